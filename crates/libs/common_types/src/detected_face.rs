use crate::BoundingBox;
use serde::{Deserialize, Serialize};

/// Response body of the face detection service.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct DetectionResponse {
    #[serde(default)]
    pub faces: Vec<RawDetectedFace>,
}

/// One face as returned by the detection service, before any unit conversion.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RawDetectedFace {
    #[serde(rename = "box", alias = "bbox", alias = "boundingBox")]
    pub bounding_box: RawBox,
    pub embedding: Vec<f32>,
    #[serde(alias = "score", default)]
    pub confidence: f32,
}

/// Detector variants disagree on box shape; both end up as `[x1, y1, x2, y2]`.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
#[serde(untagged)]
pub enum RawBox {
    Corners([f32; 4]),
    Named { x1: f32, y1: f32, x2: f32, y2: f32 },
}

impl RawBox {
    #[must_use]
    pub const fn corners(&self) -> [f32; 4] {
        match *self {
            Self::Corners(c) => c,
            Self::Named { x1, y1, x2, y2 } => [x1, y1, x2, y2],
        }
    }
}

/// A detected face with its box already in the deployment's fraction convention.
/// The embedding is still raw; normalization happens in the matching engine.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFace {
    pub bounding_box: BoundingBox,
    pub embedding: Vec<f32>,
    pub confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_both_box_shapes() {
        let body = r#"{"faces": [
            {"box": [1, 2, 3, 4], "embedding": [0.1], "confidence": 0.9},
            {"bbox": {"x1": 5, "y1": 6, "x2": 7, "y2": 8}, "embedding": [0.2], "score": 0.8}
        ]}"#;
        let parsed: DetectionResponse = serde_json::from_str(body).expect("valid body");

        assert_eq!(parsed.faces[0].bounding_box.corners(), [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(parsed.faces[1].bounding_box.corners(), [5.0, 6.0, 7.0, 8.0]);
        assert!((parsed.faces[1].confidence - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn missing_faces_means_none() {
        let parsed: DetectionResponse = serde_json::from_str("{}").expect("valid body");
        assert!(parsed.faces.is_empty());
    }
}
