use super::error::DetectionError;
use app_state::{BoxUnits, DetectionSettings};
use async_trait::async_trait;
use common_types::{BoundingBox, DetectedFace, DetectionResponse};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Black-box face detector: image bytes in, boxes and embeddings out.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    /// Boxes in the returned faces are always normalized fractions.
    async fn detect(&self, image: &[u8]) -> Result<Vec<DetectedFace>, DetectionError>;
}

/// Width and height from the image header, without decoding pixels.
pub fn image_dimensions(image: &[u8]) -> Result<(u32, u32), DetectionError> {
    let size =
        imagesize::blob_size(image).map_err(|e| DetectionError::UnreadableImage(e.to_string()))?;
    let width = u32::try_from(size.width)
        .map_err(|_| DetectionError::UnreadableImage(format!("width {}", size.width)))?;
    let height = u32::try_from(size.height)
        .map_err(|_| DetectionError::UnreadableImage(format!("height {}", size.height)))?;
    Ok((width, height))
}

/// Converts the detection service's answer into fraction boxes.
///
/// Faces whose box cannot be converted are dropped with a warning; they could
/// never be stored anyway.
pub fn to_detected_faces(
    response: DetectionResponse,
    units: BoxUnits,
    dimensions: Option<(u32, u32)>,
) -> Vec<DetectedFace> {
    response
        .faces
        .into_iter()
        .filter_map(|raw| {
            let [x1, y1, x2, y2] = raw.bounding_box.corners();
            let bounding_box = match (units, dimensions) {
                (BoxUnits::Fraction, _) => BoundingBox::from_fractions(x1, y1, x2, y2),
                (BoxUnits::Pixels, Some((width, height))) => {
                    BoundingBox::from_pixels([x1, y1, x2, y2], width, height)
                }
                (BoxUnits::Pixels, None) => BoundingBox::from_pixels([x1, y1, x2, y2], 0, 0),
            };
            match bounding_box {
                Ok(bounding_box) => Some(DetectedFace {
                    bounding_box,
                    embedding: raw.embedding,
                    confidence: raw.confidence,
                }),
                Err(e) => {
                    warn!("Dropping detected face with unusable box: {e}");
                    None
                }
            }
        })
        .collect()
}

/// Calls the external detection service over HTTP.
#[derive(Clone)]
pub struct HttpFaceDetector {
    http_client: Client,
    url: Url,
    units: BoxUnits,
    timeout: Duration,
}

impl HttpFaceDetector {
    pub fn new(http_client: Client, settings: &DetectionSettings) -> Result<Self, DetectionError> {
        Ok(Self {
            http_client,
            url: settings.url.parse()?,
            units: settings.box_units,
            timeout: settings.timeout(),
        })
    }
}

#[async_trait]
impl FaceDetector for HttpFaceDetector {
    async fn detect(&self, image: &[u8]) -> Result<Vec<DetectedFace>, DetectionError> {
        let dimensions = match self.units {
            BoxUnits::Pixels => Some(image_dimensions(image)?),
            BoxUnits::Fraction => None,
        };

        let response = self
            .http_client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/octet-stream")
            .timeout(self.timeout)
            .body(image.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DetectionError::Status { status, body });
        }

        let parsed: DetectionResponse = response.json().await?;
        debug!("Detection service found {} faces", parsed.faces.len());
        Ok(to_detected_faces(parsed, self.units, dimensions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: &str) -> DetectionResponse {
        serde_json::from_str(json).expect("valid detection response")
    }

    #[test]
    fn pixel_boxes_become_fractions() {
        let faces = to_detected_faces(
            response(r#"{"faces": [{"box": [100, 50, 300, 150], "embedding": [1.0], "confidence": 0.9}]}"#),
            BoxUnits::Pixels,
            Some((400, 200)),
        );
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].bounding_box.corners(), [0.25, 0.25, 0.75, 0.75]);
    }

    #[test]
    fn fraction_boxes_are_clamped() {
        let faces = to_detected_faces(
            response(r#"{"faces": [{"box": {"x1": -0.01, "y1": 0.1, "x2": 1.02, "y2": 0.9}, "embedding": [1.0]}]}"#),
            BoxUnits::Fraction,
            None,
        );
        assert_eq!(faces[0].bounding_box.corners(), [0.0, 0.1, 1.0, 0.9]);
        assert!(faces[0].bounding_box.is_within_unit_square());
    }

    #[test]
    fn degenerate_boxes_are_dropped() {
        let faces = to_detected_faces(
            response(
                r#"{"faces": [
                    {"box": [10, 10, 10, 40], "embedding": [1.0]},
                    {"box": [10, 10, 20, 40], "embedding": [1.0]}
                ]}"#,
            ),
            BoxUnits::Pixels,
            Some((100, 100)),
        );
        assert_eq!(faces.len(), 1);
    }

    #[test]
    fn pixel_boxes_without_dimensions_are_dropped() {
        let faces = to_detected_faces(
            response(r#"{"faces": [{"box": [1, 1, 2, 2], "embedding": [1.0]}]}"#),
            BoxUnits::Pixels,
            None,
        );
        assert!(faces.is_empty());
    }

    #[test]
    fn garbage_is_not_an_image() {
        assert!(matches!(
            image_dimensions(b"definitely not an image"),
            Err(DetectionError::UnreadableImage(_))
        ));
    }
}
