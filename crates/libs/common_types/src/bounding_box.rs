use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BoundingBoxError {
    #[error("bounding box has a non-finite coordinate")]
    NonFinite,

    #[error("bounding box is empty or inverted ({x1}, {y1}) -> ({x2}, {y2})")]
    Degenerate { x1: f32, y1: f32, x2: f32, y2: f32 },

    #[error("image dimensions must be non-zero to convert pixel boxes")]
    UnknownImageSize,
}

/// A face box in normalized image fractions: every coordinate lies in `[0, 1]`,
/// `(x1, y1)` is the top-left corner and `(x2, y2)` the bottom-right one.
///
/// This is the single convention used at the identity store boundary; pixel boxes
/// from the detection service are converted with [`BoundingBox::from_pixels`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    /// Builds a box from fractions, clamping slight detector overshoot into `[0, 1]`.
    pub fn from_fractions(x1: f32, y1: f32, x2: f32, y2: f32) -> Result<Self, BoundingBoxError> {
        if ![x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
            return Err(BoundingBoxError::NonFinite);
        }
        let clamped = Self {
            x1: x1.clamp(0.0, 1.0),
            y1: y1.clamp(0.0, 1.0),
            x2: x2.clamp(0.0, 1.0),
            y2: y2.clamp(0.0, 1.0),
        };
        if clamped.x2 <= clamped.x1 || clamped.y2 <= clamped.y1 {
            return Err(BoundingBoxError::Degenerate { x1, y1, x2, y2 });
        }
        Ok(clamped)
    }

    /// Converts a pixel box of an image `width` x `height` into fractions.
    pub fn from_pixels(
        corners: [f32; 4],
        width: u32,
        height: u32,
    ) -> Result<Self, BoundingBoxError> {
        if width == 0 || height == 0 {
            return Err(BoundingBoxError::UnknownImageSize);
        }
        let (w, h) = (width as f32, height as f32);
        let [x1, y1, x2, y2] = corners;
        Self::from_fractions(x1 / w, y1 / h, x2 / w, y2 / h)
    }

    #[must_use]
    pub const fn corners(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    #[must_use]
    pub fn is_within_unit_square(&self) -> bool {
        self.corners().iter().all(|v| (0.0..=1.0).contains(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn converts_pixels_to_fractions() {
        let bbox = BoundingBox::from_pixels([100.0, 50.0, 300.0, 250.0], 400, 500).expect("valid");
        assert_eq!(bbox.corners(), [0.25, 0.1, 0.75, 0.5]);
    }

    #[test]
    fn clamps_overshoot_into_bounds() {
        let bbox = BoundingBox::from_fractions(-0.05, 0.2, 1.2, 0.9).expect("valid");
        assert!(bbox.is_within_unit_square());
        assert_eq!(bbox.x1, 0.0);
        assert_eq!(bbox.x2, 1.0);
    }

    #[rstest]
    #[case([0.5, 0.5, 0.4, 0.9])]
    #[case([0.1, 0.1, 0.1, 0.2])]
    #[case([1.5, 0.0, 2.0, 1.0])]
    fn rejects_degenerate_boxes(#[case] c: [f32; 4]) {
        assert!(matches!(
            BoundingBox::from_fractions(c[0], c[1], c[2], c[3]),
            Err(BoundingBoxError::Degenerate { .. })
        ));
    }

    #[test]
    fn pixel_conversion_needs_image_size() {
        assert_eq!(
            BoundingBox::from_pixels([0.0, 0.0, 10.0, 10.0], 0, 100),
            Err(BoundingBoxError::UnknownImageSize)
        );
    }
}
