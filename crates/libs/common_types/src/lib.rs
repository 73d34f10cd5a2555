#![deny(clippy::unwrap_used)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cast_precision_loss
)]
mod bounding_box;
mod contact;
mod detected_face;
mod embedding;

pub use bounding_box::*;
pub use contact::*;
pub use detected_face::*;
pub use embedding::*;
