use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Invalid detection service URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Detection request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Detection service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Could not read image dimensions: {0}")]
    UnreadableImage(String),
}
