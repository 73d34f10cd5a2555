use crate::database::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("no face found in the selfie")]
    NoFaceFound,

    #[error("the selfie shows {0} faces; exactly one is needed")]
    MultipleFaces(usize),

    #[error("identity store failed: {0}")]
    Database(#[from] DbError),
}
