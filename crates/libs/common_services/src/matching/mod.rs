mod engine;
mod error;

pub use engine::*;
pub use error::*;
