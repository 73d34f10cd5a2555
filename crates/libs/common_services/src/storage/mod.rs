mod error;
mod local;

pub use error::*;
pub use local::*;
