mod backoff;
mod bridge;
mod credentials;
mod error;
mod session;
mod transport;

pub use backoff::*;
pub use bridge::*;
pub use credentials::*;
pub use error::*;
pub use session::*;
pub use transport::*;
