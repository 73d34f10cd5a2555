mod error;
mod identity_store;
mod memory_identity_store;
mod pg_identity_store;
mod stores;
mod tables;
mod utils;

pub use error::*;
pub use identity_store::*;
pub use memory_identity_store::*;
pub use pg_identity_store::*;
pub use stores::*;
pub use tables::*;
pub use utils::*;
