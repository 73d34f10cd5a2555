pub mod faces;
pub mod guests;
pub mod messaging;
pub mod photos;
pub mod search;
pub mod upload;
