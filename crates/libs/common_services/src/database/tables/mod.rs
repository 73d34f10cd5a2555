pub mod face;
pub mod person;
pub mod photo;
