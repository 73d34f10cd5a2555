pub mod face_store;
pub mod person_store;
pub mod photo_store;
