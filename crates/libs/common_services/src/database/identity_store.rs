use crate::database::DbError;
use crate::database::face::{Face, NewFace, PersonMatch};
use crate::database::person::{NewGuest, Person, PersonTarget};
use crate::database::photo::{NewPhoto, Photo, PhotoMatch};
use async_trait::async_trait;
use common_types::Embedding;

/// A photo row and the faces that were written with it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPhoto {
    pub photo: Photo,
    pub faces: Vec<Face>,
}

/// One registration snapshot: the reference photo and the guest's face in it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSnapshot {
    pub photo: NewPhoto,
    pub face: NewFace,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub person: Person,
    pub reference_photos: Vec<Photo>,
    pub reference_faces: Vec<Face>,
    /// Previously unlabeled faces that now belong to the guest.
    pub tagged: Vec<Face>,
}

/// Result of naming one face and propagating that name.
#[derive(Debug, Clone, PartialEq)]
pub struct Propagation {
    pub person: Person,
    pub face: Face,
    pub previous_person_id: Option<i64>,
    /// Other faces that were unlabeled and are now linked to `person`.
    pub tagged: Vec<Face>,
}

impl Propagation {
    /// Ids of the photos whose faces changed identity in this operation.
    #[must_use]
    pub fn affected_photo_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = std::iter::once(&self.face)
            .chain(&self.tagged)
            .map(|f| f.photo_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Durable Person ↔ Face ↔ Photo mapping with vector similarity queries.
///
/// Distances are Euclidean between unit-length embeddings and every threshold is
/// exclusive (`distance < max_distance`). Every method is atomic: multi-row
/// writes either fully commit or leave the store untouched.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Writes a photo and all of its faces together.
    async fn insert_photo(&self, photo: NewPhoto, faces: Vec<NewFace>)
    -> Result<StoredPhoto, DbError>;

    /// Person owning the closest labeled face, if that face is closer than `max_distance`.
    /// Ties resolve to the lowest face id.
    async fn nearest_person(
        &self,
        embedding: &Embedding,
        max_distance: f32,
    ) -> Result<Option<PersonMatch>, DbError>;

    /// Completed photos with at least one face closer than `max_distance`,
    /// nearest first (by their closest face), ties broken by photo id.
    async fn photos_matching(
        &self,
        embedding: &Embedding,
        max_distance: f32,
        limit: usize,
    ) -> Result<Vec<PhotoMatch>, DbError>;

    /// Returns the person with this display name, creating it when nobody has it.
    async fn rename_or_create_person(&self, name: &str) -> Result<Person, DbError>;

    /// Inserts or updates a roster entry keyed by contact handle.
    async fn upsert_guest(&self, guest: &NewGuest) -> Result<Person, DbError>;

    /// Upserts the guest, stores their reference snapshots and links every unlabeled
    /// face closer than `propagation_threshold` to any reference face.
    async fn register_guest(
        &self,
        guest: &NewGuest,
        references: Vec<ReferenceSnapshot>,
        propagation_threshold: f32,
    ) -> Result<Registration, DbError>;

    /// Links `face_id` to the resolved person and claims every other unlabeled face
    /// closer than `propagation_threshold`. Never touches already labeled faces.
    async fn label_face(
        &self,
        face_id: i64,
        target: &PersonTarget,
        propagation_threshold: f32,
    ) -> Result<Propagation, DbError>;

    async fn find_photo(&self, photo_id: i64) -> Result<Option<Photo>, DbError>;

    /// Completed event photos, newest first. Reference photos are never listed.
    async fn list_photos(&self) -> Result<Vec<Photo>, DbError>;

    async fn find_face(&self, face_id: i64) -> Result<Option<Face>, DbError>;

    async fn faces_for_photo(&self, photo_id: i64) -> Result<Vec<Face>, DbError>;

    async fn list_persons(&self) -> Result<Vec<Person>, DbError>;

    async fn persons_by_ids(&self, person_ids: &[i64]) -> Result<Vec<Person>, DbError>;

    /// Deletes the photo and its faces, returning the removed row.
    async fn delete_photo(&self, photo_id: i64) -> Result<Option<Photo>, DbError>;

    /// Deletes a person. Their faces stay, unlabeled.
    async fn delete_person(&self, person_id: i64) -> Result<bool, DbError>;

    async fn ping(&self) -> Result<(), DbError>;
}
