use crate::database::face::{Face, NewFace, PersonMatch};
use crate::database::face_store::FaceStore;
use crate::database::person::{NewGuest, Person, PersonTarget};
use crate::database::person_store::PersonStore;
use crate::database::photo::{NewPhoto, Photo, PhotoMatch};
use crate::database::photo_store::PhotoStore;
use crate::database::{
    DbError, IdentityStore, Propagation, ReferenceSnapshot, Registration, StoredPhoto,
};
use async_trait::async_trait;
use common_types::Embedding;
use pgvector::Vector;
use sqlx::PgPool;
use std::future::Future;
use tracing::warn;

const MAX_TX_ATTEMPTS: u32 = 3;

fn to_vector(embedding: &Embedding) -> Vector {
    Vector::from(embedding.as_slice().to_vec())
}

/// Runs `op` again when Postgres aborts it with a serialization failure or deadlock.
async fn retry_conflicts<T, F, Fut>(operation: &str, mut op: F) -> Result<T, DbError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(err) if err.is_retryable_conflict() && attempt < MAX_TX_ATTEMPTS => {
                warn!("{operation} conflicted (attempt {attempt}), retrying: {err}");
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Identity store backed by Postgres and pgvector.
#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn try_register_guest(
        &self,
        guest: &NewGuest,
        references: &[ReferenceSnapshot],
        propagation_threshold: f32,
    ) -> Result<Registration, DbError> {
        let mut tx = self.pool.begin().await?;
        let person = PersonStore::upsert_guest(&mut *tx, guest).await?;

        let mut reference_photos = Vec::with_capacity(references.len());
        let mut reference_faces = Vec::with_capacity(references.len());
        for reference in references {
            let photo = PhotoStore::insert(&mut *tx, &reference.photo).await?;
            let new_face = NewFace {
                person_id: Some(person.id),
                ..reference.face.clone()
            };
            let face = FaceStore::insert(&mut *tx, photo.id, &new_face).await?;
            reference_photos.push(photo);
            reference_faces.push(face);
        }

        let mut tagged = Vec::new();
        for face in &reference_faces {
            let claimed = FaceStore::claim_unlabeled_near(
                &mut *tx,
                person.id,
                &to_vector(&face.embedding),
                face.id,
                propagation_threshold,
            )
            .await?;
            tagged.extend(claimed);
        }

        tx.commit().await?;
        Ok(Registration {
            person,
            reference_photos,
            reference_faces,
            tagged,
        })
    }

    async fn try_label_face(
        &self,
        face_id: i64,
        target: &PersonTarget,
        propagation_threshold: f32,
    ) -> Result<Propagation, DbError> {
        let mut tx = self.pool.begin().await?;
        let face = FaceStore::find_by_id_for_update(&mut *tx, face_id)
            .await?
            .ok_or(DbError::NotFound {
                entity: "face",
                id: face_id,
            })?;
        let previous_person_id = face.person_id;

        let person = PersonStore::resolve(&mut tx, target).await?;
        let face = FaceStore::set_person(&mut *tx, face_id, person.id).await?;
        let tagged = FaceStore::claim_unlabeled_near(
            &mut *tx,
            person.id,
            &to_vector(&face.embedding),
            face.id,
            propagation_threshold,
        )
        .await?;

        tx.commit().await?;
        Ok(Propagation {
            person,
            face,
            previous_person_id,
            tagged,
        })
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn insert_photo(
        &self,
        photo: NewPhoto,
        faces: Vec<NewFace>,
    ) -> Result<StoredPhoto, DbError> {
        let mut tx = self.pool.begin().await?;
        let photo = PhotoStore::insert(&mut *tx, &photo).await?;
        let mut stored_faces = Vec::with_capacity(faces.len());
        for face in &faces {
            stored_faces.push(FaceStore::insert(&mut *tx, photo.id, face).await?);
        }
        tx.commit().await?;
        Ok(StoredPhoto {
            photo,
            faces: stored_faces,
        })
    }

    async fn nearest_person(
        &self,
        embedding: &Embedding,
        max_distance: f32,
    ) -> Result<Option<PersonMatch>, DbError> {
        PersonStore::nearest(&self.pool, &to_vector(embedding), max_distance).await
    }

    async fn photos_matching(
        &self,
        embedding: &Embedding,
        max_distance: f32,
        limit: usize,
    ) -> Result<Vec<PhotoMatch>, DbError> {
        PhotoStore::matching(&self.pool, &to_vector(embedding), max_distance, limit).await
    }

    async fn rename_or_create_person(&self, name: &str) -> Result<Person, DbError> {
        retry_conflicts("rename_or_create_person", move || async move {
            let mut tx = self.pool.begin().await?;
            let person = PersonStore::find_or_create_by_name(&mut tx, name).await?;
            tx.commit().await?;
            Ok(person)
        })
        .await
    }

    async fn upsert_guest(&self, guest: &NewGuest) -> Result<Person, DbError> {
        PersonStore::upsert_guest(&self.pool, guest).await
    }

    async fn register_guest(
        &self,
        guest: &NewGuest,
        references: Vec<ReferenceSnapshot>,
        propagation_threshold: f32,
    ) -> Result<Registration, DbError> {
        retry_conflicts("register_guest", || {
            self.try_register_guest(guest, &references, propagation_threshold)
        })
        .await
    }

    async fn label_face(
        &self,
        face_id: i64,
        target: &PersonTarget,
        propagation_threshold: f32,
    ) -> Result<Propagation, DbError> {
        retry_conflicts("label_face", || {
            self.try_label_face(face_id, target, propagation_threshold)
        })
        .await
    }

    async fn find_photo(&self, photo_id: i64) -> Result<Option<Photo>, DbError> {
        PhotoStore::find_by_id(&self.pool, photo_id).await
    }

    async fn list_photos(&self) -> Result<Vec<Photo>, DbError> {
        PhotoStore::list_completed(&self.pool).await
    }

    async fn find_face(&self, face_id: i64) -> Result<Option<Face>, DbError> {
        FaceStore::find_by_id(&self.pool, face_id).await
    }

    async fn faces_for_photo(&self, photo_id: i64) -> Result<Vec<Face>, DbError> {
        FaceStore::for_photo(&self.pool, photo_id).await
    }

    async fn list_persons(&self) -> Result<Vec<Person>, DbError> {
        PersonStore::list(&self.pool).await
    }

    async fn persons_by_ids(&self, person_ids: &[i64]) -> Result<Vec<Person>, DbError> {
        PersonStore::find_by_ids(&self.pool, person_ids).await
    }

    async fn delete_photo(&self, photo_id: i64) -> Result<Option<Photo>, DbError> {
        PhotoStore::delete(&self.pool, photo_id).await
    }

    async fn delete_person(&self, person_id: i64) -> Result<bool, DbError> {
        let result = PersonStore::delete(&self.pool, person_id).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
