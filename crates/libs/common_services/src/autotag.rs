use crate::database::face::Face;
use crate::database::person::PersonTarget;
use crate::database::{DbError, IdentityStore, Propagation};
use common_types::{Embedding, EmbeddingError};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum AutoTagError {
    #[error("a face needs a non-empty name")]
    EmptyName,

    #[error("face {0} does not exist")]
    FaceNotFound(i64),

    #[error("more than one person is named {0:?}; name them by contact handle")]
    AmbiguousName(String),

    #[error("naming failed: {0}")]
    Database(DbError),
}

impl From<DbError> for AutoTagError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity: "face", id } => Self::FaceNotFound(id),
            DbError::AmbiguousName(name) => Self::AmbiguousName(name),
            other => Self::Database(other),
        }
    }
}

/// Ids of the unlabeled faces, other than `source_face_id`, strictly closer than
/// `max_distance` to `source`. Output is sorted by face id.
///
/// Labeled faces are never candidates, whatever their distance.
pub fn unlabeled_within<'a>(
    source_face_id: i64,
    source: &Embedding,
    faces: impl IntoIterator<Item = &'a Face>,
    max_distance: f32,
) -> Result<Vec<i64>, EmbeddingError> {
    let mut ids = Vec::new();
    for face in faces {
        if face.id == source_face_id || face.person_id.is_some() {
            continue;
        }
        if face.embedding.distance(source)? < max_distance {
            ids.push(face.id);
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

/// Extends a name given to one face to every similar face nobody has named yet.
#[derive(Clone)]
pub struct AutoTagPropagator {
    store: Arc<dyn IdentityStore>,
    propagation_threshold: f32,
}

impl AutoTagPropagator {
    #[must_use]
    pub fn new(store: Arc<dyn IdentityStore>, propagation_threshold: f32) -> Self {
        Self {
            store,
            propagation_threshold,
        }
    }

    /// Names `face_id` and propagates, all in one transaction.
    pub async fn name_face(
        &self,
        face_id: i64,
        target: PersonTarget,
    ) -> Result<Propagation, AutoTagError> {
        let target = match target {
            PersonTarget::Named(name) => PersonTarget::Named(clean_name(&name)?),
            PersonTarget::Guest(mut guest) => {
                guest.name = clean_name(&guest.name)?;
                PersonTarget::Guest(guest)
            }
        };

        let propagation = self
            .store
            .label_face(face_id, &target, self.propagation_threshold)
            .await?;
        info!(
            "Face {face_id} named {:?} (person {}), {} more faces tagged",
            target.name(),
            propagation.person.id,
            propagation.tagged.len()
        );
        Ok(propagation)
    }
}

fn clean_name(name: &str) -> Result<String, AutoTagError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AutoTagError::EmptyName);
    }
    Ok(name.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryIdentityStore;
    use crate::database::face::NewFace;
    use crate::database::photo::{NewPhoto, PhotoStatus};
    use chrono::Utc;
    use common_types::BoundingBox;

    fn unit(values: &[f32]) -> Embedding {
        Embedding::normalize(values).expect("non-zero vector")
    }

    fn face(id: i64, person_id: Option<i64>, values: &[f32]) -> Face {
        Face {
            id,
            photo_id: 1,
            person_id,
            bounding_box: BoundingBox::from_fractions(0.1, 0.1, 0.5, 0.5).expect("valid box"),
            confidence: 0.9,
            embedding: unit(values),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn candidates_skip_source_and_labeled_faces() {
        let faces = [
            face(1, None, &[1.0, 0.0]),
            face(2, Some(7), &[1.0, 0.01]),
            face(3, None, &[1.0, 0.02]),
            face(4, None, &[0.0, 1.0]),
        ];
        let ids = unlabeled_within(1, &unit(&[1.0, 0.0]), &faces, 0.75).expect("same dims");
        assert_eq!(ids, vec![3]);
    }

    #[test]
    fn candidates_require_strictly_smaller_distance() {
        let faces = [face(2, None, &[0.0, 1.0])];
        let exact = std::f32::consts::SQRT_2;
        let ids = unlabeled_within(1, &unit(&[1.0, 0.0]), &faces, exact).expect("same dims");
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn blank_names_are_rejected_before_touching_the_store() {
        let store = Arc::new(MemoryIdentityStore::new());
        let propagator = AutoTagPropagator::new(store.clone(), 0.75);

        let err = propagator
            .name_face(1, PersonTarget::Named("   ".into()))
            .await
            .expect_err("blank name");
        assert!(matches!(err, AutoTagError::EmptyName));
        assert!(store.list_persons().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn unknown_face_is_reported() {
        let store = Arc::new(MemoryIdentityStore::new());
        let propagator = AutoTagPropagator::new(store, 0.75);

        let err = propagator
            .name_face(42, PersonTarget::Named("Carol".into()))
            .await
            .expect_err("missing face");
        assert!(matches!(err, AutoTagError::FaceNotFound(42)));
    }

    #[tokio::test]
    async fn names_are_trimmed() {
        let store = Arc::new(MemoryIdentityStore::new());
        let stored = store
            .insert_photo(
                NewPhoto {
                    url: "http://media/a.jpg".into(),
                    storage_key: "a.jpg".into(),
                    original_url: None,
                    original_storage_key: None,
                    status: PhotoStatus::Completed,
                    width: None,
                    height: None,
                },
                vec![NewFace {
                    person_id: None,
                    bounding_box: BoundingBox::from_fractions(0.1, 0.1, 0.4, 0.4)
                        .expect("valid box"),
                    embedding: unit(&[1.0, 0.0]),
                    confidence: 0.9,
                }],
            )
            .await
            .expect("insert");
        let propagator = AutoTagPropagator::new(store, 0.75);

        let propagation = propagator
            .name_face(stored.faces[0].id, PersonTarget::Named("  Dana ".into()))
            .await
            .expect("named");
        assert_eq!(propagation.person.name.as_deref(), Some("Dana"));
    }
}
