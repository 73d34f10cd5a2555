use super::error::MatchError;
use crate::database::face::NewFace;
use crate::database::photo::PhotoMatch;
use crate::database::IdentityStore;
use app_state::MatchingSettings;
use common_types::{BoundingBox, DetectedFace, Embedding};
use std::sync::Arc;
use tracing::{debug, warn};

/// A detected face whose embedding is normalized and of the deployment's dimensionality.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedFace {
    pub bounding_box: BoundingBox,
    pub embedding: Embedding,
    pub confidence: f32,
}

/// Normalizes every detected face, dropping the ones that cannot be identified.
pub fn prepare_faces(faces: Vec<DetectedFace>, dimensions: usize) -> Vec<PreparedFace> {
    faces
        .into_iter()
        .filter_map(|face| {
            let embedding = Embedding::normalize(&face.embedding)
                .and_then(|e| e.ensure_dimensions(dimensions).map(|()| e));
            match embedding {
                Ok(embedding) => Some(PreparedFace {
                    bounding_box: face.bounding_box,
                    embedding,
                    confidence: face.confidence,
                }),
                Err(e) => {
                    warn!("Skipping unidentifiable face: {e}");
                    None
                }
            }
        })
        .collect()
}

/// The single face a selfie must contain.
pub fn selfie_face(mut faces: Vec<PreparedFace>) -> Result<PreparedFace, MatchError> {
    match faces.len() {
        0 => Err(MatchError::NoFaceFound),
        1 => Ok(faces.remove(0)),
        n => Err(MatchError::MultipleFaces(n)),
    }
}

/// Highest-confidence face of a registration snapshot. On equal confidence the
/// face the detector listed first wins.
#[must_use]
pub fn most_confident(faces: Vec<PreparedFace>) -> Option<PreparedFace> {
    faces
        .into_iter()
        .reduce(|best, face| if face.confidence > best.confidence { face } else { best })
}

/// Matches faces against the identity store.
#[derive(Clone)]
pub struct MatchingEngine {
    store: Arc<dyn IdentityStore>,
    settings: MatchingSettings,
}

impl MatchingEngine {
    #[must_use]
    pub fn new(store: Arc<dyn IdentityStore>, settings: MatchingSettings) -> Self {
        Self { store, settings }
    }

    #[must_use]
    pub fn prepare(&self, faces: Vec<DetectedFace>) -> Vec<PreparedFace> {
        prepare_faces(faces, self.settings.embedding_dimensions)
    }

    /// Upload-time association: links each face to the nearest known person within
    /// the association threshold. Unmatched faces stay unlabeled; no person is created.
    pub async fn associate(&self, faces: Vec<PreparedFace>) -> Result<Vec<NewFace>, MatchError> {
        let mut associated = Vec::with_capacity(faces.len());
        for face in faces {
            let nearest = self
                .store
                .nearest_person(&face.embedding, self.settings.association_threshold)
                .await?;
            if let Some(found) = &nearest {
                debug!(
                    "Face matches person {} at distance {:.3}",
                    found.person.id, found.distance
                );
            }
            associated.push(NewFace {
                person_id: nearest.map(|m| m.person.id),
                bounding_box: face.bounding_box,
                embedding: face.embedding,
                confidence: face.confidence,
            });
        }
        Ok(associated)
    }

    /// Guest self-search: every photo with a face close to the one face in the selfie,
    /// nearest first. No match is an empty list, not an error.
    pub async fn search(&self, selfie: Vec<DetectedFace>) -> Result<Vec<PhotoMatch>, MatchError> {
        let face = selfie_face(self.prepare(selfie))?;
        let matches = self
            .store
            .photos_matching(
                &face.embedding,
                self.settings.search_threshold,
                self.settings.search_limit,
            )
            .await?;
        debug!("Selfie matched {} photos", matches.len());
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryIdentityStore;
    use crate::database::photo::{NewPhoto, PhotoStatus};

    fn detected(embedding: Vec<f32>, confidence: f32) -> DetectedFace {
        DetectedFace {
            bounding_box: BoundingBox::from_fractions(0.1, 0.1, 0.3, 0.3).expect("valid box"),
            embedding,
            confidence,
        }
    }

    fn settings() -> MatchingSettings {
        MatchingSettings {
            embedding_dimensions: 2,
            ..MatchingSettings::default()
        }
    }

    #[test]
    fn prepare_drops_zero_and_wrong_sized_embeddings() {
        let prepared = prepare_faces(
            vec![
                detected(vec![3.0, 4.0], 0.9),
                detected(vec![0.0, 0.0], 0.9),
                detected(vec![1.0, 2.0, 3.0], 0.9),
                detected(vec![], 0.9),
            ],
            2,
        );
        assert_eq!(prepared.len(), 1);
        assert_eq!(prepared[0].embedding.as_slice(), &[0.6, 0.8]);
    }

    #[test]
    fn selfie_needs_exactly_one_face() {
        let one = prepare_faces(vec![detected(vec![1.0, 0.0], 0.9)], 2);
        let two = prepare_faces(
            vec![detected(vec![1.0, 0.0], 0.9), detected(vec![0.0, 1.0], 0.8)],
            2,
        );
        assert!(selfie_face(one).is_ok());
        assert!(matches!(selfie_face(Vec::new()), Err(MatchError::NoFaceFound)));
        assert!(matches!(selfie_face(two), Err(MatchError::MultipleFaces(2))));
    }

    #[test]
    fn most_confident_prefers_first_on_ties() {
        let faces = prepare_faces(
            vec![
                detected(vec![1.0, 0.0], 0.7),
                detected(vec![0.0, 1.0], 0.9),
                detected(vec![1.0, 1.0], 0.9),
            ],
            2,
        );
        let best = most_confident(faces).expect("three faces");
        assert_eq!(best.embedding.as_slice(), &[0.0, 1.0]);
        assert!(most_confident(Vec::new()).is_none());
    }

    #[tokio::test]
    async fn association_never_creates_persons() {
        let store = Arc::new(MemoryIdentityStore::new());
        let engine = MatchingEngine::new(store.clone(), settings());

        let faces = engine.prepare(vec![detected(vec![1.0, 0.0], 0.9)]);
        let associated = engine.associate(faces).await.expect("associate");

        assert_eq!(associated[0].person_id, None);
        assert!(store.list_persons().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn search_without_matches_is_empty() {
        let store = Arc::new(MemoryIdentityStore::new());
        store
            .insert_photo(
                NewPhoto {
                    url: "http://media/x.jpg".into(),
                    storage_key: "x.jpg".into(),
                    original_url: None,
                    original_storage_key: None,
                    status: PhotoStatus::Completed,
                    width: None,
                    height: None,
                },
                engine_faces(&[vec![0.0, 1.0]]),
            )
            .await
            .expect("insert");
        let engine = MatchingEngine::new(store, settings());

        let found = engine
            .search(vec![detected(vec![1.0, 0.0], 0.9)])
            .await
            .expect("search");
        assert!(found.is_empty());
    }

    fn engine_faces(embeddings: &[Vec<f32>]) -> Vec<NewFace> {
        prepare_faces(
            embeddings.iter().map(|e| detected(e.clone(), 0.9)).collect(),
            2,
        )
        .into_iter()
        .map(|f| NewFace {
            person_id: None,
            bounding_box: f.bounding_box,
            embedding: f.embedding,
            confidence: f.confidence,
        })
        .collect()
    }
}
