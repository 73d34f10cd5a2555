use crate::autotag::unlabeled_within;
use crate::database::face::{Face, NewFace, PersonMatch};
use crate::database::person::{NewGuest, Person, PersonTarget};
use crate::database::photo::{NewPhoto, Photo, PhotoMatch, PhotoStatus};
use crate::database::{
    DbError, IdentityStore, Propagation, ReferenceSnapshot, Registration, StoredPhoto,
};
use async_trait::async_trait;
use chrono::Utc;
use common_types::Embedding;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    last_person_id: i64,
    last_photo_id: i64,
    last_face_id: i64,
    persons: BTreeMap<i64, Person>,
    photos: BTreeMap<i64, Photo>,
    faces: BTreeMap<i64, Face>,
}

impl MemoryState {
    fn insert_photo(&mut self, photo: &NewPhoto) -> Photo {
        self.last_photo_id += 1;
        let photo = Photo {
            id: self.last_photo_id,
            url: photo.url.clone(),
            storage_key: photo.storage_key.clone(),
            original_url: photo.original_url.clone(),
            original_storage_key: photo.original_storage_key.clone(),
            status: photo.status,
            width: photo.width,
            height: photo.height,
            created_at: Utc::now(),
        };
        self.photos.insert(photo.id, photo.clone());
        photo
    }

    fn insert_face(&mut self, photo_id: i64, face: &NewFace) -> Result<Face, DbError> {
        if !self.photos.contains_key(&photo_id) {
            return Err(DbError::NotFound {
                entity: "photo",
                id: photo_id,
            });
        }
        self.last_face_id += 1;
        let face = Face {
            id: self.last_face_id,
            photo_id,
            person_id: face.person_id,
            bounding_box: face.bounding_box,
            confidence: face.confidence,
            embedding: face.embedding.clone(),
            created_at: Utc::now(),
        };
        self.faces.insert(face.id, face.clone());
        Ok(face)
    }

    fn insert_person(&mut self, name: Option<String>, guest: Option<&NewGuest>) -> Person {
        self.last_person_id += 1;
        let now = Utc::now();
        let person = Person {
            id: self.last_person_id,
            name,
            contact_handle: guest.map(|g| g.contact.as_str().to_owned()),
            seat_label: guest.and_then(|g| g.seat_label.clone()),
            created_at: now,
            updated_at: now,
        };
        self.persons.insert(person.id, person.clone());
        person
    }

    fn upsert_guest(&mut self, guest: &NewGuest) -> Person {
        let existing = self
            .persons
            .values_mut()
            .find(|p| p.contact_handle.as_deref() == Some(guest.contact.as_str()));
        if let Some(person) = existing {
            person.name = Some(guest.name.clone());
            if guest.seat_label.is_some() {
                person.seat_label.clone_from(&guest.seat_label);
            }
            person.updated_at = Utc::now();
            return person.clone();
        }
        self.insert_person(Some(guest.name.clone()), Some(guest))
    }

    fn find_or_create_by_name(&mut self, name: &str) -> Result<Person, DbError> {
        let named: Vec<&Person> = self
            .persons
            .values()
            .filter(|p| p.name.as_deref() == Some(name))
            .take(2)
            .collect();
        match named.as_slice() {
            [] => Ok(self.insert_person(Some(name.to_owned()), None)),
            [person] => Ok((*person).clone()),
            _ => Err(DbError::AmbiguousName(name.to_owned())),
        }
    }

    fn resolve(&mut self, target: &PersonTarget) -> Result<Person, DbError> {
        match target {
            PersonTarget::Named(name) => self.find_or_create_by_name(name),
            PersonTarget::Guest(guest) => Ok(self.upsert_guest(guest)),
        }
    }

    /// Links every unlabeled face near `source` to `person_id` and returns them.
    fn claim_unlabeled_near(
        &mut self,
        person_id: i64,
        source_face_id: i64,
        source: &Embedding,
        max_distance: f32,
    ) -> Result<Vec<Face>, DbError> {
        let ids = unlabeled_within(source_face_id, source, self.faces.values(), max_distance)?;
        let mut claimed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(face) = self.faces.get_mut(&id) {
                face.person_id = Some(person_id);
                claimed.push(face.clone());
            }
        }
        Ok(claimed)
    }
}

/// Identity store that lives in process memory.
///
/// Every mutation runs against a copy of the state that replaces the original only
/// when the whole operation succeeded, so a failure half way leaves nothing behind.
///
/// Copying the state makes each write linear in the size of the store. Meant for
/// tests and small local runs; deployments serving an event use [`PgIdentityStore`].
///
/// [`PgIdentityStore`]: crate::database::PgIdentityStore
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    state: RwLock<MemoryState>,
}

impl MemoryIdentityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn transaction<T>(
        &self,
        op: impl FnOnce(&mut MemoryState) -> Result<T, DbError> + Send,
    ) -> Result<T, DbError> {
        let mut state = self.state.write().await;
        let mut draft = state.clone();
        let output = op(&mut draft)?;
        *state = draft;
        Ok(output)
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn insert_photo(
        &self,
        photo: NewPhoto,
        faces: Vec<NewFace>,
    ) -> Result<StoredPhoto, DbError> {
        self.transaction(|state| {
            let photo = state.insert_photo(&photo);
            let faces = faces
                .iter()
                .map(|face| state.insert_face(photo.id, face))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(StoredPhoto { photo, faces })
        })
        .await
    }

    async fn nearest_person(
        &self,
        embedding: &Embedding,
        max_distance: f32,
    ) -> Result<Option<PersonMatch>, DbError> {
        let state = self.state.read().await;
        let mut best: Option<(f32, &Face)> = None;
        for face in state.faces.values().filter(|f| f.person_id.is_some()) {
            let distance = face.embedding.distance(embedding)?;
            // Faces iterate in id order, so strict `<` keeps the lowest id on ties.
            if distance < max_distance && best.is_none_or(|(d, _)| distance < d) {
                best = Some((distance, face));
            }
        }
        Ok(best.and_then(|(distance, face)| {
            let person = state.persons.get(&face.person_id?)?.clone();
            Some(PersonMatch { person, distance })
        }))
    }

    async fn photos_matching(
        &self,
        embedding: &Embedding,
        max_distance: f32,
        limit: usize,
    ) -> Result<Vec<PhotoMatch>, DbError> {
        let state = self.state.read().await;
        let mut closest: HashMap<i64, f32> = HashMap::new();
        for face in state.faces.values() {
            let distance = face.embedding.distance(embedding)?;
            if distance < max_distance {
                closest
                    .entry(face.photo_id)
                    .and_modify(|d| *d = d.min(distance))
                    .or_insert(distance);
            }
        }
        let mut matches: Vec<PhotoMatch> = closest
            .into_iter()
            .filter_map(|(photo_id, distance)| {
                let photo = state.photos.get(&photo_id)?;
                (photo.status == PhotoStatus::Completed).then(|| PhotoMatch {
                    photo: photo.clone(),
                    distance,
                })
            })
            .collect();
        matches.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.photo.id.cmp(&b.photo.id))
        });
        matches.truncate(limit);
        Ok(matches)
    }

    async fn rename_or_create_person(&self, name: &str) -> Result<Person, DbError> {
        self.transaction(|state| state.find_or_create_by_name(name))
            .await
    }

    async fn upsert_guest(&self, guest: &NewGuest) -> Result<Person, DbError> {
        self.transaction(|state| Ok(state.upsert_guest(guest))).await
    }

    async fn register_guest(
        &self,
        guest: &NewGuest,
        references: Vec<ReferenceSnapshot>,
        propagation_threshold: f32,
    ) -> Result<Registration, DbError> {
        self.transaction(|state| {
            let person = state.upsert_guest(guest);
            let mut reference_photos = Vec::with_capacity(references.len());
            let mut reference_faces = Vec::with_capacity(references.len());
            for reference in &references {
                let photo = state.insert_photo(&reference.photo);
                let new_face = NewFace {
                    person_id: Some(person.id),
                    ..reference.face.clone()
                };
                reference_faces.push(state.insert_face(photo.id, &new_face)?);
                reference_photos.push(photo);
            }
            let mut tagged = Vec::new();
            for face in &reference_faces {
                tagged.extend(state.claim_unlabeled_near(
                    person.id,
                    face.id,
                    &face.embedding,
                    propagation_threshold,
                )?);
            }
            Ok(Registration {
                person,
                reference_photos,
                reference_faces,
                tagged,
            })
        })
        .await
    }

    async fn label_face(
        &self,
        face_id: i64,
        target: &PersonTarget,
        propagation_threshold: f32,
    ) -> Result<Propagation, DbError> {
        self.transaction(|state| {
            let previous_person_id = state
                .faces
                .get(&face_id)
                .ok_or(DbError::NotFound {
                    entity: "face",
                    id: face_id,
                })?
                .person_id;
            let person = state.resolve(target)?;
            let face = state.faces.get_mut(&face_id).ok_or(DbError::NotFound {
                entity: "face",
                id: face_id,
            })?;
            face.person_id = Some(person.id);
            let face = face.clone();
            let tagged = state.claim_unlabeled_near(
                person.id,
                face.id,
                &face.embedding,
                propagation_threshold,
            )?;
            Ok(Propagation {
                person,
                face,
                previous_person_id,
                tagged,
            })
        })
        .await
    }

    async fn find_photo(&self, photo_id: i64) -> Result<Option<Photo>, DbError> {
        Ok(self.state.read().await.photos.get(&photo_id).cloned())
    }

    async fn list_photos(&self) -> Result<Vec<Photo>, DbError> {
        let state = self.state.read().await;
        let mut photos: Vec<Photo> = state
            .photos
            .values()
            .filter(|p| p.status == PhotoStatus::Completed)
            .cloned()
            .collect();
        photos.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(photos)
    }

    async fn find_face(&self, face_id: i64) -> Result<Option<Face>, DbError> {
        Ok(self.state.read().await.faces.get(&face_id).cloned())
    }

    async fn faces_for_photo(&self, photo_id: i64) -> Result<Vec<Face>, DbError> {
        let state = self.state.read().await;
        Ok(state
            .faces
            .values()
            .filter(|f| f.photo_id == photo_id)
            .cloned()
            .collect())
    }

    async fn list_persons(&self) -> Result<Vec<Person>, DbError> {
        let state = self.state.read().await;
        let mut persons: Vec<Person> = state.persons.values().cloned().collect();
        persons.sort_by(|a, b| match (&a.name, &b.name) {
            (Some(x), Some(y)) => x.cmp(y).then(a.id.cmp(&b.id)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.id.cmp(&b.id),
        });
        Ok(persons)
    }

    async fn persons_by_ids(&self, person_ids: &[i64]) -> Result<Vec<Person>, DbError> {
        let state = self.state.read().await;
        let mut persons: Vec<Person> = person_ids
            .iter()
            .filter_map(|id| state.persons.get(id).cloned())
            .collect();
        persons.sort_by_key(|p| p.id);
        persons.dedup_by_key(|p| p.id);
        Ok(persons)
    }

    async fn delete_photo(&self, photo_id: i64) -> Result<Option<Photo>, DbError> {
        self.transaction(|state| {
            let removed = state.photos.remove(&photo_id);
            if removed.is_some() {
                state.faces.retain(|_, f| f.photo_id != photo_id);
            }
            Ok(removed)
        })
        .await
    }

    async fn delete_person(&self, person_id: i64) -> Result<bool, DbError> {
        self.transaction(|state| {
            let removed = state.persons.remove(&person_id).is_some();
            for face in state.faces.values_mut() {
                if face.person_id == Some(person_id) {
                    face.person_id = None;
                }
            }
            Ok(removed)
        })
        .await
    }

    async fn ping(&self) -> Result<(), DbError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_types::{BoundingBox, ContactHandle};

    fn unit(values: &[f32]) -> Embedding {
        Embedding::normalize(values).expect("non-zero vector")
    }

    fn new_photo(status: PhotoStatus) -> NewPhoto {
        NewPhoto {
            url: "http://media/p.jpg".into(),
            storage_key: "p.jpg".into(),
            original_url: None,
            original_storage_key: None,
            status,
            width: Some(100),
            height: Some(100),
        }
    }

    fn new_face(person_id: Option<i64>, values: &[f32]) -> NewFace {
        NewFace {
            person_id,
            bounding_box: BoundingBox::from_fractions(0.2, 0.2, 0.6, 0.6).expect("valid box"),
            embedding: unit(values),
            confidence: 0.9,
        }
    }

    fn guest(name: &str, phone: &str) -> NewGuest {
        NewGuest {
            name: name.into(),
            contact: ContactHandle::parse(phone).expect("valid phone"),
            seat_label: None,
        }
    }

    #[tokio::test]
    async fn nearest_person_ties_resolve_to_lowest_face_id() {
        let store = MemoryIdentityStore::new();
        let alice = store.rename_or_create_person("Alice").await.expect("alice");
        let bob = store.rename_or_create_person("Bob").await.expect("bob");
        store
            .insert_photo(
                new_photo(PhotoStatus::Completed),
                vec![
                    new_face(Some(alice.id), &[1.0, 0.1]),
                    new_face(Some(bob.id), &[1.0, 0.1]),
                ],
            )
            .await
            .expect("insert");

        let found = store
            .nearest_person(&unit(&[1.0, 0.0]), 0.6)
            .await
            .expect("query")
            .expect("a match");
        assert_eq!(found.person.id, alice.id);
    }

    #[tokio::test]
    async fn search_skips_reference_photos_and_orders_by_distance() {
        let store = MemoryIdentityStore::new();
        let far = store
            .insert_photo(
                new_photo(PhotoStatus::Completed),
                vec![new_face(None, &[1.0, 0.3])],
            )
            .await
            .expect("far");
        let near = store
            .insert_photo(
                new_photo(PhotoStatus::Completed),
                vec![new_face(None, &[1.0, 0.05]), new_face(None, &[0.0, 1.0])],
            )
            .await
            .expect("near");
        store
            .insert_photo(
                new_photo(PhotoStatus::Reference),
                vec![new_face(None, &[1.0, 0.0])],
            )
            .await
            .expect("reference");

        let matches = store
            .photos_matching(&unit(&[1.0, 0.0]), 0.6, 10)
            .await
            .expect("search");
        let ids: Vec<i64> = matches.iter().map(|m| m.photo.id).collect();
        assert_eq!(ids, vec![near.photo.id, far.photo.id]);

        let capped = store
            .photos_matching(&unit(&[1.0, 0.0]), 0.6, 1)
            .await
            .expect("search");
        assert_eq!(capped.len(), 1);
    }

    #[tokio::test]
    async fn same_name_twice_is_ambiguous() {
        let store = MemoryIdentityStore::new();
        store.upsert_guest(&guest("Sam", "+31 6 1234 5678")).await.expect("first");
        store.upsert_guest(&guest("Sam", "+31 6 8765 4321")).await.expect("second");

        let err = store
            .rename_or_create_person("Sam")
            .await
            .expect_err("two guests are named Sam");
        assert!(matches!(err, DbError::AmbiguousName(_)));
    }

    #[tokio::test]
    async fn upsert_guest_is_keyed_by_contact() {
        let store = MemoryIdentityStore::new();
        let first = store.upsert_guest(&guest("Sam", "0612345678")).await.expect("insert");
        let second = store
            .upsert_guest(&guest("Samantha", "06-1234-5678"))
            .await
            .expect("update");

        assert_eq!(first.id, second.id);
        assert_eq!(second.name.as_deref(), Some("Samantha"));
        assert_eq!(store.list_persons().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn failed_propagation_leaves_no_trace() {
        let store = MemoryIdentityStore::new();
        let stored = store
            .insert_photo(
                new_photo(PhotoStatus::Completed),
                vec![
                    new_face(None, &[1.0, 0.0]),
                    new_face(None, &[1.0, 0.01]),
                    // Mismatched dimensionality makes the scan fail half way.
                    new_face(None, &[1.0, 0.0, 0.0]),
                ],
            )
            .await
            .expect("insert");
        let source = stored.faces[0].id;

        store
            .label_face(source, &PersonTarget::Named("Carol".into()), 0.75)
            .await
            .expect_err("scan hits a foreign dimensionality");

        for face in store.faces_for_photo(stored.photo.id).await.expect("faces") {
            assert_eq!(face.person_id, None);
        }
        assert!(store.list_persons().await.expect("persons").is_empty());
    }

    #[tokio::test]
    async fn deleting_a_person_unlabels_their_faces() {
        let store = MemoryIdentityStore::new();
        let person = store.rename_or_create_person("Eve").await.expect("eve");
        let stored = store
            .insert_photo(
                new_photo(PhotoStatus::Completed),
                vec![new_face(Some(person.id), &[1.0, 0.0])],
            )
            .await
            .expect("insert");

        assert!(store.delete_person(person.id).await.expect("delete"));
        assert!(!store.delete_person(person.id).await.expect("second delete"));
        let face = store
            .find_face(stored.faces[0].id)
            .await
            .expect("query")
            .expect("face survives");
        assert_eq!(face.person_id, None);
    }

    #[tokio::test]
    async fn deleting_a_photo_removes_its_faces() {
        let store = MemoryIdentityStore::new();
        let stored = store
            .insert_photo(
                new_photo(PhotoStatus::Completed),
                vec![new_face(None, &[1.0, 0.0])],
            )
            .await
            .expect("insert");

        let removed = store.delete_photo(stored.photo.id).await.expect("delete");
        assert_eq!(removed.map(|p| p.id), Some(stored.photo.id));
        assert!(store.find_face(stored.faces[0].id).await.expect("query").is_none());
        assert!(store.delete_photo(stored.photo.id).await.expect("again").is_none());
    }

    #[tokio::test]
    async fn registration_claims_nearby_unlabeled_faces() {
        let store = MemoryIdentityStore::new();
        let event = store
            .insert_photo(
                new_photo(PhotoStatus::Completed),
                vec![new_face(None, &[1.0, 0.05]), new_face(None, &[0.0, 1.0])],
            )
            .await
            .expect("event photo");

        let registration = store
            .register_guest(
                &guest("Frank", "0611112222"),
                vec![ReferenceSnapshot {
                    photo: new_photo(PhotoStatus::Reference),
                    face: new_face(None, &[1.0, 0.0]),
                }],
                0.75,
            )
            .await
            .expect("register");

        assert_eq!(registration.reference_faces.len(), 1);
        assert_eq!(
            registration.reference_faces[0].person_id,
            Some(registration.person.id)
        );
        let tagged: Vec<i64> = registration.tagged.iter().map(|f| f.id).collect();
        assert_eq!(tagged, vec![event.faces[0].id]);
        assert!(store.list_photos().await.expect("list").iter().all(|p| p.status == PhotoStatus::Completed));
    }
}
