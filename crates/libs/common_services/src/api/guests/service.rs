use crate::api::guests::error::GuestError;
use crate::api::guests::interfaces::{
    BulkUpsertResponse, RegisterRequest, RegistrationResponse, RejectedGuest, UpsertGuestRequest,
};
use crate::api::upload::service::{store_upload, stored_dimensions};
use crate::context::PipelineContext;
use crate::database::face::NewFace;
use crate::database::person::{NewGuest, Person};
use crate::database::photo::{NewPhoto, PhotoStatus};
use crate::database::{IdentityStore, ReferenceSnapshot};
use crate::matching::most_confident;
use common_types::ContactHandle;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Validates and canonicalizes one roster entry.
pub fn new_guest(name: &str, phone: &str, seat: Option<&str>) -> Result<NewGuest, GuestError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(GuestError::EmptyName);
    }
    Ok(NewGuest {
        name: name.to_owned(),
        contact: ContactHandle::parse(phone)?,
        seat_label: seat.map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned),
    })
}

pub async fn upsert_guest(
    store: &dyn IdentityStore,
    request: &UpsertGuestRequest,
) -> Result<Person, GuestError> {
    let guest = new_guest(&request.name, &request.phone, request.seat.as_deref())?;
    Ok(store.upsert_guest(&guest).await?)
}

/// Upserts every valid entry; invalid ones are reported back instead of failing the batch.
pub async fn upsert_guests_bulk(
    store: &dyn IdentityStore,
    requests: &[UpsertGuestRequest],
) -> Result<BulkUpsertResponse, GuestError> {
    let mut upserted = Vec::with_capacity(requests.len());
    let mut rejected = Vec::new();
    for (index, request) in requests.iter().enumerate() {
        match new_guest(&request.name, &request.phone, request.seat.as_deref()) {
            Ok(guest) => upserted.push(store.upsert_guest(&guest).await?),
            Err(e) => rejected.push(RejectedGuest {
                index,
                error: e.to_string(),
            }),
        }
    }
    info!(
        "Bulk upsert: {} guests stored, {} rejected",
        upserted.len(),
        rejected.len()
    );
    Ok(BulkUpsertResponse { upserted, rejected })
}

pub async fn list_guests(store: &dyn IdentityStore) -> Result<Vec<Person>, GuestError> {
    Ok(store.list_persons().await?)
}

/// Removes a person. Their faces stay, unlabeled, and reference photos are kept.
pub async fn delete_guest(store: &dyn IdentityStore, person_id: i64) -> Result<(), GuestError> {
    if store.delete_person(person_id).await? {
        info!("Deleted person {person_id}");
        Ok(())
    } else {
        Err(GuestError::GuestNotFound(person_id))
    }
}

/// Enrolls a guest from one or more reference snapshots.
///
/// Each snapshot contributes its most confident face. Snapshots the detector cannot
/// handle are skipped; the registration fails when no snapshot had a usable face.
pub async fn register_guest(
    context: &PipelineContext,
    request: RegisterRequest,
) -> Result<RegistrationResponse, GuestError> {
    let guest = new_guest(&request.name, &request.phone, request.seat.as_deref())?;
    if request.snapshots.is_empty() {
        return Err(GuestError::NoSnapshots);
    }

    let engine = context.engine();
    let mut usable = Vec::with_capacity(request.snapshots.len());
    for (index, snapshot) in request.snapshots.iter().enumerate() {
        let detected = match context.detector.detect(&snapshot.bytes).await {
            Ok(detected) => detected,
            Err(e) => {
                warn!("Skipping registration snapshot {index}: {e}");
                continue;
            }
        };
        match most_confident(engine.prepare(detected)) {
            Some(face) => usable.push((snapshot, face)),
            None => warn!("Registration snapshot {index} has no usable face"),
        }
    }
    if usable.is_empty() {
        return Err(GuestError::NoUsableFace);
    }

    let mut keys: Vec<String> = Vec::with_capacity(usable.len());
    let mut references = Vec::with_capacity(usable.len());
    for (snapshot, face) in usable {
        let object = match store_upload(context, snapshot).await {
            Ok(object) => object,
            Err(e) => {
                context.release_artifacts(keys.iter().map(String::as_str)).await;
                return Err(e.into());
            }
        };
        let (width, height) = stored_dimensions(&snapshot.bytes);
        keys.push(object.key.clone());
        references.push(ReferenceSnapshot {
            photo: NewPhoto {
                url: object.url,
                storage_key: object.key,
                original_url: None,
                original_storage_key: None,
                status: PhotoStatus::Reference,
                width,
                height,
            },
            face: NewFace {
                person_id: None,
                bounding_box: face.bounding_box,
                embedding: face.embedding,
                confidence: face.confidence,
            },
        });
    }

    let registration = match context
        .store
        .register_guest(&guest, references, context.matching.propagation_threshold)
        .await
    {
        Ok(registration) => registration,
        Err(e) => {
            context.release_artifacts(keys.iter().map(String::as_str)).await;
            return Err(e.into());
        }
    };
    info!(
        "Registered guest {} with {} reference faces, {} event faces tagged",
        registration.person.id,
        registration.reference_faces.len(),
        registration.tagged.len()
    );

    let report = context
        .fanout
        .faces_tagged(&registration.person, &registration.tagged)
        .await;
    let matched_photo_ids: BTreeSet<i64> =
        registration.tagged.iter().map(|f| f.photo_id).collect();
    Ok(RegistrationResponse {
        count: registration.reference_faces.len(),
        tagged_faces: registration.tagged.len(),
        matched_photo_ids: matched_photo_ids.into_iter().collect(),
        person: registration.person,
        notifications: report.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", "0612345678")]
    #[case("   ", "0612345678")]
    fn rejects_blank_names(#[case] name: &str, #[case] phone: &str) {
        assert!(matches!(new_guest(name, phone, None), Err(GuestError::EmptyName)));
    }

    #[test]
    fn rejects_bad_phones() {
        assert!(matches!(
            new_guest("Ada", "12-ab", None),
            Err(GuestError::InvalidContact(_))
        ));
    }

    #[test]
    fn trims_fields() {
        let guest = new_guest(" Ada ", "+44 (20) 7946-0958", Some("  ")).expect("valid");
        assert_eq!(guest.name, "Ada");
        assert_eq!(guest.contact.as_str(), "442079460958");
        assert_eq!(guest.seat_label, None);
    }
}
