use crate::api::faces::error::FaceError;
use crate::api::faces::interfaces::{NameFaceRequest, NameFaceResponse};
use crate::context::PipelineContext;
use crate::database::face::Face;
use crate::database::person::{NewGuest, PersonTarget};
use crate::database::IdentityStore;
use common_types::ContactHandle;

/// Names one face, propagates the name to similar unlabeled faces and notifies.
pub async fn name_face(
    context: &PipelineContext,
    face_id: i64,
    request: NameFaceRequest,
) -> Result<NameFaceResponse, FaceError> {
    let target = match request.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        Some(phone) => PersonTarget::Guest(NewGuest {
            name: request.name,
            contact: ContactHandle::parse(phone)?,
            seat_label: None,
        }),
        None => PersonTarget::Named(request.name),
    };

    let propagation = context.propagator().name_face(face_id, target).await?;

    let mut newly_linked = propagation.tagged.clone();
    if propagation.previous_person_id != Some(propagation.person.id) {
        newly_linked.push(propagation.face.clone());
    }
    let report = context
        .fanout
        .faces_tagged(&propagation.person, &newly_linked)
        .await;

    Ok(NameFaceResponse {
        tagged_face_ids: propagation.tagged.iter().map(|f| f.id).collect(),
        affected_photo_ids: propagation.affected_photo_ids(),
        person: propagation.person,
        face: propagation.face,
        notifications: report.into(),
    })
}

/// Faces of one photo, for the naming UI.
pub async fn faces_for_photo(
    store: &dyn IdentityStore,
    photo_id: i64,
) -> Result<Vec<Face>, FaceError> {
    if store.find_photo(photo_id).await?.is_none() {
        return Err(FaceError::PhotoNotFound(photo_id));
    }
    Ok(store.faces_for_photo(photo_id).await?)
}
