use crate::database::face::Face;
use crate::database::person::Person;
use crate::database::photo::Photo;
use serde::Serialize;
use utoipa::ToSchema;

/// Pushed to every live UI subscriber. At most once, no replay.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    #[serde(rename_all = "camelCase")]
    NewPhotoReady {
        photo: Photo,
        faces: Vec<Face>,
    },
    #[serde(rename_all = "camelCase")]
    PhotoDeleted {
        photo_id: i64,
    },
    /// Faces that were linked to `person` by naming, propagation or registration.
    #[serde(rename_all = "camelCase")]
    FacesTagged {
        person: Person,
        face_ids: Vec<i64>,
        photo_ids: Vec<i64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deleted_event_shape() {
        let value = serde_json::to_value(LiveEvent::PhotoDeleted { photo_id: 7 }).expect("json");
        assert_eq!(value, json!({"type": "photo_deleted", "photoId": 7}));
    }
}
