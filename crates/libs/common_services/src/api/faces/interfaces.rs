use crate::api::upload::interfaces::NotificationSummary;
use crate::database::face::Face;
use crate::database::person::Person;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NameFaceRequest {
    pub name: String,
    /// When given, the person is resolved by this contact handle instead of by name.
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NameFaceResponse {
    pub person: Person,
    pub face: Face,
    /// Other faces that received the same name through propagation.
    pub tagged_face_ids: Vec<i64>,
    pub affected_photo_ids: Vec<i64>,
    pub notifications: NotificationSummary,
}
