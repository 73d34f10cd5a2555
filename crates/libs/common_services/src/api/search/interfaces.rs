use crate::database::photo::PhotoMatch;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    /// Nearest first. Empty when the guest appears in no photo.
    pub items: Vec<PhotoMatch>,
}
