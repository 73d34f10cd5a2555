use crate::api_state::ApiContext;
use axum::Json;
use axum::extract::{Multipart, State};
use common_services::api::search::error::SearchError;
use common_services::api::search::interfaces::SearchResponse;
use common_services::api::search::service::search_by_selfie;
use tracing::instrument;

/// Find every event photo the person in a selfie appears in.
///
/// # Errors
///
/// Returns a `SearchError` if the selfie is missing, does not contain exactly one
/// face, or detection is unavailable.
#[utoipa::path(
    post,
    path = "/search",
    tag = "Search",
    request_body(content_type = "multipart/form-data", description = "`selfie` file"),
    responses(
        (status = 200, description = "Matching photos, nearest first.", body = SearchResponse),
        (status = 400, description = "No selfie, or no single face in it."),
        (status = 503, description = "Face detection is unavailable."),
        (status = 500, description = "A database or internal error occurred."),
    )
)]
#[instrument(skip(context, multipart), err(Debug))]
pub async fn search_handler(
    State(context): State<ApiContext>,
    mut multipart: Multipart,
) -> Result<Json<SearchResponse>, SearchError> {
    let mut selfie = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| SearchError::Multipart(e.body_text()))?
    {
        if field.name() == Some("selfie") {
            selfie = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| SearchError::Multipart(e.body_text()))?,
            );
        }
    }
    let selfie = selfie.ok_or(SearchError::MissingSelfie)?;
    Ok(Json(search_by_selfie(&context.pipeline, &selfie).await?))
}
