use crate::api_state::ApiContext;
use axum::Json;
use axum::extract::{Path, State};
use common_services::api::faces::error::FaceError;
use common_services::api::faces::interfaces::{NameFaceRequest, NameFaceResponse};
use common_services::api::faces::service::name_face;
use tracing::instrument;

/// Name a face.
///
/// The name spreads to every unlabeled face that looks like this one. Faces that
/// already belong to someone are never changed.
///
/// # Errors
///
/// Returns a `FaceError` if the face does not exist, the name is empty or ambiguous,
/// or the database fails.
#[utoipa::path(
    post,
    path = "/faces/{face_id}/name",
    tag = "Faces",
    params(
        ("face_id" = i64, Path, description = "Face id")
    ),
    request_body = NameFaceRequest,
    responses(
        (status = 200, description = "The named face and everything tagged with it.", body = NameFaceResponse),
        (status = 400, description = "Empty name or invalid phone number."),
        (status = 404, description = "Face not found."),
        (status = 409, description = "More than one person has this name."),
        (status = 500, description = "A database or internal error occurred."),
    )
)]
#[instrument(skip(context), err(Debug))]
pub async fn name_face_handler(
    State(context): State<ApiContext>,
    Path(face_id): Path<i64>,
    Json(payload): Json<NameFaceRequest>,
) -> Result<Json<NameFaceResponse>, FaceError> {
    let pipeline = context.pipeline.clone();
    let response =
        tokio::spawn(async move { name_face(&pipeline, face_id, payload).await }).await??;
    Ok(Json(response))
}
