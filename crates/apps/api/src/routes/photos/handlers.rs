use crate::api_state::ApiContext;
use crate::routes::multipart::{field_name, read_file};
use axum::Json;
use axum::extract::{Multipart, Path, State};
use common_services::api::faces::error::FaceError;
use common_services::api::faces::service::faces_for_photo;
use common_services::api::photos::error::PhotosError;
use common_services::api::photos::interfaces::{DeletePhotoResponse, PhotoListResponse};
use common_services::api::photos::service::{delete_photo, list_photos};
use common_services::api::upload::error::UploadError;
use common_services::api::upload::interfaces::{UploadRequest, UploadResponse};
use common_services::api::upload::service::upload_photo;
use common_services::database::face::Face;
use tracing::instrument;

/// Upload an event photo.
///
/// Faces are detected and linked to known guests, the photo is stored, live viewers
/// are updated and every recognized guest gets a message with the photo link.
///
/// # Errors
///
/// Returns an `UploadError` if the request has no photo, detection or storage is
/// unavailable, or the database write fails.
#[utoipa::path(
    post,
    path = "/upload",
    tag = "Photos",
    request_body(content_type = "multipart/form-data", description = "`photo` file and an optional `original` file"),
    responses(
        (status = 200, description = "Photo stored with its faces.", body = UploadResponse),
        (status = 400, description = "No photo in the request."),
        (status = 503, description = "Face detection or storage is unavailable."),
        (status = 500, description = "A database or internal error occurred."),
    )
)]
#[instrument(skip(context, multipart), err(Debug))]
pub async fn upload_photo_handler(
    State(context): State<ApiContext>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, UploadError> {
    let mut photo = None;
    let mut original = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Multipart(e.body_text()))?
    {
        let target = match field_name(&field).as_str() {
            "photo" => &mut photo,
            "original" => &mut original,
            _ => continue,
        };
        *target = Some(
            read_file(field)
                .await
                .map_err(|e| UploadError::Multipart(e.body_text()))?,
        );
    }
    let request = UploadRequest {
        photo: photo.ok_or(UploadError::MissingPhoto)?,
        original,
    };

    // Run detached so a disconnecting uploader does not cancel a half-finished upload.
    let pipeline = context.pipeline.clone();
    let response = tokio::spawn(async move { upload_photo(&pipeline, request).await }).await??;
    Ok(Json(response))
}

/// List all event photos, newest first.
///
/// # Errors
///
/// Returns a `PhotosError` if the database query fails.
#[utoipa::path(
    get,
    path = "/photos",
    tag = "Photos",
    responses(
        (status = 200, description = "Event photos, newest first.", body = PhotoListResponse),
        (status = 500, description = "A database or internal error occurred."),
    )
)]
#[instrument(skip(context), err(Debug))]
pub async fn list_photos_handler(
    State(context): State<ApiContext>,
) -> Result<Json<PhotoListResponse>, PhotosError> {
    Ok(Json(list_photos(context.store()).await?))
}

/// Faces detected in one photo.
///
/// # Errors
///
/// Returns a `FaceError` if the photo does not exist or the query fails.
#[utoipa::path(
    get,
    path = "/photos/{photo_id}/faces",
    tag = "Photos",
    params(
        ("photo_id" = i64, Path, description = "Photo id")
    ),
    responses(
        (status = 200, description = "Faces of the photo.", body = Vec<Face>),
        (status = 404, description = "Photo not found."),
        (status = 500, description = "A database or internal error occurred."),
    )
)]
#[instrument(skip(context), err(Debug))]
pub async fn photo_faces_handler(
    State(context): State<ApiContext>,
    Path(photo_id): Path<i64>,
) -> Result<Json<Vec<Face>>, FaceError> {
    Ok(Json(faces_for_photo(context.store(), photo_id).await?))
}

/// Delete a photo, its faces and its stored files.
///
/// # Errors
///
/// Returns a `PhotosError` if the photo does not exist or the database fails.
#[utoipa::path(
    delete,
    path = "/photo/{photo_id}",
    tag = "Photos",
    params(
        ("photo_id" = i64, Path, description = "Photo id")
    ),
    responses(
        (status = 200, description = "The deleted photo.", body = DeletePhotoResponse),
        (status = 404, description = "Photo not found."),
        (status = 500, description = "A database or internal error occurred."),
    )
)]
#[instrument(skip(context), err(Debug))]
pub async fn delete_photo_handler(
    State(context): State<ApiContext>,
    Path(photo_id): Path<i64>,
) -> Result<Json<DeletePhotoResponse>, PhotosError> {
    Ok(Json(delete_photo(&context.pipeline, photo_id).await?))
}
