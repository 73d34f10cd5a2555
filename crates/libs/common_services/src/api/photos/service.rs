use crate::api::photos::error::PhotosError;
use crate::api::photos::interfaces::{DeletePhotoResponse, PhotoListResponse};
use crate::context::PipelineContext;
use crate::database::IdentityStore;
use tracing::info;

pub async fn list_photos(store: &dyn IdentityStore) -> Result<PhotoListResponse, PhotosError> {
    Ok(PhotoListResponse {
        photos: store.list_photos().await?,
    })
}

/// Deletes a photo with its faces, then releases its stored artifacts and tells
/// live viewers. Artifact cleanup failures are logged; the row is gone either way.
pub async fn delete_photo(
    context: &PipelineContext,
    photo_id: i64,
) -> Result<DeletePhotoResponse, PhotosError> {
    let deleted = context
        .store
        .delete_photo(photo_id)
        .await?
        .ok_or(PhotosError::PhotoNotFound(photo_id))?;
    context.release_artifacts(deleted.storage_keys()).await;
    context.fanout.photo_deleted(photo_id);
    info!("Deleted photo {photo_id}");
    Ok(DeletePhotoResponse { deleted })
}
