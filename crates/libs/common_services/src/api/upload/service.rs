use crate::api::upload::error::UploadError;
use crate::api::upload::interfaces::{UploadRequest, UploadResponse, UploadedFile};
use crate::context::PipelineContext;
use crate::database::photo::{NewPhoto, PhotoStatus};
use crate::detection::image_dimensions;
use crate::storage::{StorageError, StoredObject, extension_for};
use tracing::info;

pub(crate) async fn store_upload(
    context: &PipelineContext,
    file: &UploadedFile,
) -> Result<StoredObject, StorageError> {
    let extension = extension_for(file.file_name.as_deref(), file.content_type.as_deref());
    context.storage.put(&file.bytes, &extension).await
}

/// `(width, height)` as stored on the photo row, when the header is readable.
pub(crate) fn stored_dimensions(image: &[u8]) -> (Option<i32>, Option<i32>) {
    image_dimensions(image).map_or((None, None), |(w, h)| {
        (i32::try_from(w).ok(), i32::try_from(h).ok())
    })
}

/// Detects, associates and stores one event photo, then fans it out.
///
/// Nothing is persisted unless detection and storage both succeeded. Stored
/// artifacts are released again if the database write fails.
pub async fn upload_photo(
    context: &PipelineContext,
    request: UploadRequest,
) -> Result<UploadResponse, UploadError> {
    let detected = context.detector.detect(&request.photo.bytes).await?;
    let engine = context.engine();
    let faces = engine.associate(engine.prepare(detected)).await?;

    let photo_object = store_upload(context, &request.photo).await?;
    let original_object = match &request.original {
        Some(original) => match store_upload(context, original).await {
            Ok(object) => Some(object),
            Err(e) => {
                context.release_artifacts([photo_object.key.as_str()]).await;
                return Err(e.into());
            }
        },
        None => None,
    };

    let (width, height) = stored_dimensions(&request.photo.bytes);
    let new_photo = NewPhoto {
        url: photo_object.url.clone(),
        storage_key: photo_object.key.clone(),
        original_url: original_object.as_ref().map(|o| o.url.clone()),
        original_storage_key: original_object.as_ref().map(|o| o.key.clone()),
        status: PhotoStatus::Completed,
        width,
        height,
    };
    let stored = match context.store.insert_photo(new_photo, faces).await {
        Ok(stored) => stored,
        Err(e) => {
            let keys = std::iter::once(photo_object.key.as_str())
                .chain(original_object.as_ref().map(|o| o.key.as_str()))
                .collect::<Vec<&str>>();
            context.release_artifacts(keys).await;
            return Err(e.into());
        }
    };

    let matched = stored.faces.iter().filter(|f| f.person_id.is_some()).count();
    info!(
        "Stored photo {} with {} faces ({matched} recognized)",
        stored.photo.id,
        stored.faces.len()
    );

    let report = context.fanout.photo_ready(&stored).await;
    Ok(UploadResponse {
        photo: stored.photo,
        faces: stored.faces,
        notifications: report.into(),
    })
}
