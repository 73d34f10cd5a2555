use axum::extract::multipart::{Field, MultipartError};
use common_services::api::upload::interfaces::UploadedFile;

/// Reads one file part completely.
pub async fn read_file(field: Field<'_>) -> Result<UploadedFile, MultipartError> {
    let file_name = field.file_name().map(str::to_owned);
    let content_type = field.content_type().map(str::to_owned);
    let bytes = field.bytes().await?;
    Ok(UploadedFile {
        bytes: bytes.to_vec(),
        file_name,
        content_type,
    })
}

pub fn field_name(field: &Field<'_>) -> String {
    field.name().unwrap_or_default().to_owned()
}
