use crate::database::face::Face;
use crate::database::photo::Photo;
use crate::notify::FanoutReport;
use serde::Serialize;
use utoipa::ToSchema;

/// One file part of a multipart request.
#[derive(Debug, Clone, Default)]
pub struct UploadedFile {
    pub bytes: Vec<u8>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub photo: UploadedFile,
    /// Untouched camera original, stored next to the distributable version.
    pub original: Option<UploadedFile>,
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSummary {
    pub live_receivers: usize,
    pub messages_sent: usize,
    pub messages_failed: usize,
}

impl From<FanoutReport> for NotificationSummary {
    fn from(report: FanoutReport) -> Self {
        Self {
            live_receivers: report.live_receivers,
            messages_sent: report.messages_sent,
            messages_failed: report.messages_failed,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub photo: Photo,
    pub faces: Vec<Face>,
    pub notifications: NotificationSummary,
}
