use crate::entities::file_records::{self, FileStatus, ScanVerdict};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileRecordResponse {
    pub id: String,
    pub filename: String,
    pub location: String,
    pub status: FileStatus,
    /// `null` while the scan is pending
    pub result: Option<ScanVerdict>,
    pub uploaded_at: DateTime<Utc>,
    pub scanned_at: Option<DateTime<Utc>>,
}

impl From<file_records::Model> for FileRecordResponse {
    fn from(model: file_records::Model) -> Self {
        Self {
            id: model.id,
            filename: model.filename,
            location: model.location,
            status: model.status,
            result: model.result,
            uploaded_at: model.uploaded_at,
            scanned_at: model.scanned_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    pub file: FileRecordResponse,
}
