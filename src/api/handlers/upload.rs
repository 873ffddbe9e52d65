use crate::api::error::AppError;
use crate::utils::validation::UploadRejection;
use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
};
use bytes::BytesMut;

use super::types::*;

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::Rejected(UploadRejection::TooLarge)
    } else {
        AppError::BadRequest(e.body_text())
    }
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = Multipart, description = "File upload (field `file`)", content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "File uploaded and queued for scanning", body = UploadResponse),
        (status = 400, description = "No file, disallowed file type, or file too large"),
        (status = 500, description = "Storage or database failure")
    ),
    tag = "files"
)]
pub async fn upload_file(
    State(state): State<crate::AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let mut multipart = multipart.map_err(|_| UploadRejection::NoFile)?;
    let service = state.upload_service.clone();

    // Use a result to capture errors so we can consume the multipart stream if needed
    let result: Result<(StatusCode, Json<UploadResponse>), AppError> = async {
        let mut upload = None;

        while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
            if upload.is_some() || field.name() != Some("file") {
                continue;
            }

            let Some(filename) = field
                .file_name()
                .map(str::to_string)
                .filter(|n| !n.trim().is_empty())
            else {
                continue;
            };

            // 1. Extension, before reading any content
            service.check_filename(&filename)?;

            // 2. Size, while streaming and before anything is stored
            let mut data = BytesMut::new();
            while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                service.check_size(data.len() + chunk.len())?;
                data.extend_from_slice(&chunk);
            }

            upload = Some((filename, data.freeze()));
        }

        let (filename, data) = upload.ok_or(UploadRejection::NoFile)?;

        // 3. Store, record, enqueue
        let record = service.store_upload(&filename, data).await?;

        Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                message: "File uploaded successfully".to_string(),
                file: record.into(),
            }),
        ))
    }
    .await;

    match result {
        Ok(res) => Ok(res),
        Err(e) => {
            // Consume the remaining multipart stream so the client sees the
            // response instead of a connection reset
            tracing::warn!("Upload failed early: {}. Consuming remaining stream...", e);
            while let Ok(Some(mut field)) = multipart.next_field().await {
                while let Ok(Some(_)) = field.chunk().await {}
            }
            Err(e)
        }
    }
}
