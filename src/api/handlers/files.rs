use crate::api::error::AppError;
use axum::{Json, extract::State};

use super::types::*;

#[utoipa::path(
    get,
    path = "/files",
    responses(
        (status = 200, description = "All file records, newest upload first", body = Vec<FileRecordResponse>),
        (status = 500, description = "Store failure")
    ),
    tag = "files"
)]
pub async fn list_files(
    State(state): State<crate::AppState>,
) -> Result<Json<Vec<FileRecordResponse>>, AppError> {
    let records = state.store.list_all().await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}
