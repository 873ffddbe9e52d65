use crate::config::UploadConfig;
use crate::entities::file_records;
use crate::services::file_store::{FileStore, NewFileRecord};
use crate::services::queue::{ScanJob, ScanQueue};
use crate::services::storage::StorageService;
use crate::utils::validation::{
    UploadRejection, sanitize_filename, validate_extension, validate_file_size,
};
use anyhow::{Context, Result};
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Accepts validated uploads: stores the bytes, records the file and queues the scan.
pub struct UploadService {
    storage: Arc<dyn StorageService>,
    store: Arc<dyn FileStore>,
    queue: ScanQueue,
    config: UploadConfig,
}

impl UploadService {
    pub fn new(
        storage: Arc<dyn StorageService>,
        store: Arc<dyn FileStore>,
        queue: ScanQueue,
        config: UploadConfig,
    ) -> Self {
        Self {
            storage,
            store,
            queue,
            config,
        }
    }

    pub fn max_file_size(&self) -> usize {
        self.config.max_file_size
    }

    /// Extension check, run as soon as the client filename is known
    pub fn check_filename(&self, filename: &str) -> Result<String, UploadRejection> {
        validate_extension(filename, &self.config.allowed_extensions)
    }

    /// Size check, run while the body is still streaming
    pub fn check_size(&self, size: usize) -> Result<(), UploadRejection> {
        validate_file_size(size, self.config.max_file_size)
    }

    /// Persist an upload that passed validation.
    ///
    /// A failure to create the record after the bytes were stored leaves the
    /// stored object behind.
    pub async fn store_upload(&self, filename: &str, data: Bytes) -> Result<file_records::Model> {
        let ext = self
            .check_filename(filename)
            .context("store_upload called with an unvalidated filename")?;
        let display_name = sanitize_filename(filename);
        let key = format!("uploads/{}.{}", Uuid::new_v4(), ext);
        let size = data.len();

        let location = self
            .storage
            .upload_file(&key, data)
            .await
            .with_context(|| format!("Failed to store {}", key))?;

        let record = self
            .store
            .create(NewFileRecord {
                filename: display_name,
                location: location.clone(),
                uploaded_at: Utc::now(),
            })
            .await
            .inspect_err(|_| {
                tracing::warn!("Stored object {} has no file record", location);
            })?;

        tracing::info!(
            file_id = %record.id,
            size,
            "💾 Stored {} at {}",
            record.filename,
            record.location
        );

        self.queue.enqueue(ScanJob {
            file_id: record.id.clone(),
            location: record.location.clone(),
            filename: record.filename.clone(),
        });

        Ok(record)
    }
}
