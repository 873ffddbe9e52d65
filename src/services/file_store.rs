use crate::entities::file_records::{self, FileStatus, ScanVerdict};
use crate::entities::prelude::*;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

/// Fields supplied by the upload path; everything else is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub filename: String,
    pub location: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Persistence of File Records.
///
/// Every method is a single atomic operation against the backing database.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Insert a record in `pending` state and return it with its assigned id.
    async fn create(&self, record: NewFileRecord) -> Result<file_records::Model>;

    /// Move a pending record to `scanned` with the given verdict.
    ///
    /// Returns `false` when nothing changed: unknown ids and records that were
    /// already scanned are logged and left alone.
    async fn update_status(
        &self,
        id: &str,
        result: ScanVerdict,
        scanned_at: DateTime<Utc>,
    ) -> Result<bool>;

    async fn find(&self, id: &str) -> Result<Option<file_records::Model>>;

    /// All records, newest upload first.
    async fn list_all(&self) -> Result<Vec<file_records::Model>>;

    /// Pending records uploaded at or before `uploaded_before`, oldest first.
    async fn list_pending(
        &self,
        uploaded_before: DateTime<Utc>,
    ) -> Result<Vec<file_records::Model>>;

    async fn ping(&self) -> bool;
}

pub struct SeaOrmFileStore {
    db: DatabaseConnection,
}

impl SeaOrmFileStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FileStore for SeaOrmFileStore {
    async fn create(&self, record: NewFileRecord) -> Result<file_records::Model> {
        let model = file_records::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            filename: Set(record.filename),
            location: Set(record.location),
            status: Set(FileStatus::Pending),
            result: Set(None),
            uploaded_at: Set(record.uploaded_at),
            scanned_at: Set(None),
        };

        model
            .insert(&self.db)
            .await
            .context("Failed to insert file record")
    }

    async fn update_status(
        &self,
        id: &str,
        result: ScanVerdict,
        scanned_at: DateTime<Utc>,
    ) -> Result<bool> {
        let res = FileRecords::update_many()
            .col_expr(file_records::Column::Status, Expr::value(FileStatus::Scanned))
            .col_expr(file_records::Column::Result, Expr::value(result))
            .col_expr(file_records::Column::ScannedAt, Expr::value(scanned_at))
            .filter(file_records::Column::Id.eq(id))
            .filter(file_records::Column::Status.eq(FileStatus::Pending))
            .exec(&self.db)
            .await
            .with_context(|| format!("Failed to update scan status of {}", id))?;

        if res.rows_affected == 0 {
            tracing::warn!(
                file_id = %id,
                result = %result,
                "No pending file record to update (unknown id or already scanned)"
            );
        }

        Ok(res.rows_affected > 0)
    }

    async fn find(&self, id: &str) -> Result<Option<file_records::Model>> {
        Ok(FileRecords::find_by_id(id.to_string())
            .one(&self.db)
            .await?)
    }

    async fn list_all(&self) -> Result<Vec<file_records::Model>> {
        Ok(FileRecords::find()
            .order_by_desc(file_records::Column::UploadedAt)
            .order_by_desc(file_records::Column::Id)
            .all(&self.db)
            .await?)
    }

    async fn list_pending(
        &self,
        uploaded_before: DateTime<Utc>,
    ) -> Result<Vec<file_records::Model>> {
        Ok(FileRecords::find()
            .filter(file_records::Column::Status.eq(FileStatus::Pending))
            .filter(file_records::Column::UploadedAt.lte(uploaded_before))
            .order_by_asc(file_records::Column::UploadedAt)
            .all(&self.db)
            .await?)
    }

    async fn ping(&self) -> bool {
        self.db.ping().await.is_ok()
    }
}
