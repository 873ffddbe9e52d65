use crate::services::file_store::FileStore;
use crate::services::queue::{ScanJob, ScanQueue};
use anyhow::Result;
use chrono::Utc;
use std::time::Duration;

/// Re-enqueue records a previous process left `pending`, oldest first.
///
/// Only records uploaded at least `grace` ago are picked up. Returns the number
/// of jobs enqueued.
pub async fn recover_pending(
    store: &dyn FileStore,
    queue: &ScanQueue,
    grace: Duration,
) -> Result<usize> {
    let cutoff = Utc::now() - chrono::Duration::from_std(grace)?;
    let pending = store.list_pending(cutoff).await?;
    let count = pending.len();

    for record in pending {
        queue.enqueue(ScanJob {
            file_id: record.id,
            location: record.location,
            filename: record.filename,
        });
    }

    if count > 0 {
        tracing::info!("♻️  Re-enqueued {} pending file(s) from a previous run", count);
    }

    Ok(count)
}
