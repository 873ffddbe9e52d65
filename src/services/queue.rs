//! In-process scan queue.
//!
//! Jobs are drained strictly FIFO by a single worker task, so at most one job is
//! processed at any instant. The queue is volatile: jobs still waiting when the
//! process stops are lost and their records stay `pending` until boot recovery.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Everything the worker needs to scan one upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanJob {
    pub file_id: String,
    pub location: String,
    pub filename: String,
}

/// Processes one job at a time on behalf of the queue
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, job: ScanJob) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueState {
    Idle,
    Draining,
}

/// Snapshot of the queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    /// Jobs waiting behind the one in flight
    pub queued: usize,
    /// Whether a job is being processed right now
    pub processing: bool,
}

impl QueueStatus {
    pub fn state(&self) -> QueueState {
        if self.processing || self.queued > 0 {
            QueueState::Draining
        } else {
            QueueState::Idle
        }
    }
}

/// Handle to the scan queue. Cheap to clone; all clones feed the same worker.
#[derive(Clone)]
pub struct ScanQueue {
    tx: mpsc::UnboundedSender<ScanJob>,
    status: Arc<watch::Sender<QueueStatus>>,
}

impl ScanQueue {
    /// Spawn the worker and return the queue handle together with the worker's
    /// join handle. The worker exits when `shutdown` flips to `true` or its
    /// sender is dropped.
    pub fn start(
        handler: Arc<dyn JobHandler>,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(QueueStatus::default());
        let status = Arc::new(status);

        let worker = tokio::spawn(Self::worker(handler, rx, status.clone(), shutdown));

        (Self { tx, status }, worker)
    }

    /// Append a job to the tail of the queue. Never blocks.
    pub fn enqueue(&self, job: ScanJob) {
        let file_id = job.file_id.clone();
        let filename = job.filename.clone();

        self.status.send_modify(|s| s.queued += 1);
        if self.tx.send(job).is_err() {
            self.status.send_modify(|s| s.queued -= 1);
            tracing::error!(
                file_id = %file_id,
                "Scan worker is not running, job dropped"
            );
            return;
        }

        tracing::info!(file_id = %file_id, filename = %filename, "📥 Scan job enqueued");
    }

    pub fn status(&self) -> QueueStatus {
        *self.status.borrow()
    }

    pub fn state(&self) -> QueueState {
        self.status().state()
    }

    /// Jobs waiting behind the one in flight
    pub fn pending(&self) -> usize {
        self.status().queued
    }

    /// Subscribe to status changes
    pub fn subscribe(&self) -> watch::Receiver<QueueStatus> {
        self.status.subscribe()
    }

    /// Resolves once nothing is queued or in flight
    pub async fn wait_idle(&self) {
        let mut rx = self.subscribe();
        // The sender lives in `self`, so this cannot fail while we hold it
        let _ = rx.wait_for(|s| s.state() == QueueState::Idle).await;
    }

    async fn worker(
        handler: Arc<dyn JobHandler>,
        mut rx: mpsc::UnboundedReceiver<ScanJob>,
        status: Arc<watch::Sender<QueueStatus>>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tracing::info!("🚀 Scan worker started");

        loop {
            let job = tokio::select! {
                biased;
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        tracing::info!("🛑 Scan worker shutting down");
                        break;
                    }
                    continue;
                }
                job = rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            status.send_modify(|s| {
                s.queued = s.queued.saturating_sub(1);
                s.processing = true;
            });

            let file_id = job.file_id.clone();
            let handler = handler.clone();

            // A separate task so that a panicking job is reported instead of
            // taking the worker down with it
            match tokio::spawn(async move { handler.handle(job).await }).await {
                Ok(Ok(())) => {
                    tracing::debug!(file_id = %file_id, "Scan job finished");
                }
                Ok(Err(e)) => {
                    tracing::error!(file_id = %file_id, "Scan job failed: {:#}", e);
                }
                Err(e) => {
                    tracing::error!(file_id = %file_id, "Scan job aborted: {}", e);
                }
            }

            status.send_modify(|s| s.processing = false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingHandler {
        seen: Mutex<Vec<String>>,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    #[async_trait]
    impl JobHandler for RecordingHandler {
        async fn handle(&self, job: ScanJob) -> anyhow::Result<()> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(5)).await;
            self.seen.lock().unwrap().push(job.file_id.clone());

            self.active.fetch_sub(1, Ordering::SeqCst);

            match job.filename.as_str() {
                "fail" => anyhow::bail!("handler failure"),
                "panic" => panic!("handler panic"),
                _ => Ok(()),
            }
        }
    }

    fn job(id: usize, filename: &str) -> ScanJob {
        ScanJob {
            file_id: id.to_string(),
            location: format!("file:///tmp/{}", id),
            filename: filename.to_string(),
        }
    }

    #[tokio::test]
    async fn test_fifo_and_single_flight() {
        let handler = Arc::new(RecordingHandler::default());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (queue, _worker) = ScanQueue::start(handler.clone(), shutdown_rx);

        for i in 0..10 {
            queue.enqueue(job(i, "ok.pdf"));
        }
        queue.wait_idle().await;

        let seen = handler.seen.lock().unwrap().clone();
        let expected: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        assert_eq!(seen, expected);
        assert_eq!(handler.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(queue.state(), QueueState::Idle);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_queue() {
        let handler = Arc::new(RecordingHandler::default());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (queue, _worker) = ScanQueue::start(handler.clone(), shutdown_rx);

        queue.enqueue(job(1, "fail"));
        queue.enqueue(job(2, "panic"));
        queue.enqueue(job(3, "ok.pdf"));
        queue.wait_idle().await;

        let seen = handler.seen.lock().unwrap().clone();
        assert_eq!(seen, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_status_reports_draining() {
        let handler = Arc::new(RecordingHandler::default());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (queue, _worker) = ScanQueue::start(handler, shutdown_rx);

        assert_eq!(queue.state(), QueueState::Idle);
        queue.enqueue(job(1, "ok.pdf"));
        queue.enqueue(job(2, "ok.pdf"));
        assert_eq!(queue.state(), QueueState::Draining);

        queue.wait_idle().await;
        assert_eq!(queue.status(), QueueStatus::default());
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_stops_worker() {
        let handler = Arc::new(RecordingHandler::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (queue, worker) = ScanQueue::start(handler.clone(), shutdown_rx);

        shutdown_tx.send(true).unwrap();
        worker.await.unwrap();

        // Enqueue after shutdown is dropped, not processed
        queue.enqueue(job(1, "ok.pdf"));
        assert!(handler.seen.lock().unwrap().is_empty());
        assert_eq!(queue.status().queued, 0);
    }
}
