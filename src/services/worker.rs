use crate::config::{ScanConfig, UnreadablePolicy};
use crate::entities::file_records::ScanVerdict;
use crate::services::file_store::FileStore;
use crate::services::notifier::{Notifier, ThreatAlert};
use crate::services::queue::{JobHandler, ScanJob};
use crate::services::scanner::{ContentScanner, ScanResult};
use crate::services::storage::StorageService;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use futures::FutureExt;
use rand::Rng;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

/// Scans one uploaded file: fetch, match, record the verdict, alert on infection.
pub struct ScanWorker {
    store: Arc<dyn FileStore>,
    storage: Arc<dyn StorageService>,
    scanner: Arc<dyn ContentScanner>,
    notifier: Arc<dyn Notifier>,
    config: ScanConfig,
}

impl ScanWorker {
    pub fn new(
        store: Arc<dyn FileStore>,
        storage: Arc<dyn StorageService>,
        scanner: Arc<dyn ContentScanner>,
        notifier: Arc<dyn Notifier>,
        config: ScanConfig,
    ) -> Self {
        Self {
            store,
            storage,
            scanner,
            notifier,
            config,
        }
    }

    async fn simulate_latency(&self) {
        let jitter_ms = self.config.jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };

        let delay = self.config.base_delay + extra;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    async fn evaluate(&self, job: &ScanJob) -> Result<ScanResult> {
        let content = match self.storage.get_file(&job.location).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(
                    file_id = %job.file_id,
                    policy = ?self.config.unreadable,
                    "⚠️  Could not fetch {}: {:#}",
                    job.filename,
                    e
                );
                match self.config.unreadable {
                    UnreadablePolicy::TreatAsClean => Vec::new(),
                    UnreadablePolicy::MarkError => {
                        return Err(e.context(format!("Could not fetch {}", job.location)));
                    }
                }
            }
        };

        self.scanner.scan(&content).await
    }
}

#[async_trait]
impl JobHandler for ScanWorker {
    async fn handle(&self, job: ScanJob) -> Result<()> {
        tracing::info!(file_id = %job.file_id, "🔍 Starting scan for: {}", job.filename);

        self.simulate_latency().await;

        // A panicking fetch or scan still ends in a recorded verdict
        let outcome = match AssertUnwindSafe(self.evaluate(&job)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => Err(anyhow!("Scan panicked: {}", panic_message(panic.as_ref()))),
        };
        let scanned_at = Utc::now();

        let verdict = match &outcome {
            Ok(ScanResult::Clean) => ScanVerdict::Clean,
            Ok(ScanResult::Infected { .. }) => ScanVerdict::Infected,
            Err(e) => {
                tracing::error!(file_id = %job.file_id, "❌ Error scanning {}: {:#}", job.filename, e);
                ScanVerdict::Error
            }
        };

        let recorded = match self
            .store
            .update_status(&job.file_id, verdict, scanned_at)
            .await
        {
            Ok(recorded) => recorded,
            Err(e) => {
                if verdict == ScanVerdict::Error {
                    return Err(e.context("Failed to record error verdict"));
                }
                tracing::error!(
                    file_id = %job.file_id,
                    "Failed to record {} verdict: {:#}",
                    verdict,
                    e
                );
                self.store
                    .update_status(&job.file_id, ScanVerdict::Error, Utc::now())
                    .await
                    .context("Failed to record error verdict")?;
                return Ok(());
            }
        };

        // Only the run that wrote the verdict may alert on it
        if !recorded {
            tracing::warn!(
                file_id = %job.file_id,
                "Verdict for {} was not recorded, skipping alert",
                job.filename
            );
            return Ok(());
        }

        tracing::info!(file_id = %job.file_id, "✅ Scan completed for {}: {}", job.filename, verdict);

        if let Ok(ScanResult::Infected { threats, severity }) = outcome {
            let alert = ThreatAlert {
                filename: job.filename,
                file_id: job.file_id,
                detected_threats: threats,
                timestamp: scanned_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                severity,
            };
            self.notifier.notify(&alert).await;
        }

        Ok(())
    }
}

fn panic_message<'a>(panic: &'a (dyn Any + Send + 'static)) -> &'a str {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        *msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}
