use crate::config::NotifierConfig;
use crate::services::notifier::{Notifier, WebhookNotifier};
use std::sync::Arc;
use tracing::info;

pub fn setup_notifier(config: &NotifierConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    let notifier = WebhookNotifier::new(config.endpoints())?;

    if notifier.endpoints().is_empty() {
        tracing::warn!("⚠️  No alert webhooks configured, infected files will only be logged");
    } else {
        info!("📣 Alerts go to {} webhook(s)", notifier.endpoints().len());
    }

    Ok(Arc::new(notifier))
}
