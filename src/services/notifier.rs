//! Best-effort delivery of infected-file alerts to webhook endpoints.
//!
//! Every configured endpoint receives the same JSON body. Deliveries run
//! concurrently, are attempted once, and their failures are only logged.

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;

use crate::services::scanner::Severity;

/// HTTP request timeout for a single delivery.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const ALERT_FOOTER: &str = "FileGuard Security Scanner";

/// What the scanner reports for an infected file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatAlert {
    pub filename: String,
    pub file_id: String,
    pub detected_threats: Vec<String>,
    /// RFC 3339 time of the scan
    pub timestamp: String,
    pub severity: Severity,
}

impl ThreatAlert {
    /// Chat-webhook compatible message body.
    pub fn to_message(&self) -> Value {
        let color = match self.severity {
            Severity::High => "#ff0000",
            Severity::Medium => "#ffa500",
        };

        json!({
            "text": "🚨 *SECURITY ALERT: Malicious File Detected*",
            "attachments": [{
                "color": color,
                "fields": [
                    { "title": "File Name", "value": self.filename, "short": true },
                    { "title": "File ID", "value": self.file_id, "short": true },
                    {
                        "title": "Detected Threats",
                        "value": self.detected_threats.join(", "),
                        "short": false
                    },
                    {
                        "title": "Severity",
                        "value": self.severity.as_str().to_uppercase(),
                        "short": true
                    },
                    { "title": "Timestamp", "value": self.timestamp, "short": true }
                ],
                "footer": ALERT_FOOTER
            }]
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

/// Alert dispatcher. Implementations must never fail or panic.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &ThreatAlert);
}

pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoints: Vec<String>,
}

impl WebhookNotifier {
    pub fn new(endpoints: Vec<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client, endpoints })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    async fn deliver(&self, url: &str, body: &Value) -> Result<(), WebhookError> {
        let response = self.client.post(url).json(body).send().await?;
        if !response.status().is_success() {
            return Err(WebhookError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, alert: &ThreatAlert) {
        let body = alert.to_message();

        if self.endpoints.is_empty() {
            tracing::warn!(
                file_id = %alert.file_id,
                alert = %body,
                "🚨 SECURITY ALERT - No webhooks configured, logging only"
            );
            return;
        }

        let body = &body;
        let deliveries = self
            .endpoints
            .iter()
            .map(|url| async move { (url, self.deliver(url, body).await) });

        for (url, outcome) in join_all(deliveries).await {
            match outcome {
                Ok(()) => tracing::info!(
                    file_id = %alert.file_id,
                    url = %url,
                    "📣 Security alert delivered"
                ),
                Err(e) => tracing::error!(
                    file_id = %alert.file_id,
                    url = %url,
                    error = %e,
                    "Security alert delivery failed"
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(severity: Severity) -> ThreatAlert {
        ThreatAlert {
            filename: "invoice.pdf".to_string(),
            file_id: "f-1".to_string(),
            detected_threats: vec!["eval(".to_string(), "bitcoin".to_string()],
            timestamp: "2025-01-01T00:00:00.000Z".to_string(),
            severity,
        }
    }

    #[test]
    fn test_message_fields() {
        let message = alert(Severity::High).to_message();
        let attachment = &message["attachments"][0];
        assert_eq!(attachment["color"], "#ff0000");
        assert_eq!(attachment["footer"], ALERT_FOOTER);

        let fields = attachment["fields"].as_array().unwrap();
        let value_of = |title: &str| {
            fields
                .iter()
                .find(|f| f["title"] == title)
                .map(|f| f["value"].clone())
                .unwrap()
        };
        assert_eq!(value_of("File Name"), "invoice.pdf");
        assert_eq!(value_of("File ID"), "f-1");
        assert_eq!(value_of("Detected Threats"), "eval(, bitcoin");
        assert_eq!(value_of("Severity"), "HIGH");
        assert_eq!(value_of("Timestamp"), "2025-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_medium_color() {
        let message = alert(Severity::Medium).to_message();
        assert_eq!(message["attachments"][0]["color"], "#ffa500");
    }

    #[test]
    fn test_alert_serializes_camel_case() {
        let value = serde_json::to_value(alert(Severity::Medium)).unwrap();
        assert_eq!(value["fileId"], "f-1");
        assert_eq!(value["detectedThreats"][1], "bitcoin");
        assert_eq!(value["severity"], "medium");
    }

    #[test]
    fn webhook_error_display_http_status() {
        let err = WebhookError::HttpStatus(502);
        assert_eq!(err.to_string(), "Webhook returned HTTP 502");
    }

    #[tokio::test]
    async fn test_notify_without_endpoints_does_not_fail() {
        let notifier = WebhookNotifier::new(Vec::new()).unwrap();
        notifier.notify(&alert(Severity::High)).await;
    }

    #[tokio::test]
    async fn test_notify_unreachable_endpoint_is_swallowed() {
        let notifier = WebhookNotifier::new(vec![
            "http://127.0.0.1:9/unreachable".to_string(),
            "not-a-url".to_string(),
        ])
        .unwrap();
        notifier.notify(&alert(Severity::High)).await;
    }
}
