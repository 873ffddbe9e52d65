use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use file_guard::services::notifier::{Notifier, ThreatAlert, WebhookNotifier};
use file_guard::services::scanner::Severity;
use serde_json::Value;
use std::sync::{Arc, Mutex};

type Received = Arc<Mutex<Vec<(String, Value)>>>;

async fn record(
    State(received): State<Received>,
    uri: axum::http::Uri,
    Json(body): Json<Value>,
) -> StatusCode {
    received
        .lock()
        .unwrap()
        .push((uri.path().to_string(), body));
    StatusCode::OK
}

async fn reject() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Local webhook receiver; returns its base URL
async fn spawn_receiver(received: Received) -> String {
    let app = Router::new()
        .route("/security", post(record))
        .route("/slack", post(record))
        .route("/broken", post(reject))
        .with_state(received);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

fn alert() -> ThreatAlert {
    ThreatAlert {
        filename: "payload.pdf".to_string(),
        file_id: "6f1c".to_string(),
        detected_threats: vec!["rm -rf".to_string(), "passwd".to_string()],
        timestamp: "2025-03-01T12:00:00.000Z".to_string(),
        severity: Severity::High,
    }
}

#[tokio::test]
async fn test_alert_fans_out_to_every_endpoint() {
    let received: Received = Arc::default();
    let base = spawn_receiver(received.clone()).await;

    let notifier = WebhookNotifier::new(vec![
        format!("{}/security", base),
        format!("{}/broken", base),
        format!("{}/slack", base),
    ])
    .unwrap();

    // A failing endpoint does not prevent delivery to the others
    notifier.notify(&alert()).await;

    let received = received.lock().unwrap();
    let mut paths: Vec<&str> = received.iter().map(|(p, _)| p.as_str()).collect();
    paths.sort();
    assert_eq!(paths, vec!["/security", "/slack"]);

    for (_, body) in received.iter() {
        assert_eq!(body, &alert().to_message());
        let fields = body["attachments"][0]["fields"].as_array().unwrap();
        assert!(
            fields
                .iter()
                .any(|f| f["title"] == "Detected Threats" && f["value"] == "rm -rf, passwd")
        );
    }
}
