use clap::Parser;
use dotenvy::dotenv;
use file_guard::config::AppConfig;
use file_guard::infrastructure::{database, notifier, scanner, storage};
use file_guard::services::file_store::{FileStore, SeaOrmFileStore};
use file_guard::services::recovery::recover_pending;
use file_guard::{AppState, create_app};
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Upload service that scans every file in the background
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Port to listen on (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind (overrides BIND_ADDR)
    #[arg(long)]
    bind: Option<String>,

    /// Skip re-enqueueing files left pending by a previous run
    #[arg(long)]
    no_recovery: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    // Initialize tracing with EnvFilter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "file_guard=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting FileGuard...");

    let mut config = AppConfig::from_env()?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if args.no_recovery {
        config.recovery.enabled = false;
    }

    info!(
        "🛡️  Upload limits: Max Size={}MB, Extensions={}",
        config.upload.max_file_size / 1024 / 1024,
        config.upload.allowed_extensions.join(",")
    );

    // Setup Infrastructure
    let db = database::setup_database(&config.database_url).await?;
    let storage_service = storage::setup_storage(&config.storage).await?;
    let scanner_service = scanner::setup_scanner();
    let notifier_service = notifier::setup_notifier(&config.notifier)?;
    let store: Arc<dyn FileStore> = Arc::new(SeaOrmFileStore::new(db));

    // Setup Shutdown Channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let (state, worker) = AppState::assemble(
        config.clone(),
        store.clone(),
        storage_service,
        scanner_service,
        notifier_service,
        shutdown_rx,
    );

    if config.recovery.enabled {
        if let Err(e) = recover_pending(store.as_ref(), &state.queue, config.recovery.grace).await
        {
            tracing::error!("❌ Failed to recover pending files: {:#}", e);
        }
    }

    let app = create_app(state).layer(
        TraceLayer::new_for_http()
            .make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            })
            .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                info!("📥 {} {}", request.method(), request.uri());
            })
            .on_response(
                |response: &axum::http::Response<_>,
                 latency: std::time::Duration,
                 _span: &tracing::Span| {
                    info!(
                        "📤 Finished in {:?} with status {}",
                        latency,
                        response.status()
                    );
                },
            ),
    );

    let addr = format!("{}:{}", config.bind_addr, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("✅ Server ready at http://{}", listener.local_addr()?);
    info!("📖 Swagger UI: http://{}/swagger-ui", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Jobs still waiting in the queue are dropped; their records stay pending
    let _ = shutdown_tx.send(true);
    if let Err(e) = worker.await {
        tracing::error!("Scan worker ended abnormally: {}", e);
    }

    info!("🛑 Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}
