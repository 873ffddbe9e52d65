pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::file_store::FileStore;
use crate::services::notifier::Notifier;
use crate::services::queue::ScanQueue;
use crate::services::scanner::ContentScanner;
use crate::services::storage::StorageService;
use crate::services::upload_service::UploadService;
use crate::services::worker::ScanWorker;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::root,
        api::handlers::health::health_check,
        api::handlers::upload::upload_file,
        api::handlers::files::list_files,
    ),
    components(
        schemas(
            api::handlers::FileRecordResponse,
            api::handlers::UploadResponse,
            api::handlers::health::HealthResponse,
            entities::file_records::FileStatus,
            entities::file_records::ScanVerdict,
        )
    ),
    tags(
        (name = "files", description = "Upload and scan status endpoints"),
        (name = "system", description = "Liveness and health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn FileStore>,
    pub storage: Arc<dyn StorageService>,
    pub queue: ScanQueue,
    pub upload_service: Arc<UploadService>,
    pub config: AppConfig,
}

impl AppState {
    /// Wire upload -> queue -> scan worker -> notifier and start the worker.
    ///
    /// The returned handle resolves once `shutdown` fires and the worker stops.
    pub fn assemble(
        config: AppConfig,
        store: Arc<dyn FileStore>,
        storage: Arc<dyn StorageService>,
        scanner: Arc<dyn ContentScanner>,
        notifier: Arc<dyn Notifier>,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<()>) {
        let worker = Arc::new(ScanWorker::new(
            store.clone(),
            storage.clone(),
            scanner,
            notifier,
            config.scan.clone(),
        ));
        let (queue, worker_handle) = ScanQueue::start(worker, shutdown);

        let upload_service = Arc::new(UploadService::new(
            storage.clone(),
            store.clone(),
            queue.clone(),
            config.upload.clone(),
        ));

        let state = Self {
            store,
            storage,
            queue,
            upload_service,
            config,
        };

        (state, worker_handle)
    }
}

pub fn create_app(state: AppState) -> Router {
    // Leave room for the multipart framing around the file itself
    let body_limit = state.config.upload.max_file_size + 1024 * 1024;

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(api::handlers::health::root))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/upload",
            post(api::handlers::upload::upload_file).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/files", get(api::handlers::files::list_files))
        .layer(cors_layer(&state.config.allowed_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            // Wildcards cannot be combined with credentials
            Ok(_) if o == "*" => {
                tracing::warn!("Ignoring wildcard CORS origin, list origins explicitly");
                None
            }
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}
