use crate::api_state::ApiContext;
use crate::create_router;
use app_state::AppSettings;
use axum::extract::DefaultBodyLimit;
use axum::routing::get_service;
use color_eyre::Result;
use color_eyre::eyre::eyre;
use common_services::context::PipelineContext;
use common_services::database::{
    IdentityStore, MemoryIdentityStore, PgIdentityStore, get_db_pool,
};
use common_services::detection::HttpFaceDetector;
use common_services::messaging::{BridgeTransport, FileCredentialStore, MessagingSession};
use common_services::notify::NotificationFanout;
use common_services::storage::LocalObjectStorage;
use http::{HeaderValue, header};
use reqwest::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::fs;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::cors;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Wires the identity store, detector, storage and messaging session together.
pub async fn build_pipeline(settings: &AppSettings) -> Result<PipelineContext> {
    let store: Arc<dyn IdentityStore> = if settings.database.in_memory {
        warn!("Using the in-memory identity store: nothing survives a restart and every write copies the whole store.");
        Arc::new(MemoryIdentityStore::new())
    } else {
        let pool = get_db_pool(&settings.database, &settings.secrets).await?;
        Arc::new(PgIdentityStore::new(pool))
    };

    fs::create_dir_all(&settings.storage.root).await?;
    if let Some(parent) = settings.messaging.credentials_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let session = Arc::new(MessagingSession::new(
        Arc::new(BridgeTransport::new(settings.messaging.bridge_url.clone())),
        FileCredentialStore::new(settings.messaging.credentials_path.clone()),
        settings.messaging.backoff,
    ));
    if settings.messaging.enabled {
        session.start().await;
    } else {
        info!("Messaging is disabled, guests will not be notified.");
    }

    Ok(PipelineContext {
        fanout: NotificationFanout::new(
            Arc::clone(&store),
            session,
            settings.messaging.message_template.clone(),
        ),
        store,
        detector: Arc::new(HttpFaceDetector::new(Client::new(), &settings.detection)?),
        storage: Arc::new(LocalObjectStorage::new(&settings.storage)),
        matching: settings.matching,
    })
}

pub async fn serve(settings: AppSettings) -> Result<()> {
    // --- Server Startup ---
    info!("🚀 Initializing server...");
    let pipeline = build_pipeline(&settings).await?;
    let api_state = ApiContext {
        pipeline: pipeline.clone(),
        settings: settings.clone(),
    };

    // --- CORS Configuration ---
    let allowed_origins: Vec<HeaderValue> = settings
        .api
        .allowed_origins
        .iter()
        .filter_map(|s| match s.parse() {
            Ok(hv) => Some(hv),
            Err(e) => {
                error!("Invalid CORS origin configured: {} - Error: {}", s, e);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_methods(cors::Any)
        .allow_origin(allowed_origins)
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::ORIGIN,
            header::USER_AGENT,
            header::CACHE_CONTROL,
            header::PRAGMA,
        ]);

    // Stored artifacts never change once written.
    let serve_dir = ServeDir::new(&settings.storage.root);
    let cache_layer = SetResponseHeaderLayer::if_not_present(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    // --- Create Router ---
    let app = create_router(api_state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(settings.api.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(CompressionLayer::new())
        .nest_service("/media", get_service(serve_dir).layer(cache_layer));

    let addr: SocketAddr = format!("{}:{}", settings.api.host, settings.api.port)
        .parse()
        .map_err(|e| eyre!("Invalid address: {}", e))?;
    let listener = TcpListener::bind(addr).await?;

    info!("🐸 Server listening on http://{}", addr);
    info!("API docs at {}/docs", settings.api.public_url);

    let messaging = Arc::clone(pipeline.fanout.messaging());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    messaging.stop().await;
    info!("Server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received.");
}
