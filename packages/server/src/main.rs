use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::{HeaderValue, Method, header};
use common::config::SearchBackend;
use common::upload::UploadEngine;
use common::upload::filesystem::FilesystemUploadEngine;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use server::auth::{CredentialStore, TokenService};
use server::config::AppConfig;
use server::coordinator::UploadCoordinator;
use server::database::{DOCUMENT_ENTITIES, RELATIONAL_ENTITIES, init_db};
use server::indexer::elasticsearch::ElasticsearchIndex;
use server::indexer::memory::MemoryIndex;
use server::indexer::{Indexer, SearchIndex};
use server::models::upload::{TUS_RESUMABLE, UPLOAD_LENGTH, UPLOAD_OFFSET};
use server::state::AppState;
use server::tracks::TrackRepository;
use server::tracks::sea::{SeaDescriptorStore, SeaOwnershipStore};
use server::{build_router, seed};

fn build_cors_layer(config: &AppConfig) -> anyhow::Result<CorsLayer> {
    let origins = &config.server.cors.allow_origins;
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed = origins
            .iter()
            .map(|o| HeaderValue::from_str(o))
            .collect::<Result<Vec<_>, _>>()
            .context("Invalid CORS origin")?;
        AllowOrigin::list(parsed)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::HEAD,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            TUS_RESUMABLE.clone(),
            UPLOAD_LENGTH.clone(),
            UPLOAD_OFFSET.clone(),
        ])
        .expose_headers([
            header::LOCATION,
            TUS_RESUMABLE.clone(),
            UPLOAD_LENGTH.clone(),
            UPLOAD_OFFSET.clone(),
        ])
        .max_age(Duration::from_secs(config.server.cors.max_age)))
}

async fn search_index(config: &AppConfig) -> anyhow::Result<Arc<dyn SearchIndex>> {
    Ok(match config.search.backend {
        SearchBackend::Memory => Arc::new(MemoryIndex::default()),
        SearchBackend::Elasticsearch => Arc::new(
            ElasticsearchIndex::connect(&config.search.url, &config.search.index)
                .await
                .context("Failed to connect to Elasticsearch")?,
        ),
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.server.log_level)),
        )
        .init();

    let relational = init_db(&config.database.url, RELATIONAL_ENTITIES)
        .await
        .context("Failed to initialize relational database")?;
    let document = init_db(config.database.document_url(), DOCUMENT_ENTITIES)
        .await
        .context("Failed to initialize document database")?;
    seed::ensure_indexes(&relational).await?;
    seed::ensure_document_indexes(&document).await?;
    info!("Databases ready");

    let indexer = Indexer::spawn(search_index(&config).await?);
    let tracks = TrackRepository::new(
        Arc::new(SeaOwnershipStore::new(relational.clone())),
        Arc::new(SeaDescriptorStore::new(document)),
        indexer.clone(),
    );
    if config.search.backend == SearchBackend::Memory {
        indexer
            .rebuild(&tracks)
            .await
            .context("Failed to build the search index")?;
    }

    let uploads: Arc<dyn UploadEngine> = Arc::new(
        FilesystemUploadEngine::new(config.upload.dir.clone(), config.upload.max_size)
            .await
            .context("Failed to prepare upload directory")?,
    );
    info!(dir = %config.upload.dir.display(), "Upload storage ready");

    let coordinator = UploadCoordinator::new(
        uploads.clone(),
        tracks.clone(),
        Duration::from_secs(config.coordinator.join_timeout_secs),
    );

    let tokens = TokenService::new(
        config.auth.jwt_secret.clone(),
        chrono::Duration::hours(config.auth.token_ttl_hours),
    );
    let cors = build_cors_layer(&config)?;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState {
        config: Arc::new(config),
        credentials: CredentialStore::new(relational),
        tokens,
        tracks,
        uploads,
        indexer,
        coordinator,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server running at http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
