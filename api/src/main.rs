use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::extract::MatchedPath;
use dotenvy::dotenv;
use http::HeaderValue;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use stash::application::ports::blob_storage_port::BlobStoragePort;
use stash::application::ports::entry_repository::EntryRepository;
use stash::application::use_cases::entries::sweep_orphans::SweepOrphans;
use stash::application::use_cases::entries::upload_file::UploadPolicy;
use stash::bootstrap::app_context::{AppContext, AppServices};
use stash::bootstrap::config::{Config, StorageBackend};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
        paths(
            stash::presentation::http::entries::list_entries,
            stash::presentation::http::entries::create_entry,
            stash::presentation::http::entries::get_entry,
            stash::presentation::http::entries::get_ancestors,
            stash::presentation::http::entries::download_entry,
            stash::presentation::http::entries::update_entry,
            stash::presentation::http::entries::toggle_star,
            stash::presentation::http::entries::toggle_trash,
            stash::presentation::http::entries::restore_entry,
            stash::presentation::http::entries::delete_entry,
            stash::presentation::http::entries::empty_trash,
            stash::presentation::http::health::health,
        ),
        components(schemas(
            stash::presentation::http::entries::EntryResponse,
            stash::presentation::http::entries::EntryListResponse,
            stash::presentation::http::entries::AncestorResponse,
            stash::presentation::http::entries::CreateFolderRequest,
            stash::presentation::http::entries::CreateEntryMultipart,
            stash::presentation::http::entries::UpdateEntryRequest,
            stash::presentation::http::entries::ToggleRequest,
            stash::presentation::http::entries::TrashRequest,
            stash::presentation::http::entries::DeleteResponse,
            stash::presentation::http::error::ApiErrorResponse,
            stash::presentation::http::health::HealthResp,
        )),
        tags(
            (name = "Entries", description = "Files, folders, stars and trash"),
            (name = "Health", description = "System health checks")
        )
    )]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "stash=debug,axum=info,tower_http=info".into()),
        )
        .init();

    let cfg = Config::from_env()?;
    info!(
        port = cfg.api_port,
        storage = ?cfg.storage_backend,
        production = cfg.is_production,
        "Starting stash backend"
    );

    // Database
    let pool =
        stash::infrastructure::db::connect_pool(&cfg.database_url, cfg.database_max_connections)
            .await?;
    stash::infrastructure::db::migrate(&pool).await?;

    let blob_storage: Arc<dyn BlobStoragePort> = match cfg.storage_backend {
        StorageBackend::Filesystem => {
            if let Err(e) = tokio::fs::create_dir_all(&cfg.storage_root).await {
                tracing::warn!(error=?e, dir=%cfg.storage_root, "Failed to create storage dir");
            }
            Arc::new(stash::infrastructure::storage::fs::FsBlobStore::new(
                &cfg.storage_root,
            ))
        }
        StorageBackend::S3 => {
            Arc::new(stash::infrastructure::storage::s3::S3BlobStore::new(&cfg).await?)
        }
    };
    let entry_repo: Arc<dyn EntryRepository> = Arc::new(
        stash::infrastructure::db::repositories::entry_repository_sqlx::SqlxEntryRepository::new(
            pool.clone(),
        ),
    );

    let services = AppServices::new(
        entry_repo.clone(),
        blob_storage.clone(),
        UploadPolicy::from_config(&cfg),
    );
    let ctx = AppContext::new(cfg.clone(), services);

    // Build CORS
    let methods = [
        http::Method::GET,
        http::Method::POST,
        http::Method::DELETE,
        http::Method::PATCH,
        http::Method::OPTIONS,
    ];
    let headers = [http::header::CONTENT_TYPE, http::header::AUTHORIZATION];
    let cors = match cfg.frontend_url.as_deref().map(HeaderValue::from_str) {
        Some(Ok(origin)) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(true),
        _ if cfg.is_production => {
            // FRONTEND_URL is mandatory in production (enforced in Config); deny all otherwise
            CorsLayer::new()
                .allow_origin(AllowOrigin::exact(HeaderValue::from_static(
                    "http://invalid",
                )))
                .allow_methods(methods)
                .allow_headers(headers)
        }
        // Development convenience
        _ => CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(true),
    };

    // Multipart framing needs some room on top of the file itself.
    let body_limit = cfg.upload_max_bytes.saturating_add(64 * 1024);

    let app = Router::new()
        .nest(
            "/api",
            stash::presentation::http::health::routes(pool.clone()),
        )
        .nest(
            "/api",
            stash::presentation::http::entries::routes(ctx.clone()),
        )
        .merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &http::Request<_>| {
                let method = req.method().clone();
                let uri = req.uri().clone();
                let matched = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default();
                tracing::info_span!("http", %method, %uri, matched_path = %matched)
            }),
        );

    let api_addr = SocketAddr::from(([0, 0, 0, 0], cfg.api_port));
    info!(%api_addr, "HTTP API listening");
    let listener = tokio::net::TcpListener::bind(api_addr).await?;

    let api_handle: JoinHandle<anyhow::Result<()>> = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    });

    // Background orphan sweep
    let sweep_handle: Option<JoinHandle<()>> = if cfg.orphan_sweep_interval_secs == 0 {
        info!("orphan_sweep_disabled");
        None
    } else {
        let interval = Duration::from_secs(cfg.orphan_sweep_interval_secs);
        let grace = chrono::Duration::seconds(cfg.orphan_grace_secs);
        Some(tokio::spawn(async move {
            loop {
                sleep(interval).await;
                let uc = SweepOrphans {
                    repo: entry_repo.as_ref(),
                    storage: blob_storage.as_ref(),
                    grace,
                };
                if let Err(e) = uc.execute(chrono::Utc::now()).await {
                    error!(error = ?e, "orphan_sweep_failed");
                }
            }
        }))
    };

    match api_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(?e, "API server task failed"),
        Err(e) => error!(?e, "API server task panicked"),
    }

    if let Some(handle) = sweep_handle {
        handle.abort();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(?e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown_requested");
}
