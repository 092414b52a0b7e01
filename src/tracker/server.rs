use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Router, extract::Request, response::Response};
use chrono::Utc;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::api::{self, AppState, SharedState};
use super::auth::AuthConfig;
use super::db::{DbHandle, TrackerDb};
use super::embedded::static_or_not_found;
use super::pages;
use super::timestamp;
use crate::llm::{ChatModel, ModelCatalog};
use crate::nutrition::NutritionTables;

/// Configuration for the tracker server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub dev_mode: bool,
    pub open_browser: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            db_path: PathBuf::from("platewise.db"),
            dev_mode: false,
            open_browser: false,
        }
    }
}

/// Everything the request handlers need besides the database.
pub struct Services {
    pub llm: Arc<dyn ChatModel>,
    pub catalog: ModelCatalog,
    pub tables: NutritionTables,
    pub auth: AuthConfig,
}

/// Build the full application router: JSON API, HTML pages and static assets.
pub fn build_router(state: SharedState, dev_mode: bool) -> Router {
    let mut app = api::api_router()
        .merge(pages::page_router())
        .fallback(static_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if dev_mode {
        app = app.layer(CorsLayer::permissive());
    }
    app
}

async fn static_handler(req: Request) -> Response {
    static_or_not_found(req.uri().path())
}

/// Open the database, drop stale sessions and serve until Ctrl-C or SIGTERM.
pub async fn start_server(config: ServerConfig, services: Services) -> Result<()> {
    let db = TrackerDb::new(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;
    let db = DbHandle::new(db);
    let purged = db
        .lock_sync()?
        .purge_expired_sessions(&timestamp(Utc::now()))?;
    if purged > 0 {
        info!(purged, "Removed expired sessions");
    }

    let state = Arc::new(AppState {
        db,
        llm: services.llm,
        catalog: services.catalog,
        tables: services.tables,
        auth: services.auth,
    });
    let app = build_router(state, config.dev_mode);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    let url = format!("http://{}", local_addr);
    info!(%url, db = %config.db_path.display(), dev = config.dev_mode, "Platewise listening");
    println!("Platewise running at {}", url);

    if config.open_browser {
        if let Err(e) = open::that(&url) {
            warn!(error = %e, "Could not open a browser");
        }
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
