//! Web app command: `platewise serve`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use platewise::config::PlatewiseToml;
use platewise::tracker::auth::{AuthConfig, ephemeral_secret};
use platewise::tracker::server::{ServerConfig, Services, start_server};
use tracing::warn;

/// CLI flags that take precedence over file and environment values.
pub struct ServeOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub db_path: Option<PathBuf>,
    pub dev: bool,
    pub open: bool,
}

pub async fn cmd_serve(mut config: PlatewiseToml, overrides: ServeOverrides) -> Result<()> {
    if let Some(host) = overrides.host {
        config.server.host = host;
    }
    if let Some(port) = overrides.port {
        config.server.port = port;
    }
    if let Some(db_path) = overrides.db_path {
        config.server.db_path = db_path;
    }

    for warning in config.validate() {
        warn!("{}", warning);
    }
    if config.llm.token.is_none() {
        warn!("GITHUB_TOKEN is not set; meal analysis and the coach will fail");
    }
    let secret = config.server.secret_key.clone().unwrap_or_else(|| {
        warn!("SECRET_KEY is not set; sessions end when the server restarts");
        ephemeral_secret()
    });

    let services = Services {
        llm: Arc::new(super::llm_client(&config)?),
        catalog: config.catalog(),
        tables: config.tables()?,
        auth: AuthConfig::new(secret, config.server.session_ttl_hours),
    };

    start_server(
        ServerConfig {
            host: config.server.host,
            port: config.server.port,
            db_path: config.server.db_path,
            dev_mode: overrides.dev,
            open_browser: overrides.open,
        },
        services,
    )
    .await
}
