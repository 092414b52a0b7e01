//! CLI command implementations.
//!
//! | Module    | Commands handled       |
//! |-----------|------------------------|
//! | `serve`   | `Serve`                |
//! | `db`      | `InitDb`               |
//! | `analyze` | `Analyze`              |
//! | `models`  | `Models`               |
//! | `config`  | `Config`               |
//! | `user`    | `User`                 |

pub mod analyze;
pub mod config;
pub mod db;
pub mod models;
pub mod serve;
pub mod user;

pub use analyze::cmd_analyze;
pub use config::cmd_config;
pub use db::cmd_init_db;
pub use models::cmd_models;
pub use serve::{ServeOverrides, cmd_serve};
pub use user::cmd_user_reset;

use std::time::Duration;

use anyhow::Result;
use platewise::config::PlatewiseToml;
use platewise::llm::OpenAiCompatClient;

/// Chat-completion client for the configured endpoint.
fn llm_client(config: &PlatewiseToml) -> Result<OpenAiCompatClient> {
    Ok(OpenAiCompatClient::new(
        config.llm.endpoint.clone(),
        config.llm.token.clone(),
        Duration::from_secs(config.llm.timeout_secs),
    )?)
}
