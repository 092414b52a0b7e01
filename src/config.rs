//! Configuration loaded from `platewise.toml`.
//!
//! Values are layered: built-in defaults, then the file, then environment
//! variables, then CLI flags (applied by the command that needs them).
//!
//! ```toml
//! nutrition_tables = "config/nutrition.toml"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 5000
//! db_path = "platewise.db"
//! session_ttl_hours = 168
//!
//! [llm]
//! endpoint = "https://models.github.ai/inference"
//! default_model = "mistral-ai/Ministral-3B"
//! coach_model = "microsoft/Phi-4"
//! timeout_secs = 60
//!
//! [[llm.models]]
//! id = "openai/gpt-4.1"
//! label = "Fast GPT-4.1"
//! structured_output = true
//!
//! [logging]
//! level = "info"
//! json = false
//! dir = "logs"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::llm::{ModelCatalog, ModelInfo, default_models};
use crate::nutrition::NutritionTables;

pub const CONFIG_FILE: &str = "platewise.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: u32,
    /// Session token pepper. Only ever read from `SECRET_KEY`.
    #[serde(skip)]
    pub secret_key: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_db_path() -> PathBuf {
    PathBuf::from("platewise.db")
}

fn default_session_ttl_hours() -> u32 {
    168
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
            session_ttl_hours: default_session_ttl_hours(),
            secret_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSection {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// API token; normally supplied through `GITHUB_TOKEN`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_coach_model")]
    pub coach_model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_models")]
    pub models: Vec<ModelInfo>,
}

fn default_endpoint() -> String {
    "https://models.github.ai/inference".to_string()
}

fn default_model() -> String {
    "mistral-ai/Ministral-3B".to_string()
}

fn default_coach_model() -> String {
    "microsoft/Phi-4".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            token: None,
            default_model: default_model(),
            coach_model: default_coach_model(),
            timeout_secs: default_timeout_secs(),
            models: default_models(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Filter used when `RUST_LOG` is unset, e.g. "info" or "platewise=debug".
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    /// Directory for a daily-rolling log file. Console only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
            dir: None,
        }
    }
}

/// Root of `platewise.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatewiseToml {
    /// Alternative nutrition tables document. The built-in tables are used
    /// when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nutrition_tables: Option<PathBuf>,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl PlatewiseToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse platewise.toml")
    }

    /// Load `path`, or defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize platewise.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Overlay environment variables, read through `lookup`. Blank values
    /// are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("PLATEWISE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("PLATEWISE_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PLATEWISE_PORT '{}'", port))?;
        }
        if let Some(path) = get("PLATEWISE_DB_PATH") {
            self.server.db_path = PathBuf::from(path);
        }
        if let Some(secret) = get("SECRET_KEY") {
            self.server.secret_key = Some(secret);
        }
        if let Some(token) = get("GITHUB_TOKEN") {
            self.llm.token = Some(token);
        }
        if let Some(endpoint) = get("PLATEWISE_LLM_ENDPOINT") {
            self.llm.endpoint = endpoint;
        }
        if let Some(model) = get("PLATEWISE_DEFAULT_MODEL") {
            self.llm.default_model = model;
        }
        if let Some(level) = get("PLATEWISE_LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Load `path` (or defaults) and overlay the process environment.
    pub fn resolve(path: &Path) -> Result<Self> {
        let mut config = Self::load_or_default(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn catalog(&self) -> ModelCatalog {
        ModelCatalog {
            models: self.llm.models.clone(),
            default_model: self.llm.default_model.clone(),
            coach_model: self.llm.coach_model.clone(),
        }
    }

    /// Nutrition tables named by `nutrition_tables`, or the built-in ones.
    pub fn tables(&self) -> Result<NutritionTables> {
        NutritionTables::load_or_builtin(self.nutrition_tables.as_deref())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; the OS will pick a random port".to_string());
        }
        if self.server.session_ttl_hours == 0 {
            warnings.push("server.session_ttl_hours is 0; sessions expire immediately".to_string());
        }
        if self.llm.timeout_secs == 0 {
            warnings.push("llm.timeout_secs must be greater than 0".to_string());
        }

        if self.llm.models.is_empty() {
            warnings.push("llm.models is empty; no model can be selected".to_string());
        } else {
            let mut seen = HashSet::new();
            for model in &self.llm.models {
                if !seen.insert(model.id.as_str()) {
                    warnings.push(format!("Duplicate model id '{}'", model.id));
                }
            }
            for (key, id) in [
                ("default_model", &self.llm.default_model),
                ("coach_model", &self.llm.coach_model),
            ] {
                if !self.llm.models.iter().any(|m| &m.id == id) {
                    warnings.push(format!("llm.{} '{}' is not in llm.models", key, id));
                }
            }
        }

        if let Some(path) = &self.nutrition_tables {
            match NutritionTables::load(path) {
                Ok(tables) => warnings.extend(
                    tables
                        .validate()
                        .into_iter()
                        .map(|w| format!("{}: {}", path.display(), w)),
                ),
                Err(e) => warnings.push(format!("{:#}", e)),
            }
        }

        warnings
    }
}
