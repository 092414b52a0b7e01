//! Typed error hierarchy for platewise.
//!
//! Three top-level enums cover the three subsystems:
//! - `LlmError`: chat-completion transport and reply failures
//! - `AuthError`: registration, login and session failures
//! - `TrackerError`: persistence and request failures in the web app

use thiserror::Error;

/// Errors from talking to the remote chat-completion API.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Unsupported model: {0}")]
    UnknownModel(String),

    #[error("No API token configured (set GITHUB_TOKEN)")]
    MissingToken,

    #[error("Request to model API failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Model API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Model API returned an unreadable reply: {0}")]
    Decode(String),

    #[error("Model API returned no choices")]
    EmptyResponse,
}

/// Errors from account and session handling.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    #[error("{0}")]
    Invalid(String),

    #[error("Username already exists")]
    UsernameTaken,

    #[error("Email already exists")]
    EmailTaken,

    #[error("Invalid username or password")]
    BadCredentials,

    #[error("Not logged in")]
    MissingSession,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Account storage failed: {0}")]
    Storage(String),
}

impl AuthError {
    /// Short machine-readable code, used in redirect query strings.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Invalid(_) => "invalid",
            AuthError::UsernameTaken => "username_taken",
            AuthError::EmailTaken => "email_taken",
            AuthError::BadCredentials => "bad_credentials",
            AuthError::MissingSession => "session",
            AuthError::Hashing(_) => "internal",
            AuthError::Storage(_) => "storage",
        }
    }
}

/// Errors from the tracker web app and its database.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Entry {id} not found")]
    EntryNotFound { id: i64 },

    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// The model reply contained no usable food items. Carries the run log.
    #[error("No food items detected")]
    NoFoodDetected { logs: Vec<String> },

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Database error: {0:#}")]
    Database(#[from] anyhow::Error),
}
