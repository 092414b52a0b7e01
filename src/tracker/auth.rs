//! Accounts, password hashing and cookie sessions.

use std::sync::LazyLock;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use super::api::{ApiError, SharedState};
use super::db::DbHandle;
use super::models::User;
use super::timestamp;
use crate::errors::AuthError;

pub const SESSION_COOKIE: &str = "platewise_session";
pub const MIN_PASSWORD_LEN: usize = 6;

static USERNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.\-]{3,50}$").unwrap());
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Session and hashing settings shared by every request.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Pepper mixed into stored session-token hashes.
    pub secret: String,
    pub session_ttl: Duration,
    pub bcrypt_cost: u32,
}

impl AuthConfig {
    pub fn new(secret: impl Into<String>, session_ttl_hours: u32) -> Self {
        Self {
            secret: secret.into(),
            session_ttl: Duration::hours(i64::from(session_ttl_hours)),
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }

    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    /// Stored form of a session token: `hex(sha256(secret ‖ token))`.
    pub fn hash_token(&self, token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn session_cookie(&self, token: &str) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            SESSION_COOKIE,
            token,
            self.session_ttl.num_seconds()
        )
    }
}

pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// A random per-process secret, used when `SECRET_KEY` is not configured.
pub fn ephemeral_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

pub fn validate_registration(username: &str, email: &str, password: &str) -> Result<(), AuthError> {
    if !USERNAME.is_match(username) {
        return Err(AuthError::Invalid(
            "Username must be 3-50 characters of letters, digits, '_', '.' or '-'".into(),
        ));
    }
    if !EMAIL.is_match(email) {
        return Err(AuthError::Invalid("Please enter a valid email address".into()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Invalid(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn storage(e: anyhow::Error) -> AuthError {
    AuthError::Storage(format!("{:#}", e))
}

async fn hash_password(password: String, cost: u32) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

async fn verify_password(password: String, hash: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Create an account. Username and email must both be unused.
pub async fn register(
    db: &DbHandle,
    config: &AuthConfig,
    username: &str,
    email: &str,
    password: &str,
) -> Result<User, AuthError> {
    let username = username.trim().to_string();
    let email = email.trim().to_lowercase();
    validate_registration(&username, &email, password)?;

    let hash = hash_password(password.to_string(), config.bcrypt_cost).await?;
    let now = timestamp(Utc::now());

    let user = db
        .call(move |db| {
            if db.username_exists(&username)? {
                return Ok(Err(AuthError::UsernameTaken));
            }
            if db.email_exists(&email)? {
                return Ok(Err(AuthError::EmailTaken));
            }
            db.create_user(&username, &email, &hash, &now).map(Ok)
        })
        .await
        .map_err(storage)??;

    info!(user_id = user.id, username = %user.username, "Registered user");
    Ok(user)
}

/// Check credentials and open a session. Returns the user and the raw
/// session token for the cookie.
pub async fn login(
    db: &DbHandle,
    config: &AuthConfig,
    username: &str,
    password: &str,
) -> Result<(User, String), AuthError> {
    let lookup = username.trim().to_string();
    let creds = db
        .call(move |db| db.find_user_by_username(&lookup))
        .await
        .map_err(storage)?;

    let Some(creds) = creds else {
        warn!(username = %username.trim(), "Login for unknown user");
        return Err(AuthError::BadCredentials);
    };
    if !verify_password(password.to_string(), creds.password_hash).await? {
        warn!(user_id = creds.user.id, "Login with wrong password");
        return Err(AuthError::BadCredentials);
    }

    let token = ephemeral_secret();
    let token_hash = config.hash_token(&token);
    let now = Utc::now();
    let created_at = timestamp(now);
    let expires_at = timestamp(now + config.session_ttl);
    let user_id = creds.user.id;
    db.call(move |db| db.create_session(&token_hash, user_id, &created_at, &expires_at))
        .await
        .map_err(storage)?;

    info!(user_id, "User logged in");
    Ok((creds.user, token))
}

pub async fn logout(db: &DbHandle, config: &AuthConfig, token: &str) -> Result<bool, AuthError> {
    let token_hash = config.hash_token(token);
    db.call(move |db| db.delete_session(&token_hash))
        .await
        .map_err(storage)
}

/// Session token from the request's `Cookie` headers.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// The logged-in user for these headers, if the session is valid.
pub async fn current_user(
    db: &DbHandle,
    config: &AuthConfig,
    headers: &HeaderMap,
) -> Result<Option<User>, AuthError> {
    let Some(token) = session_token(headers) else {
        return Ok(None);
    };
    let token_hash = config.hash_token(&token);
    let now = timestamp(Utc::now());
    db.call(move |db| db.session_user(&token_hash, &now))
        .await
        .map_err(storage)
}

/// Extractor for API routes that need a logged-in user; rejects with 401.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<SharedState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        match current_user(&state.db, &state.auth, &parts.headers).await? {
            Some(user) => Ok(CurrentUser(user)),
            None => Err(AuthError::MissingSession.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::db::TrackerDb;
    use axum::http::HeaderValue;

    fn config() -> AuthConfig {
        AuthConfig::new("pepper", 24).with_bcrypt_cost(4)
    }

    fn handle() -> DbHandle {
        DbHandle::new(TrackerDb::new_in_memory().unwrap())
    }

    #[test]
    fn test_validate_registration() {
        assert!(validate_registration("asha_k", "asha@example.com", "secret1").is_ok());
        assert!(matches!(
            validate_registration("as", "asha@example.com", "secret1"),
            Err(AuthError::Invalid(_))
        ));
        assert!(validate_registration("asha k", "asha@example.com", "secret1").is_err());
        assert!(validate_registration("asha", "not-an-email", "secret1").is_err());
        assert!(validate_registration("asha", "asha@example", "secret1").is_err());
        assert!(validate_registration("asha", "asha@example.com", "12345").is_err());
    }

    #[test]
    fn test_token_hash_depends_on_secret() {
        let a = AuthConfig::new("one", 1).hash_token("token");
        let b = AuthConfig::new("two", 1).hash_token("token");
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert!(!a.contains("token"));
    }

    #[test]
    fn test_cookie_format() {
        let cookie = config().session_cookie("abc");
        assert!(cookie.starts_with("platewise_session=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=86400"));
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }

    #[test]
    fn test_session_token_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; platewise_session=tok123; other=1"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("tok123"));

        let mut empty = HeaderMap::new();
        empty.insert(COOKIE, HeaderValue::from_static("platewise_session="));
        assert_eq!(session_token(&empty), None);
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates() {
        let db = handle();
        let cfg = config();
        let user = register(&db, &cfg, "asha", "Asha@Example.com", "secret1").await.unwrap();
        assert_eq!(user.email, "asha@example.com");

        let err = register(&db, &cfg, "asha", "new@example.com", "secret1").await.unwrap_err();
        assert_eq!(err, AuthError::UsernameTaken);
        let err = register(&db, &cfg, "ravi", "asha@example.com", "secret1").await.unwrap_err();
        assert_eq!(err, AuthError::EmailTaken);
    }

    #[tokio::test]
    async fn test_login_and_session_lifecycle() {
        let db = handle();
        let cfg = config();
        register(&db, &cfg, "asha", "asha@example.com", "secret1").await.unwrap();

        assert_eq!(
            login(&db, &cfg, "asha", "wrong-pass").await.unwrap_err(),
            AuthError::BadCredentials
        );
        assert_eq!(
            login(&db, &cfg, "nobody", "secret1").await.unwrap_err(),
            AuthError::BadCredentials
        );

        let (user, token) = login(&db, &cfg, "asha", "secret1").await.unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE, token)).unwrap(),
        );
        let found = current_user(&db, &cfg, &headers).await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));

        // A different secret cannot resolve the same token.
        let other = AuthConfig::new("other", 24);
        assert!(current_user(&db, &other, &headers).await.unwrap().is_none());

        assert!(logout(&db, &cfg, &token).await.unwrap());
        assert!(current_user(&db, &cfg, &headers).await.unwrap().is_none());
    }
}
