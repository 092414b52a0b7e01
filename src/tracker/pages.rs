//! HTML pages and the form-based login flow.
//!
//! Failures redirect back to the form with `?error=<code>`; the page script
//! turns the code into a message.

use axum::{
    Form, Router,
    extract::State,
    http::{HeaderMap, header},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::error;

use super::api::SharedState;
use super::auth::{self, clear_session_cookie};
use super::embedded::asset_or_not_found;
use crate::errors::AuthError;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

pub fn page_router() -> Router<SharedState> {
    Router::new()
        .route("/", get(dashboard))
        .route("/login", get(login_page).post(login_submit))
        .route("/register", get(register_page).post(register_submit))
        .route("/logout", get(logout))
}

fn failure_redirect(page: &str, err: &AuthError) -> Response {
    if matches!(err, AuthError::Hashing(_) | AuthError::Storage(_)) {
        error!(error = %err, "Auth form failed");
    }
    Redirect::to(&format!("/{}?error={}", page, err.code())).into_response()
}

async fn dashboard(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    match auth::current_user(&state.db, &state.auth, &headers).await {
        Ok(Some(_)) => asset_or_not_found("index.html"),
        Ok(None) => Redirect::to("/login").into_response(),
        Err(e) => failure_redirect("login", &e),
    }
}

async fn login_page() -> Response {
    asset_or_not_found("login.html")
}

async fn register_page() -> Response {
    asset_or_not_found("register.html")
}

async fn login_submit(State(state): State<SharedState>, Form(form): Form<LoginForm>) -> Response {
    match auth::login(&state.db, &state.auth, &form.username, &form.password).await {
        Ok((_, token)) => (
            [(header::SET_COOKIE, state.auth.session_cookie(&token))],
            Redirect::to("/"),
        )
            .into_response(),
        Err(e) => failure_redirect("login", &e),
    }
}

async fn register_submit(
    State(state): State<SharedState>,
    Form(form): Form<RegisterForm>,
) -> Response {
    match auth::register(
        &state.db,
        &state.auth,
        &form.username,
        &form.email,
        &form.password,
    )
    .await
    {
        Ok(_) => Redirect::to("/login?registered=1").into_response(),
        Err(e) => failure_redirect("register", &e),
    }
}

async fn logout(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    if let Some(token) = auth::session_token(&headers) {
        if let Err(e) = auth::logout(&state.db, &state.auth, &token).await {
            error!(error = %e, "Failed to delete session");
        }
    }
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Redirect::to("/login"),
    )
        .into_response()
}
