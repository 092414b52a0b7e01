use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use super::auth::{AuthConfig, CurrentUser};
use super::coach::{self, ChatRequest};
use super::db::DbHandle;
use super::models::{DailySummary, GoalUpdate, WeekDay};
use super::{parse_date, pipeline, timestamp, today};
use crate::errors::{AuthError, LlmError, TrackerError};
use crate::llm::{ChatModel, ModelCatalog};
use crate::nutrition::{MacroTotals, NutritionTables};

pub const HISTORY_LIMIT: usize = 15;
pub const DEFAULT_CHAT_LIMIT: usize = 10;
pub const MAX_CHAT_LIMIT: usize = 100;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub llm: Arc<dyn ChatModel>,
    pub catalog: ModelCatalog,
    pub tables: NutritionTables,
    pub auth: AuthConfig,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ProcessFoodRequest {
    #[serde(default)]
    pub user_input: String,
    pub model: Option<String>,
}

#[derive(Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

#[derive(Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    /// The request was understood but nothing usable came out of it.
    Unprocessable { message: String, logs: Vec<String> },
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, logs) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
            ApiError::Unprocessable { message, logs } => {
                (StatusCode::UNPROCESSABLE_ENTITY, message, Some(logs))
            }
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg, None),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None),
        };
        let body = match logs {
            Some(logs) => json!({"success": false, "error": message, "logs": logs}),
            None => json!({"success": false, "error": message}),
        };
        (status, Json(body)).into_response()
    }
}

impl From<TrackerError> for ApiError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::EntryNotFound { .. } => ApiError::NotFound(err.to_string()),
            TrackerError::InvalidDate(_) | TrackerError::BadRequest(_) => {
                ApiError::BadRequest(err.to_string())
            }
            TrackerError::NoFoodDetected { logs } => ApiError::Unprocessable {
                message: "No food items detected".into(),
                logs,
            },
            TrackerError::Llm(e @ LlmError::UnknownModel(_)) => ApiError::BadRequest(e.to_string()),
            TrackerError::Llm(e) => ApiError::BadGateway(e.to_string()),
            TrackerError::LockPoisoned | TrackerError::Database(_) => {
                error!(error = %err, "Request failed");
                ApiError::Internal("Internal server error".into())
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        TrackerError::Database(err).into()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Invalid(msg) => ApiError::BadRequest(msg),
            AuthError::UsernameTaken | AuthError::EmailTaken => ApiError::Conflict(err.to_string()),
            AuthError::BadCredentials | AuthError::MissingSession => {
                ApiError::Unauthorized(err.to_string())
            }
            AuthError::Hashing(_) | AuthError::Storage(_) => {
                error!(error = %err, "Auth failure");
                ApiError::Internal("Internal server error".into())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/process_food", post(process_food))
        .route("/delete_entry/{id}", delete(delete_entry))
        .route("/get_daily_summary", get(daily_summary))
        .route("/get_history", get(history))
        .route("/get_weekly_data", get(weekly_data))
        .route("/delete_all_entries", delete(delete_all_entries))
        .route("/chat", post(chat))
        .route("/chat_history", get(chat_history))
        .route("/goals", get(get_goal).post(set_goal))
        .route("/macros", get(macros))
        .route("/models", get(list_models))
        .route("/reset_all_data", post(reset_all_data))
        .route("/health", get(health_check))
}

// ── Meal handlers ─────────────────────────────────────────────────────

async fn process_food(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<ProcessFoodRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let response =
        pipeline::analyze_meal(&state, &user, &req.user_input, req.model.as_deref()).await?;
    Ok(Json(response))
}

async fn delete_entry(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    let deleted = state.db.call(move |db| db.delete_entry(user.id, id)).await?;
    if !deleted {
        return Err(TrackerError::EntryNotFound { id }.into());
    }
    Ok(Json(json!({
        "success": true,
        "message": format!("Entry {} deleted successfully", id),
    })))
}

async fn daily_summary(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    query: Result<Query<DateQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let date = match query.date.as_deref().filter(|d| !d.trim().is_empty()) {
        Some(d) => parse_date(d)?,
        None => today(),
    }
    .to_string();
    let entries = {
        let date = date.clone();
        state
            .db
            .call(move |db| db.entries_for_date(user.id, &date))
            .await?
    };
    Ok(Json(DailySummary::new(date, entries)))
}

async fn history(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state
        .db
        .call(move |db| db.recent_entries(user.id, HISTORY_LIMIT))
        .await?;
    Ok(Json(json!({"success": true, "entries": entries})))
}

async fn weekly_data(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let end = today();
    let start = (end - Duration::days(6)).to_string();
    let end_str = end.to_string();
    let entries = state
        .db
        .call(move |db| db.entries_between(user.id, &start, &end_str))
        .await?;
    let data = WeekDay::week_ending(end, &entries);
    let total_entries: usize = data.iter().map(|d| d.entries).sum();
    Ok(Json(json!({"data": data, "total_entries": total_entries})))
}

async fn delete_all_entries(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user.id;
    let deleted = state
        .db
        .call(move |db| db.delete_all_entries(user_id))
        .await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("No entries were deleted".into()));
    }
    info!(user_id, deleted, "Deleted all entries");
    Ok(Json(json!({
        "success": true,
        "message": "All entries deleted successfully",
        "deleted": deleted,
    })))
}

// ── Coach handlers ────────────────────────────────────────────────────

async fn chat(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    Ok(Json(coach::chat(&state, &user, req).await?))
}

async fn chat_history(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_CHAT_LIMIT)
        .clamp(1, MAX_CHAT_LIMIT);
    let messages = state
        .db
        .call(move |db| db.chat_history(user.id, limit))
        .await?;
    Ok(Json(json!({"success": true, "messages": messages})))
}

async fn get_goal(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let goal = state.db.call(move |db| db.latest_goal(user.id)).await?;
    Ok(Json(json!({"success": true, "goal": goal})))
}

async fn set_goal(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<GoalUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(update) = payload?;
    let positive = |v: Option<f64>| v.is_none_or(|w| w.is_finite() && w > 0.0);
    if !positive(update.target_weight) || !positive(update.current_weight) {
        return Err(ApiError::BadRequest("Weights must be positive numbers".into()));
    }
    if update.timeline_weeks.is_some_and(|w| w <= 0) {
        return Err(ApiError::BadRequest("Timeline must be at least one week".into()));
    }
    let user_id = user.id;
    let now = timestamp(Utc::now());
    let goal = state
        .db
        .call(move |db| db.upsert_goal(user_id, &update, &now))
        .await?;
    info!(user_id, goal_type = goal.goal_type.as_str(), "Goal saved");
    Ok(Json(json!({"success": true, "goal": goal})))
}

async fn macros(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    query: Result<Query<DateQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let date = match query.date.as_deref().filter(|d| !d.trim().is_empty()) {
        Some(d) => parse_date(d)?,
        None => today(),
    }
    .to_string();
    let rows = {
        let date = date.clone();
        state
            .db
            .call(move |db| db.macros_for_date(user.id, &date))
            .await?
    };
    let totals: Vec<MacroTotals> = rows.iter().map(|r| r.totals()).collect();
    Ok(Json(json!({
        "success": true,
        "date": date,
        "entries": rows,
        "totals": MacroTotals::sum(&totals),
    })))
}

// ── Misc handlers ─────────────────────────────────────────────────────

async fn list_models(State(state): State<SharedState>) -> impl IntoResponse {
    Json(state.catalog.clone())
}

async fn reset_all_data(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user.id;
    let counts = state.db.call(move |db| db.reset_user_data(user_id)).await?;
    info!(user_id, removed = counts.total(), "Reset user data");
    Ok(Json(json!({
        "success": true,
        "message": "All user data has been reset successfully",
        "deleted": counts,
    })))
}

async fn health_check() -> &'static str {
    "ok"
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::llm::testing::ScriptedModel;
    use crate::tracker::models::NewEntry;
    use axum::body::Body;
    use axum::http::{Request, header};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    const IDLI_REPLY: &str = r#"[{"food": "idli", "quantity": 3, "portion": "piece", "calories_per_item": 70, "total_calories": 210, "confidence": 0.9}]"#;
    const INSIGHTS_REPLY: &str = r#"{"macro_balance": "Balanced", "nutrition_gaps": "Fiber", "health_score": 81, "next_meal": "Salad"}"#;

    fn app(state: &SharedState) -> Router {
        api_router().with_state(state.clone())
    }

    fn get(uri: &str, cookie: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap()
    }

    fn send_json(method: &str, uri: &str, cookie: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, cookie)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn delete_req(uri: &str, cookie: &str) -> Request<Body> {
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap()
    }

    async fn seed_entry(state: &SharedState, username: &str, calories: i64) -> i64 {
        let username = username.to_string();
        let date = today().to_string();
        state
            .db
            .call(move |db| {
                let user = db.find_user_by_username(&username)?.unwrap().user;
                let entry = db.insert_entry(
                    user.id,
                    &NewEntry {
                        user_input: "seed".into(),
                        food_items: vec!["rice".into()],
                        total_calories: calories,
                        detailed_breakdown: Default::default(),
                        created_at: "2026-01-05T08:00:00.000Z".into(),
                        date,
                    },
                )?;
                Ok(entry.id)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let (state, _) = test_state(ScriptedModel::new(Vec::<String>::new()));
        let response = app(&state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_endpoints_require_session() {
        let (state, _) = test_state(ScriptedModel::new(Vec::<String>::new()));
        for uri in ["/get_history", "/get_weekly_data", "/goals", "/macros", "/chat_history"] {
            let response = app(&state).oneshot(get(uri, "")).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
            let body: Value = body_json(response.into_body()).await;
            assert_eq!(body["success"], false);
        }
        let response = app(&state)
            .oneshot(get("/get_history", "platewise_session=forged"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_process_food_saves_and_summarises() {
        let (state, llm) = test_state(ScriptedModel::new([IDLI_REPLY, INSIGHTS_REPLY]));
        let cookie = login_cookie(&state, "asha").await;

        let response = app(&state)
            .oneshot(send_json(
                "POST",
                "/process_food",
                &cookie,
                json!({"user_input": "3 idli", "model": "microsoft/Phi-4"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = body_json(response.into_body()).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["food_entries"], json!(["idli"]));
        assert_eq!(body["total_calories"], 210);
        assert_eq!(body["daily_total"], 210);
        assert_eq!(body["daily_entries_count"], 1);
        assert_eq!(body["model_used"], "Fast Phi-4");
        assert_eq!(body["ai_insights"]["health_score"], 81);
        assert_eq!(body["detailed_breakdown"]["items"][0]["total_calories"], 210);
        assert!(body["entry_id"].as_i64().unwrap() > 0);
        assert!(!body["logs"].as_array().unwrap().is_empty());
        assert_eq!(llm.requests.lock().unwrap()[0].model, "microsoft/Phi-4");

        let response = app(&state).oneshot(get("/get_history", &cookie)).await.unwrap();
        let body: Value = body_json(response.into_body()).await;
        assert_eq!(body["entries"].as_array().unwrap().len(), 1);
        assert_eq!(body["entries"][0]["user_input"], "3 idli");
    }

    #[tokio::test]
    async fn test_process_food_without_foods_saves_nothing() {
        let (state, _) = test_state(ScriptedModel::new(["I can't tell."]));
        let cookie = login_cookie(&state, "asha").await;

        let response = app(&state)
            .oneshot(send_json("POST", "/process_food", &cookie, json!({"user_input": "hmm"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = body_json(response.into_body()).await;
        assert_eq!(body["error"], "No food items detected");
        assert!(body["logs"].is_array());

        let response = app(&state).oneshot(get("/get_history", &cookie)).await.unwrap();
        let body: Value = body_json(response.into_body()).await;
        assert!(body["entries"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_process_food_rejects_bad_input() {
        let (state, llm) = test_state(ScriptedModel::new(Vec::<String>::new()));
        let cookie = login_cookie(&state, "asha").await;

        let response = app(&state)
            .oneshot(send_json("POST", "/process_food", &cookie, json!({"user_input": " "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app(&state)
            .oneshot(send_json(
                "POST",
                "/process_food",
                &cookie,
                json!({"user_input": "rice", "model": "acme/unknown"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = body_json(response.into_body()).await;
        assert_eq!(body["error"], "Unsupported model: acme/unknown");
        assert_eq!(llm.request_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_entry_scoped_and_missing() {
        let (state, _) = test_state(ScriptedModel::new(Vec::<String>::new()));
        let asha = login_cookie(&state, "asha").await;
        let ravi = login_cookie(&state, "ravi").await;
        let id = seed_entry(&state, "asha", 300).await;

        let response = app(&state)
            .oneshot(delete_req(&format!("/delete_entry/{}", id), &ravi))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app(&state)
            .oneshot(delete_req(&format!("/delete_entry/{}", id), &asha))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = body_json(response.into_body()).await;
        assert_eq!(body["message"], format!("Entry {} deleted successfully", id));
    }

    #[tokio::test]
    async fn test_daily_summary_and_weekly_data() {
        let (state, _) = test_state(ScriptedModel::new(Vec::<String>::new()));
        let cookie = login_cookie(&state, "asha").await;
        seed_entry(&state, "asha", 300).await;
        seed_entry(&state, "asha", 250).await;

        let response = app(&state).oneshot(get("/get_daily_summary", &cookie)).await.unwrap();
        let body: Value = body_json(response.into_body()).await;
        assert_eq!(body["date"], today().to_string());
        assert_eq!(body["total_calories"], 550);
        assert_eq!(body["entries_count"], 2);

        let response = app(&state)
            .oneshot(get("/get_daily_summary?date=2020-01-01", &cookie))
            .await
            .unwrap();
        let body: Value = body_json(response.into_body()).await;
        assert_eq!(body["entries_count"], 0);

        let response = app(&state)
            .oneshot(get("/get_daily_summary?date=yesterday", &cookie))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app(&state).oneshot(get("/get_weekly_data", &cookie)).await.unwrap();
        let body: Value = body_json(response.into_body()).await;
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 7);
        assert_eq!(data[6]["calories"], 550);
        assert_eq!(body["total_entries"], 2);
    }

    #[tokio::test]
    async fn test_delete_all_entries() {
        let (state, _) = test_state(ScriptedModel::new(Vec::<String>::new()));
        let cookie = login_cookie(&state, "asha").await;

        let response = app(&state).oneshot(delete_req("/delete_all_entries", &cookie)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: Value = body_json(response.into_body()).await;
        assert_eq!(body["error"], "No entries were deleted");

        seed_entry(&state, "asha", 100).await;
        seed_entry(&state, "asha", 100).await;
        let response = app(&state).oneshot(delete_req("/delete_all_entries", &cookie)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = body_json(response.into_body()).await;
        assert_eq!(body["deleted"], 2);
    }

    #[tokio::test]
    async fn test_chat_tracks_food_and_goal() {
        let (state, llm) = test_state(ScriptedModel::new(["Nice choice! 🥗"]));
        let cookie = login_cookie(&state, "asha").await;

        let response = app(&state)
            .oneshot(send_json(
                "POST",
                "/chat",
                &cookie,
                json!({"message": "I want to lose weight, had 2 chapati", "context": ["hi", "hello!"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = body_json(response.into_body()).await;
        assert_eq!(body["response"], "Nice choice! 🥗");
        assert_eq!(body["context"].as_array().unwrap().len(), 4);
        assert_eq!(body["food_detected"], true);
        assert_eq!(body["macros"]["calories"], 200.0);
        assert_eq!(body["goal_changed"], true);
        assert_eq!(body["user_goals"]["goal_type"], "weight_loss");
        assert_eq!(body["user_goals"]["target_weight"], 70.0);
        assert_eq!(llm.requests.lock().unwrap()[0].model, "microsoft/Phi-4");

        let response = app(&state).oneshot(get("/chat_history", &cookie)).await.unwrap();
        let body: Value = body_json(response.into_body()).await;
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);

        let response = app(&state).oneshot(get("/macros", &cookie)).await.unwrap();
        let body: Value = body_json(response.into_body()).await;
        assert_eq!(body["totals"]["calories"], 200.0);
        assert_eq!(body["entries"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_chat_history_default_and_cap() {
        let (state, _) = test_state(ScriptedModel::new(Vec::<String>::new()));
        let cookie = login_cookie(&state, "asha").await;
        state
            .db
            .call(|db| {
                let user = db.find_user_by_username("asha")?.unwrap().user;
                for i in 0..(MAX_CHAT_LIMIT + 5) {
                    let at = format!("2026-01-05T08:{:02}:{:02}.000Z", i / 60, i % 60);
                    db.insert_chat_message(user.id, &format!("message {}", i), i % 2 == 0, &at)?;
                }
                Ok(())
            })
            .await
            .unwrap();

        let count = |uri: &'static str| {
            let state = state.clone();
            let cookie = cookie.clone();
            async move {
                let response = app(&state).oneshot(get(uri, &cookie)).await.unwrap();
                assert_eq!(response.status(), StatusCode::OK, "{}", uri);
                let body: Value = body_json(response.into_body()).await;
                body["messages"].as_array().unwrap().len()
            }
        };
        assert_eq!(count("/chat_history").await, DEFAULT_CHAT_LIMIT);
        assert_eq!(count("/chat_history?limit=3").await, 3);
        assert_eq!(count("/chat_history?limit=500").await, MAX_CHAT_LIMIT);
    }

    #[tokio::test]
    async fn test_malformed_requests_get_json_errors() {
        let (state, _) = test_state(ScriptedModel::new(Vec::<String>::new()));
        let cookie = login_cookie(&state, "asha").await;

        let plain_text = Request::builder()
            .method("POST")
            .uri("/process_food")
            .header(header::COOKIE, &cookie)
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("3 idli"))
            .unwrap();
        let broken_json = Request::builder()
            .method("POST")
            .uri("/chat")
            .header(header::COOKIE, &cookie)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"message\": "))
            .unwrap();
        let requests = [
            plain_text,
            broken_json,
            delete_req("/delete_entry/abc", &cookie),
            get("/chat_history?limit=lots", &cookie),
        ];
        for request in requests {
            let uri = request.uri().to_string();
            let response = app(&state).oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
            let body: Value = body_json(response.into_body()).await;
            assert_eq!(body["success"], false, "{}", uri);
            assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()), "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_chat_accumulates_macros_across_messages() {
        let (state, _) = test_state(ScriptedModel::new(["Yum", "Great"]));
        let cookie = login_cookie(&state, "asha").await;

        for msg in ["2 chapati", "a bowl of rice"] {
            let response = app(&state)
                .oneshot(send_json("POST", "/chat", &cookie, json!({"message": msg})))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = app(&state).oneshot(get("/macros", &cookie)).await.unwrap();
        let body: Value = body_json(response.into_body()).await;
        // 2 × 100 + 1.5 × 200, stored as two increments
        assert_eq!(body["totals"]["calories"], 500.0);
        assert_eq!(body["entries"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_chat_model_failure_is_bad_gateway() {
        let (state, _) = test_state(ScriptedModel::failing());
        let cookie = login_cookie(&state, "asha").await;

        let response = app(&state)
            .oneshot(send_json("POST", "/chat", &cookie, json!({"message": "hello"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body: Value = body_json(response.into_body()).await;
        assert_eq!(body["error"], coach::COACH_UNAVAILABLE);

        let response = app(&state)
            .oneshot(send_json("POST", "/chat", &cookie, json!({"message": ""})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_goals_get_and_set() {
        let (state, _) = test_state(ScriptedModel::new(Vec::<String>::new()));
        let cookie = login_cookie(&state, "asha").await;

        let response = app(&state).oneshot(get("/goals", &cookie)).await.unwrap();
        let body: Value = body_json(response.into_body()).await;
        assert!(body["goal"].is_null());

        let response = app(&state)
            .oneshot(send_json(
                "POST",
                "/goals",
                &cookie,
                json!({"goal_type": "weight_gain", "target_weight": 72.5, "timeline_weeks": 8}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = body_json(response.into_body()).await;
        assert_eq!(body["goal"]["goal_type"], "weight_gain");
        assert_eq!(body["goal"]["timeline_weeks"], 8);

        let response = app(&state)
            .oneshot(send_json(
                "POST",
                "/goals",
                &cookie,
                json!({"goal_type": "weight_gain", "target_weight": -3}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_models_listing() {
        let (state, _) = test_state(ScriptedModel::new(Vec::<String>::new()));
        let response = app(&state).oneshot(get("/models", "")).await.unwrap();
        let body: Value = body_json(response.into_body()).await;
        assert_eq!(body["default_model"], "mistral-ai/Ministral-3B");
        assert_eq!(body["coach_model"], "microsoft/Phi-4");
        assert_eq!(body["models"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_reset_all_data() {
        let (state, _) = test_state(ScriptedModel::new(["ok"]));
        let cookie = login_cookie(&state, "asha").await;
        seed_entry(&state, "asha", 100).await;
        app(&state)
            .oneshot(send_json("POST", "/chat", &cookie, json!({"message": "1 apple"})))
            .await
            .unwrap();

        let response = app(&state)
            .oneshot(send_json("POST", "/reset_all_data", &cookie, json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = body_json(response.into_body()).await;
        assert_eq!(body["deleted"]["entries"], 1);
        assert_eq!(body["deleted"]["macros"], 1);
        assert_eq!(body["deleted"]["messages"], 2);

        let response = app(&state).oneshot(get("/get_history", &cookie)).await.unwrap();
        let body: Value = body_json(response.into_body()).await;
        assert!(body["entries"].as_array().unwrap().is_empty());
    }
}
