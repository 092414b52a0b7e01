//! The calorie tracker web app.
//!
//! - `db`: SQLite persistence behind [`db::DbHandle`]
//! - `auth`: accounts, bcrypt hashing and cookie sessions
//! - `pipeline`: meal analysis (detection, calories, insights, save)
//! - `coach`: the conversational nutrition coach
//! - `api` / `pages`: JSON endpoints and HTML pages
//! - `server`: router assembly and the serve loop

pub mod api;
pub mod auth;
pub mod coach;
pub mod db;
pub mod embedded;
pub mod models;
pub mod pages;
pub mod pipeline;
pub mod server;

use chrono::{DateTime, Local, NaiveDate, SecondsFormat, Utc};

/// RFC 3339 UTC timestamp with a `Z` suffix, as stored in every
/// `created_at` column. Lexicographic order matches time order.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The calendar day entries are filed under, in the server's local zone.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Parse a `YYYY-MM-DD` query value.
pub fn parse_date(value: &str) -> Result<NaiveDate, crate::errors::TrackerError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| crate::errors::TrackerError::InvalidDate(value.to_string()))
}
