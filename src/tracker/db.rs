use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;

use super::models::*;
use crate::errors::TrackerError;
use crate::nutrition::MacroTotals;

/// Async-safe handle to the tracker database.
///
/// Wraps `TrackerDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<TrackerDb>>,
}

impl DbHandle {
    pub fn new(db: TrackerDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&TrackerDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|_| TrackerError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }

    /// Acquire the database mutex synchronously. For startup, CLI commands
    /// and tests only.
    pub fn lock_sync(&self) -> Result<std::sync::MutexGuard<'_, TrackerDb>> {
        Ok(self.inner.lock().map_err(|_| TrackerError::LockPoisoned)?)
    }
}

/// Rows removed by [`TrackerDb::reset_user_data`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResetCounts {
    pub entries: usize,
    pub goals: usize,
    pub macros: usize,
    pub messages: usize,
}

impl ResetCounts {
    pub fn total(&self) -> usize {
        self.entries + self.goals + self.macros + self.messages
    }
}

pub struct TrackerDb {
    conn: Connection,
}

const ENTRY_COLUMNS: &str =
    "id, user_id, user_input, food_items, total_calories, detailed_breakdown, created_at, date";
const GOAL_COLUMNS: &str = "id, user_id, goal_type, target_weight, current_weight, timeline_weeks, created_at, updated_at";
const MACRO_COLUMNS: &str = "id, user_id, date, protein, carbs, fats, fiber, calories, created_at";

impl TrackerDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT NOT NULL UNIQUE,
                    email TEXT NOT NULL UNIQUE,
                    password_hash TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS sessions (
                    token_hash TEXT PRIMARY KEY,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL,
                    expires_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS calorie_entries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    user_input TEXT NOT NULL,
                    food_items TEXT NOT NULL DEFAULT '[]',
                    total_calories INTEGER NOT NULL,
                    detailed_breakdown TEXT NOT NULL DEFAULT '{}',
                    created_at TEXT NOT NULL,
                    date TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS user_goals (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    goal_type TEXT NOT NULL,
                    target_weight REAL,
                    current_weight REAL,
                    timeline_weeks INTEGER,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS user_macros (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    date TEXT NOT NULL,
                    protein REAL NOT NULL DEFAULT 0,
                    carbs REAL NOT NULL DEFAULT 0,
                    fats REAL NOT NULL DEFAULT 0,
                    fiber REAL,
                    calories REAL NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS chat_history (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    message TEXT NOT NULL,
                    is_user INTEGER NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
                CREATE INDEX IF NOT EXISTS idx_entries_user_date ON calorie_entries(user_id, date);
                CREATE INDEX IF NOT EXISTS idx_goals_user ON user_goals(user_id);
                CREATE INDEX IF NOT EXISTS idx_macros_user_date ON user_macros(user_id, date);
                CREATE INDEX IF NOT EXISTS idx_chat_user ON chat_history(user_id);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Users ─────────────────────────────────────────────────────────

    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        created_at: &str,
    ) -> Result<User> {
        self.conn
            .execute(
                "INSERT INTO users (username, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![username, email, password_hash, created_at],
            )
            .context("Failed to insert user")?;
        let id = self.conn.last_insert_rowid();
        self.get_user(id)?.context("User not found after insert")
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, username, email, created_at FROM users WHERE id = ?1")
            .context("Failed to prepare get_user")?;
        let mut rows = stmt
            .query_map(params![id], user_from_row)
            .context("Failed to query user")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read user row")?)),
            None => Ok(None),
        }
    }

    pub fn find_user_by_username(&self, username: &str) -> Result<Option<UserCredentials>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, username, email, created_at, password_hash FROM users WHERE username = ?1",
            )
            .context("Failed to prepare find_user_by_username")?;
        let mut rows = stmt
            .query_map(params![username], |row| {
                Ok(UserCredentials {
                    user: user_from_row(row)?,
                    password_hash: row.get(4)?,
                })
            })
            .context("Failed to query user")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read user row")?)),
            None => Ok(None),
        }
    }

    pub fn username_exists(&self, username: &str) -> Result<bool> {
        self.exists("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)", username)
    }

    pub fn email_exists(&self, email: &str) -> Result<bool> {
        self.exists("SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)", email)
    }

    fn exists(&self, sql: &str, value: &str) -> Result<bool> {
        self.conn
            .query_row(sql, params![value], |row| row.get(0))
            .context("Failed to check existence")
    }

    // ── Sessions ──────────────────────────────────────────────────────

    pub fn create_session(
        &self,
        token_hash: &str,
        user_id: i64,
        created_at: &str,
        expires_at: &str,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
                params![token_hash, user_id, created_at, expires_at],
            )
            .context("Failed to insert session")?;
        Ok(())
    }

    /// The user owning an unexpired session.
    pub fn session_user(&self, token_hash: &str, now: &str) -> Result<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT u.id, u.username, u.email, u.created_at
                 FROM sessions s JOIN users u ON u.id = s.user_id
                 WHERE s.token_hash = ?1 AND s.expires_at > ?2",
            )
            .context("Failed to prepare session_user")?;
        let mut rows = stmt
            .query_map(params![token_hash, now], user_from_row)
            .context("Failed to query session")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read session row")?)),
            None => Ok(None),
        }
    }

    pub fn delete_session(&self, token_hash: &str) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM sessions WHERE token_hash = ?1", params![token_hash])
            .context("Failed to delete session")?;
        Ok(n > 0)
    }

    pub fn purge_expired_sessions(&self, now: &str) -> Result<usize> {
        self.conn
            .execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])
            .context("Failed to purge sessions")
    }

    // ── Calorie entries ───────────────────────────────────────────────

    pub fn insert_entry(&self, user_id: i64, entry: &NewEntry) -> Result<CalorieEntry> {
        let food_items =
            serde_json::to_string(&entry.food_items).context("Failed to serialize food items")?;
        let breakdown = serde_json::to_string(&entry.detailed_breakdown)
            .context("Failed to serialize breakdown")?;
        self.conn
            .execute(
                "INSERT INTO calorie_entries (user_id, user_input, food_items, total_calories, detailed_breakdown, created_at, date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user_id,
                    entry.user_input,
                    food_items,
                    entry.total_calories,
                    breakdown,
                    entry.created_at,
                    entry.date
                ],
            )
            .context("Failed to insert calorie entry")?;
        let id = self.conn.last_insert_rowid();
        self.query_entries(
            &format!("SELECT {ENTRY_COLUMNS} FROM calorie_entries WHERE id = ?1"),
            params![id],
        )?
        .pop()
        .context("Entry not found after insert")
    }

    /// Delete one of the user's entries. `false` when nothing matched.
    pub fn delete_entry(&self, user_id: i64, id: i64) -> Result<bool> {
        let n = self
            .conn
            .execute(
                "DELETE FROM calorie_entries WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )
            .context("Failed to delete entry")?;
        Ok(n > 0)
    }

    pub fn delete_all_entries(&self, user_id: i64) -> Result<usize> {
        self.conn
            .execute("DELETE FROM calorie_entries WHERE user_id = ?1", params![user_id])
            .context("Failed to delete entries")
    }

    pub fn entries_for_date(&self, user_id: i64, date: &str) -> Result<Vec<CalorieEntry>> {
        self.query_entries(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM calorie_entries WHERE user_id = ?1 AND date = ?2 ORDER BY created_at, id"
            ),
            params![user_id, date],
        )
    }

    /// Most recent entries first.
    pub fn recent_entries(&self, user_id: i64, limit: usize) -> Result<Vec<CalorieEntry>> {
        self.query_entries(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM calorie_entries WHERE user_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2"
            ),
            params![user_id, limit as i64],
        )
    }

    /// Entries dated within `[start, end]`, both `YYYY-MM-DD`.
    pub fn entries_between(&self, user_id: i64, start: &str, end: &str) -> Result<Vec<CalorieEntry>> {
        self.query_entries(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM calorie_entries WHERE user_id = ?1 AND date >= ?2 AND date <= ?3 ORDER BY date, id"
            ),
            params![user_id, start, end],
        )
    }

    fn query_entries(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<CalorieEntry>> {
        let mut stmt = self.conn.prepare(sql).context("Failed to prepare entry query")?;
        let rows = stmt
            .query_map(params, |row| {
                Ok(EntryRow {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    user_input: row.get(2)?,
                    food_items: row.get(3)?,
                    total_calories: row.get(4)?,
                    detailed_breakdown: row.get(5)?,
                    created_at: row.get(6)?,
                    date: row.get(7)?,
                })
            })
            .context("Failed to query entries")?;
        let mut entries = Vec::new();
        for row in rows {
            let r = row.context("Failed to read entry row")?;
            entries.push(r.into_entry()?);
        }
        Ok(entries)
    }

    // ── Goals ─────────────────────────────────────────────────────────

    pub fn latest_goal(&self, user_id: i64) -> Result<Option<UserGoal>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {GOAL_COLUMNS} FROM user_goals WHERE user_id = ?1 ORDER BY created_at DESC, id DESC LIMIT 1"
            ))
            .context("Failed to prepare latest_goal")?;
        let mut rows = stmt
            .query_map(params![user_id], |row| {
                Ok(GoalRow {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    goal_type: row.get(2)?,
                    target_weight: row.get(3)?,
                    current_weight: row.get(4)?,
                    timeline_weeks: row.get(5)?,
                    created_at: row.get(6)?,
                    updated_at: row.get(7)?,
                })
            })
            .context("Failed to query goal")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read goal row")?.into_goal()?)),
            None => Ok(None),
        }
    }

    /// Update the user's latest goal in place, or create the first one.
    pub fn upsert_goal(&self, user_id: i64, goal: &GoalUpdate, now: &str) -> Result<UserGoal> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin goal transaction")?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM user_goals WHERE user_id = ?1 ORDER BY created_at DESC, id DESC LIMIT 1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to look up existing goal")?;

        match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE user_goals SET goal_type = ?1, target_weight = ?2, current_weight = ?3, timeline_weeks = ?4, updated_at = ?5 WHERE id = ?6",
                    params![
                        goal.goal_type.as_str(),
                        goal.target_weight,
                        goal.current_weight,
                        goal.timeline_weeks,
                        now,
                        id
                    ],
                )
                .context("Failed to update goal")?;
            }
            None => {
                tx.execute(
                    "INSERT INTO user_goals (user_id, goal_type, target_weight, current_weight, timeline_weeks, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                    params![
                        user_id,
                        goal.goal_type.as_str(),
                        goal.target_weight,
                        goal.current_weight,
                        goal.timeline_weeks,
                        now
                    ],
                )
                .context("Failed to insert goal")?;
            }
        }
        tx.commit().context("Failed to commit goal transaction")?;

        self.latest_goal(user_id)?
            .context("Goal not found after upsert")
    }

    // ── Macros ────────────────────────────────────────────────────────

    pub fn insert_macros(
        &self,
        user_id: i64,
        date: &str,
        macros: &MacroTotals,
        fiber: Option<f64>,
        created_at: &str,
    ) -> Result<MacroEntry> {
        self.conn
            .execute(
                "INSERT INTO user_macros (user_id, date, protein, carbs, fats, fiber, calories, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    user_id,
                    date,
                    macros.protein,
                    macros.carbs,
                    macros.fats,
                    fiber,
                    macros.calories,
                    created_at
                ],
            )
            .context("Failed to insert macros")?;
        let id = self.conn.last_insert_rowid();
        self.query_macros(
            &format!("SELECT {MACRO_COLUMNS} FROM user_macros WHERE id = ?1"),
            params![id],
        )?
        .pop()
        .context("Macro row not found after insert")
    }

    pub fn macros_for_date(&self, user_id: i64, date: &str) -> Result<Vec<MacroEntry>> {
        self.query_macros(
            &format!(
                "SELECT {MACRO_COLUMNS} FROM user_macros WHERE user_id = ?1 AND date = ?2 ORDER BY id"
            ),
            params![user_id, date],
        )
    }

    fn query_macros(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<MacroEntry>> {
        let mut stmt = self.conn.prepare(sql).context("Failed to prepare macro query")?;
        let rows = stmt
            .query_map(params, |row| {
                Ok(MacroEntry {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    date: row.get(2)?,
                    protein: row.get(3)?,
                    carbs: row.get(4)?,
                    fats: row.get(5)?,
                    fiber: row.get(6)?,
                    calories: row.get(7)?,
                    created_at: row.get(8)?,
                })
            })
            .context("Failed to query macros")?;
        let mut macros = Vec::new();
        for row in rows {
            macros.push(row.context("Failed to read macro row")?);
        }
        Ok(macros)
    }

    // ── Chat history ──────────────────────────────────────────────────

    pub fn insert_chat_message(
        &self,
        user_id: i64,
        message: &str,
        is_user: bool,
        created_at: &str,
    ) -> Result<ChatRecord> {
        self.conn
            .execute(
                "INSERT INTO chat_history (user_id, message, is_user, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![user_id, message, is_user, created_at],
            )
            .context("Failed to insert chat message")?;
        Ok(ChatRecord {
            id: self.conn.last_insert_rowid(),
            user_id,
            message: message.to_string(),
            is_user,
            created_at: created_at.to_string(),
        })
    }

    /// Most recent messages first.
    pub fn chat_history(&self, user_id: i64, limit: usize) -> Result<Vec<ChatRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, user_id, message, is_user, created_at FROM chat_history
                 WHERE user_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
            )
            .context("Failed to prepare chat_history")?;
        let rows = stmt
            .query_map(params![user_id, limit as i64], |row| {
                Ok(ChatRecord {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    message: row.get(2)?,
                    is_user: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })
            .context("Failed to query chat history")?;
        let mut messages = Vec::new();
        for row in rows {
            messages.push(row.context("Failed to read chat row")?);
        }
        Ok(messages)
    }

    // ── Reset ─────────────────────────────────────────────────────────

    /// Remove every entry, goal, macro row and chat message of the user in
    /// one transaction. The account and its sessions are kept.
    pub fn reset_user_data(&self, user_id: i64) -> Result<ResetCounts> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin reset transaction")?;
        let counts = ResetCounts {
            entries: tx
                .execute("DELETE FROM calorie_entries WHERE user_id = ?1", params![user_id])
                .context("Failed to delete entries")?,
            goals: tx
                .execute("DELETE FROM user_goals WHERE user_id = ?1", params![user_id])
                .context("Failed to delete goals")?,
            macros: tx
                .execute("DELETE FROM user_macros WHERE user_id = ?1", params![user_id])
                .context("Failed to delete macros")?,
            messages: tx
                .execute("DELETE FROM chat_history WHERE user_id = ?1", params![user_id])
                .context("Failed to delete chat history")?,
        };
        tx.commit().context("Failed to commit reset transaction")?;
        Ok(counts)
    }
}

// ── Internal row helpers ──────────────────────────────────────────────

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Entry as stored, with JSON columns still encoded.
struct EntryRow {
    id: i64,
    user_id: i64,
    user_input: String,
    food_items: String,
    total_calories: i64,
    detailed_breakdown: String,
    created_at: String,
    date: String,
}

impl EntryRow {
    fn into_entry(self) -> Result<CalorieEntry> {
        let food_items: Vec<String> =
            serde_json::from_str(&self.food_items).context("Failed to parse food_items JSON")?;
        let detailed_breakdown = serde_json::from_str(&self.detailed_breakdown)
            .context("Failed to parse detailed_breakdown JSON")?;
        Ok(CalorieEntry {
            id: self.id,
            user_id: self.user_id,
            user_input: self.user_input,
            food_items,
            total_calories: self.total_calories,
            detailed_breakdown,
            created_at: self.created_at,
            date: self.date,
        })
    }
}

struct GoalRow {
    id: i64,
    user_id: i64,
    goal_type: String,
    target_weight: Option<f64>,
    current_weight: Option<f64>,
    timeline_weeks: Option<i64>,
    created_at: String,
    updated_at: String,
}

impl GoalRow {
    fn into_goal(self) -> Result<UserGoal> {
        let goal_type = GoalType::from_str(&self.goal_type)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse goal type")?;
        Ok(UserGoal {
            id: self.id,
            user_id: self.user_id,
            goal_type,
            target_weight: self.target_weight,
            current_weight: self.current_weight,
            timeline_weeks: self.timeline_weeks,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
