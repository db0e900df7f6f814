//! Remote data service for authenticated mode.
//!
//! [`RemoteService`] holds the domain rules (principal scoping, time-format
//! normalization, completion folding) and talks to a row-level
//! [`RemoteStore`]. [`RestStore`] is the store used in production.

mod rest;
mod service;

pub use rest::RestStore;
pub use service::RemoteService;

use crate::auth::Session;
use crate::backend::BackendError;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A row of the `habits` table. Times are stored as `HH:mm:ss`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    pub color: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

fn default_active() -> bool {
    true
}

/// Columns an edit is allowed to touch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HabitPatch {
    pub title: String,
    pub description: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub color: String,
}

/// A row of `habit_logs`, unique on `(habit_id, date)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRow {
    pub habit_id: String,
    pub date: NaiveDate,
    pub completed: bool,
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Active habits owned by the session's principal, oldest first.
    async fn select_habits(&self, session: &Session) -> Result<Vec<HabitRow>, BackendError>;

    /// Every habit id owned by the principal, active or not.
    async fn select_habit_ids(&self, session: &Session) -> Result<Vec<String>, BackendError>;

    async fn select_completed_logs(
        &self,
        session: &Session,
        habit_ids: &[String],
    ) -> Result<Vec<LogRow>, BackendError>;

    async fn insert_habit(&self, session: &Session, row: &HabitRow) -> Result<(), BackendError>;

    async fn update_habit(
        &self,
        session: &Session,
        habit_id: &str,
        patch: &HabitPatch,
    ) -> Result<(), BackendError>;

    async fn delete_habit(&self, session: &Session, habit_id: &str) -> Result<(), BackendError>;

    /// Insert, or overwrite the row with the same `(habit_id, date)`.
    async fn upsert_log(&self, session: &Session, row: &LogRow) -> Result<(), BackendError>;

    async fn delete_log(
        &self,
        session: &Session,
        habit_id: &str,
        date: NaiveDate,
    ) -> Result<(), BackendError>;
}
