use super::{HabitPatch, HabitRow, LogRow, RemoteStore};
use crate::auth::{Session, SessionHandle};
use crate::backend::{BackendError, HabitBackend};
use crate::models::{Completions, Habit, HabitColor};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use std::sync::Arc;
use tracing::{error, warn};

/// Habit and completion operations scoped to whoever is signed in when the
/// call is made.
#[derive(Clone)]
pub struct RemoteService {
    store: Arc<dyn RemoteStore>,
    session: SessionHandle,
}

impl RemoteService {
    pub fn new(store: Arc<dyn RemoteStore>, session: SessionHandle) -> Self {
        Self { store, session }
    }

    fn session(&self) -> Result<Session, BackendError> {
        self.session.current().ok_or(BackendError::NotAuthenticated)
    }
}

/// `HH:mm:ss` (or `HH:mm`) as stored remotely -> `HH:mm`.
fn to_domain_time(stored: Option<String>) -> Option<String> {
    let stored = stored?;
    let stored = stored.trim();
    ["%H:%M:%S", "%H:%M"]
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(stored, format).ok())
        .map(|time| time.format("%H:%M").to_string())
        .or_else(|| {
            warn!("unrecognised stored time {stored:?}");
            None
        })
}

fn to_stored_time(time: &Option<String>) -> Option<String> {
    time.as_ref().map(|time| format!("{time}:00"))
}

fn habit_from_row(row: HabitRow) -> Habit {
    let color = HabitColor::from_hex(&row.color).unwrap_or_else(|| {
        warn!(habit = %row.id, "unknown color {:?}, using default", row.color);
        HabitColor::default()
    });
    Habit {
        id: row.id,
        title: row.title,
        description: row.description,
        time_start: to_domain_time(row.start_time),
        time_end: to_domain_time(row.end_time),
        color,
        // Manual order has no remote column yet.
        order: 0,
        user_id: Some(row.user_id),
        created_at: row.created_at,
    }
}

#[async_trait]
impl HabitBackend for RemoteService {
    async fn fetch_habits(&self) -> Result<Vec<Habit>, BackendError> {
        let Some(session) = self.session.current() else {
            return Ok(Vec::new());
        };
        let rows = self.store.select_habits(&session).await?;
        Ok(rows.into_iter().map(habit_from_row).collect())
    }

    async fn fetch_completions(&self) -> Result<Completions, BackendError> {
        let mut completions = Completions::default();
        let Some(session) = self.session.current() else {
            return Ok(completions);
        };

        let habit_ids = match self.store.select_habit_ids(&session).await {
            Ok(ids) if ids.is_empty() => return Ok(completions),
            Ok(ids) => ids,
            Err(err) => {
                error!("failed to list habit ids for completions: {err}");
                return Ok(completions);
            }
        };

        match self.store.select_completed_logs(&session, &habit_ids).await {
            Ok(logs) => {
                for log in logs.into_iter().filter(|log| log.completed) {
                    completions.set(Completions::key(&log.habit_id, log.date), true);
                }
            }
            Err(err) => error!("failed to fetch completion logs: {err}"),
        }
        Ok(completions)
    }

    async fn create_habit(&self, habit: &Habit) -> Result<(), BackendError> {
        let session = self.session()?;
        let row = HabitRow {
            id: habit.id.clone(),
            user_id: session.principal.id.clone(),
            title: habit.title.clone(),
            description: habit.description.clone(),
            start_time: to_stored_time(&habit.time_start),
            end_time: to_stored_time(&habit.time_end),
            color: habit.color.hex().to_string(),
            active: true,
            created_at: None,
        };
        self.store.insert_habit(&session, &row).await
    }

    async fn update_habit(&self, habit: &Habit) -> Result<(), BackendError> {
        let session = self.session()?;
        let patch = HabitPatch {
            title: habit.title.clone(),
            description: habit.description.clone(),
            start_time: to_stored_time(&habit.time_start),
            end_time: to_stored_time(&habit.time_end),
            color: habit.color.hex().to_string(),
        };
        self.store.update_habit(&session, &habit.id, &patch).await
    }

    async fn delete_habit(&self, habit_id: &str) -> Result<(), BackendError> {
        let session = self.session()?;
        self.store.delete_habit(&session, habit_id).await
    }

    async fn toggle_completion(
        &self,
        habit_id: &str,
        date: NaiveDate,
        completed: bool,
    ) -> Result<(), BackendError> {
        let session = self.session()?;
        if completed {
            let row = LogRow {
                habit_id: habit_id.to_string(),
                date,
                completed: true,
            };
            self.store.upsert_log(&session, &row).await
        } else {
            self.store.delete_log(&session, habit_id, date).await
        }
    }
}
