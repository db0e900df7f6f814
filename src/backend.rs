//! The capability both storage modes expose to the coordinator.
//!
//! Guest mode is served by [`LocalStore`]: reads come from the on-device
//! slots and every committed snapshot is written back. Authenticated mode is
//! served by [`crate::remote::RemoteService`], where each mutation is a remote
//! call and `commit` has nothing to do.

use crate::models::{Completions, Habit};
use crate::storage::LocalStore;
use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no authenticated principal")]
    NotAuthenticated,

    #[error("remote store is not configured")]
    NotConfigured,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote store rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("remote store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait HabitBackend: Send + Sync {
    async fn fetch_habits(&self) -> Result<Vec<Habit>, BackendError>;

    async fn fetch_completions(&self) -> Result<Completions, BackendError>;

    async fn create_habit(&self, habit: &Habit) -> Result<(), BackendError>;

    async fn update_habit(&self, habit: &Habit) -> Result<(), BackendError>;

    async fn delete_habit(&self, habit_id: &str) -> Result<(), BackendError>;

    /// `completed == false` removes the fact rather than storing `false`.
    async fn toggle_completion(
        &self,
        habit_id: &str,
        date: NaiveDate,
        completed: bool,
    ) -> Result<(), BackendError>;

    /// Called after every settled mutation with the in-memory state.
    async fn commit(&self, _habits: &[Habit], _completions: &Completions) {}
}

#[async_trait]
impl HabitBackend for LocalStore {
    async fn fetch_habits(&self) -> Result<Vec<Habit>, BackendError> {
        Ok(self.habits_or_default().await)
    }

    async fn fetch_completions(&self) -> Result<Completions, BackendError> {
        Ok(self.read_completions().await)
    }

    // Guest mutations live in memory until `commit` writes the whole snapshot.
    async fn create_habit(&self, _habit: &Habit) -> Result<(), BackendError> {
        Ok(())
    }

    async fn update_habit(&self, _habit: &Habit) -> Result<(), BackendError> {
        Ok(())
    }

    async fn delete_habit(&self, _habit_id: &str) -> Result<(), BackendError> {
        Ok(())
    }

    async fn toggle_completion(
        &self,
        _habit_id: &str,
        _date: NaiveDate,
        _completed: bool,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    async fn commit(&self, habits: &[Habit], completions: &Completions) {
        self.write_data(habits, completions).await;
    }
}
