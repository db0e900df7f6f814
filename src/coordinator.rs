//! In-memory habit and completion state, and the rules for keeping it in step
//! with whichever backend the current session selects.
//!
//! Every mutation is applied to memory first. The backend effect runs with the
//! lock released; toggles and deletes carry an undo record that is replayed if
//! the effect fails, saves do not. Once the effect settles the snapshot is
//! committed, which writes the local slots in guest mode and does nothing in
//! authenticated mode.
//!
//! Loads run one at a time. Commits are serialised too, and each one copies
//! the state only after taking its turn, so the newest snapshot is always the
//! last one written.

use crate::auth::{Principal, Session, SessionHandle};
use crate::backend::{BackendError, HabitBackend};
use crate::dates::today;
use crate::migrate::{MigrationReport, migrate_local_to_remote};
use crate::models::{Completions, Direction, Habit, HabitDraft, SortMode, default_habits};
use crate::stats::{Heatmap, WeekView, build_heatmap_at, build_week_at, sort_habits};
use crate::storage::LocalStore;
use crate::streak::streak;
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum StorageMode {
    Guest,
    Authenticated(Principal),
}

impl StorageMode {
    pub fn label(&self) -> &'static str {
        match self {
            StorageMode::Guest => "guest",
            StorageMode::Authenticated(_) => "authenticated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Declined,
    NotFound,
    Deleted,
    RolledBack,
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub mode: StorageMode,
    pub loaded: bool,
    pub sort_mode: SortMode,
    pub habits: Vec<Habit>,
    pub completions: Completions,
}

#[derive(Debug)]
struct State {
    mode: StorageMode,
    loaded: bool,
    sort_mode: SortMode,
    habits: Vec<Habit>,
    completions: Completions,
}

enum Effect {
    Create(Habit),
    Update(Habit),
    Delete(String),
    Toggle {
        habit_id: String,
        date: NaiveDate,
        completed: bool,
    },
    LocalOnly,
}

enum Undo {
    Completion { key: String, was: bool },
    Reinsert { index: usize, habit: Habit },
}

struct Command {
    label: &'static str,
    effect: Effect,
    undo: Option<Undo>,
}

impl State {
    fn undo(&mut self, undo: Undo) {
        match undo {
            Undo::Completion { key, was } => self.completions.set(key, was),
            Undo::Reinsert { index, habit } => {
                if !self.habits.iter().any(|existing| existing.id == habit.id) {
                    let index = index.min(self.habits.len());
                    self.habits.insert(index, habit);
                }
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Normalises a draft time to zero-padded `HH:mm`. Anything that is not a
/// time of day is dropped.
fn time_of_day(value: Option<String>) -> Option<String> {
    let value = non_blank(value)?;
    let parsed = ["%H:%M", "%H:%M:%S"]
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(&value, format).ok());
    match parsed {
        Some(time) => Some(time.format("%H:%M").to_string()),
        None => {
            warn!("ignoring invalid time {value:?}");
            None
        }
    }
}

#[derive(Clone)]
pub struct Coordinator {
    state: Arc<Mutex<State>>,
    local: Arc<LocalStore>,
    remote: Option<Arc<dyn HabitBackend>>,
    session: SessionHandle,
    load_lock: Arc<Mutex<()>>,
    commit_lock: Arc<Mutex<()>>,
}

impl Coordinator {
    pub fn new(local: Arc<LocalStore>, session: SessionHandle) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                mode: StorageMode::Guest,
                loaded: false,
                sort_mode: SortMode::default(),
                habits: Vec::new(),
                completions: Completions::default(),
            })),
            local,
            remote: None,
            session,
            load_lock: Arc::new(Mutex::new(())),
            commit_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn HabitBackend>) -> Self {
        self.remote = Some(remote);
        self
    }

    fn session_mode(&self) -> StorageMode {
        match self.session.principal() {
            Some(principal) => StorageMode::Authenticated(principal),
            None => StorageMode::Guest,
        }
    }

    fn backend_for(&self, mode: &StorageMode) -> Result<Arc<dyn HabitBackend>, BackendError> {
        match mode {
            StorageMode::Guest => {
                let local: Arc<dyn HabitBackend> = self.local.clone();
                Ok(local)
            }
            StorageMode::Authenticated(_) => self.remote.clone().ok_or(BackendError::NotConfigured),
        }
    }

    /// Loads habits and completions for the mode the session currently
    /// selects. Entering authenticated mode first moves any guest data across.
    pub async fn load(&self) {
        let _loading = self.load_lock.lock().await;
        self.reload().await;
    }

    /// Reloads when nothing is loaded yet or the session changed mode since
    /// the last load.
    pub async fn ensure_loaded(&self) {
        if !self.is_stale().await {
            return;
        }
        let _loading = self.load_lock.lock().await;
        // the load may have been done by whoever held the lock before us
        if self.is_stale().await {
            self.reload().await;
        }
    }

    async fn is_stale(&self) -> bool {
        let state = self.state.lock().await;
        !state.loaded || state.mode != self.session_mode()
    }

    /// Caller holds `load_lock`.
    async fn reload(&self) {
        let mode = self.session_mode();
        let _committing = self.commit_lock.lock().await;
        let (habits, completions) = match self.backend_for(&mode) {
            Ok(backend) => {
                if let StorageMode::Authenticated(principal) = &mode {
                    self.migrate_guest_data(principal, backend.as_ref()).await;
                }
                let habits = backend.fetch_habits().await.unwrap_or_else(|err| {
                    error!(mode = mode.label(), "failed to load habits: {err}");
                    Vec::new()
                });
                let completions = backend.fetch_completions().await.unwrap_or_else(|err| {
                    error!(mode = mode.label(), "failed to load completions: {err}");
                    Completions::default()
                });
                (habits, completions)
            }
            Err(err) => {
                error!(mode = mode.label(), "cannot load: {err}");
                (Vec::new(), Completions::default())
            }
        };

        info!(mode = mode.label(), habits = habits.len(), "state loaded");
        {
            let mut state = self.state.lock().await;
            state.mode = mode;
            state.habits = habits;
            state.completions = completions;
            state.loaded = true;
        }
        self.write_snapshot().await;
    }

    pub async fn sign_in(&self, session: Session) {
        info!(principal = %session.principal.id, "session started");
        self.session.set(session);
        self.load().await;
    }

    /// Drops the session and empties memory; the next `ensure_loaded` falls
    /// back to guest storage.
    pub async fn sign_out(&self) -> Option<Session> {
        let _loading = self.load_lock.lock().await;
        let session = self.session.clear();
        let mut state = self.state.lock().await;
        state.mode = StorageMode::Guest;
        state.loaded = false;
        state.habits.clear();
        state.completions = Completions::default();
        session
    }

    /// Moves guest habits the principal has not received yet. Ids that made
    /// it across are recorded, together with the seed ids so a reseeded guest
    /// list is not pushed twice. Habits that failed stay in the local slots
    /// for the next session to retry.
    async fn migrate_guest_data(
        &self,
        principal: &Principal,
        remote: &dyn HabitBackend,
    ) -> Option<MigrationReport> {
        let habits = self.local.read_habits().await?;
        let already = self.local.migrated_habits(&principal.id).await;
        let pending: Vec<Habit> = habits
            .into_iter()
            .filter(|habit| !already.contains(&habit.id))
            .collect();
        if pending.is_empty() {
            return None;
        }

        let completions = self.local.read_completions().await;
        let report = migrate_local_to_remote(&pending, &completions, remote).await;

        let failed: HashSet<&str> = report.failed.iter().map(String::as_str).collect();
        let recorded: Vec<String> = report
            .migrated
            .iter()
            .cloned()
            .chain(default_habits().into_iter().map(|habit| habit.id))
            .filter(|id| !failed.contains(id.as_str()))
            .collect();
        self.local.record_migrated(&principal.id, recorded).await;

        if report.is_complete() {
            self.local.clear_data().await;
        } else {
            let remaining: Vec<Habit> = pending
                .into_iter()
                .filter(|habit| failed.contains(habit.id.as_str()))
                .collect();
            let mut completions = completions;
            completions.retain_habits(|id| failed.contains(id));
            warn!(
                remaining = remaining.len(),
                "keeping habits that failed to migrate in local storage"
            );
            self.local.write_data(&remaining, &completions).await;
        }
        Some(report)
    }

    async fn commit(&self) {
        let _committing = self.commit_lock.lock().await;
        self.write_snapshot().await;
    }

    /// Caller holds `commit_lock`.
    async fn write_snapshot(&self) {
        let (mode, habits, completions) = {
            let state = self.state.lock().await;
            if !state.loaded {
                return;
            }
            (
                state.mode.clone(),
                state.habits.clone(),
                state.completions.clone(),
            )
        };
        if let Ok(backend) = self.backend_for(&mode) {
            backend.commit(&habits, &completions).await;
        }
    }

    /// Runs the backend effect for an already-applied change. Returns whether
    /// the effect succeeded.
    async fn execute(&self, mode: StorageMode, command: Command) -> bool {
        let result = match self.backend_for(&mode) {
            Ok(backend) => match &command.effect {
                Effect::Create(habit) => backend.create_habit(habit).await,
                Effect::Update(habit) => backend.update_habit(habit).await,
                Effect::Delete(habit_id) => backend.delete_habit(habit_id).await,
                Effect::Toggle {
                    habit_id,
                    date,
                    completed,
                } => backend.toggle_completion(habit_id, *date, *completed).await,
                Effect::LocalOnly => Ok(()),
            },
            Err(err) => Err(err),
        };

        let succeeded = match result {
            Ok(()) => true,
            Err(err) => {
                match command.undo {
                    Some(undo) => {
                        warn!("{} failed, rolling back: {err}", command.label);
                        self.state.lock().await.undo(undo);
                    }
                    None => error!("{} failed: {err}", command.label),
                }
                false
            }
        };
        self.commit().await;
        succeeded
    }

    /// Flips the completion for `(habit_id, date)` and returns the value held
    /// in memory once the backend has answered.
    pub async fn toggle_completion(&self, habit_id: &str, date: NaiveDate) -> bool {
        let key = Completions::key(habit_id, date);
        let (mode, command) = {
            let mut state = self.state.lock().await;
            let was = state.completions.contains_key(&key);
            state.completions.set(key.clone(), !was);
            let command = Command {
                label: "toggle completion",
                effect: Effect::Toggle {
                    habit_id: habit_id.to_string(),
                    date,
                    completed: !was,
                },
                undo: Some(Undo::Completion {
                    key: key.clone(),
                    was,
                }),
            };
            (state.mode.clone(), command)
        };
        self.execute(mode, command).await;
        self.state.lock().await.completions.contains_key(&key)
    }

    /// Creates a habit, or merges the draft into the habit named by
    /// `draft.id`. A blank title, or an id that no longer exists, is a no-op.
    pub async fn save_habit(&self, draft: HabitDraft) -> Option<Habit> {
        let title = draft.title.trim().to_string();
        if title.is_empty() {
            return None;
        }
        let time_start = time_of_day(draft.time_start);
        let time_end = time_of_day(draft.time_end);

        let (mode, command, saved) = {
            let mut state = self.state.lock().await;
            let (effect, saved) = match non_blank(draft.id) {
                Some(id) => {
                    let existing = state.habits.iter_mut().find(|habit| habit.id == id)?;
                    existing.title = title;
                    if let Some(description) = draft.description {
                        existing.description = non_blank(Some(description));
                    }
                    existing.time_start = time_start;
                    existing.time_end = time_end;
                    existing.color = draft.color;
                    (Effect::Update(existing.clone()), existing.clone())
                }
                None => {
                    let habit = Habit {
                        id: Uuid::new_v4().to_string(),
                        title,
                        description: non_blank(draft.description),
                        time_start,
                        time_end,
                        color: draft.color,
                        order: state.habits.len() as u32,
                        user_id: match &state.mode {
                            StorageMode::Authenticated(principal) => Some(principal.id.clone()),
                            StorageMode::Guest => None,
                        },
                        created_at: None,
                    };
                    state.habits.push(habit.clone());
                    (Effect::Create(habit.clone()), habit)
                }
            };
            let command = Command {
                label: "save habit",
                effect,
                undo: None,
            };
            (state.mode.clone(), command, saved)
        };

        self.execute(mode, command).await;
        Some(saved)
    }

    /// Removes a habit once the user has confirmed. If the backend refuses,
    /// the habit goes back to the position it was taken from.
    pub async fn delete_habit(&self, habit_id: &str, confirmed: bool) -> DeleteOutcome {
        if !confirmed {
            return DeleteOutcome::Declined;
        }
        let (mode, command) = {
            let mut state = self.state.lock().await;
            let Some(index) = state.habits.iter().position(|habit| habit.id == habit_id) else {
                return DeleteOutcome::NotFound;
            };
            let habit = state.habits.remove(index);
            let command = Command {
                label: "delete habit",
                effect: Effect::Delete(habit_id.to_string()),
                undo: Some(Undo::Reinsert { index, habit }),
            };
            (state.mode.clone(), command)
        };

        if self.execute(mode, command).await {
            DeleteOutcome::Deleted
        } else {
            DeleteOutcome::RolledBack
        }
    }

    /// Swaps the habit at `index` with its neighbour and renumbers `order`
    /// densely. Only meaningful in manual sort mode; order is never sent to
    /// the remote store.
    pub async fn move_habit(&self, index: usize, direction: Direction) -> bool {
        let mode = {
            let mut state = self.state.lock().await;
            if state.sort_mode == SortMode::Time {
                return false;
            }
            let target = match direction {
                Direction::Up => index.checked_sub(1),
                Direction::Down => index.checked_add(1),
            };
            let Some(target) = target.filter(|target| {
                *target < state.habits.len() && index < state.habits.len()
            }) else {
                return false;
            };
            state.habits.swap(index, target);
            for (position, habit) in state.habits.iter_mut().enumerate() {
                habit.order = position as u32;
            }
            state.mode.clone()
        };

        let command = Command {
            label: "move habit",
            effect: Effect::LocalOnly,
            undo: None,
        };
        self.execute(mode, command).await;
        true
    }

    pub async fn set_sort_mode(&self, sort_mode: SortMode) {
        self.state.lock().await.sort_mode = sort_mode;
    }

    pub async fn sort_mode(&self) -> SortMode {
        self.state.lock().await.sort_mode
    }

    pub async fn mode(&self) -> StorageMode {
        self.state.lock().await.mode.clone()
    }

    pub async fn snapshot(&self) -> Snapshot {
        let state = self.state.lock().await;
        Snapshot {
            mode: state.mode.clone(),
            loaded: state.loaded,
            sort_mode: state.sort_mode,
            habits: state.habits.clone(),
            completions: state.completions.clone(),
        }
    }

    pub async fn sorted_habits(&self) -> Vec<Habit> {
        let state = self.state.lock().await;
        sort_habits(&state.habits, state.sort_mode)
    }

    pub async fn streak(&self, habit_id: &str) -> u32 {
        let state = self.state.lock().await;
        streak(habit_id, &state.completions)
    }

    pub async fn week_view(&self, anchor: NaiveDate) -> WeekView {
        let state = self.state.lock().await;
        build_week_at(
            today(),
            anchor,
            &state.habits,
            &state.completions,
            state.sort_mode,
        )
    }

    pub async fn heatmap(&self) -> Heatmap {
        let state = self.state.lock().await;
        build_heatmap_at(today(), &state.completions)
    }
}
