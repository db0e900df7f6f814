#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use habitcal::auth::{Principal, Session, SessionHandle};
use habitcal::backend::BackendError;
use habitcal::remote::{HabitPatch, HabitRow, LogRow, RemoteService, RemoteStore};
use habitcal::{Coordinator, LocalStore};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    SelectHabits,
    SelectHabitIds,
    SelectLogs,
    InsertHabit,
    UpdateHabit,
    DeleteHabit,
    UpsertLog,
    DeleteLog,
}

#[derive(Default)]
struct Tables {
    habits: Vec<HabitRow>,
    logs: BTreeMap<(String, NaiveDate), LogRow>,
    failing: HashSet<Op>,
    failing_habit_ids: HashSet<String>,
    created: u64,
    insert_delay: Option<Duration>,
}

/// In-memory `habits` / `habit_logs` tables with switchable failures.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn fail(&self, op: Op) {
        self.tables.lock().unwrap().failing.insert(op);
    }

    pub fn recover(&self, op: Op) {
        self.tables.lock().unwrap().failing.remove(&op);
    }

    pub fn fail_insert_of(&self, habit_id: &str) {
        self.tables
            .lock()
            .unwrap()
            .failing_habit_ids
            .insert(habit_id.to_string());
    }

    pub fn allow_insert_of(&self, habit_id: &str) {
        self.tables.lock().unwrap().failing_habit_ids.remove(habit_id);
    }

    /// Every habit insert waits `delay` before touching the table.
    pub fn slow_inserts(&self, delay: Duration) {
        self.tables.lock().unwrap().insert_delay = Some(delay);
    }

    pub fn seed_habit(&self, row: HabitRow) {
        self.tables.lock().unwrap().habits.push(row);
    }

    pub fn seed_log(&self, habit_id: &str, date: NaiveDate, completed: bool) {
        self.tables.lock().unwrap().logs.insert(
            (habit_id.to_string(), date),
            LogRow {
                habit_id: habit_id.to_string(),
                date,
                completed,
            },
        );
    }

    pub fn habit_rows(&self) -> Vec<HabitRow> {
        self.tables.lock().unwrap().habits.clone()
    }

    pub fn log_rows(&self) -> Vec<LogRow> {
        self.tables.lock().unwrap().logs.values().cloned().collect()
    }

    fn check(&self, op: Op) -> Result<(), BackendError> {
        if self.tables.lock().unwrap().failing.contains(&op) {
            Err(BackendError::Unavailable(format!("{op:?} is failing")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn select_habits(&self, session: &Session) -> Result<Vec<HabitRow>, BackendError> {
        self.check(Op::SelectHabits)?;
        let mut rows: Vec<HabitRow> = self
            .tables
            .lock()
            .unwrap()
            .habits
            .iter()
            .filter(|row| row.user_id == session.principal.id && row.active)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rows)
    }

    async fn select_habit_ids(&self, session: &Session) -> Result<Vec<String>, BackendError> {
        self.check(Op::SelectHabitIds)?;
        Ok(self
            .tables
            .lock()
            .unwrap()
            .habits
            .iter()
            .filter(|row| row.user_id == session.principal.id)
            .map(|row| row.id.clone())
            .collect())
    }

    async fn select_completed_logs(
        &self,
        _session: &Session,
        habit_ids: &[String],
    ) -> Result<Vec<LogRow>, BackendError> {
        self.check(Op::SelectLogs)?;
        Ok(self
            .tables
            .lock()
            .unwrap()
            .logs
            .values()
            .filter(|log| log.completed && habit_ids.contains(&log.habit_id))
            .cloned()
            .collect())
    }

    async fn insert_habit(&self, _session: &Session, row: &HabitRow) -> Result<(), BackendError> {
        self.check(Op::InsertHabit)?;
        let delay = self.tables.lock().unwrap().insert_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut tables = self.tables.lock().unwrap();
        if tables.failing_habit_ids.contains(&row.id) {
            return Err(BackendError::Unavailable(format!("insert of {} refused", row.id)));
        }
        if tables.habits.iter().any(|existing| existing.id == row.id) {
            return Err(BackendError::Rejected {
                status: 409,
                body: "duplicate key".to_string(),
            });
        }
        tables.created += 1;
        let mut row = row.clone();
        row.created_at = Some(format!("2024-06-01T00:00:{:02}Z", tables.created));
        tables.habits.push(row);
        Ok(())
    }

    async fn update_habit(
        &self,
        _session: &Session,
        habit_id: &str,
        patch: &HabitPatch,
    ) -> Result<(), BackendError> {
        self.check(Op::UpdateHabit)?;
        let mut tables = self.tables.lock().unwrap();
        if let Some(row) = tables.habits.iter_mut().find(|row| row.id == habit_id) {
            row.title = patch.title.clone();
            row.description = patch.description.clone();
            row.start_time = patch.start_time.clone();
            row.end_time = patch.end_time.clone();
            row.color = patch.color.clone();
        }
        Ok(())
    }

    async fn delete_habit(&self, _session: &Session, habit_id: &str) -> Result<(), BackendError> {
        self.check(Op::DeleteHabit)?;
        let mut tables = self.tables.lock().unwrap();
        tables.habits.retain(|row| row.id != habit_id);
        tables.logs.retain(|(id, _), _| id != habit_id);
        Ok(())
    }

    async fn upsert_log(&self, _session: &Session, row: &LogRow) -> Result<(), BackendError> {
        self.check(Op::UpsertLog)?;
        self.tables
            .lock()
            .unwrap()
            .logs
            .insert((row.habit_id.clone(), row.date), row.clone());
        Ok(())
    }

    async fn delete_log(
        &self,
        _session: &Session,
        habit_id: &str,
        date: NaiveDate,
    ) -> Result<(), BackendError> {
        self.check(Op::DeleteLog)?;
        self.tables
            .lock()
            .unwrap()
            .logs
            .remove(&(habit_id.to_string(), date));
        Ok(())
    }
}

pub fn session(user_id: &str) -> Session {
    Session {
        access_token: format!("token-{user_id}"),
        principal: Principal {
            id: user_id.to_string(),
            email: Some(format!("{user_id}@example.test")),
            display_name: None,
            avatar_url: None,
        },
    }
}

pub fn row(id: &str, user_id: &str, title: &str, start: Option<&str>, created_at: &str) -> HabitRow {
    HabitRow {
        id: id.to_string(),
        user_id: user_id.to_string(),
        title: title.to_string(),
        description: None,
        start_time: start.map(str::to_string),
        end_time: None,
        color: "#8ab4f8".to_string(),
        active: true,
        created_at: Some(created_at.to_string()),
    }
}

pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub struct Harness {
    pub dir: TempDir,
    pub local: Arc<LocalStore>,
    pub store: MemoryStore,
    pub session: SessionHandle,
    pub remote: Arc<RemoteService>,
    pub coordinator: Coordinator,
}

impl Harness {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let local = Arc::new(LocalStore::open(dir.path().join("state.json")).await);
        let store = MemoryStore::default();
        let session = SessionHandle::default();
        let remote = Arc::new(RemoteService::new(
            Arc::new(store.clone()),
            session.clone(),
        ));
        let coordinator =
            Coordinator::new(local.clone(), session.clone()).with_remote(remote.clone());
        Self {
            dir,
            local,
            store,
            session,
            remote,
            coordinator,
        }
    }

    /// Reopens the storage file the way a fresh process would see it.
    pub async fn reopen_local(&self) -> LocalStore {
        LocalStore::open(self.local.path()).await
    }
}
