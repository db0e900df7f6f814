use crate::models::{Completions, Habit, Theme, default_habits};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tokio::{fs, sync::Mutex};
use tracing::{error, warn};

pub const HABITS_KEY: &str = "habitCal_habits";
pub const COMPLETIONS_KEY: &str = "habitCal_completions";
pub const THEME_KEY: &str = "habitCal_theme";
pub const MIGRATED_KEY: &str = "habitCal_migrated";

/// On-device key-value storage backed by a single JSON file. Every slot holds
/// encoded text under a fixed key; writes are fire-and-forget and failures are
/// only logged.
#[derive(Debug)]
pub struct LocalStore {
    path: PathBuf,
    slots: Mutex<BTreeMap<String, String>>,
}

impl LocalStore {
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let slots = load_slots(&path).await;
        Self {
            path,
            slots: Mutex::new(slots),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored habits, or `None` when the slot was never written.
    pub async fn read_habits(&self) -> Option<Vec<Habit>> {
        self.read_json(HABITS_KEY).await
    }

    pub async fn habits_or_default(&self) -> Vec<Habit> {
        self.read_habits().await.unwrap_or_else(default_habits)
    }

    pub async fn read_completions(&self) -> Completions {
        self.read_json(COMPLETIONS_KEY).await.unwrap_or_default()
    }

    pub async fn read_theme(&self) -> Theme {
        let slots = self.slots.lock().await;
        slots
            .get(THEME_KEY)
            .and_then(|value| Theme::parse(value))
            .unwrap_or_default()
    }

    /// Replaces both data slots in one write so the file never pairs habits
    /// with completions from a different snapshot.
    pub async fn write_data(&self, habits: &[Habit], completions: &Completions) {
        let encoded = serde_json::to_string(habits)
            .and_then(|habits| Ok((habits, serde_json::to_string(completions)?)));
        let (habits, completions) = match encoded {
            Ok(pair) => pair,
            Err(err) => {
                error!("failed to encode habit data: {err}");
                return;
            }
        };
        let mut slots = self.slots.lock().await;
        slots.insert(HABITS_KEY.to_string(), habits);
        slots.insert(COMPLETIONS_KEY.to_string(), completions);
        self.flush(&slots).await;
    }

    pub async fn write_theme(&self, theme: Theme) {
        self.write_raw(THEME_KEY, theme.as_str().to_string()).await;
    }

    /// Guest habit ids already moved into `principal_id`'s remote account.
    pub async fn migrated_habits(&self, principal_id: &str) -> BTreeSet<String> {
        let slots = self.slots.lock().await;
        migration_marker(&slots)
            .remove(principal_id)
            .unwrap_or_default()
    }

    pub async fn record_migrated(
        &self,
        principal_id: &str,
        habit_ids: impl IntoIterator<Item = String>,
    ) {
        let mut slots = self.slots.lock().await;
        let mut marker = migration_marker(&slots);
        marker
            .entry(principal_id.to_string())
            .or_default()
            .extend(habit_ids);
        match serde_json::to_string(&marker) {
            Ok(encoded) => {
                slots.insert(MIGRATED_KEY.to_string(), encoded);
                self.flush(&slots).await;
            }
            Err(err) => error!("failed to encode {MIGRATED_KEY}: {err}"),
        }
    }

    /// Drops the habit and completion slots. Theme and marker survive.
    pub async fn clear_data(&self) {
        let mut slots = self.slots.lock().await;
        slots.remove(HABITS_KEY);
        slots.remove(COMPLETIONS_KEY);
        self.flush(&slots).await;
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        decode_slot(&*self.slots.lock().await, key)
    }

    async fn write_raw(&self, key: &str, value: String) {
        let mut slots = self.slots.lock().await;
        slots.insert(key.to_string(), value);
        self.flush(&slots).await;
    }

    async fn flush(&self, slots: &BTreeMap<String, String>) {
        if let Err(err) = persist_slots(&self.path, slots).await {
            error!("failed to write {}: {err}", self.path.display());
        }
    }
}

fn decode_slot<T: DeserializeOwned>(slots: &BTreeMap<String, String>, key: &str) -> Option<T> {
    let raw = slots.get(key)?;
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("ignoring corrupt {key} slot: {err}");
            None
        }
    }
}

fn migration_marker(slots: &BTreeMap<String, String>) -> BTreeMap<String, BTreeSet<String>> {
    decode_slot(slots, MIGRATED_KEY).unwrap_or_default()
}

async fn load_slots(path: &Path) -> BTreeMap<String, String> {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(slots) => slots,
            Err(err) => {
                error!("failed to parse data file: {err}");
                BTreeMap::new()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
        Err(err) => {
            error!("failed to read data file: {err}");
            BTreeMap::new()
        }
    }
}

async fn persist_slots(path: &Path, slots: &BTreeMap<String, String>) -> std::io::Result<()> {
    let payload = serde_json::to_vec_pretty(slots)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    fs::write(path, payload).await
}
