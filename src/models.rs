use crate::coordinator::DeleteOutcome;
use crate::dates::{date_key, parse_date_key};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Fixed palette a habit can be painted with, serialized as its hex value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum HabitColor {
    #[default]
    #[serde(rename = "#8ab4f8")]
    Blue,
    #[serde(rename = "#f28b82")]
    Red,
    #[serde(rename = "#fdd663")]
    Yellow,
    #[serde(rename = "#81c995")]
    Green,
    #[serde(rename = "#c58af9")]
    Purple,
    #[serde(rename = "#f6bfbc")]
    Pink,
    #[serde(rename = "#e8eaed")]
    Grey,
}

impl HabitColor {
    pub const PALETTE: [HabitColor; 7] = [
        HabitColor::Blue,
        HabitColor::Red,
        HabitColor::Yellow,
        HabitColor::Green,
        HabitColor::Purple,
        HabitColor::Pink,
        HabitColor::Grey,
    ];

    pub fn hex(self) -> &'static str {
        match self {
            HabitColor::Blue => "#8ab4f8",
            HabitColor::Red => "#f28b82",
            HabitColor::Yellow => "#fdd663",
            HabitColor::Green => "#81c995",
            HabitColor::Purple => "#c58af9",
            HabitColor::Pink => "#f6bfbc",
            HabitColor::Grey => "#e8eaed",
        }
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        Self::PALETTE
            .into_iter()
            .find(|color| color.hex().eq_ignore_ascii_case(hex.trim()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "timeStart", default, skip_serializing_if = "Option::is_none")]
    pub time_start: Option<String>,
    #[serde(rename = "timeEnd", default, skip_serializing_if = "Option::is_none")]
    pub time_end: Option<String>,
    #[serde(default)]
    pub color: HabitColor,
    #[serde(default)]
    pub order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Seed set shown to a fresh guest.
pub fn default_habits() -> Vec<Habit> {
    let seed = |id: &str, title: &str, start: &str, end: &str, color, order| Habit {
        id: id.to_string(),
        title: title.to_string(),
        description: None,
        time_start: Some(start.to_string()),
        time_end: Some(end.to_string()),
        color,
        order,
        user_id: None,
        created_at: None,
    };
    vec![
        seed(
            "11111111-1111-4111-8111-111111111111",
            "Morning Jog",
            "07:00",
            "07:30",
            HabitColor::Blue,
            0,
        ),
        seed(
            "22222222-2222-4222-8222-222222222222",
            "Deep Work",
            "09:00",
            "11:00",
            HabitColor::Red,
            1,
        ),
        seed(
            "33333333-3333-4333-8333-333333333333",
            "Read Book",
            "21:00",
            "21:30",
            HabitColor::Green,
            2,
        ),
    ]
}

/// Form payload for creating (`id: None`) or editing a habit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HabitDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub time_start: Option<String>,
    #[serde(default)]
    pub time_end: Option<String>,
    #[serde(default)]
    pub color: HabitColor,
}

/// Completion facts keyed `"<habit_id>_<YYYY-MM-DD>"`. Only `true` entries are
/// ever stored; absence means "not completed".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, bool>")]
pub struct Completions(BTreeMap<String, bool>);

impl From<BTreeMap<String, bool>> for Completions {
    fn from(map: BTreeMap<String, bool>) -> Self {
        Self(map.into_iter().filter(|(_, done)| *done).collect())
    }
}

impl Completions {
    pub fn key(habit_id: &str, date: NaiveDate) -> String {
        format!("{habit_id}_{}", date_key(date))
    }

    /// Splits a key on its last underscore so habit ids may contain `_`.
    pub fn split_key(key: &str) -> Option<(&str, NaiveDate)> {
        let (habit_id, date) = key.rsplit_once('_')?;
        Some((habit_id, parse_date_key(date)?))
    }

    pub fn is_completed(&self, habit_id: &str, date: NaiveDate) -> bool {
        self.contains_key(&Self::key(habit_id, date))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.get(key).copied().unwrap_or(false)
    }

    pub fn set(&mut self, key: String, completed: bool) {
        if completed {
            self.0.insert(key, true);
        } else {
            self.0.remove(&key);
        }
    }

    /// Dates completed for one habit, oldest first.
    pub fn dates_for(&self, habit_id: &str) -> Vec<NaiveDate> {
        self.0
            .keys()
            .filter_map(|key| Self::split_key(key))
            .filter(|(id, _)| *id == habit_id)
            .map(|(_, date)| date)
            .collect()
    }

    pub fn retain_habits(&mut self, keep: impl Fn(&str) -> bool) {
        self.0
            .retain(|key, _| Self::split_key(key).is_none_or(|(id, _)| keep(id)));
    }

    pub fn count_on(&self, date: NaiveDate) -> usize {
        let suffix = format!("_{}", date_key(date));
        self.0.keys().filter(|key| key.ends_with(&suffix)).count()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    Time,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub habit_id: String,
    pub date: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleResponse {
    pub habit_id: String,
    pub date: NaiveDate,
    pub completed: bool,
    pub streak: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct WeekQuery {
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveResponse {
    pub saved: Option<Habit>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub outcome: DeleteOutcome,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub index: usize,
    pub direction: Direction,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MoveResponse {
    pub moved: bool,
    pub habits: Vec<Habit>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SortPayload {
    pub mode: SortMode,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ThemePayload {
    pub theme: Theme,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub sign_up: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub mode: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn false_entries_are_dropped_on_load() {
        let completions: Completions =
            serde_json::from_str(r#"{"a_2024-06-10": true, "a_2024-06-11": false}"#).unwrap();
        assert_eq!(completions.len(), 1);
        assert!(completions.is_completed("a", ymd(2024, 6, 10)));
        assert!(!completions.is_completed("a", ymd(2024, 6, 11)));
    }

    #[test]
    fn split_key_handles_underscored_ids() {
        let key = Completions::key("habit_with_underscores", ymd(2024, 1, 2));
        assert_eq!(
            Completions::split_key(&key),
            Some(("habit_with_underscores", ymd(2024, 1, 2)))
        );
        assert_eq!(Completions::split_key("garbage"), None);
    }

    #[test]
    fn dates_for_matches_whole_ids_only() {
        let mut completions = Completions::default();
        completions.set(Completions::key("a", ymd(2024, 6, 10)), true);
        completions.set(Completions::key("ab", ymd(2024, 6, 11)), true);
        assert_eq!(completions.dates_for("a"), vec![ymd(2024, 6, 10)]);
        assert_eq!(completions.count_on(ymd(2024, 6, 10)), 1);
    }

    #[test]
    fn habit_json_uses_storage_field_names() {
        let habit = &default_habits()[0];
        let json = serde_json::to_value(habit).unwrap();
        assert_eq!(json["timeStart"], "07:00");
        assert_eq!(json["color"], "#8ab4f8");

        let decoded: Habit = serde_json::from_value(json).unwrap();
        assert_eq!(&decoded, habit);
    }

    #[test]
    fn palette_lookup_is_case_insensitive() {
        assert_eq!(HabitColor::from_hex("#C58AF9"), Some(HabitColor::Purple));
        assert_eq!(HabitColor::from_hex("#000000"), None);
    }
}
