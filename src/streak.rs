use crate::dates::today;
use crate::models::{Completions, Habit};
use chrono::NaiveDate;
use std::collections::BTreeMap;

const MAX_STREAK_DAYS: u32 = 365;

pub fn streak(habit_id: &str, completions: &Completions) -> u32 {
    streak_at(today(), habit_id, completions)
}

/// Consecutive completed days ending at `today`. A missing `today` means 0.
pub fn streak_at(today: NaiveDate, habit_id: &str, completions: &Completions) -> u32 {
    let mut count = 0;
    let mut day = today;
    while count < MAX_STREAK_DAYS && completions.is_completed(habit_id, day) {
        count += 1;
        match day.pred_opt() {
            Some(previous) => day = previous,
            None => break,
        }
    }
    count
}

pub fn streaks_at(
    today: NaiveDate,
    habits: &[Habit],
    completions: &Completions,
) -> BTreeMap<String, u32> {
    habits
        .iter()
        .map(|habit| (habit.id.clone(), streak_at(today, &habit.id, completions)))
        .collect()
}
