use crate::dates::{date_key, format_time_of_day, is_same_day, month_label, week_days, week_start};
use crate::models::{Completions, Habit, SortMode};
use crate::streak::streaks_at;
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::cmp::Ordering;

const HEATMAP_WEEKS: i64 = 12;

#[derive(Debug, Serialize)]
pub struct DayColumn {
    pub date: NaiveDate,
    pub key: String,
    pub weekday: String,
    pub is_today: bool,
}

#[derive(Debug, Serialize)]
pub struct HabitRow {
    pub habit: Habit,
    pub time_label: String,
    pub streak: u32,
    pub cells: [bool; 7],
}

#[derive(Debug, Serialize)]
pub struct WeekView {
    pub week_start: NaiveDate,
    pub title: String,
    pub days: Vec<DayColumn>,
    pub rows: Vec<HabitRow>,
}

#[derive(Debug, Serialize)]
pub struct HeatmapCell {
    pub date: NaiveDate,
    pub count: usize,
    pub is_today: bool,
    pub is_future: bool,
}

#[derive(Debug, Serialize)]
pub struct MonthLabel {
    pub month: String,
    pub week_index: usize,
}

#[derive(Debug, Serialize)]
pub struct Heatmap {
    pub weeks: Vec<Vec<HeatmapCell>>,
    pub months: Vec<MonthLabel>,
}

/// Display order for the grid. Time mode puts untimed habits last and breaks
/// ties on manual order; manual mode is a stable sort on `order`.
pub fn sort_habits(habits: &[Habit], mode: SortMode) -> Vec<Habit> {
    let mut list = habits.to_vec();
    match mode {
        SortMode::Time => list.sort_by(|a, b| match (&a.time_start, &b.time_start) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.order.cmp(&b.order),
        }),
        SortMode::Manual => list.sort_by_key(|habit| habit.order),
    }
    list
}

pub fn build_week_at(
    today: NaiveDate,
    anchor: NaiveDate,
    habits: &[Habit],
    completions: &Completions,
    mode: SortMode,
) -> WeekView {
    let start = week_start(anchor);
    let dates = week_days(start);

    let days = dates
        .iter()
        .map(|date| DayColumn {
            date: *date,
            key: date_key(*date),
            weekday: date.format("%a").to_string(),
            is_today: is_same_day(date, &today),
        })
        .collect();

    let streaks = streaks_at(today, habits, completions);
    let rows = sort_habits(habits, mode)
        .into_iter()
        .map(|habit| {
            let cells = dates.map(|date| completions.is_completed(&habit.id, date));
            let time_label = match (&habit.time_start, &habit.time_end) {
                (Some(from), Some(to)) => {
                    format!("{} - {}", format_time_of_day(from), format_time_of_day(to))
                }
                (Some(from), None) => format_time_of_day(from),
                _ => String::new(),
            };
            HabitRow {
                streak: streaks.get(&habit.id).copied().unwrap_or_default(),
                time_label,
                cells,
                habit,
            }
        })
        .collect();

    WeekView {
        week_start: start,
        title: month_label(start),
        days,
        rows,
    }
}

/// Rolling twelve-week grid of per-day completion counts, Sunday-aligned and
/// ending with the week containing `today`.
pub fn build_heatmap_at(today: NaiveDate, completions: &Completions) -> Heatmap {
    let first = week_start(today) - Duration::weeks(HEATMAP_WEEKS - 1);

    let weeks: Vec<Vec<HeatmapCell>> = (0..HEATMAP_WEEKS)
        .map(|week| {
            week_days(first + Duration::weeks(week))
                .into_iter()
                .map(|date| HeatmapCell {
                    date,
                    count: completions.count_on(date),
                    is_today: is_same_day(&date, &today),
                    is_future: date > today,
                })
                .collect()
        })
        .collect();

    let mut months = Vec::new();
    let mut last_month = None;
    for (week_index, week) in weeks.iter().enumerate() {
        let month = week[0].date.month();
        if last_month != Some(month) {
            months.push(MonthLabel {
                month: week[0].date.format("%b").to_string(),
                week_index,
            });
            last_month = Some(month);
        }
    }

    Heatmap { weeks, months }
}
