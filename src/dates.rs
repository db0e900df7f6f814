use chrono::{Datelike, Days, Duration, Local, NaiveDate, NaiveTime};

/// Local calendar date. Completion keys are derived from this, never from UTC.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Sunday on or before `date`, saturating at the first representable day.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let back = Days::new(u64::from(date.weekday().num_days_from_sunday()));
    date.checked_sub_days(back).unwrap_or(NaiveDate::MIN)
}

/// The seven days from `start`. Days past the last representable date repeat it.
pub fn week_days(start: NaiveDate) -> [NaiveDate; 7] {
    std::array::from_fn(|offset| {
        start
            .checked_add_days(Days::new(offset as u64))
            .unwrap_or(NaiveDate::MAX)
    })
}

pub fn shift_weeks(date: NaiveDate, weeks: i64) -> Option<NaiveDate> {
    date.checked_add_signed(Duration::try_weeks(weeks)?)
}

/// Whether the week holding `anchor` can be shown with both neighbours
/// reachable.
pub fn navigable(anchor: NaiveDate) -> bool {
    let start = week_start(anchor);
    start.checked_sub_days(Days::new(7)).is_some()
        && start.checked_add_days(Days::new(13)).is_some()
}

pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, "%Y-%m-%d").ok()
}

pub fn is_same_day(a: &impl Datelike, b: &impl Datelike) -> bool {
    a.year() == b.year() && a.month() == b.month() && a.day() == b.day()
}

/// `"13:05"` -> `"1:05 PM"`. Empty or unparseable input yields an empty string.
pub fn format_time_of_day(hhmm: &str) -> String {
    let hhmm = hhmm.trim();
    if hhmm.is_empty() {
        return String::new();
    }
    let Ok(time) = NaiveTime::parse_from_str(hhmm, "%H:%M") else {
        return String::new();
    };
    time.format("%-I:%M %p").to_string()
}

/// Header label for the week grid, e.g. `"June 2024"`.
pub fn month_label(date: NaiveDate) -> String {
    date.format("%B %Y").to_string()
}
