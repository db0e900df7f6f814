use crate::coordinator::StorageMode;
use crate::dates::{date_key, shift_weeks};
use crate::models::{HabitColor, Theme};
use crate::stats::{HabitRow, WeekView};
use chrono::NaiveDate;
use std::fmt::Write;

pub fn render_index(view: &WeekView, mode: &StorageMode, theme: Theme) -> String {
    let header: String = view
        .days
        .iter()
        .map(|day| {
            let class = if day.is_today { "day today" } else { "day" };
            format!(
                r#"<th class="{class}"><span>{}</span><strong>{}</strong></th>"#,
                day.weekday,
                day.date.format("%-d")
            )
        })
        .collect();

    let rows: String = if view.rows.is_empty() {
        r#"<tr><td class="empty" colspan="8">No habits yet. Add one below.</td></tr>"#.to_string()
    } else {
        view.rows.iter().map(|row| render_row(view, row)).collect()
    };

    let colors: String = HabitColor::PALETTE
        .iter()
        .map(|color| {
            format!(
                r#"<option value="{hex}" style="background:{hex}">{hex}</option>"#,
                hex = color.hex()
            )
        })
        .collect();

    let account = match mode {
        StorageMode::Guest => "Guest (saved on this device)".to_string(),
        StorageMode::Authenticated(principal) => format!(
            "Signed in as {}",
            escape(
                principal
                    .display_name
                    .as_deref()
                    .or(principal.email.as_deref())
                    .unwrap_or(&principal.id)
            )
        ),
    };

    INDEX_HTML
        .replace("{{THEME}}", theme.as_str())
        .replace("{{TITLE}}", &escape(&view.title))
        .replace("{{PREV}}", &week_link(view.week_start, -1))
        .replace("{{NEXT}}", &week_link(view.week_start, 1))
        .replace("{{ACCOUNT}}", &account)
        .replace("{{HEADER}}", &header)
        .replace("{{ROWS}}", &rows)
        .replace("{{COLORS}}", &colors)
}

fn week_link(week_start: NaiveDate, weeks: i64) -> String {
    shift_weeks(week_start, weeks)
        .map(date_key)
        .unwrap_or_default()
}

fn render_row(view: &WeekView, row: &HabitRow) -> String {
    let mut html = format!(
        r#"<tr><th class="habit" style="border-color:{color}"><span class="title">{title}</span><span class="time">{time}</span>"#,
        color = row.habit.color.hex(),
        title = escape(&row.habit.title),
        time = escape(&row.time_label),
    );
    if row.streak > 0 {
        let unit = if row.streak == 1 { "day" } else { "days" };
        let _ = write!(html, r#"<span class="streak">{} {unit}</span>"#, row.streak);
    }
    html.push_str("</th>");

    for (day, done) in view.days.iter().zip(row.cells) {
        let _ = write!(
            html,
            r#"<td><form method="post" action="/toggle"><input type="hidden" name="habit_id" value="{id}"><input type="hidden" name="date" value="{date}"><button class="{class}" style="--habit:{color}" aria-pressed="{done}">{mark}</button></form></td>"#,
            id = escape(&row.habit.id),
            date = day.key,
            class = if done { "cell done" } else { "cell" },
            color = row.habit.color.hex(),
            mark = if done { "&#10003;" } else { "" },
        );
    }
    html.push_str("</tr>");
    html
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en" class="{{THEME}}">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>HabitCal</title>
  <style>
    :root {
      --bg: #f8f9fa;
      --surface: #ffffff;
      --ink: #202124;
      --muted: #5f6368;
      --border: #dadce0;
      --accent: #1a73e8;
    }

    html.dark {
      --bg: #202124;
      --surface: #2d2e31;
      --ink: #e8eaed;
      --muted: #9aa0a6;
      --border: #3c4043;
      --accent: #8ab4f8;
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: var(--bg);
      color: var(--ink);
      font-family: "Google Sans", "Segoe UI", sans-serif;
    }

    header {
      display: flex;
      align-items: center;
      justify-content: space-between;
      padding: 16px 24px;
      border-bottom: 1px solid var(--border);
    }

    header nav {
      display: flex;
      align-items: center;
      gap: 12px;
    }

    header a {
      color: var(--ink);
      text-decoration: none;
      padding: 6px 12px;
      border: 1px solid var(--border);
      border-radius: 999px;
    }

    .account {
      color: var(--muted);
      font-size: 0.9rem;
    }

    main {
      padding: 24px;
      display: grid;
      gap: 24px;
    }

    table {
      width: 100%;
      border-collapse: collapse;
      background: var(--surface);
      border-radius: 16px;
      overflow: hidden;
    }

    th, td {
      border: 1px solid var(--border);
      padding: 8px;
      text-align: center;
    }

    th.day span {
      display: block;
      font-size: 0.75rem;
      color: var(--muted);
      text-transform: uppercase;
    }

    th.today strong {
      color: var(--accent);
    }

    th.habit {
      text-align: left;
      border-left: 6px solid;
      min-width: 200px;
    }

    th.habit span {
      display: block;
    }

    .time, .empty {
      color: var(--muted);
      font-size: 0.8rem;
    }

    .streak {
      color: #f28b82;
      font-size: 0.8rem;
    }

    .cell {
      width: 36px;
      height: 36px;
      border-radius: 50%;
      border: 2px solid var(--habit);
      background: transparent;
      color: var(--bg);
      cursor: pointer;
    }

    .cell.done {
      background: var(--habit);
    }

    form.new-habit {
      display: flex;
      flex-wrap: wrap;
      gap: 8px;
      align-items: center;
    }

    form.new-habit input, form.new-habit select, form.new-habit button {
      padding: 8px 12px;
      border-radius: 8px;
      border: 1px solid var(--border);
      background: var(--surface);
      color: var(--ink);
    }
  </style>
</head>
<body>
  <header>
    <nav>
      <strong>HabitCal</strong>
      <a href="/">Today</a>
      <a href="/?date={{PREV}}" aria-label="Previous week">&lsaquo;</a>
      <a href="/?date={{NEXT}}" aria-label="Next week">&rsaquo;</a>
      <span>{{TITLE}}</span>
    </nav>
    <span class="account">{{ACCOUNT}}</span>
  </header>
  <main>
    <table>
      <thead>
        <tr><th></th>{{HEADER}}</tr>
      </thead>
      <tbody>
        {{ROWS}}
      </tbody>
    </table>
    <form class="new-habit" method="post" action="/habits">
      <input name="title" placeholder="New habit" required />
      <input name="time_start" type="time" />
      <input name="time_end" type="time" />
      <select name="color">{{COLORS}}</select>
      <button type="submit">Add habit</button>
    </form>
  </main>
</body>
</html>
"#;
