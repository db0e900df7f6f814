use crate::backend::HabitBackend;
use crate::models::{Completions, Habit};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub migrated: Vec<String>,
    pub failed: Vec<String>,
    pub failed_completions: usize,
}

impl MigrationReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Uploads guest habits and their completions one by one. A habit that fails
/// to insert is logged and skipped; the rest of the batch still runs. Running
/// it twice re-attempts the inserts, so callers must guard against repeats.
pub async fn migrate_local_to_remote(
    habits: &[Habit],
    completions: &Completions,
    remote: &dyn HabitBackend,
) -> MigrationReport {
    info!(habits = habits.len(), "migrating guest data");
    let mut report = MigrationReport::default();

    for habit in habits {
        if let Err(err) = remote.create_habit(habit).await {
            error!(habit = %habit.id, "failed to migrate habit {:?}: {err}", habit.title);
            report.failed.push(habit.id.clone());
            continue;
        }

        for date in completions.dates_for(&habit.id) {
            if let Err(err) = remote.toggle_completion(&habit.id, date, true).await {
                warn!(habit = %habit.id, %date, "failed to migrate completion: {err}");
                report.failed_completions += 1;
            }
        }
        report.migrated.push(habit.id.clone());
    }

    info!(
        migrated = report.migrated.len(),
        failed = report.failed.len(),
        failed_completions = report.failed_completions,
        "guest migration finished"
    );
    report
}
