mod common;

use common::{Harness, Op, session, ymd};
use habitcal::migrate::migrate_local_to_remote;
use habitcal::models::{Completions, Habit, HabitColor, HabitDraft, default_habits};
use std::time::Duration;

fn guest_habit(id: &str, title: &str, start: Option<&str>, order: u32) -> Habit {
    Habit {
        id: id.to_string(),
        title: title.to_string(),
        description: None,
        time_start: start.map(str::to_string),
        time_end: None,
        color: HabitColor::Green,
        order,
        user_id: None,
        created_at: None,
    }
}

async fn seed_guest(h: &Harness) -> (Vec<Habit>, Completions) {
    let habits = vec![
        guest_habit("guest-a", "Stretch", Some("06:30"), 0),
        guest_habit("guest-b", "Journal", None, 1),
    ];
    let mut completions = Completions::default();
    completions.set(Completions::key("guest-a", ymd(2024, 6, 10)), true);
    completions.set(Completions::key("guest-a", ymd(2024, 6, 11)), true);
    completions.set(Completions::key("guest-b", ymd(2024, 6, 11)), true);
    h.local.write_data(&habits, &completions).await;
    (habits, completions)
}

#[tokio::test]
async fn sign_in_moves_guest_data_to_the_account() {
    let h = Harness::new().await;
    seed_guest(&h).await;

    h.coordinator.sign_in(session("user-1")).await;

    let rows = h.store.habit_rows();
    let ids: Vec<&str> = rows.iter().map(|row| row.id.as_str()).collect();
    assert_eq!(ids, ["guest-a", "guest-b"]);
    assert!(rows.iter().all(|row| row.user_id == "user-1"));
    assert_eq!(rows[0].start_time.as_deref(), Some("06:30:00"));
    assert_eq!(h.store.log_rows().len(), 3);

    let snapshot = h.coordinator.snapshot().await;
    assert_eq!(snapshot.habits.len(), 2);
    assert!(snapshot.habits.iter().all(|habit| habit.order == 0));
    assert_eq!(snapshot.habits[0].time_start.as_deref(), Some("06:30"));
    assert!(snapshot.completions.is_completed("guest-a", ymd(2024, 6, 11)));
    assert_eq!(snapshot.completions.len(), 3);

    let local = h.reopen_local().await;
    assert!(local.read_habits().await.is_none());
    assert!(local.read_completions().await.is_empty());
    let recorded = local.migrated_habits("user-1").await;
    assert!(recorded.contains("guest-a") && recorded.contains("guest-b"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_loads_migrate_once() {
    let h = Harness::new().await;
    seed_guest(&h).await;
    h.session.set(session("user-1"));
    h.store.slow_inserts(Duration::from_millis(30));

    let first = tokio::spawn({
        let coordinator = h.coordinator.clone();
        async move { coordinator.ensure_loaded().await }
    });
    let second = tokio::spawn({
        let coordinator = h.coordinator.clone();
        async move { coordinator.ensure_loaded().await }
    });
    first.await.unwrap();
    second.await.unwrap();

    assert_eq!(h.store.habit_rows().len(), 2);
    assert_eq!(h.store.log_rows().len(), 3);
    assert_eq!(h.coordinator.snapshot().await.habits.len(), 2);
    let local = h.reopen_local().await;
    assert!(local.read_habits().await.is_none());
    assert!(local.migrated_habits("user-1").await.contains("guest-b"));
}

#[tokio::test]
async fn failed_habits_stay_local_for_a_retry() {
    let h = Harness::new().await;
    seed_guest(&h).await;
    h.store.fail_insert_of("guest-b");

    h.coordinator.sign_in(session("user-1")).await;

    let rows = h.store.habit_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "guest-a");
    assert_eq!(h.store.log_rows().len(), 2);

    let local = h.reopen_local().await;
    let remaining = local.read_habits().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, "guest-b");
    let kept = local.read_completions().await;
    assert_eq!(kept.len(), 1);
    assert!(kept.is_completed("guest-b", ymd(2024, 6, 11)));
    let recorded = local.migrated_habits("user-1").await;
    assert!(recorded.contains("guest-a"));
    assert!(!recorded.contains("guest-b"));

    h.coordinator.sign_out().await;
    h.store.allow_insert_of("guest-b");
    h.coordinator.sign_in(session("user-1")).await;

    assert_eq!(h.store.habit_rows().len(), 2);
    assert_eq!(h.store.log_rows().len(), 3);
    let local = h.reopen_local().await;
    assert!(local.read_habits().await.is_none());
    assert!(local.migrated_habits("user-1").await.contains("guest-b"));
}

#[tokio::test]
async fn later_guest_habits_follow_but_reseeded_defaults_do_not() {
    let h = Harness::new().await;
    seed_guest(&h).await;
    h.coordinator.sign_in(session("user-1")).await;
    h.coordinator.sign_out().await;

    // guest storage is reseeded once signed out
    h.coordinator.ensure_loaded().await;
    let guest_habits = h.coordinator.snapshot().await.habits;
    assert_eq!(guest_habits, default_habits());

    // nothing new: the seeds stay local and the account is untouched
    h.coordinator.sign_in(session("user-1")).await;
    assert_eq!(h.store.habit_rows().len(), 2);
    assert_eq!(h.coordinator.snapshot().await.habits.len(), 2);
    let local = h.reopen_local().await;
    assert_eq!(local.read_habits().await.unwrap(), guest_habits);

    // a habit created as a guest between sessions is carried over
    h.coordinator.sign_out().await;
    h.coordinator.ensure_loaded().await;
    let floss = h
        .coordinator
        .save_habit(HabitDraft {
            title: "Floss".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    h.coordinator.sign_in(session("user-1")).await;
    let ids: Vec<String> = h.store.habit_rows().into_iter().map(|row| row.id).collect();
    assert_eq!(ids, ["guest-a", "guest-b", floss.id.as_str()]);
    assert!(h.reopen_local().await.migrated_habits("user-1").await.contains(&floss.id));

    // a different account still picks the reseeded defaults up
    h.coordinator.sign_out().await;
    h.coordinator.ensure_loaded().await;
    h.coordinator.sign_in(session("user-2")).await;
    let rows = h.store.habit_rows();
    assert_eq!(rows.iter().filter(|row| row.user_id == "user-2").count(), 3);
    let local = h.reopen_local().await;
    assert_eq!(local.migrated_habits("user-1").await.len(), 6);
    assert_eq!(local.migrated_habits("user-2").await.len(), 3);
}

#[tokio::test]
async fn completion_failures_are_counted_not_fatal() {
    let h = Harness::new().await;
    let (habits, completions) = seed_guest(&h).await;
    h.session.set(session("user-1"));
    h.store.fail(Op::UpsertLog);

    let report = migrate_local_to_remote(&habits, &completions, h.remote.as_ref()).await;

    assert!(report.is_complete());
    assert_eq!(report.migrated, ["guest-a", "guest-b"]);
    assert_eq!(report.failed_completions, 3);
    assert_eq!(h.store.habit_rows().len(), 2);
    assert!(h.store.log_rows().is_empty());
}

#[tokio::test]
async fn empty_guest_storage_skips_migration() {
    let h = Harness::new().await;
    h.coordinator.sign_in(session("user-1")).await;

    assert!(h.store.habit_rows().is_empty());
    assert!(h.reopen_local().await.migrated_habits("user-1").await.is_empty());
}
