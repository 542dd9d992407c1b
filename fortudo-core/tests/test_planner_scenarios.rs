use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use fortudo_core::time::parse_duration;
use fortudo_core::{
    overlaps, spawn_sync_worker, CurrentMarker, JsonFileRepository, Planner, Priority,
    SyncBackend, SyncStatus, Task, TaskDraft, TaskPatch, TaskRepository,
};
use proptest::prelude::*;

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
}

fn at(h: u32, m: u32) -> NaiveDateTime {
    day().and_hms_opt(h, m, 0).unwrap()
}

fn planner() -> Planner {
    let now = at(8, 0);
    Planner::new().with_clock(Arc::new(move || now))
}

fn add(p: &mut Planner, desc: &str, start: &str, minutes: u32) -> String {
    let r = p.add_task(TaskDraft::scheduled(desc, start, minutes));
    assert!(r.success, "add {desc}: {:?}", r.reason);
    r.task.unwrap().id
}

fn span(p: &Planner, id: &str) -> (NaiveDateTime, NaiveDateTime) {
    let b = p.task(id).unwrap().block().unwrap();
    (b.start, b.end)
}

fn assert_no_displaceable_overlaps(tasks: &[Task]) {
    let live: Vec<&Task> = tasks.iter().filter(|t| t.is_displaceable()).collect();
    for (i, a) in live.iter().enumerate() {
        for b in &live[i + 1..] {
            let (ra, rb) = (a.range().unwrap(), b.range().unwrap());
            assert!(
                !overlaps(&ra, &rb),
                "{} {:?} overlaps {} {:?}",
                a.description,
                ra,
                b.description,
                rb
            );
        }
    }
}

#[test]
fn test_extending_first_task_pushes_the_next() {
    let mut p = planner();
    let a = add(&mut p, "A", "09:00", 60);
    let b = add(&mut p, "B", "10:00", 60);

    let r = p.update_task(&a, TaskPatch::default().with_minutes(90));
    assert!(r.success);
    assert_eq!(span(&p, &a), (at(9, 0), at(10, 30)));
    assert_eq!(span(&p, &b), (at(10, 30), at(11, 30)));
}

#[test]
fn test_extension_cascades_through_chain() {
    let mut p = planner();
    let a = add(&mut p, "First", "09:00", 60);
    let b = add(&mut p, "Second", "10:00", 60);
    let c = add(&mut p, "Third", "11:00", 60);

    let r = p.update_task(&a, TaskPatch::default().with_minutes(90));
    assert_eq!(r.displaced.len(), 2);
    assert_eq!(span(&p, &b), (at(10, 30), at(11, 30)));
    assert_eq!(span(&p, &c), (at(11, 30), at(12, 30)));
    for d in &r.displaced {
        assert!(d.to >= d.from);
    }
}

#[test]
fn test_extension_keeps_pushed_tasks_in_start_order() {
    let mut p = planner();
    let a = add(&mut p, "A", "09:00", 60);
    let b = add(&mut p, "B", "10:00", 30);
    let c = add(&mut p, "C", "10:30", 30);
    let d = add(&mut p, "D", "11:15", 30);

    let r = p.update_task(&a, TaskPatch::default().with_minutes(120));
    assert!(r.success);
    assert_eq!(span(&p, &b), (at(11, 0), at(11, 30)));
    assert_eq!(span(&p, &c), (at(11, 30), at(12, 0)));
    assert_eq!(span(&p, &d), (at(12, 0), at(12, 30)));
    assert_no_displaceable_overlaps(p.tasks());
}

#[test]
fn test_empty_description_is_rejected_without_change() {
    let mut p = planner();
    add(&mut p, "Existing", "08:00", 30);
    let before = p.tasks().to_vec();

    let r = p.add_task(TaskDraft::scheduled("", "09:00", 30));
    assert!(!r.success);
    assert!(!r.requires_confirmation);
    assert!(r.reason.unwrap().contains("description"));
    assert_eq!(p.tasks(), before.as_slice());
}

#[test]
fn test_zero_duration_depends_on_allow_zero() {
    assert!(parse_duration("0", "0", false).is_err());
    assert_eq!(parse_duration("0", "0", true).unwrap(), 0);
}

#[test]
fn test_gaps_between_tasks() {
    let mut p = planner();
    add(&mut p, "A", "10:00", 60);
    add(&mut p, "B", "11:30", 60);

    let report = p.gaps();
    assert_eq!(report.gaps.len(), 1);
    assert_eq!(report.gaps[0].duration, 30);
    assert_eq!(report.current, CurrentMarker::BeforeFirst);

    let mut p = planner();
    add(&mut p, "A", "10:00", 60);
    add(&mut p, "B", "11:00", 60);
    assert!(p.gaps().gaps.is_empty());
}

#[test]
fn test_late_evening_task_pushes_past_midnight() {
    let mut p = planner();
    let late = add(&mut p, "Deploy window", "23:00", 90);

    let r = p.add_task(
        TaskDraft::scheduled("Early batch", "00:15", 45).on(day().succ_opt().unwrap()),
    );
    let early = r.task.unwrap().id;

    // 00:15 next day sits inside 23:00-00:30, so the incoming task pushes it.
    assert_eq!(span(&p, &late).0, day().succ_opt().unwrap().and_hms_opt(1, 0, 0).unwrap());
    assert_eq!(span(&p, &early).1, day().succ_opt().unwrap().and_hms_opt(1, 0, 0).unwrap());
}

#[test]
fn test_editing_task_is_a_barrier_but_not_a_shield() {
    let mut p = planner();
    let a = add(&mut p, "A", "09:00", 60);
    let held = add(&mut p, "Held", "10:00", 30);
    let c = add(&mut p, "C", "10:30", 30);

    p.begin_edit(&held);
    p.update_task(&a, TaskPatch::default().with_minutes(120));

    assert_eq!(span(&p, &held).0, at(10, 0));
    // C overlapped the new 09:00-11:00 range, so it moved despite the barrier.
    assert_eq!(span(&p, &c), (at(11, 0), at(11, 30)));

    p.cancel_edit(&held);
    assert!(!p.task(&held).unwrap().editing);
}

#[test]
fn test_same_description_tasks_keep_identity() {
    let mut p = planner();
    let first = add(&mut p, "Focus", "09:00", 60);
    let second = add(&mut p, "Focus", "10:00", 60);
    p.begin_edit(&second);

    p.update_task(&first, TaskPatch::default().with_minutes(30));
    assert!(p.task(&second).unwrap().editing);
    assert!(!p.task(&first).unwrap().editing);
}

#[test]
fn test_backlog_schedule_roundtrip() {
    let mut p = planner();
    let r = p.add_task(TaskDraft::unscheduled("Write report", Priority::High, Some(90)));
    let id = r.task.unwrap().id;

    let r = p.schedule_task(&id, "13:00", "1", "30");
    assert!(r.success);
    assert_eq!(span(&p, &id), (at(13, 0), at(14, 30)));

    let r = p.unschedule_task(&id);
    assert_eq!(r.task.unwrap().backlog().unwrap().est_duration, Some(90));
}

#[test]
fn test_planner_state_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("default.json");

    let mut p = planner().with_repository(JsonFileRepository::new(&path));
    let a = add(&mut p, "Standup", "09:00", 15);
    p.toggle_lock(&a);
    p.begin_edit(&a);
    p.add_task(TaskDraft::unscheduled("Inbox", Priority::Low, None));

    let reloaded = Planner::load(JsonFileRepository::new(&path)).unwrap();
    assert_eq!(reloaded.tasks().len(), 2);
    let t = reloaded.task(&a).unwrap();
    assert!(t.is_locked());
    assert!(!t.editing);
    assert_eq!(JsonFileRepository::new(&path).load().unwrap(), reloaded.tasks());
}

#[derive(Clone, Default)]
struct CountingBackend {
    pushes: Arc<Mutex<Vec<usize>>>,
}

#[async_trait]
impl SyncBackend for CountingBackend {
    async fn push(&self, tasks: Vec<Task>) -> anyhow::Result<()> {
        self.pushes.lock().unwrap().push(tasks.len());
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_rapid_edits_produce_one_sync() {
    let backend = CountingBackend::default();
    let (handle, worker) = spawn_sync_worker(backend.clone(), Duration::from_millis(300));
    let mut p = planner().with_sync(handle);

    for start in ["09:00", "10:00", "11:00"] {
        add(&mut p, "Block", start, 30);
    }
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(*backend.pushes.lock().unwrap(), vec![3]);
    assert_eq!(p.sync_handle().unwrap().status(), SyncStatus::Synced);

    drop(p);
    worker.await.unwrap();
}

#[derive(Debug, Clone)]
enum Op {
    Add { start: u32, minutes: u32 },
    Resize { pick: usize, minutes: u32 },
    Move { pick: usize, start: u32 },
    ToggleLock { pick: usize },
    CompleteAt { pick: usize, offset: i64 },
    Unschedule { pick: usize },
}

fn clock(minute: u32) -> String {
    format!("{:02}:{:02}", minute / 60, minute % 60)
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u32..1440, 5u32..240).prop_map(|(start, minutes)| Op::Add { start, minutes }),
        2 => (any::<usize>(), 5u32..240).prop_map(|(pick, minutes)| Op::Resize { pick, minutes }),
        2 => (any::<usize>(), 0u32..1440).prop_map(|(pick, start)| Op::Move { pick, start }),
        1 => any::<usize>().prop_map(|pick| Op::ToggleLock { pick }),
        1 => (any::<usize>(), -60i64..180)
            .prop_map(|(pick, offset)| Op::CompleteAt { pick, offset }),
        1 => any::<usize>().prop_map(|pick| Op::Unschedule { pick }),
    ]
}

fn pick_scheduled(p: &Planner, pick: usize) -> Option<String> {
    let ids: Vec<String> = p.store().scheduled().iter().map(|t| t.id.clone()).collect();
    (!ids.is_empty()).then(|| ids[pick % ids.len()].clone())
}

fn apply(p: &mut Planner, op: Op) {
    let result = match op {
        Op::Add { start, minutes } => p.add_task(TaskDraft::scheduled("t", clock(start), minutes)),
        Op::Resize { pick, minutes } => match pick_scheduled(p, pick) {
            Some(id) => p.update_task(&id, TaskPatch::default().with_minutes(minutes)),
            None => return,
        },
        Op::Move { pick, start } => match pick_scheduled(p, pick) {
            Some(id) => p.update_task(&id, TaskPatch::default().with_start_time(clock(start))),
            None => return,
        },
        Op::ToggleLock { pick } => match pick_scheduled(p, pick) {
            Some(id) => p.toggle_lock(&id),
            None => return,
        },
        Op::CompleteAt { pick, offset } => match pick_scheduled(p, pick) {
            Some(id) => {
                let end = p.task(&id).unwrap().block().unwrap().end;
                p.complete_task(&id, Some(end + chrono::Duration::minutes(offset)), true)
            }
            None => return,
        },
        Op::Unschedule { pick } => match pick_scheduled(p, pick) {
            Some(id) => p.unschedule_task(&id),
            None => return,
        },
    };
    for d in &result.displaced {
        assert!(d.to >= d.from, "task moved backward: {d:?}");
    }
    for a in &result.displaced {
        for b in &result.displaced {
            if a.from < b.from {
                assert!(a.to <= b.to, "{} overtook {} in a cascade", b.id, a.id);
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_no_overlaps_between_movable_tasks(ops in prop::collection::vec(op_strategy(), 1..25)) {
        let mut p = planner();
        for op in ops {
            apply(&mut p, op);
            assert_no_displaceable_overlaps(p.tasks());

            let starts: Vec<NaiveDateTime> =
                p.store().scheduled().iter().filter_map(|t| t.start()).collect();
            prop_assert!(starts.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
