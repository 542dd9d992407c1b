//! Reschedule engine: cascading forward push of conflicting tasks.
//!
//! When a task's range is set or changed, every displaceable task that now
//! overlaps it is pushed to start right after it, in start order. Each pushed
//! task then becomes a trigger itself. Tasks only ever move forward, and every
//! move strictly increases one task's start, so the work stack always drains.
//!
//! Barriers: locked, editing and completed tasks are never candidates. They
//! do not shield anything behind them; tasks past a barrier are still
//! evaluated against the trigger's range.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::overlap::overlaps;
use crate::task::{Task, TimeBlock};

/// One task moved by a cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Displacement {
    pub id: String,
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeReport {
    /// One entry per moved task; `from` is where it was before the first move.
    pub displaced: Vec<Displacement>,
}

impl CascadeReport {
    pub fn is_empty(&self) -> bool {
        self.displaced.is_empty()
    }

    pub fn len(&self) -> usize {
        self.displaced.len()
    }

    fn record(&mut self, id: &str, from: NaiveDateTime, to: NaiveDateTime) {
        match self.displaced.iter_mut().find(|d| d.id == id) {
            Some(d) => d.to = to,
            None => self.displaced.push(Displacement {
                id: id.to_string(),
                from,
                to,
            }),
        }
    }

    pub fn merge(&mut self, other: CascadeReport) {
        for d in other.displaced {
            self.record(&d.id, d.from, d.to);
        }
    }
}

/// Pending work for one trigger: the candidates it still has to place, in
/// start order, and where the next one goes.
struct Frame {
    trigger: usize,
    pending: Vec<usize>,
    cursor: NaiveDateTime,
}

impl Frame {
    /// `None` when nothing displaceable overlaps the trigger.
    fn open(tasks: &[Task], trigger: usize) -> Option<Self> {
        let range = tasks[trigger].range()?;

        let mut pending: Vec<usize> = tasks
            .iter()
            .enumerate()
            .filter(|(i, t)| *i != trigger && t.is_displaceable())
            .filter(|(_, t)| t.range().is_some_and(|r| overlaps(&range, &r)))
            .map(|(i, _)| i)
            .collect();

        if pending.is_empty() {
            return None;
        }

        // Stable: equal starts keep store order. Reversed so `pop` yields the earliest.
        pending.sort_by_key(|&i| tasks[i].start());
        pending.reverse();

        Some(Self {
            trigger,
            pending,
            cursor: range.end,
        })
    }
}

/// Resolve conflicts caused by `trigger_id`'s current range.
///
/// Each candidate is placed at the cursor and its own cascade runs to the
/// end before the next candidate is placed. A candidate that an earlier
/// sub-cascade already pushed past the cursor stays where it is.
///
/// Unknown or unscheduled triggers are a no-op.
pub fn cascade(tasks: &mut [Task], trigger_id: &str) -> CascadeReport {
    let mut report = CascadeReport::default();
    let mut stack: Vec<Frame> = tasks
        .iter()
        .position(|t| t.id == trigger_id)
        .and_then(|i| Frame::open(tasks, i))
        .into_iter()
        .collect();

    while let Some(frame) = stack.last_mut() {
        let Some(i) = frame.pending.pop() else {
            stack.pop();
            continue;
        };
        let cursor = frame.cursor;
        let trigger = frame.trigger;

        let id = tasks[i].id.clone();
        let Some(block) = tasks[i].block_mut() else {
            continue;
        };
        let from = block.start;
        if block.start < cursor {
            block.move_to(cursor);
            let (to, end) = (block.start, block.end);
            tracing::debug!(
                task = %id,
                trigger = %tasks[trigger].id,
                from = %from,
                to = %to,
                "cascade displaced task"
            );
            report.record(&id, from, to);
            frame.cursor = end;
        } else {
            frame.cursor = block.end;
        }

        if let Some(child) = Frame::open(tasks, i) {
            stack.push(child);
        }
    }

    report
}

/// Run a cascade from every incomplete scheduled task, in start order.
/// A store with no overlaps comes back untouched.
pub fn cascade_all(tasks: &mut [Task]) -> CascadeReport {
    let mut order: Vec<(NaiveDateTime, String)> = tasks
        .iter()
        .filter(|t| !t.is_completed())
        .filter_map(|t| t.start().map(|s| (s, t.id.clone())))
        .collect();
    order.sort();

    let mut report = CascadeReport::default();
    for (_, id) in order {
        report.merge(cascade(tasks, &id));
    }
    report
}

/// How an actual completion instant relates to the planned block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionAdjustment {
    /// Finished after the planned end: extend to `new_end` and cascade.
    RunningLate { new_end: NaiveDateTime },
    /// Finished inside the block: shorten to `new_end`, nothing to cascade.
    FinishedEarly { new_end: NaiveDateTime },
    /// Finished exactly at the end, or at/before the start.
    Unchanged,
}

pub fn completion_adjustment(block: &TimeBlock, actual: NaiveDateTime) -> CompletionAdjustment {
    if actual > block.end {
        CompletionAdjustment::RunningLate { new_end: actual }
    } else if actual < block.end && actual > block.start {
        CompletionAdjustment::FinishedEarly { new_end: actual }
    } else {
        CompletionAdjustment::Unchanged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use crate::time::add_minutes;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 17)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn get<'a>(tasks: &'a [Task], id: &str) -> &'a Task {
        tasks.iter().find(|t| t.id == id).unwrap()
    }

    fn extend(tasks: &mut [Task], id: &str, minutes: i64) {
        let t = tasks.iter_mut().find(|t| t.id == id).unwrap();
        let b = t.block_mut().unwrap();
        let end = add_minutes(b.end, minutes);
        b.set_end(end);
    }

    #[test]
    fn no_conflict_is_a_no_op() {
        let mut tasks = vec![
            Task::scheduled("a", "A", at(9, 0), 60),
            Task::scheduled("b", "B", at(10, 0), 60),
        ];
        let before = tasks.clone();
        let report = cascade(&mut tasks, "a");
        assert!(report.is_empty());
        assert_eq!(tasks, before);
    }

    #[test]
    fn extending_first_task_pushes_next() {
        let mut tasks = vec![
            Task::scheduled("a", "A", at(9, 0), 60),
            Task::scheduled("b", "B", at(10, 0), 60),
        ];
        extend(&mut tasks, "a", 30);

        let report = cascade(&mut tasks, "a");
        assert_eq!(report.len(), 1);
        let b = get(&tasks, "b").block().unwrap();
        assert_eq!(b.start, at(10, 30));
        assert_eq!(b.end, at(11, 30));
    }

    #[test]
    fn chain_of_three_shifts_both_downstream() {
        let mut tasks = vec![
            Task::scheduled("a", "A", at(9, 0), 60),
            Task::scheduled("b", "B", at(10, 0), 60),
            Task::scheduled("c", "C", at(11, 0), 60),
        ];
        extend(&mut tasks, "a", 30);

        let report = cascade(&mut tasks, "a");
        assert_eq!(report.len(), 2);
        assert_eq!(get(&tasks, "b").start(), Some(at(10, 30)));
        assert_eq!(get(&tasks, "c").start(), Some(at(11, 30)));
        assert_eq!(report.displaced[1].from, at(11, 0));
    }

    #[test]
    fn locked_task_is_not_moved() {
        let mut tasks = vec![
            Task::scheduled("a", "A", at(9, 0), 90),
            Task::scheduled("l", "Locked", at(10, 0), 60).with_locked(true),
            Task::scheduled("c", "C", at(10, 15), 30),
        ];
        cascade(&mut tasks, "a");
        assert_eq!(get(&tasks, "l").start(), Some(at(10, 0)));
        assert_eq!(get(&tasks, "c").start(), Some(at(10, 30)));
    }

    #[test]
    fn editing_task_is_a_barrier_but_later_tasks_still_move() {
        let mut tasks = vec![
            Task::scheduled("a", "A", at(9, 0), 120),
            Task::scheduled("e", "Editing", at(9, 30), 30).with_editing(true),
            Task::scheduled("c", "C", at(10, 30), 30),
        ];
        let report = cascade(&mut tasks, "a");

        assert_eq!(get(&tasks, "e").start(), Some(at(9, 30)));
        assert_eq!(get(&tasks, "c").start(), Some(at(11, 0)));
        assert_eq!(report.len(), 1);
        assert!(get(&tasks, "e").editing);
    }

    #[test]
    fn completed_tasks_do_not_compete() {
        let mut tasks = vec![
            Task::scheduled("a", "A", at(9, 0), 90),
            Task::scheduled("d", "Done", at(10, 0), 60).with_status(TaskStatus::Completed),
        ];
        assert!(cascade(&mut tasks, "a").is_empty());
        assert_eq!(get(&tasks, "d").start(), Some(at(10, 0)));
    }

    #[test]
    fn inserted_task_pushes_overlapping_earlier_start() {
        // New 10:15-10:45 block lands inside A (10:00-11:00): A moves behind it.
        let mut tasks = vec![
            Task::scheduled("a", "A", at(10, 0), 60),
            Task::scheduled("n", "New", at(10, 15), 30),
        ];
        cascade(&mut tasks, "n");
        assert_eq!(get(&tasks, "a").start(), Some(at(10, 45)));
    }

    #[test]
    fn pushed_task_can_cascade_into_non_overlapping_neighbour() {
        // B does not overlap A's new range but C's displacement reaches it.
        let mut tasks = vec![
            Task::scheduled("a", "A", at(9, 0), 60),
            Task::scheduled("c", "C", at(9, 30), 60),
            Task::scheduled("b", "B", at(10, 45), 30),
        ];
        cascade(&mut tasks, "a");
        assert_eq!(get(&tasks, "c").start(), Some(at(10, 0)));
        assert_eq!(get(&tasks, "b").start(), Some(at(11, 0)));
    }

    #[test]
    fn sub_cascade_finishes_before_next_candidate() {
        // A was extended to 11:00 and overlaps B and C. B lands on D, so D must
        // end up behind C, which started before it.
        let mut tasks = vec![
            Task::scheduled("a", "A", at(9, 0), 120),
            Task::scheduled("b", "B", at(10, 0), 30),
            Task::scheduled("c", "C", at(10, 30), 30),
            Task::scheduled("d", "D", at(11, 15), 30),
        ];
        let report = cascade(&mut tasks, "a");

        assert_eq!(get(&tasks, "b").start(), Some(at(11, 0)));
        assert_eq!(get(&tasks, "c").start(), Some(at(11, 30)));
        assert_eq!(get(&tasks, "d").start(), Some(at(12, 0)));
        assert_eq!(report.len(), 3);
        let d = report.displaced.iter().find(|d| d.id == "d").unwrap();
        assert_eq!((d.from, d.to), (at(11, 15), at(12, 0)));
    }

    #[test]
    fn candidate_already_pushed_by_earlier_sub_cascade_stays_put() {
        // B's new slot (10:40-11:40) swallows C, which is pushed to 11:40
        // before its own turn comes; it is not dragged back.
        let mut tasks = vec![
            Task::scheduled("a", "A", at(9, 0), 100),
            Task::scheduled("b", "B", at(10, 0), 60),
            Task::scheduled("c", "C", at(10, 30), 15),
        ];
        cascade(&mut tasks, "a");
        assert_eq!(get(&tasks, "b").start(), Some(at(10, 40)));
        assert_eq!(get(&tasks, "c").start(), Some(at(11, 40)));
    }

    #[test]
    fn unknown_trigger_is_ignored() {
        let mut tasks = vec![Task::scheduled("a", "A", at(9, 0), 60)];
        assert!(cascade(&mut tasks, "nope").is_empty());
    }

    #[test]
    fn completion_adjustment_classifies() {
        let b = TimeBlock::new(at(9, 0), 60);
        assert_eq!(
            completion_adjustment(&b, at(10, 20)),
            CompletionAdjustment::RunningLate { new_end: at(10, 20) }
        );
        assert_eq!(
            completion_adjustment(&b, at(9, 40)),
            CompletionAdjustment::FinishedEarly { new_end: at(9, 40) }
        );
        assert_eq!(completion_adjustment(&b, at(10, 0)), CompletionAdjustment::Unchanged);
        assert_eq!(completion_adjustment(&b, at(8, 0)), CompletionAdjustment::Unchanged);
    }

    /// Back-to-back-or-gapped schedule with no overlaps at all.
    fn schedule_strategy() -> impl Strategy<Value = Vec<Task>> {
        prop::collection::vec((0i64..90, 5i64..120, any::<bool>(), 0u8..10), 1..12).prop_map(
            |specs| {
                let mut cursor = at(6, 0);
                specs
                    .into_iter()
                    .enumerate()
                    .map(|(i, (gap, len, locked, editing_roll))| {
                        let start = add_minutes(cursor, gap);
                        cursor = add_minutes(start, len);
                        Task::scheduled(format!("t{i}"), format!("Task {i}"), start, len)
                            .with_locked(locked && i > 0)
                            .with_editing(editing_roll == 0 && i > 0)
                    })
                    .collect()
            },
        )
    }

    fn assert_no_displaceable_overlap(tasks: &[Task]) -> Result<(), TestCaseError> {
        for (i, a) in tasks.iter().enumerate() {
            for b in &tasks[i + 1..] {
                if a.is_displaceable() && b.is_displaceable() {
                    let (ra, rb) = (a.range().unwrap(), b.range().unwrap());
                    prop_assert!(!overlaps(&ra, &rb), "{} overlaps {}", a.id, b.id);
                }
            }
        }
        Ok(())
    }

    proptest! {
        #[test]
        fn cascade_restores_invariant_and_only_moves_forward(
            tasks in schedule_strategy(),
            extra in 1i64..240,
        ) {
            let mut tasks = tasks;
            let before = tasks.clone();
            extend(&mut tasks, "t0", extra);

            let report = cascade(&mut tasks, "t0");
            assert_no_displaceable_overlap(&tasks)?;

            // Displaceable tasks keep their relative start order.
            let order: Vec<&str> = before
                .iter()
                .filter(|t| t.is_displaceable())
                .map(|t| t.id.as_str())
                .collect();
            for pair in order.windows(2) {
                let (a, b) = (get(&tasks, pair[0]).start(), get(&tasks, pair[1]).start());
                prop_assert!(a <= b, "{} moved behind {}", pair[0], pair[1]);
            }

            for d in &report.displaced {
                let old = get(&before, &d.id).start().unwrap();
                prop_assert!(d.to > old);
                prop_assert_eq!(d.from, old);
                prop_assert!(!get(&tasks, &d.id).is_locked());
                prop_assert!(!get(&tasks, &d.id).editing);
            }

            let second = cascade(&mut tasks, "t0");
            prop_assert!(second.is_empty());
        }

        #[test]
        fn cascade_all_is_idempotent_on_clean_schedule(tasks in schedule_strategy()) {
            let mut tasks = tasks;
            let before = tasks.clone();
            prop_assert!(cascade_all(&mut tasks).is_empty());
            prop_assert!(cascade_all(&mut tasks).is_empty());
            prop_assert_eq!(tasks, before);
        }
    }
}
