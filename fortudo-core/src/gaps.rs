//! Free time between scheduled tasks, and where "now" sits relative to them.
//!
//! Recomputed on demand from the sorted schedule; nothing is cached.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::task::Task;
use crate::time::{format_duration, minutes_between};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Minutes, always > 0.
    pub duration: i64,
    /// Task that ends where the gap starts.
    pub after_task_id: String,
    /// Task that starts where the gap ends.
    pub before_task_id: String,
}

impl Gap {
    pub fn label(&self) -> String {
        format!("{} free", format_duration(self.duration))
    }

    pub fn contains(&self, now: NaiveDateTime) -> bool {
        self.start <= now && now < self.end
    }
}

/// Which marker is "current". At most one at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrentMarker {
    /// Index into `GapReport::gaps`.
    Gap(usize),
    BeforeFirst,
    AfterLast,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapReport {
    pub gaps: Vec<Gap>,
    /// `now` is earlier than the first task's start.
    pub before_first: bool,
    /// `now` is at or past the latest end of any scheduled task.
    pub after_last: bool,
    pub current: CurrentMarker,
}

/// Derive gaps and boundary state from the scheduled tasks in `tasks`.
///
/// Unscheduled entries are ignored; the scheduled ones are ordered by start
/// before gaps are measured.
pub fn compute_gaps(tasks: &[Task], now: NaiveDateTime) -> GapReport {
    let mut scheduled: Vec<&Task> = tasks.iter().filter(|t| t.is_scheduled()).collect();
    scheduled.sort_by_key(|t| t.start());

    let blocks: Vec<(&Task, NaiveDateTime, NaiveDateTime)> = scheduled
        .iter()
        .filter_map(|t| t.block().map(|b| (*t, b.start, b.end)))
        .collect();

    let gaps: Vec<Gap> = blocks
        .windows(2)
        .filter_map(|pair| {
            let (prev, _, prev_end) = pair[0];
            let (next, next_start, _) = pair[1];
            let duration = minutes_between(prev_end, next_start);
            (duration > 0).then(|| Gap {
                start: prev_end,
                end: next_start,
                duration,
                after_task_id: prev.id.clone(),
                before_task_id: next.id.clone(),
            })
        })
        .collect();

    let before_first = blocks.first().is_some_and(|(_, start, _)| now < *start);
    // Latest end, not the last start's end: an overlapping locked or completed
    // block can run past the task that starts after it.
    let after_last = blocks
        .iter()
        .map(|(_, _, end)| *end)
        .max()
        .is_some_and(|end| now >= end);

    let current = if before_first {
        CurrentMarker::BeforeFirst
    } else if after_last {
        CurrentMarker::AfterLast
    } else {
        gaps.iter()
            .position(|g| g.contains(now))
            .map_or(CurrentMarker::None, CurrentMarker::Gap)
    };

    GapReport {
        gaps,
        before_first,
        after_last,
        current,
    }
}
