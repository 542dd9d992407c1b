//! Task model for the daily planner: time-blocked tasks and the backlog.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::overlap::TimeRange;
use crate::time::{add_minutes, minutes_between};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Incomplete,
    Completed,
}

/// Backlog priority. Ordering puts `High` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        })
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// A concrete slot on the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBlock {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Minutes; always `end - start`.
    pub duration: i64,
    /// Locked blocks are never displaced by a cascade.
    #[serde(default)]
    pub locked: bool,
}

impl TimeBlock {
    pub fn new(start: NaiveDateTime, duration: i64) -> Self {
        Self {
            start,
            end: add_minutes(start, duration),
            duration,
            locked: false,
        }
    }

    /// Move the block, keeping its duration.
    pub fn move_to(&mut self, start: NaiveDateTime) {
        self.start = start;
        self.end = add_minutes(start, self.duration);
    }

    /// Change the end, keeping the start.
    pub fn set_end(&mut self, end: NaiveDateTime) {
        self.end = end;
        self.duration = minutes_between(self.start, end);
    }

    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start, self.end)
    }
}

/// Backlog entry: no slot yet, only a rank and an estimate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Backlog {
    pub priority: Priority,
    /// Minutes; zero is a valid estimate.
    #[serde(default)]
    pub est_duration: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TaskKind {
    Scheduled(TimeBlock),
    Unscheduled(Backlog),
}

/// Core task type.
///
/// `editing` and `confirming_delete` are UI state. They are skipped by serde,
/// so anything loaded from storage starts with both cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(flatten)]
    pub kind: TaskKind,

    #[serde(skip)]
    pub editing: bool,
    #[serde(skip)]
    pub confirming_delete: bool,
}

impl Task {
    pub fn scheduled(
        id: impl Into<String>,
        description: impl Into<String>,
        start: NaiveDateTime,
        duration: i64,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            status: TaskStatus::Incomplete,
            kind: TaskKind::Scheduled(TimeBlock::new(start, duration)),
            editing: false,
            confirming_delete: false,
        }
    }

    pub fn unscheduled(
        id: impl Into<String>,
        description: impl Into<String>,
        priority: Priority,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            status: TaskStatus::Incomplete,
            kind: TaskKind::Unscheduled(Backlog {
                priority,
                est_duration: None,
            }),
            editing: false,
            confirming_delete: false,
        }
    }

    pub fn with_estimate(mut self, minutes: i64) -> Self {
        if let TaskKind::Unscheduled(b) = &mut self.kind {
            b.est_duration = Some(minutes);
        }
        self
    }

    pub fn with_locked(mut self, locked: bool) -> Self {
        if let TaskKind::Scheduled(b) = &mut self.kind {
            b.locked = locked;
        }
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_editing(mut self, editing: bool) -> Self {
        self.editing = editing;
        self
    }

    pub fn block(&self) -> Option<&TimeBlock> {
        match &self.kind {
            TaskKind::Scheduled(b) => Some(b),
            TaskKind::Unscheduled(_) => None,
        }
    }

    pub fn block_mut(&mut self) -> Option<&mut TimeBlock> {
        match &mut self.kind {
            TaskKind::Scheduled(b) => Some(b),
            TaskKind::Unscheduled(_) => None,
        }
    }

    pub fn backlog(&self) -> Option<&Backlog> {
        match &self.kind {
            TaskKind::Unscheduled(b) => Some(b),
            TaskKind::Scheduled(_) => None,
        }
    }

    pub fn range(&self) -> Option<TimeRange> {
        self.block().map(TimeBlock::range)
    }

    pub fn start(&self) -> Option<NaiveDateTime> {
        self.block().map(|b| b.start)
    }

    pub fn is_scheduled(&self) -> bool {
        matches!(self.kind, TaskKind::Scheduled(_))
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    pub fn is_locked(&self) -> bool {
        self.block().is_some_and(|b| b.locked)
    }

    /// Whether a cascade may move this task.
    pub fn is_displaceable(&self) -> bool {
        self.is_scheduled() && !self.is_completed() && !self.editing && !self.is_locked()
    }

    /// Minutes this task occupies (or is estimated to).
    pub fn minutes(&self) -> i64 {
        match &self.kind {
            TaskKind::Scheduled(b) => b.duration,
            TaskKind::Unscheduled(b) => b.est_duration.unwrap_or(0),
        }
    }
}
