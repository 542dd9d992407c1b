//! TaskStore: the owned, ordered task list the planner mutates.
//!
//! Ordering: scheduled tasks first, ascending by start (ties keep their
//! previous relative order), then the backlog grouped by priority.
//!
//! Every mutation that sets or changes a scheduled range runs the reschedule
//! engine before re-sorting, so the store is consistent when a call returns.
//! Validation happens before any mutation; a rejected call changes nothing.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::{PlannerError, Result};
use crate::reschedule::{cascade, cascade_all, CascadeReport};
use crate::task::{Backlog, Priority, Task, TaskKind, TaskStatus, TimeBlock};
use crate::time::{instant_from, parse_duration};

/// Form input for a new task. Durations stay raw strings until validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskDraft {
    Scheduled {
        description: String,
        start_time: String,
        /// Calendar day for `start_time`; `None` means today.
        date: Option<NaiveDate>,
        duration_hours: String,
        duration_minutes: String,
    },
    Unscheduled {
        description: String,
        priority: Priority,
        est_hours: String,
        est_minutes: String,
    },
}

impl TaskDraft {
    pub fn scheduled(
        description: impl Into<String>,
        start_time: impl Into<String>,
        minutes: u32,
    ) -> Self {
        Self::Scheduled {
            description: description.into(),
            start_time: start_time.into(),
            date: None,
            duration_hours: (minutes / 60).to_string(),
            duration_minutes: (minutes % 60).to_string(),
        }
    }

    pub fn unscheduled(
        description: impl Into<String>,
        priority: Priority,
        minutes: Option<u32>,
    ) -> Self {
        let (h, m) = minutes.map_or((String::new(), String::new()), |n| {
            ((n / 60).to_string(), (n % 60).to_string())
        });
        Self::Unscheduled {
            description: description.into(),
            priority,
            est_hours: h,
            est_minutes: m,
        }
    }

    /// Pin a scheduled draft to a calendar day.
    pub fn on(mut self, day: NaiveDate) -> Self {
        if let Self::Scheduled { date, .. } = &mut self {
            *date = Some(day);
        }
        self
    }

    /// Fill in the day only if the draft has none.
    pub fn on_or(self, day: NaiveDate) -> Self {
        if matches!(self, Self::Scheduled { date: None, .. }) {
            self.on(day)
        } else {
            self
        }
    }
}

/// Partial edit. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub description: Option<String>,
    /// Scheduled only: new "HH:MM" on the task's current day.
    pub start_time: Option<String>,
    /// Raw (hours, minutes). Scheduled: new duration. Unscheduled: new estimate.
    pub duration: Option<(String, String)>,
    /// Unscheduled only.
    pub priority: Option<Priority>,
}

impl TaskPatch {
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_start_time(mut self, start_time: impl Into<String>) -> Self {
        self.start_time = Some(start_time.into());
        self
    }

    pub fn with_minutes(mut self, minutes: u32) -> Self {
        self.duration = Some(((minutes / 60).to_string(), (minutes % 60).to_string()));
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }
}

#[derive(Debug, Default, Clone)]
pub struct TaskStore {
    tasks: Vec<Task>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let mut store = Self::new();
        store.set_all(tasks);
        store
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn all(&self) -> &[Task] {
        &self.tasks
    }

    pub fn find(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    fn require(&self, id: &str) -> Result<&Task> {
        self.find(id)
            .ok_or_else(|| PlannerError::InvalidReference(id.to_string()))
    }

    fn require_mut(&mut self, id: &str) -> Result<&mut Task> {
        self.find_mut(id)
            .ok_or_else(|| PlannerError::InvalidReference(id.to_string()))
    }

    /// Scheduled tasks, ascending by start.
    pub fn scheduled(&self) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.is_scheduled()).collect()
    }

    /// Backlog, high priority first.
    pub fn unscheduled(&self) -> Vec<&Task> {
        self.tasks.iter().filter(|t| !t.is_scheduled()).collect()
    }

    /// Bulk replace (load, clear). No cascade runs.
    pub fn set_all(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
        self.sort();
    }

    pub fn add(&mut self, draft: TaskDraft) -> Result<(Task, CascadeReport)> {
        let task = build_task(draft)?;
        let id = task.id.clone();
        let scheduled = task.is_scheduled();

        self.tasks.push(task);
        let report = if scheduled {
            self.reschedule_from(&id)
        } else {
            self.sort();
            CascadeReport::default()
        };

        tracing::info!(task = %id, displaced = report.len(), "task added");
        Ok((self.require(&id)?.clone(), report))
    }

    pub fn update(&mut self, id: &str, patch: TaskPatch) -> Result<(Task, CascadeReport)> {
        let current = self.require(id)?;
        let updated = apply_patch(current, patch)?;
        let reschedule = updated.is_scheduled() && !updated.is_completed();

        *self.require_mut(id)? = updated;
        let report = if reschedule {
            self.reschedule_from(id)
        } else {
            self.sort();
            CascadeReport::default()
        };

        tracing::info!(task = %id, displaced = report.len(), "task updated");
        Ok((self.require(id)?.clone(), report))
    }

    /// Two-step delete: an unconfirmed call only flags the task.
    /// Returns the removed task on a confirmed call.
    pub fn remove(&mut self, id: &str, confirmed: bool) -> Result<Option<Task>> {
        if !confirmed {
            self.require_mut(id)?.confirming_delete = true;
            return Ok(None);
        }

        let idx = self
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| PlannerError::InvalidReference(id.to_string()))?;
        let removed = self.tasks.remove(idx);
        tracing::info!(task = %id, "task removed");
        Ok(Some(removed))
    }

    /// Move a backlog task onto the timeline.
    pub fn schedule(
        &mut self,
        id: &str,
        start_time: &str,
        date: Option<NaiveDate>,
        hours: &str,
        minutes: &str,
    ) -> Result<(Task, CascadeReport)> {
        let task = self.require(id)?;
        if task.is_scheduled() {
            return Err(PlannerError::validation("Task is already scheduled"));
        }
        let duration = parse_duration(hours, minutes, false)?;
        let start = instant_from(start_time, date)?;

        let task = self.require_mut(id)?;
        task.kind = TaskKind::Scheduled(TimeBlock::new(start, duration.into()));
        task.status = TaskStatus::Incomplete;
        task.editing = false;

        let report = self.reschedule_from(id);
        tracing::info!(task = %id, displaced = report.len(), "backlog task scheduled");
        Ok((self.require(id)?.clone(), report))
    }

    /// Take a scheduled task off the timeline; its duration becomes the estimate.
    pub fn unschedule(&mut self, id: &str, priority: Priority) -> Result<Task> {
        let task = self.require_mut(id)?;
        let Some(duration) = task.block().map(|b| b.duration) else {
            return Err(PlannerError::validation("Task is not scheduled"));
        };
        if task.is_completed() {
            return Err(PlannerError::validation("Completed tasks cannot be unscheduled"));
        }

        task.kind = TaskKind::Unscheduled(Backlog {
            priority,
            est_duration: Some(duration),
        });
        task.editing = false;
        let task = task.clone();
        self.sort();
        Ok(task)
    }

    /// Run the reschedule engine from `id`, then restore ordering.
    pub fn reschedule_from(&mut self, id: &str) -> CascadeReport {
        let report = cascade(&mut self.tasks, id);
        self.sort();
        report
    }

    /// Cascade from every incomplete scheduled task. Used on data that did not
    /// come through this store (a hand-edited or merged file).
    pub fn resolve_conflicts(&mut self) -> CascadeReport {
        let report = cascade_all(&mut self.tasks);
        self.sort();
        report
    }

    fn sort(&mut self) {
        self.tasks.sort_by_key(|t| match &t.kind {
            TaskKind::Scheduled(b) => (0u8, Some(b.start), Priority::High),
            TaskKind::Unscheduled(b) => (1u8, None, b.priority),
        });
    }
}

fn validate_description(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PlannerError::validation("Task description is required"));
    }
    Ok(trimmed.to_string())
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn parse_estimate(hours: &str, minutes: &str) -> Result<Option<i64>> {
    if hours.trim().is_empty() && minutes.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(parse_duration(hours, minutes, true)?.into()))
}

fn build_task(draft: TaskDraft) -> Result<Task> {
    match draft {
        TaskDraft::Scheduled {
            description,
            start_time,
            date,
            duration_hours,
            duration_minutes,
        } => {
            let description = validate_description(&description)?;
            let duration = parse_duration(&duration_hours, &duration_minutes, false)?;
            let start = instant_from(&start_time, date)?;
            Ok(Task::scheduled(new_id(), description, start, duration.into()))
        }
        TaskDraft::Unscheduled {
            description,
            priority,
            est_hours,
            est_minutes,
        } => {
            let description = validate_description(&description)?;
            let mut task = Task::unscheduled(new_id(), description, priority);
            if let Some(est) = parse_estimate(&est_hours, &est_minutes)? {
                task = task.with_estimate(est);
            }
            Ok(task)
        }
    }
}

/// Validate a patch against `current` and return the edited copy.
fn apply_patch(current: &Task, patch: TaskPatch) -> Result<Task> {
    let mut task = current.clone();

    if let Some(description) = &patch.description {
        task.description = validate_description(description)?;
    }

    match &mut task.kind {
        TaskKind::Scheduled(block) => {
            if patch.priority.is_some() {
                return Err(PlannerError::validation(
                    "Priority only applies to unscheduled tasks",
                ));
            }
            let duration = match &patch.duration {
                Some((h, m)) => i64::from(parse_duration(h, m, false)?),
                None => block.duration,
            };
            let start = match &patch.start_time {
                Some(t) => instant_from(t, Some(block.start.date()))?,
                None => block.start,
            };
            let locked = block.locked;
            *block = TimeBlock::new(start, duration);
            block.locked = locked;
        }
        TaskKind::Unscheduled(backlog) => {
            if patch.start_time.is_some() {
                return Err(PlannerError::validation(
                    "Unscheduled tasks have no start time; schedule the task instead",
                ));
            }
            if let Some((h, m)) = &patch.duration {
                backlog.est_duration = parse_estimate(h, m)?;
            }
            if let Some(priority) = patch.priority {
                backlog.priority = priority;
            }
        }
    }

    task.editing = false;
    task.confirming_delete = false;
    Ok(task)
}
