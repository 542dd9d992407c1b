//! Planner: the single entry point the UI layer talks to.
//!
//! Every operation returns an [`OperationResult`] instead of an error so the
//! caller can render failures and confirmation prompts uniformly. Destructive
//! or surprising operations come back with `requires_confirmation` set and
//! must be repeated with `confirmed = true`.
//!
//! After each committed mutation the full task list is saved through the
//! repository and handed to the sync worker. Save failures are logged and do
//! not roll anything back.

use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, Result};
use crate::gaps::{compute_gaps, Gap, GapReport};
use crate::overlap::{find_conflicts, overlap_warning, TimeRange};
use crate::persist::TaskRepository;
use crate::reschedule::{completion_adjustment, CascadeReport, CompletionAdjustment, Displacement};
use crate::store::{TaskDraft, TaskPatch, TaskStore};
use crate::sync::SyncHandle;
use crate::task::{Priority, Task, TaskStatus};
use crate::time::{
    add_minutes, format_clock, format_instant_12h, instant_from, parse_duration,
    round_up_to_5_minutes,
};

/// Source of "now". Injected so tests can pin the clock.
pub type NowProvider = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationType {
    Delete,
    DeleteAll,
    CompleteLate,
}

/// Which tasks `clear` removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClearScope {
    All,
    Scheduled,
    Completed,
}

impl ClearScope {
    fn removes(self, task: &Task) -> bool {
        match self {
            ClearScope::All => true,
            ClearScope::Scheduled => task.is_scheduled(),
            ClearScope::Completed => task.is_completed(),
        }
    }
}

impl std::str::FromStr for ClearScope {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(ClearScope::All),
            "scheduled" => Ok(ClearScope::Scheduled),
            "completed" => Ok(ClearScope::Completed),
            other => Err(PlannerError::validation(format!(
                "unknown clear scope {other:?} (expected all, scheduled or completed)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OperationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<Task>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
    /// Failure reason, or the question to ask when confirmation is required.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub requires_confirmation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_type: Option<ConfirmationType>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub displaced: Vec<Displacement>,
}

impl OperationResult {
    fn ok(task: Task) -> Self {
        Self {
            success: true,
            task: Some(task),
            ..Default::default()
        }
    }

    fn ok_list(tasks: Vec<Task>) -> Self {
        Self {
            success: true,
            tasks: Some(tasks),
            ..Default::default()
        }
    }

    fn failed(err: PlannerError) -> Self {
        Self {
            success: false,
            reason: Some(err.to_string()),
            ..Default::default()
        }
    }

    fn confirm(kind: ConfirmationType, question: String, task: Option<Task>) -> Self {
        Self {
            success: false,
            task,
            reason: Some(question),
            requires_confirmation: true,
            confirmation_type: Some(kind),
            ..Default::default()
        }
    }

    fn with_displaced(mut self, report: CascadeReport) -> Self {
        self.displaced = report.displaced;
        self
    }
}

/// Answer to "would this slot collide with anything?".
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapCheck {
    pub range: TimeRange,
    /// e.g. "Ends at 2:30 PM".
    pub end_hint: String,
    pub conflicts: Vec<Task>,
    pub warning: Option<String>,
}

pub struct Planner {
    store: TaskStore,
    now: NowProvider,
    repository: Option<Box<dyn TaskRepository>>,
    sync: Option<SyncHandle>,
}

impl Default for Planner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Planner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Planner")
            .field("tasks", &self.store.len())
            .field("repository", &self.repository.is_some())
            .field("sync", &self.sync.is_some())
            .finish()
    }
}

impl Planner {
    /// Empty planner on the local wall clock, with no storage or sync.
    pub fn new() -> Self {
        Self {
            store: TaskStore::new(),
            now: Arc::new(|| Local::now().naive_local()),
            repository: None,
            sync: None,
        }
    }

    /// Load the task list from `repository` and keep saving back to it.
    pub fn load(repository: impl TaskRepository + 'static) -> anyhow::Result<Self> {
        let tasks = repository.load()?;
        tracing::info!(tasks = tasks.len(), "tasks loaded");
        let mut planner = Self::new();
        planner.store = TaskStore::from_tasks(tasks);
        planner.repository = Some(Box::new(repository));

        let repaired = planner.store.resolve_conflicts();
        if !repaired.is_empty() {
            tracing::warn!(
                moved = repaired.len(),
                "stored schedule had overlaps; pushed later tasks"
            );
            planner.commit();
        }
        Ok(planner)
    }

    pub fn with_tasks(mut self, tasks: Vec<Task>) -> Self {
        self.store = TaskStore::from_tasks(tasks);
        self
    }

    pub fn with_clock(mut self, now: NowProvider) -> Self {
        self.now = now;
        self
    }

    pub fn with_repository(mut self, repository: impl TaskRepository + 'static) -> Self {
        self.repository = Some(Box::new(repository));
        self
    }

    pub fn with_sync(mut self, sync: SyncHandle) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn now(&self) -> NaiveDateTime {
        (self.now)()
    }

    fn today(&self) -> NaiveDate {
        self.now().date()
    }

    pub fn tasks(&self) -> &[Task] {
        self.store.all()
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.store.find(id)
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn sync_handle(&self) -> Option<&SyncHandle> {
        self.sync.as_ref()
    }

    fn commit(&self) {
        if let Some(repo) = &self.repository {
            if let Err(e) = repo.save(self.store.all()) {
                tracing::warn!(error = %e, "failed to save tasks; in-memory state kept");
            }
        }
        if let Some(sync) = &self.sync {
            sync.notify_changed(self.store.all().to_vec());
        }
    }

    fn committed(&self, result: Result<OperationResult>) -> OperationResult {
        match result {
            Ok(r) => {
                self.commit();
                r
            }
            Err(e) => {
                tracing::debug!(error = %e, "operation rejected");
                OperationResult::failed(e)
            }
        }
    }

    pub fn add_task(&mut self, draft: TaskDraft) -> OperationResult {
        let draft = draft.on_or(self.today());
        let result = self
            .store
            .add(draft)
            .map(|(task, report)| OperationResult::ok(task).with_displaced(report));
        self.committed(result)
    }

    pub fn update_task(&mut self, id: &str, patch: TaskPatch) -> OperationResult {
        let result = self
            .store
            .update(id, patch)
            .map(|(task, report)| OperationResult::ok(task).with_displaced(report));
        self.committed(result)
    }

    /// Mark a task completed.
    ///
    /// With `actual` set on a scheduled task the block is adjusted to the real
    /// finish: finishing early shortens it, finishing late extends it and
    /// pushes later tasks. The late case needs confirmation first.
    pub fn complete_task(
        &mut self,
        id: &str,
        actual: Option<NaiveDateTime>,
        confirmed: bool,
    ) -> OperationResult {
        let Some(task) = self.store.find(id) else {
            return OperationResult::failed(PlannerError::InvalidReference(id.to_string()));
        };
        if task.is_completed() {
            return OperationResult::failed(PlannerError::validation("Task is already completed"));
        }

        let adjustment = match (task.block(), actual) {
            (Some(block), Some(actual)) => completion_adjustment(block, actual),
            _ => CompletionAdjustment::Unchanged,
        };

        if let CompletionAdjustment::RunningLate { new_end } = adjustment {
            if !confirmed {
                let question = format!(
                    "\"{}\" ran late. Extend it to {} and push the tasks after it?",
                    task.description,
                    format_instant_12h(new_end)
                );
                return OperationResult::confirm(
                    ConfirmationType::CompleteLate,
                    question,
                    Some(task.clone()),
                );
            }
        }

        let result = self.apply_completion(id, adjustment);
        self.committed(result)
    }

    fn apply_completion(
        &mut self,
        id: &str,
        adjustment: CompletionAdjustment,
    ) -> Result<OperationResult> {
        let task = self
            .store
            .find_mut(id)
            .ok_or_else(|| PlannerError::InvalidReference(id.to_string()))?;
        task.status = TaskStatus::Completed;
        task.editing = false;
        task.confirming_delete = false;

        let report = match adjustment {
            CompletionAdjustment::RunningLate { new_end } => {
                if let Some(block) = task.block_mut() {
                    block.set_end(new_end);
                }
                self.store.reschedule_from(id)
            }
            CompletionAdjustment::FinishedEarly { new_end } => {
                if let Some(block) = task.block_mut() {
                    block.set_end(new_end);
                }
                CascadeReport::default()
            }
            CompletionAdjustment::Unchanged => CascadeReport::default(),
        };

        tracing::info!(task = %id, displaced = report.len(), "task completed");
        let task = self
            .store
            .find(id)
            .cloned()
            .ok_or_else(|| PlannerError::InvalidReference(id.to_string()))?;
        Ok(OperationResult::ok(task).with_displaced(report))
    }

    pub fn delete_task(&mut self, id: &str, confirmed: bool) -> OperationResult {
        match self.store.remove(id, confirmed) {
            Ok(Some(removed)) => {
                self.commit();
                OperationResult::ok(removed)
            }
            Ok(None) => {
                let task = self.store.find(id).cloned();
                let name = task.as_ref().map_or(id, |t| t.description.as_str());
                let question = format!("Delete \"{name}\"?");
                OperationResult::confirm(ConfirmationType::Delete, question, task)
            }
            Err(e) => OperationResult::failed(e),
        }
    }

    pub fn cancel_delete(&mut self, id: &str) -> OperationResult {
        match self.store.find_mut(id) {
            Some(task) => {
                task.confirming_delete = false;
                OperationResult::ok(task.clone())
            }
            None => OperationResult::failed(PlannerError::InvalidReference(id.to_string())),
        }
    }

    pub fn delete_all(&mut self, confirmed: bool) -> OperationResult {
        self.clear(ClearScope::All, confirmed)
    }

    /// Remove every task in `scope`. Always asks first when anything would go.
    pub fn clear(&mut self, scope: ClearScope, confirmed: bool) -> OperationResult {
        let doomed = self.store.all().iter().filter(|t| scope.removes(t)).count();
        if doomed == 0 {
            return OperationResult::ok_list(self.store.all().to_vec());
        }
        if !confirmed {
            let what = match scope {
                ClearScope::All => "tasks",
                ClearScope::Scheduled => "scheduled tasks",
                ClearScope::Completed => "completed tasks",
            };
            return OperationResult::confirm(
                ConfirmationType::DeleteAll,
                format!("Delete {doomed} {what}?"),
                None,
            );
        }

        let remaining: Vec<Task> = self
            .store
            .all()
            .iter()
            .filter(|t| !scope.removes(t))
            .cloned()
            .collect();
        self.store.set_all(remaining);
        tracing::info!(removed = doomed, ?scope, "tasks cleared");
        self.commit();
        OperationResult::ok_list(self.store.all().to_vec())
    }

    /// Flag a task as being edited. Editing tasks are cascade barriers.
    pub fn begin_edit(&mut self, id: &str) -> OperationResult {
        self.set_editing(id, true)
    }

    pub fn cancel_edit(&mut self, id: &str) -> OperationResult {
        self.set_editing(id, false)
    }

    fn set_editing(&mut self, id: &str, editing: bool) -> OperationResult {
        match self.store.find_mut(id) {
            Some(task) => {
                task.editing = editing;
                OperationResult::ok(task.clone())
            }
            None => OperationResult::failed(PlannerError::InvalidReference(id.to_string())),
        }
    }

    /// Flip a scheduled task's lock. Unlocking re-checks the tasks it overlaps.
    pub fn toggle_lock(&mut self, id: &str) -> OperationResult {
        let result = self.toggle_lock_inner(id);
        self.committed(result)
    }

    fn toggle_lock_inner(&mut self, id: &str) -> Result<OperationResult> {
        let task = self
            .store
            .find_mut(id)
            .ok_or_else(|| PlannerError::InvalidReference(id.to_string()))?;
        let block = task
            .block_mut()
            .ok_or_else(|| PlannerError::validation("Only scheduled tasks can be locked"))?;
        block.locked = !block.locked;
        let locked = block.locked;

        let report = if locked || task.is_completed() {
            CascadeReport::default()
        } else {
            self.store.reschedule_from(id)
        };
        tracing::info!(task = %id, locked, "lock toggled");
        let task = self
            .store
            .find(id)
            .cloned()
            .ok_or_else(|| PlannerError::InvalidReference(id.to_string()))?;
        Ok(OperationResult::ok(task).with_displaced(report))
    }

    /// Move a scheduled task to the backlog at medium priority.
    pub fn unschedule_task(&mut self, id: &str) -> OperationResult {
        let result = self
            .store
            .unschedule(id, Priority::default())
            .map(OperationResult::ok);
        self.committed(result)
    }

    /// Put a backlog task on today's timeline.
    pub fn schedule_task(
        &mut self,
        id: &str,
        start_time: &str,
        hours: &str,
        minutes: &str,
    ) -> OperationResult {
        let today = self.today();
        let result = self
            .store
            .schedule(id, start_time, Some(today), hours, minutes)
            .map(|(task, report)| OperationResult::ok(task).with_displaced(report));
        self.committed(result)
    }

    pub fn toggle_unscheduled_completion(&mut self, id: &str) -> OperationResult {
        let result = match self.store.find_mut(id) {
            None => Err(PlannerError::InvalidReference(id.to_string())),
            Some(task) if task.is_scheduled() => Err(PlannerError::validation(
                "Scheduled tasks are completed with complete_task",
            )),
            Some(task) => {
                task.status = match task.status {
                    TaskStatus::Completed => TaskStatus::Incomplete,
                    TaskStatus::Incomplete => TaskStatus::Completed,
                };
                Ok(OperationResult::ok(task.clone()))
            }
        };
        self.committed(result)
    }

    /// Preview the slot a form is about to claim. `exclude_id` skips the task
    /// being edited; its current day is used for the start time.
    pub fn check_overlap(
        &self,
        start_time: &str,
        hours: &str,
        minutes: &str,
        exclude_id: Option<&str>,
    ) -> Result<OverlapCheck> {
        let day = exclude_id
            .and_then(|id| self.store.find(id))
            .and_then(Task::start)
            .map_or_else(|| self.today(), |s| s.date());
        let start = instant_from(start_time, Some(day))?;
        let duration = parse_duration(hours, minutes, false)?;
        let range = TimeRange::new(start, add_minutes(start, duration.into()));

        let hits = find_conflicts(&range, self.store.all(), exclude_id);
        let warning = overlap_warning(&hits);
        Ok(OverlapCheck {
            range,
            end_hint: format!("Ends at {}", format_instant_12h(range.end)),
            conflicts: hits.into_iter().cloned().collect(),
            warning,
        })
    }

    pub fn gaps(&self) -> GapReport {
        compute_gaps(self.store.all(), self.now())
    }

    fn gap(&self, index: usize) -> Result<Gap> {
        self.gaps()
            .gaps
            .into_iter()
            .nth(index)
            .ok_or_else(|| PlannerError::validation(format!("No free gap #{}", index + 1)))
    }

    /// Backlog tasks offered for gap `index`: incomplete ones, highest
    /// priority first.
    pub fn gap_candidates(&self, index: usize) -> Result<Vec<Task>> {
        self.gap(index)?;
        let mut candidates: Vec<Task> = self
            .store
            .unscheduled()
            .into_iter()
            .filter(|t| !t.is_completed())
            .cloned()
            .collect();
        candidates.sort_by_key(|t| t.backlog().map(|b| b.priority));
        Ok(candidates)
    }

    /// Put backlog task `id` at the start of gap `index`. It runs for its
    /// estimate, or fills the gap when it has none; a longer estimate pushes
    /// the tasks after the gap like any insert.
    pub fn schedule_into_gap(&mut self, index: usize, id: &str) -> OperationResult {
        let result = self.place_in_gap(index, id);
        self.committed(result)
    }

    fn place_in_gap(&mut self, index: usize, id: &str) -> Result<OperationResult> {
        let gap = self.gap(index)?;
        let task = self
            .store
            .find(id)
            .ok_or_else(|| PlannerError::InvalidReference(id.to_string()))?;
        if task.is_scheduled() {
            return Err(PlannerError::validation("Task is already scheduled"));
        }
        if task.is_completed() {
            return Err(PlannerError::validation("Completed tasks cannot be scheduled"));
        }

        let minutes = task
            .backlog()
            .and_then(|b| b.est_duration)
            .filter(|m| *m > 0)
            .unwrap_or(gap.duration);
        let (task, report) = self.store.schedule(
            id,
            &format_clock(gap.start),
            Some(gap.start.date()),
            &(minutes / 60).to_string(),
            &(minutes % 60).to_string(),
        )?;
        tracing::info!(task = %id, gap = index, minutes, "backlog task placed in gap");
        Ok(OperationResult::ok(task).with_displaced(report))
    }

    /// "HH:MM" for a new task's start field: now, rounded up to 5 minutes.
    pub fn suggested_start_time(&self) -> String {
        format_clock(round_up_to_5_minutes(self.now()))
    }

    pub fn scheduled_count(&self) -> usize {
        self.store.scheduled().len()
    }
}
