//! Durable storage seam. The planner saves after every committed mutation and
//! only logs failures; the in-memory state is authoritative.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

use crate::task::Task;

pub trait TaskRepository {
    /// Called once at startup.
    fn load(&self) -> Result<Vec<Task>>;
    fn save(&self, tasks: &[Task]) -> Result<()>;
}

/// One pretty-printed JSON array per file. A missing file loads as empty.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TaskRepository for JsonFileRepository {
    fn load(&self) -> Result<Vec<Task>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let s = fs::read_to_string(&self.path)
            .with_context(|| format!("read {}", self.path.display()))?;
        if s.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&s).with_context(|| format!("parse {}", self.path.display()))
    }

    fn save(&self, tasks: &[Task]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(tasks).context("serialize tasks")?;
        // Write-then-rename so a crash never leaves a half-written file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("rename {} -> {}", tmp.display(), self.path.display()))?;
        Ok(())
    }
}

/// Shared in-memory repository; clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    tasks: Vec<Task>,
    saves: usize,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let repo = Self::default();
        if let Ok(mut state) = repo.inner.lock() {
            state.tasks = tasks;
        }
        repo
    }

    pub fn snapshot(&self) -> Vec<Task> {
        self.inner
            .lock()
            .map(|s| s.tasks.clone())
            .unwrap_or_default()
    }

    pub fn save_count(&self) -> usize {
        self.inner.lock().map(|s| s.saves).unwrap_or_default()
    }
}

impl TaskRepository for MemoryRepository {
    fn load(&self) -> Result<Vec<Task>> {
        Ok(self.snapshot())
    }

    fn save(&self, tasks: &[Task]) -> Result<()> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("memory repository lock poisoned"))?;
        state.tasks = tasks.to_vec();
        state.saves += 1;
        Ok(())
    }
}
