//! Sync backend that mirrors a room into a directory, typically one that a
//! file-sync tool replicates between machines.

use anyhow::{Context, Result};
use async_trait::async_trait;
use fortudo_core::{SyncBackend, Task};
use std::path::{Path, PathBuf};

use crate::state::room_file_name;

#[derive(Debug, Clone)]
pub struct DirectorySync {
    target: PathBuf,
}

impl DirectorySync {
    pub fn new(dir: &Path, room: &str) -> Result<Self> {
        Ok(Self {
            target: dir.join(room_file_name(room)?),
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }
}

#[async_trait]
impl SyncBackend for DirectorySync {
    async fn push(&self, tasks: Vec<Task>) -> Result<()> {
        if let Some(parent) = self.target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let json = serde_json::to_vec_pretty(&tasks).context("serialize tasks")?;
        let tmp = self.target.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.target)
            .await
            .with_context(|| format!("rename into {}", self.target.display()))?;
        tracing::debug!(path = %self.target.display(), tasks = tasks.len(), "room mirrored");
        Ok(())
    }
}
