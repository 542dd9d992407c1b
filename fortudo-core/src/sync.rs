//! Debounced background sync.
//!
//! The planner hands every committed snapshot to a [`SyncHandle`]. A worker
//! task waits until no new snapshot has arrived for the debounce window, then
//! pushes only the latest one. Dropping every handle flushes whatever is still
//! pending and stops the worker.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::task::Task;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Idle,
    /// Local changes waiting out the debounce window.
    Unsynced,
    Syncing,
    Synced,
    Error,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Unsynced => "unsynced",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Synced => "synced",
            SyncStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Remote side of the sync. Implementations replace the remote copy with
/// `tasks` wholesale.
#[async_trait]
pub trait SyncBackend: Send + Sync + 'static {
    async fn push(&self, tasks: Vec<Task>) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct SyncHandle {
    tx: mpsc::UnboundedSender<Vec<Task>>,
    status: watch::Receiver<SyncStatus>,
}

impl SyncHandle {
    /// Queue `snapshot` for the next push. Never blocks.
    pub fn notify_changed(&self, snapshot: Vec<Task>) {
        if self.tx.send(snapshot).is_err() {
            tracing::warn!("sync worker has stopped; change not queued");
        }
    }

    pub fn status(&self) -> SyncStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.clone()
    }
}

/// Start the worker on the current tokio runtime.
///
/// Await the returned `JoinHandle` after dropping all `SyncHandle`s to make
/// sure the final flush has completed.
pub fn spawn_sync_worker<B: SyncBackend>(
    backend: B,
    debounce: Duration,
) -> (SyncHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = watch::channel(SyncStatus::Idle);
    let worker = tokio::spawn(run_worker(backend, debounce, rx, status_tx));
    (
        SyncHandle {
            tx,
            status: status_rx,
        },
        worker,
    )
}

async fn run_worker<B: SyncBackend>(
    backend: B,
    debounce: Duration,
    mut rx: mpsc::UnboundedReceiver<Vec<Task>>,
    status: watch::Sender<SyncStatus>,
) {
    while let Some(mut latest) = rx.recv().await {
        status.send_replace(SyncStatus::Unsynced);

        // Trailing debounce: each new snapshot restarts the timer.
        loop {
            tokio::select! {
                next = rx.recv() => match next {
                    Some(snapshot) => latest = snapshot,
                    None => break,
                },
                _ = tokio::time::sleep(debounce) => break,
            }
        }

        status.send_replace(SyncStatus::Syncing);
        let count = latest.len();
        match backend.push(latest).await {
            Ok(()) => {
                tracing::debug!(tasks = count, "sync push complete");
                status.send_replace(SyncStatus::Synced);
            }
            Err(e) => {
                tracing::warn!(error = %e, "sync push failed");
                status.send_replace(SyncStatus::Error);
            }
        }
    }
    tracing::debug!("sync worker stopped");
}
