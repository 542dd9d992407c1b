use anyhow::Result;
use chrono::Local;
use clap::Parser;
use fortudo_core::time::wall_clock_now;
use fortudo_core::{spawn_sync_worker, JsonFileRepository, Planner, SyncStatus};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod mirror;
mod prompt;
mod render;
mod state;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config()?;

    // Logs go to stderr; stdout is for command output.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log.filter)),
        )
        .init();

    let room = cli.room.unwrap_or_else(|| cfg.planner.room.clone());
    let path = state::room_path(&room)?;
    tracing::debug!(room = %room, path = %path.display(), "opening room");

    let mut planner = Planner::load(JsonFileRepository::new(path))?;

    let tz = cfg.planner.timezone.trim().to_string();
    if !tz.is_empty() {
        wall_clock_now(&tz)?;
        planner = planner.with_clock(Arc::new(move || {
            wall_clock_now(&tz).unwrap_or_else(|_| Local::now().naive_local())
        }));
    }

    let mut worker = None;
    if let Some(dir) = cfg.sync.target() {
        let backend = mirror::DirectorySync::new(dir, &room)?;
        let (handle, join) = spawn_sync_worker(backend, cfg.sync.debounce());
        worker = Some((join, handle.subscribe()));
        planner = planner.with_sync(handle);
    }

    let assume_yes = cli.yes;
    let mut confirm = |q: &str| prompt::confirm(q, assume_yes);
    let command = cli.command.unwrap_or(Command::List { json: false });
    let result = commands::run(&mut planner, command, &mut confirm);

    // Dropping the planner closes the sync channel; the worker flushes and exits.
    drop(planner);
    if let Some((join, status)) = worker {
        if let Err(e) = join.await {
            tracing::warn!(error = %e, "sync worker did not finish cleanly");
        }
        let status = *status.borrow();
        tracing::debug!(%status, "sync finished");
        if status == SyncStatus::Error {
            eprintln!(
                "warning: changes were saved locally but the sync mirror could not be written"
            );
        }
    }

    print!("{}", result?);
    Ok(())
}
