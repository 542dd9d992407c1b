use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use fortudo_core::{ClearScope, Priority};

pub const VERSION: &str =
    concat!(env!("CARGO_PKG_VERSION"), " (", env!("FORTUDO_BUILD_SHA"), ")");

#[derive(Parser, Debug)]
#[command(name = "fortudo", version = VERSION, about = "Time-block your day from the terminal")]
pub struct Cli {
    /// Task list to use (default: planner.room from config)
    #[arg(long, global = true)]
    pub room: Option<String>,

    /// Answer yes to every confirmation prompt
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a task. Without --start it goes to the backlog.
    Add(AddArgs),

    /// Show the schedule and the backlog (default)
    List {
        /// Dump the raw task list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Change a task's description, time, duration or priority
    Edit(EditArgs),

    /// Mark a task done
    Done {
        id: String,
        /// When it actually finished ("now", "17:40" or "5:40 PM")
        #[arg(long)]
        at: Option<String>,
    },

    /// Mark a completed backlog task as not done
    Reopen { id: String },

    Delete { id: String },

    /// Delete many tasks at once
    Clear {
        /// all, scheduled or completed
        #[arg(long, default_value = "all")]
        scope: ClearScope,
    },

    /// Lock or unlock a scheduled task so it is never pushed around
    Lock { id: String },

    /// Move a scheduled task to the backlog
    Unschedule { id: String },

    /// Put a backlog task on today's timeline
    Schedule {
        id: String,
        #[command(flatten)]
        slot: SlotArgs,
    },

    /// Show free time between scheduled tasks, or fill a gap from the backlog
    Gaps {
        /// Gap number from the listing
        #[arg(long, value_name = "N")]
        fill: Option<usize>,
        /// Backlog task to put in the gap; without it the candidates are listed
        #[arg(requires = "fill")]
        id: Option<String>,
    },

    /// Preview whether a slot collides with anything
    Check {
        #[command(flatten)]
        slot: SlotArgs,
        /// Ignore this task (e.g. the one being moved)
        #[arg(long)]
        exclude: Option<String>,
    },

    /// Write a default ~/.fortudo/config.toml
    InitConfig,
}

#[derive(Args, Debug, Clone)]
pub struct SlotArgs {
    /// "14:30", "2:30 PM" or "now"
    #[arg(long)]
    pub start: String,
    #[arg(long)]
    pub hours: Option<String>,
    #[arg(long)]
    pub minutes: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    pub description: String,
    /// "14:30", "2:30 PM" or "now"
    #[arg(long)]
    pub start: Option<String>,
    /// Day for --start (default: today)
    #[arg(long)]
    pub date: Option<NaiveDate>,
    #[arg(long)]
    pub hours: Option<String>,
    #[arg(long)]
    pub minutes: Option<String>,
    /// Backlog only
    #[arg(long, default_value = "medium")]
    pub priority: Priority,
}

#[derive(Args, Debug, Clone, Default)]
pub struct EditArgs {
    pub id: String,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub start: Option<String>,
    #[arg(long)]
    pub hours: Option<String>,
    #[arg(long)]
    pub minutes: Option<String>,
    #[arg(long)]
    pub priority: Option<Priority>,
}
