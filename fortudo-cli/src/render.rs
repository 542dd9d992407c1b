//! Plain-text views of the planner for the terminal.

use fortudo_core::time::{format_duration, format_instant_12h};
use fortudo_core::{CurrentMarker, Gap, GapReport, Task, TaskKind};

/// First 8 characters of an id; enough to be unique in practice.
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn check(task: &Task) -> &'static str {
    if task.is_completed() { "[x]" } else { "[ ]" }
}

pub fn task_line(task: &Task) -> String {
    match &task.kind {
        TaskKind::Scheduled(b) => {
            let mut line = format!(
                "{} {} - {}  {} ({})",
                check(task),
                format_instant_12h(b.start),
                format_instant_12h(b.end),
                task.description,
                format_duration(b.duration),
            );
            if b.locked {
                line.push_str(" [locked]");
            }
            line.push_str(&format!("  #{}", short_id(&task.id)));
            line
        }
        TaskKind::Unscheduled(b) => {
            let estimate = b
                .est_duration
                .map(|m| format!(" (~{})", format_duration(m)))
                .unwrap_or_default();
            format!(
                "{} {:<6} {}{}  #{}",
                check(task),
                b.priority.to_string(),
                task.description,
                estimate,
                short_id(&task.id)
            )
        }
    }
}

fn gap_line(gap: &Gap, current: bool) -> String {
    let marker = if current { "  <- now" } else { "" };
    format!("      ... {} ...{marker}", gap.label())
}

/// Scheduled tasks in order, with free gaps and the "now" marker between them.
pub fn schedule(tasks: &[Task], gaps: &GapReport) -> String {
    let scheduled: Vec<&Task> = tasks.iter().filter(|t| t.is_scheduled()).collect();
    if scheduled.is_empty() {
        return "No scheduled tasks.\n".to_string();
    }

    let mut out = String::new();
    if gaps.current == CurrentMarker::BeforeFirst {
        out.push_str("      <- now (before first task)\n");
    }
    for task in scheduled {
        out.push_str(&task_line(task));
        out.push('\n');
        for (i, gap) in gaps.gaps.iter().enumerate() {
            if gap.after_task_id == task.id {
                out.push_str(&gap_line(gap, gaps.current == CurrentMarker::Gap(i)));
                out.push('\n');
            }
        }
    }
    if gaps.current == CurrentMarker::AfterLast {
        out.push_str("      <- now (after last task)\n");
    }
    out
}

pub fn backlog(tasks: &[Task]) -> String {
    let mut out = String::new();
    for task in tasks.iter().filter(|t| !t.is_scheduled()) {
        out.push_str(&task_line(task));
        out.push('\n');
    }
    if out.is_empty() {
        out.push_str("Backlog is empty.\n");
    }
    out
}

pub fn gaps(report: &GapReport) -> String {
    if report.gaps.is_empty() {
        return "No free time between tasks.\n".to_string();
    }
    let mut out = String::new();
    for (i, gap) in report.gaps.iter().enumerate() {
        let now = if report.current == CurrentMarker::Gap(i) { "  <- now" } else { "" };
        out.push_str(&format!("{}. {}{now}\n", i + 1, gap_range(gap)));
    }
    out
}

fn gap_range(gap: &Gap) -> String {
    format!(
        "{} - {}  {}",
        format_instant_12h(gap.start),
        format_instant_12h(gap.end),
        gap.label()
    )
}

/// Backlog tasks that can go into gap number `n`.
pub fn gap_picker(n: usize, gap: &Gap, candidates: &[Task]) -> String {
    let mut out = format!("Gap {n}: {}\n", gap_range(gap));
    if candidates.is_empty() {
        out.push_str("Nothing in the backlog to put here.\n");
        return out;
    }
    for task in candidates {
        out.push_str(&task_line(task));
        out.push('\n');
    }
    out.push_str(&format!("Pick one with `fortudo gaps --fill {n} <id>`.\n"));
    out
}
