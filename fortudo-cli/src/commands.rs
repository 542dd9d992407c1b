//! Subcommand handlers. Each returns the text to print; confirmation prompts
//! go through the `Confirm` callback so they can be answered in tests.

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use fortudo_core::time::{format_clock, format_instant_12h, instant_from, to_24_hour};
use fortudo_core::{OperationResult, Planner, Task, TaskDraft, TaskPatch};

use crate::cli::{AddArgs, Command, EditArgs, SlotArgs};
use crate::{config, render};

pub type Confirm<'a> = &'a mut dyn FnMut(&str) -> Result<bool>;

pub fn run(p: &mut Planner, command: Command, confirm: Confirm) -> Result<String> {
    match command {
        Command::Add(args) => add(p, args, confirm),
        Command::List { json } => list(p, json),
        Command::Edit(args) => edit(p, args, confirm),
        Command::Done { id, at } => done(p, &id, at.as_deref(), confirm),
        Command::Reopen { id } => reopen(p, &id),
        Command::Delete { id } => delete(p, &id, confirm),
        Command::Clear { scope } => {
            let mut r = p.clear(scope, false);
            if r.requires_confirmation {
                if !confirm(&question(&r))? {
                    return Ok("Nothing deleted.\n".to_string());
                }
                r = p.clear(scope, true);
            }
            let left = r.tasks.map_or(0, |t| t.len());
            Ok(format!("{left} task(s) left.\n"))
        }
        Command::Lock { id } => {
            let id = resolve_id(p, &id)?;
            let r = p.toggle_lock(&id);
            let verb = match &r.task {
                Some(t) if t.is_locked() => "Locked",
                _ => "Unlocked",
            };
            outcome(p, r, verb)
        }
        Command::Unschedule { id } => {
            let id = resolve_id(p, &id)?;
            let r = p.unschedule_task(&id);
            outcome(p, r, "Moved to backlog")
        }
        Command::Schedule { id, slot } => schedule(p, &id, slot, confirm),
        Command::Gaps { fill: None, .. } => Ok(render::gaps(&p.gaps())),
        Command::Gaps { fill: Some(n), id } => fill_gap(p, n, id.as_deref(), confirm),
        Command::Check { slot, exclude } => {
            let exclude = exclude.map(|e| resolve_id(p, &e)).transpose()?;
            let start = start_time(p, &slot.start);
            let (hours, minutes) = raw_duration(&slot);
            let check = p.check_overlap(&start, &hours, &minutes, exclude.as_deref())?;
            let mut out = format!("{}\n", check.end_hint);
            out.push_str(check.warning.as_deref().unwrap_or("No conflicts."));
            out.push('\n');
            Ok(out)
        }
        Command::InitConfig => {
            config::init_config()?;
            Ok(String::new())
        }
    }
}

/// Exact id, or a unique prefix of one. A leading '#' is ignored.
pub fn resolve_id(p: &Planner, raw: &str) -> Result<String> {
    let prefix = raw.trim().trim_start_matches('#');
    if prefix.is_empty() {
        bail!("task id is required");
    }
    if let Some(t) = p.task(prefix) {
        return Ok(t.id.clone());
    }
    let hits: Vec<&Task> = p
        .tasks()
        .iter()
        .filter(|t| t.id.starts_with(prefix))
        .collect();
    match hits.as_slice() {
        [one] => Ok(one.id.clone()),
        [] => bail!("no task matches id {prefix:?}"),
        many => bail!("id {prefix:?} is ambiguous ({} matches)", many.len()),
    }
}

/// Accepts "now", 12-hour input, or passes the text through for validation.
fn start_time(p: &Planner, raw: &str) -> String {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("now") {
        return p.suggested_start_time();
    }
    to_24_hour(raw).unwrap_or_else(|_| raw.to_string())
}

fn raw_duration(slot: &SlotArgs) -> (String, String) {
    (
        slot.hours.clone().unwrap_or_default(),
        slot.minutes.clone().unwrap_or_default(),
    )
}

/// Split a minute total into the (hours, minutes) form fields.
fn split_minutes(total: i64) -> (String, String) {
    ((total / 60).to_string(), (total % 60).to_string())
}

fn question(r: &OperationResult) -> String {
    r.reason.clone().unwrap_or_else(|| "Are you sure?".to_string())
}

/// Turn an operation result into output, or into an error carrying its reason.
fn outcome(p: &Planner, r: OperationResult, verb: &str) -> Result<String> {
    if !r.success {
        bail!("{}", r.reason.unwrap_or_else(|| "operation failed".to_string()));
    }
    let mut out = String::new();
    if let Some(task) = &r.task {
        out.push_str(&format!("{verb}: {}\n", render::task_line(task)));
    }
    for d in &r.displaced {
        let name = p.task(&d.id).map_or(d.id.as_str(), |t| t.description.as_str());
        out.push_str(&format!(
            "  moved {name}: {} -> {}\n",
            format_instant_12h(d.from),
            format_instant_12h(d.to)
        ));
    }
    Ok(out)
}

/// Ask before claiming a slot that is already taken. `Ok(true)` means go ahead.
fn confirm_slot(
    p: &Planner,
    start: &str,
    hours: &str,
    minutes: &str,
    exclude: Option<&str>,
    confirm: Confirm,
) -> Result<bool> {
    // Malformed input is reported by the operation itself.
    let Ok(check) = p.check_overlap(start, hours, minutes, exclude) else {
        return Ok(true);
    };
    match check.warning {
        None => Ok(true),
        Some(warning) => confirm(&format!(
            "{warning}. {}. Continue and push the overlapping tasks later?",
            check.end_hint
        )),
    }
}

fn add(p: &mut Planner, args: AddArgs, confirm: Confirm) -> Result<String> {
    let hours = args.hours.unwrap_or_default();
    let minutes = args.minutes.unwrap_or_default();

    let draft = match args.start {
        Some(start) => {
            let start = start_time(p, &start);
            let today = p.now().date();
            let preview = args.date.is_none_or(|d| d == today);
            if preview && !confirm_slot(p, &start, &hours, &minutes, None, confirm)? {
                return Ok("Not added.\n".to_string());
            }
            let draft = TaskDraft::Scheduled {
                description: args.description,
                start_time: start,
                date: None,
                duration_hours: hours,
                duration_minutes: minutes,
            };
            match args.date {
                Some(d) => draft.on(d),
                None => draft,
            }
        }
        None => TaskDraft::Unscheduled {
            description: args.description,
            priority: args.priority,
            est_hours: hours,
            est_minutes: minutes,
        },
    };

    let r = p.add_task(draft);
    outcome(p, r, "Added")
}

fn list(p: &Planner, json: bool) -> Result<String> {
    if json {
        let mut s = serde_json::to_string_pretty(p.tasks()).context("serialize tasks")?;
        s.push('\n');
        return Ok(s);
    }
    let mut out = String::from("Schedule\n");
    out.push_str(&render::schedule(p.tasks(), &p.gaps()));
    out.push_str("\nBacklog\n");
    out.push_str(&render::backlog(p.tasks()));
    out.push_str(&format!("\nNext start: {}\n", p.suggested_start_time()));
    Ok(out)
}

fn edit(p: &mut Planner, args: EditArgs, confirm: Confirm) -> Result<String> {
    let id = resolve_id(p, &args.id)?;
    let Some(task) = p.task(&id).cloned() else {
        bail!("no task matches id {:?}", args.id);
    };

    let mut patch = TaskPatch::default();
    if let Some(d) = args.description {
        patch = patch.with_description(d);
    }
    if let Some(s) = &args.start {
        patch = patch.with_start_time(start_time(p, s));
    }
    if args.hours.is_some() || args.minutes.is_some() {
        patch.duration = Some((
            args.hours.unwrap_or_else(|| "0".to_string()),
            args.minutes.unwrap_or_else(|| "0".to_string()),
        ));
    }
    if let Some(priority) = args.priority {
        patch = patch.with_priority(priority);
    }
    if patch == TaskPatch::default() {
        bail!("nothing to change; pass --description, --start, --hours, --minutes or --priority");
    }

    p.begin_edit(&id);

    if let Some(block) = task.block().filter(|_| !task.is_completed()) {
        let moves = patch.start_time.is_some() || patch.duration.is_some();
        if moves {
            let start = patch
                .start_time
                .clone()
                .unwrap_or_else(|| format_clock(block.start));
            let (hours, minutes) = patch
                .duration
                .clone()
                .unwrap_or_else(|| split_minutes(block.duration));
            if !confirm_slot(p, &start, &hours, &minutes, Some(&id), confirm)? {
                p.cancel_edit(&id);
                return Ok("Not changed.\n".to_string());
            }
        }
    }

    let r = p.update_task(&id, patch);
    if !r.success {
        p.cancel_edit(&id);
    }
    outcome(p, r, "Updated")
}

fn completion_instant(p: &Planner, task: &Task, at: &str) -> Result<NaiveDateTime> {
    if at.trim().eq_ignore_ascii_case("now") {
        return Ok(p.now());
    }
    let day = task.start().map_or_else(|| p.now().date(), |s| s.date());
    let hhmm = to_24_hour(at).unwrap_or_else(|_| at.trim().to_string());
    Ok(instant_from(&hhmm, Some(day))?)
}

fn done(p: &mut Planner, raw_id: &str, at: Option<&str>, confirm: Confirm) -> Result<String> {
    let id = resolve_id(p, raw_id)?;
    let Some(task) = p.task(&id).cloned() else {
        bail!("no task matches id {raw_id:?}");
    };

    if !task.is_scheduled() {
        if task.is_completed() {
            bail!("\"{}\" is already done; use `fortudo reopen`", task.description);
        }
        let r = p.toggle_unscheduled_completion(&id);
        return outcome(p, r, "Done");
    }

    let actual = at.map(|a| completion_instant(p, &task, a)).transpose()?;
    let mut r = p.complete_task(&id, actual, false);
    if r.requires_confirmation {
        if !confirm(&question(&r))? {
            return Ok("Left as is.\n".to_string());
        }
        r = p.complete_task(&id, actual, true);
    }
    outcome(p, r, "Done")
}

fn reopen(p: &mut Planner, raw_id: &str) -> Result<String> {
    let id = resolve_id(p, raw_id)?;
    match p.task(&id) {
        Some(t) if t.is_scheduled() => bail!("only backlog tasks can be reopened"),
        Some(t) if !t.is_completed() => bail!("\"{}\" is not done", t.description),
        _ => {}
    }
    let r = p.toggle_unscheduled_completion(&id);
    outcome(p, r, "Reopened")
}

fn delete(p: &mut Planner, raw_id: &str, confirm: Confirm) -> Result<String> {
    let id = resolve_id(p, raw_id)?;
    let r = p.delete_task(&id, false);
    if !r.requires_confirmation {
        return outcome(p, r, "Deleted");
    }
    if !confirm(&question(&r))? {
        p.cancel_delete(&id);
        return Ok("Kept.\n".to_string());
    }
    let r = p.delete_task(&id, true);
    outcome(p, r, "Deleted")
}

fn schedule(p: &mut Planner, raw_id: &str, slot: SlotArgs, confirm: Confirm) -> Result<String> {
    let id = resolve_id(p, raw_id)?;
    let start = start_time(p, &slot.start);
    let (mut hours, mut minutes) = raw_duration(&slot);
    if hours.is_empty() && minutes.is_empty() {
        // Fall back to the backlog estimate.
        if let Some(est) = p.task(&id).and_then(|t| t.backlog()).and_then(|b| b.est_duration) {
            (hours, minutes) = split_minutes(est);
        }
    }
    if !confirm_slot(p, &start, &hours, &minutes, Some(&id), confirm)? {
        return Ok("Not scheduled.\n".to_string());
    }
    let r = p.schedule_task(&id, &start, &hours, &minutes);
    outcome(p, r, "Scheduled")
}

/// `n` is the 1-based number shown by `fortudo gaps`.
fn fill_gap(p: &mut Planner, n: usize, raw_id: Option<&str>, confirm: Confirm) -> Result<String> {
    let Some(index) = n.checked_sub(1) else {
        bail!("gaps are numbered from 1");
    };
    let report = p.gaps();
    let Some(gap) = report.gaps.get(index) else {
        bail!("no gap #{n}; `fortudo gaps` lists {}", report.gaps.len());
    };

    let Some(raw_id) = raw_id else {
        let candidates = p.gap_candidates(index)?;
        return Ok(render::gap_picker(n, gap, &candidates));
    };

    let id = resolve_id(p, raw_id)?;
    let estimate = p
        .task(&id)
        .and_then(|t| t.backlog())
        .and_then(|b| b.est_duration)
        .filter(|m| *m > 0);
    if let Some(est) = estimate {
        let (hours, minutes) = split_minutes(est);
        let start = format_clock(gap.start);
        if !confirm_slot(p, &start, &hours, &minutes, Some(&id), confirm)? {
            return Ok("Not scheduled.\n".to_string());
        }
    }
    let r = p.schedule_into_gap(index, &id);
    outcome(p, r, "Scheduled")
}
