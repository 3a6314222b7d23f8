//! Revert algorithm.
//!
//! 1. pick the target execution
//! 2. back up the live input as `input.tgz.reverted`
//! 3. restore the live input from the target's snapshot
//! 4. revert blueprints with uncommitted changes, or delete those without history
//! 5. delete the objects the reverted input added, interface maps before
//!    logical devices; objects whose template changed are deleted too and
//!    recreated by the corrective run
//!
//! Remote failures during the revert leave the project in an unknown state
//! and block it.

use super::{Execution, Outcome, RunRequest};
use crate::blueprints;
use crate::context::Context;
use crate::ui;
use anyhow::{Context as _, Result, bail};
use apstra::ObjectKind;
use executions::{ExecutionId, ExecutionPaths, ExitCode, StoredExecution, snapshot};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Which execution to roll back to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetChoice {
    /// The newest successful execution
    Previous,
    /// Ask the user
    Choose,
    Id(ExecutionId),
}

/// A failure after the plan: roll back, or block a corrective run
pub(super) fn on_failure(
    ctx: &Context,
    execution: &Execution,
    request: &RunRequest,
    reason: &str,
    code: ExitCode,
) -> Result<Outcome> {
    if request.post_rollback {
        return block(execution, reason);
    }
    ui::error(reason);
    revert(ctx, execution, request, &TargetChoice::Previous, code)
}

/// Leave the project blocked until someone removes the sentinel
pub(super) fn block(execution: &Execution, reason: &str) -> Result<Outcome> {
    ui::error(reason);
    execution.tree.block(reason)?;
    Ok(Outcome::done(ExitCode::TfExecWErrorsBlocked))
}

/// Revert the project. `code` is the outcome when a target was found.
///
/// Only a user rollback without a valid target is an error. Once the revert
/// has started, any failure blocks the project.
pub(super) fn revert(
    ctx: &Context,
    execution: &Execution,
    request: &RunRequest,
    choice: &TargetChoice,
    code: ExitCode,
) -> Result<Outcome> {
    ui::section("Rolling back");
    let target = match select_target(ctx, execution, request, choice) {
        Ok(target) => target,
        Err(e) if code == ExitCode::UserRollback => return Err(e),
        Err(e) => return block(execution, &format!("Rollback target lookup failed: {e:#}")),
    };
    if target.is_none() && code == ExitCode::UserRollback {
        bail!("No successful execution of {} to roll back to", ctx.scope);
    }
    match &target {
        Some(t) => ui::info(&format!(
            "Rolling back to execution {}",
            t.id().map_or("?", ExecutionId::as_str)
        )),
        None => ui::warn("No successful execution to roll back to"),
    }

    let failures = match undo(ctx, execution, target.as_ref()) {
        Ok(failures) => failures,
        Err(e) => return block(execution, &format!("Rollback failed: {e:#}")),
    };

    let target_id = target.as_ref().and_then(|t| t.id().cloned());
    execution.update(|record| record.rollback_target = target_id)?;

    if !failures.is_empty() {
        return block(
            execution,
            &format!("Rollback incomplete: {}", failures.join(", ")),
        );
    }

    Ok(match target {
        Some(_) => Outcome {
            code,
            follow_up: Some(RunRequest::corrective(request.comment.clone())),
        },
        None => Outcome::done(ExitCode::TfExecRevertedNoHistory),
    })
}

/// Steps 2 to 5. Returns the remote operations that failed.
fn undo(
    ctx: &Context,
    execution: &Execution,
    target: Option<&StoredExecution>,
) -> Result<Vec<String>> {
    let paths = &execution.paths;
    let input = execution.input_dir();
    if input.is_dir() {
        snapshot::pack(input, &paths.input_reverted())?;
    }

    let target_snapshot = target.map(|t| ExecutionPaths::new(t.dir.clone()).input_snapshot());
    let deletions = objects_to_delete(ctx, execution, target_snapshot.as_deref())?;
    let applied = blueprints::load_all(&ctx.blueprints_dir())?;

    if let Some(archive) = &target_snapshot {
        snapshot::restore(archive, input)?;
        ui::success("Input files restored");
    } else {
        ui::dim("Input files left as they are");
    }

    let client = ctx.client()?;
    let mut failures = Vec::new();

    for file in &applied {
        match revert_blueprint(client, &file.label) {
            Ok(Some(what)) => ui::success(&format!("Blueprint {}: {what}", file.label)),
            Ok(None) => log::debug!("Blueprint {} needs no revert", file.label),
            Err(e) => {
                ui::error(&format!("Blueprint {}: {e}", file.label));
                failures.push(format!("blueprint {}", file.label));
            }
        }
    }

    for (_, kind, name) in &deletions {
        match client.delete_object_by_name(*kind, name) {
            Ok(true) => ui::success(&format!("Deleted {kind} {name}")),
            Ok(false) => ui::dim(&format!("{kind} {name} already absent")),
            Err(e) => {
                ui::error(&format!("Could not delete {kind} {name}: {e}"));
                failures.push(format!("{kind} {name}"));
            }
        }
    }
    Ok(failures)
}

fn revert_blueprint(client: &apstra::Client, label: &str) -> apstra::Result<Option<&'static str>> {
    let Some(summary) = client.find_blueprint(label)? else {
        return Ok(None);
    };
    if !client.diff_status(&summary.id)?.has_uncommitted_changes() {
        return Ok(None);
    }
    if client.has_history(&summary.id)? {
        client.revert(&summary.id)?;
        Ok(Some("staging changes reverted"))
    } else {
        client.delete_blueprint(&summary.id)?;
        Ok(Some("deleted, it had no history"))
    }
}

fn select_target(
    ctx: &Context,
    execution: &Execution,
    request: &RunRequest,
    choice: &TargetChoice,
) -> Result<Option<StoredExecution>> {
    let candidates = executions::rollback_candidates(
        &ctx.layout.executions_dir(),
        &ctx.history_filter(),
        Some(&execution.id),
    )?;

    match choice {
        TargetChoice::Previous => Ok(candidates.into_iter().next()),
        TargetChoice::Id(id) => candidates
            .into_iter()
            .find(|c| c.id() == Some(id))
            .map(Some)
            .with_context(|| format!("Execution {id} is not a successful execution of {}", ctx.scope)),
        TargetChoice::Choose => {
            if candidates.is_empty() {
                return Ok(None);
            }
            let items: Vec<String> = candidates.iter().map(describe).collect();
            let index = ctx
                .prompter(request.interactive)
                .select("Roll back to", &items, 0)?;
            Ok(candidates.into_iter().nth(index))
        }
    }
}

fn describe(execution: &StoredExecution) -> String {
    let record = &execution.record;
    format!(
        "{}  {}  {}  {}",
        record.execution_id.as_ref().map_or("?", ExecutionId::as_str),
        record.created_local.as_deref().unwrap_or(""),
        record.exit_code.map(|c| c.to_string()).unwrap_or_default(),
        record.commit_comment.as_deref().unwrap_or("")
    )
}

/// Objects present in the live input but not in the target, plus objects
/// whose template contents differ, in deletion order
fn objects_to_delete(
    ctx: &Context,
    execution: &Execution,
    target_snapshot: Option<&Path>,
) -> Result<BTreeSet<(u8, ObjectKind, String)>> {
    let target_input = execution.paths.data_dir().join("rollback_target");
    if target_input.exists() {
        fs::remove_dir_all(&target_input)
            .with_context(|| format!("Failed to clear {}", target_input.display()))?;
    }
    if let Some(archive) = target_snapshot {
        snapshot::unpack(archive, &target_input)?;
    }

    let mut deletions = BTreeSet::new();
    for menu in &ctx.settings.menus.0 {
        let diff = confdiff::diff_tree(&execution.input_dir().join(menu), &target_input.join(menu))?;
        for (key, changes) in &diff.types {
            let Some(kind) = ObjectKind::from_menu_key(key) else {
                if !changes.added.is_empty() {
                    log::warn!("No controller mapping for '{key}', not deleting {:?}", changes.added);
                }
                continue;
            };
            let names = changes
                .added
                .iter()
                .chain(changes.contents_changed.iter().map(|c| &c.name));
            for name in names {
                deletions.insert((kind.deletion_rank(), kind, name.clone()));
            }
        }
    }
    Ok(deletions)
}
