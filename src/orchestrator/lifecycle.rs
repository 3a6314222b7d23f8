//! Read-only and apply flows.

use super::{Execution, Outcome, RunRequest, commit, rollback};
use crate::blueprints;
use crate::cli::CommandAlias;
use crate::context::Context;
use crate::plan::PlanSummary;
use crate::ui;
use anyhow::{Context as _, Result};
use apstra::DiffStatus;
use confdiff::DiffResult;
use executions::{ExitCode, snapshot};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;

pub(super) fn read_only(
    ctx: &Context,
    execution: &Execution,
    request: &RunRequest,
) -> Result<Outcome> {
    let run = execution.plan_run();
    let ok = if request.command == CommandAlias::Plan {
        let ok = ctx.plan_tool.plan(&run, false)?;
        if ok {
            summarize(ctx, execution)?;
        }
        ok
    } else {
        ctx.plan_tool.command(&run, request.command)?
    };

    Ok(Outcome::done(if ok {
        ExitCode::TfReadOnlyOk
    } else {
        ExitCode::TfCommandFailed
    }))
}

pub(super) fn apply(ctx: &Context, execution: &Execution, request: &RunRequest) -> Result<Outcome> {
    let menus = diff_menus(ctx, execution)?;
    let flags: BTreeMap<String, bool> = menus
        .iter()
        .map(|(menu, diff)| (menu.clone(), !diff.is_empty()))
        .collect();
    let menu_changes = flags.values().any(|changed| *changed);
    execution.update(|record| record.changes = flags)?;

    let states = blueprint_states(ctx)?;
    save_states(execution, &states);
    save_systems(ctx, execution);
    let pending: Vec<&str> = states
        .iter()
        .filter(|(_, s)| s.has_uncommitted_changes())
        .map(|(label, _)| label.as_str())
        .collect();
    if !pending.is_empty() {
        ui::warn(&format!(
            "Blueprints with uncommitted changes before this run: {}",
            pending.join(", ")
        ));
    }

    let run = execution.plan_run();
    if !ctx.plan_tool.plan(&run, false)? {
        return Ok(Outcome::done(ExitCode::TfPlanFailed));
    }
    let summary = summarize(ctx, execution)?;

    if summary.is_empty() && !menu_changes && pending.is_empty() {
        ui::success("Nothing to apply");
        return Ok(Outcome::done(ExitCode::TfPlanNoChanges));
    }

    if !request.command.is_auto()
        && !ctx
            .prompter(request.interactive)
            .confirm("Apply these changes?", true)?
    {
        return Ok(Outcome::done(ExitCode::TfPlanDeclined));
    }

    ui::section("Applying");
    if !ctx.plan_tool.apply(&run)? {
        match execution.tree.restore_tfstate_baseline(&execution.paths) {
            Ok(true) => ui::warn("Apply left no state file; the previous state was put back"),
            Ok(false) => {}
            Err(e) => log::warn!("Could not restore the state baseline: {e}"),
        }
        return rollback::on_failure(
            ctx,
            execution,
            request,
            "The plan tool failed to apply the changes",
            ExitCode::TfExecWErrorsRevert,
        );
    }

    // The controller now holds the applied changes; any error from here on
    // has to end in a rollback or a block
    match commit::run(ctx, execution, request) {
        Ok(outcome) => Ok(outcome),
        Err(e) => rollback::on_failure(
            ctx,
            execution,
            request,
            &format!("Commit phase failed: {e:#}"),
            ExitCode::TfExecWErrorsRevert,
        ),
    }
}

/// Render the binary plan, save `summary.yml` and print it
pub(super) fn summarize(ctx: &Context, execution: &Execution) -> Result<PlanSummary> {
    let plan = ctx.plan_tool.show(&execution.plan_run())?;
    let summary = PlanSummary::from_plan(&plan);
    summary.save(&execution.paths.plan_summary())?;
    summary.print();
    Ok(summary)
}

// ============================================================================
// Non-declarative menus
// ============================================================================

/// Diff every menu of the live input against the previous execution's input.
///
/// A missing or unreadable previous snapshot counts as empty.
pub(super) fn diff_menus(
    ctx: &Context,
    execution: &Execution,
) -> Result<BTreeMap<String, DiffResult>> {
    let previous = execution.paths.previous_input_dir();
    let baseline = execution.paths.input_rollback();
    if baseline.exists() {
        if let Err(e) = snapshot::unpack(&baseline, &previous) {
            log::warn!("Previous input unavailable, diffing against nothing: {e}");
        }
    } else {
        log::info!("No previous input snapshot: first execution");
    }

    let mut results = BTreeMap::new();
    for menu in &ctx.settings.menus.0 {
        let diff = confdiff::diff_tree(&execution.input_dir().join(menu), &previous.join(menu))?;
        diff.save(&execution.paths.diff_file(menu))?;
        report(menu, &diff);
        results.insert(menu.clone(), diff);
    }
    Ok(results)
}

fn report(menu: &str, diff: &DiffResult) {
    ui::section(&format!("Changes in {menu}"));
    if diff.is_empty() {
        ui::dim("none");
        return;
    }
    for (kind, added, changed, removed, contents) in diff.counts() {
        let mut line = format!("+{added} ~{changed} -{removed}");
        if contents > 0 {
            line.push_str(&format!(" templates:{contents}"));
        }
        ui::kv(kind, &line);
    }
    for changes in diff.types.values() {
        for rename in &changes.renamed {
            ui::dim(&format!("{} renamed to {}", rename.from, rename.to));
        }
        for contents in &changes.contents_changed {
            ui::dim(&format!("{} ({})", contents.name, contents.file));
            ui::unified_diff(&contents.diff);
        }
    }
}

// ============================================================================
// Blueprint state
// ============================================================================

/// Controller view of one local blueprint
#[derive(Debug, Clone, Serialize)]
pub(super) struct BlueprintState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub local: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DiffStatus>,
}

impl BlueprintState {
    pub fn has_uncommitted_changes(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(DiffStatus::has_uncommitted_changes)
    }
}

/// Query the staging status of every blueprint defined in the input
pub(super) fn blueprint_states(ctx: &Context) -> Result<BTreeMap<String, BlueprintState>> {
    let client = ctx.client()?;
    let mut states = BTreeMap::new();
    for file in blueprints::load_all(&ctx.blueprints_dir())? {
        let state = match client.find_blueprint(&file.label)? {
            Some(summary) => {
                let status = client
                    .diff_status(&summary.id)
                    .with_context(|| format!("Failed to query blueprint {}", file.label))?;
                BlueprintState {
                    id: Some(summary.id),
                    local: file.is_local(),
                    status: Some(status),
                }
            }
            None => BlueprintState {
                id: None,
                local: file.is_local(),
                status: None,
            },
        };
        states.insert(file.label, state);
    }
    Ok(states)
}

/// Snapshot the managed systems as `device_data.yml`. Best effort.
fn save_systems(ctx: &Context, execution: &Execution) {
    let path = execution.paths.device_data();
    let written = ctx
        .client()
        .and_then(|client| client.systems().map_err(anyhow::Error::from))
        .and_then(|systems| serde_yaml::to_string(&systems).map_err(anyhow::Error::from))
        .and_then(|content| fs::write(&path, content).map_err(anyhow::Error::from));
    if let Err(e) = written {
        log::warn!("Could not write {}: {e}", path.display());
    }
}

/// Persist the pre-run blueprint state as `raw_blueprint_data.yml`
fn save_states(execution: &Execution, states: &BTreeMap<String, BlueprintState>) {
    let path = execution.paths.raw_blueprint_data();
    let written = serde_yaml::to_string(states)
        .map_err(anyhow::Error::from)
        .and_then(|content| fs::write(&path, content).map_err(anyhow::Error::from));
    if let Err(e) = written {
        log::warn!("Could not write {}: {e}", path.display());
    }
}
