//! Commit phase after a successful apply.

use super::lifecycle::blueprint_states;
use super::rollback::{self, TargetChoice};
use super::{Execution, Outcome, RunRequest};
use crate::context::Context;
use crate::ui;
use anyhow::{Context as _, Result};
use apstra::CommitCheckReport;
use executions::{CommitAction, ExitCode};
use std::collections::BTreeMap;
use std::fs;

pub(super) fn run(ctx: &Context, execution: &Execution, request: &RunRequest) -> Result<Outcome> {
    let changed: Vec<(String, String)> = blueprint_states(ctx)?
        .into_iter()
        .filter(|(_, state)| state.has_uncommitted_changes())
        .filter_map(|(label, state)| state.id.map(|id| (label, id)))
        .collect();
    let labels: Vec<String> = changed.iter().map(|(label, _)| label.clone()).collect();
    execution.update(|record| {
        record.changes_in_blueprints = !labels.is_empty();
        record.blueprints_with_changes = labels;
    })?;

    if changed.is_empty() {
        ui::info("No blueprint changes to commit");
        return Ok(Outcome::done(ExitCode::TfExecOk));
    }

    let Some(action) = choose_action(ctx, request)? else {
        return rollback::revert(
            ctx,
            execution,
            request,
            &TargetChoice::Previous,
            ExitCode::TfExecDeclinedRevert,
        );
    };
    let comment = request
        .comment
        .clone()
        .unwrap_or_else(|| ctx.settings.commit.comment.clone());
    execution.update(|record| {
        record.commit_action = Some(action);
        record.commit_comment = Some(comment.clone());
    })?;

    let client = ctx.client()?;
    let mut broken = Vec::new();
    for (label, id) in &changed {
        let errors = client.build_errors(id)?;
        if !errors.is_clean() {
            ui::warn(&format!("{label}: {} build error(s)", errors.count));
            broken.push(label.as_str());
        }
    }
    if !broken.is_empty() && action == CommitAction::Commit {
        return rollback::on_failure(
            ctx,
            execution,
            request,
            &format!("Build errors in {}", broken.join(", ")),
            ExitCode::TfExecWErrorsRevert,
        );
    }

    if action == CommitAction::Stage {
        ui::info(&format!("Changes left staged in {} blueprint(s)", changed.len()));
        return Ok(Outcome::done(ExitCode::TfExecOkStaged));
    }

    for (label, id) in &changed {
        let pb = ui::spinner(&format!("Committing {label}"));
        match client.deploy_and_keep(id, &comment) {
            Ok(evicted) => {
                ui::finish_success(&pb, &format!("Committed {label}"));
                if !evicted.is_empty() {
                    ui::dim(&format!("Evicted permanent revisions: {}", evicted.join(", ")));
                }
            }
            Err(e) => {
                ui::finish_error(&pb, &format!("Commit of {label} failed"));
                return rollback::on_failure(
                    ctx,
                    execution,
                    request,
                    &format!("Commit of {label} failed: {e}"),
                    ExitCode::TfExecWErrorsRevert,
                );
            }
        }
    }

    if ctx.settings.commit.commit_check {
        let mut reports = BTreeMap::new();
        let mut drifted = Vec::new();
        for (label, id) in &changed {
            let pb = ui::spinner(&format!("Commit-check {label}"));
            let report = match client.commit_check(id) {
                Ok(report) => report,
                Err(e) => {
                    ui::finish_error(&pb, &format!("Commit-check of {label} failed"));
                    return rollback::on_failure(
                        ctx,
                        execution,
                        request,
                        &format!("Commit-check of {label} failed: {e}"),
                        ExitCode::TfExecWErrorsRevert,
                    );
                }
            };
            if report.is_clean() {
                ui::finish_success(&pb, &format!("{label}: devices match"));
            } else {
                ui::finish_error(&pb, &format!("{label}: drift detected"));
                print_failures(&report);
                drifted.push(label.clone());
            }
            reports.insert(label.clone(), report);
        }
        save_reports(execution, &reports)?;

        if !drifted.is_empty() {
            return rollback::on_failure(
                ctx,
                execution,
                request,
                &format!("Commit-check reported drift in {}", drifted.join(", ")),
                ExitCode::TfExecWErrorsRevert,
            );
        }
    }

    if !request.command.is_auto()
        && !ctx
            .prompter(request.interactive)
            .confirm("Keep the committed changes?", true)?
    {
        return rollback::revert(
            ctx,
            execution,
            request,
            &TargetChoice::Previous,
            ExitCode::TfExecDeclinedRevert,
        );
    }

    Ok(Outcome::done(ExitCode::TfExecOk))
}

/// `None` when the user asked to roll back instead
fn choose_action(ctx: &Context, request: &RunRequest) -> Result<Option<CommitAction>> {
    if request.post_rollback {
        return Ok(Some(CommitAction::Commit));
    }
    if let Some(action) = request.commit.or(ctx.settings.commit.action) {
        return Ok(Some(action));
    }
    let items = vec![
        "commit".to_string(),
        "stage".to_string(),
        "rollback".to_string(),
    ];
    let choice = ctx
        .prompter(request.interactive)
        .select("What should happen to the blueprint changes?", &items, 0)?;
    Ok(match choice {
        0 => Some(CommitAction::Commit),
        1 => Some(CommitAction::Stage),
        _ => None,
    })
}

fn print_failures(report: &CommitCheckReport) {
    for system in report.failures() {
        ui::warn(&format!("{} ({})", system.label, system.state));
        for error in &system.errors {
            ui::dim(error);
        }
        if let Some(diff) = &system.diff {
            ui::unified_diff(diff);
        }
    }
}

fn save_reports(execution: &Execution, reports: &BTreeMap<String, CommitCheckReport>) -> Result<()> {
    let path = execution.paths.commit_check();
    let content = serde_yaml::to_string(reports).context("Failed to serialize commit-check")?;
    fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
}
