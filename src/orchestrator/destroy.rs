//! Destroy flow.
//!
//! Blueprints created by this project are deleted through the controller
//! before the plan tool destroys the rest; inherited blueprints are kept.

use super::lifecycle::summarize;
use super::{Execution, Outcome, RunRequest, rollback};
use crate::blueprints;
use crate::context::Context;
use crate::ui;
use anyhow::Result;
use executions::ExitCode;

pub(super) fn run(ctx: &Context, execution: &Execution, request: &RunRequest) -> Result<Outcome> {
    if !request.command.is_auto()
        && !ctx.prompter(request.interactive).confirm(
            &format!("Destroy every resource of {}?", ctx.scope),
            false,
        )?
    {
        return Ok(Outcome::done(ExitCode::TfPlanDeclined));
    }

    let client = ctx.client()?;
    for file in blueprints::load_all(&ctx.blueprints_dir())? {
        if let Some(parent) = &file.inherited_from {
            ui::dim(&format!("Keeping {}, inherited from {parent}", file.label));
            continue;
        }
        let Some(summary) = client.find_blueprint(&file.label)? else {
            ui::dim(&format!("Blueprint {} does not exist", file.label));
            continue;
        };

        let pb = ui::spinner(&format!("Deleting blueprint {}", file.label));
        if let Err(e) = client.delete_blueprint(&summary.id) {
            ui::finish_error(&pb, &format!("Could not delete {}", file.label));
            return rollback::on_failure(
                ctx,
                execution,
                request,
                &format!("Deleting blueprint {} failed: {e}", file.label),
                ExitCode::TfDestroyWErrorsRevert,
            );
        }
        ui::finish_success(&pb, &format!("Deleted blueprint {}", file.label));
    }

    let run = execution.plan_run();
    if !ctx.plan_tool.plan(&run, true)? {
        return Ok(Outcome::done(ExitCode::TfPlanFailed));
    }
    summarize(ctx, execution)?;

    ui::section("Destroying");
    if !ctx.plan_tool.apply(&run)? {
        if let Err(e) = execution.tree.restore_tfstate_baseline(&execution.paths) {
            log::warn!("Could not restore the state baseline: {e}");
        }
        return rollback::on_failure(
            ctx,
            execution,
            request,
            "The plan tool failed to destroy the project",
            ExitCode::TfDestroyWErrorsRevert,
        );
    }

    Ok(Outcome::done(ExitCode::TfDestroyOk))
}
