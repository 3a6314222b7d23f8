//! User-requested rollback.

use crate::cli::RollbackRequest;
use crate::context::Context;
use crate::orchestrator::{self, TargetChoice};
use anyhow::Result;
use executions::ExitCode;

pub fn run(
    ctx: &Context,
    request: &RollbackRequest,
    interactive: bool,
    comment: Option<String>,
) -> Result<Vec<ExitCode>> {
    orchestrator::user_rollback(ctx, target(request), interactive, comment)
}

fn target(request: &RollbackRequest) -> TargetChoice {
    match request {
        RollbackRequest::Choose => TargetChoice::Choose,
        RollbackRequest::To(id) => TargetChoice::Id(id.clone()),
    }
}
