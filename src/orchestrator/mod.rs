//! Execution lifecycle state machine.
//!
//! ```text
//! NORMAL ──failure/decline──▶ REVERT_REQUESTED ──▶ REVERTING
//!                                                    │
//!              no history target ◀───────────────────┤
//!                                                    ▼
//!                                   POST_ROLLBACK_REEXECUTION ──failure──▶ BLOCKED
//! ```
//!
//! A run ends with an [`ExitCode`]. A rollback that found a target schedules
//! one corrective run, executed by the same loop with `post_rollback` set.
//! A failing corrective run blocks the project instead of rolling back again.

mod commit;
mod destroy;
pub mod exit;
mod lifecycle;
mod rollback;

pub use rollback::TargetChoice;

use crate::cli::CommandAlias;
use crate::context::Context;
use crate::plan::PlanRun;
use crate::ui;
use anyhow::Result;
use chrono::Utc;
use executions::{
    CommitAction, ExecutionId, ExecutionPaths, ExecutionRecord, ExecutionTree, ExitCode,
    MetadataStore,
};
use std::path::PathBuf;

/// One orchestrator run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub command: CommandAlias,
    pub interactive: bool,
    /// Overrides the configured commit action
    pub commit: Option<CommitAction>,
    pub comment: Option<String>,
    pub post_rollback: bool,
}

impl RunRequest {
    pub fn new(command: CommandAlias, interactive: bool) -> Self {
        Self {
            command,
            interactive,
            commit: None,
            comment: None,
            post_rollback: false,
        }
    }

    /// Unattended forced apply after a rollback
    fn corrective(comment: Option<String>) -> Self {
        Self {
            command: CommandAlias::ApplyAuto,
            interactive: false,
            commit: Some(CommitAction::Commit),
            comment,
            post_rollback: true,
        }
    }
}

/// Terminal state of a run, and the run it schedules
#[derive(Debug)]
pub(crate) struct Outcome {
    pub code: ExitCode,
    pub follow_up: Option<RunRequest>,
}

impl Outcome {
    pub fn done(code: ExitCode) -> Self {
        Self {
            code,
            follow_up: None,
        }
    }
}

enum Step {
    Run(RunRequest),
    Rollback {
        target: TargetChoice,
        interactive: bool,
        comment: Option<String>,
    },
}

/// Run a command, plus the corrective run a rollback may schedule.
///
/// Returns the exit code of every run, in order.
pub fn run(ctx: &Context, request: RunRequest) -> Result<Vec<ExitCode>> {
    drive(ctx, Step::Run(request))
}

/// Roll the project back on request, then re-apply the restored input.
pub fn user_rollback(
    ctx: &Context,
    target: TargetChoice,
    interactive: bool,
    comment: Option<String>,
) -> Result<Vec<ExitCode>> {
    drive(
        ctx,
        Step::Rollback {
            target,
            interactive,
            comment,
        },
    )
}

fn drive(ctx: &Context, first: Step) -> Result<Vec<ExitCode>> {
    let mut codes = Vec::new();
    let mut next = Some(first);

    while let Some(step) = next.take() {
        let tree = ctx.tree();
        if tree.is_blocked() {
            ui::error(&format!(
                "Executions are blocked for {}. Remove {} once the project is consistent.",
                ctx.scope,
                tree.blocked_dir().display()
            ));
            if let Some(reason) = tree.blocked_reason() {
                ui::dim(reason.trim());
            }
            exit::farewell(ExitCode::ExecutionsBlocked);
            codes.push(ExitCode::ExecutionsBlocked);
            break;
        }

        let outcome = match step {
            Step::Run(request) if request.post_rollback => match execute(ctx, &request) {
                Ok(outcome) => outcome,
                Err(e) => {
                    let reason = format!("Post-rollback execution failed: {e:#}");
                    ui::error(&reason);
                    tree.block(&reason)?;
                    Outcome::done(ExitCode::TfExecWErrorsBlocked)
                }
            },
            Step::Run(request) => execute(ctx, &request)?,
            Step::Rollback {
                target,
                interactive,
                comment,
            } => {
                let request = RunRequest {
                    comment,
                    ..RunRequest::new(CommandAlias::ApplyAuto, interactive)
                };
                let execution = Execution::begin(ctx, &request, "rollback")?;
                let outcome = rollback::revert(
                    ctx,
                    &execution,
                    &request,
                    &target,
                    ExitCode::UserRollback,
                )?;
                execution.finish(ctx, outcome.code)?;
                outcome
            }
        };

        exit::farewell(outcome.code);
        codes.push(outcome.code);
        next = outcome.follow_up.map(Step::Run);
    }
    Ok(codes)
}

fn execute(ctx: &Context, request: &RunRequest) -> Result<Outcome> {
    if request.post_rollback {
        ui::header(&format!("Post-rollback execution for {}", ctx.scope));
    } else {
        ui::header(&format!(
            "{} for {}",
            request.command.description(),
            ctx.scope
        ));
    }

    let execution = Execution::begin(ctx, request, request.command.as_str())?;
    let result = if request.command.is_read_only() {
        lifecycle::read_only(ctx, &execution, request)
    } else if request.command.is_destroy() {
        destroy::run(ctx, &execution, request)
    } else {
        lifecycle::apply(ctx, &execution, request)
    };
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) if request.post_rollback => {
            rollback::block(&execution, &format!("Post-rollback execution failed: {e:#}"))?
        }
        Err(e) => return Err(e),
    };
    execution.finish(ctx, outcome.code)?;

    if outcome.code == ExitCode::TfDestroyOk {
        let archive = execution
            .tree
            .archive_and_purge(&ctx.layout.archive_dir(), &ctx.scope.label())?;
        ui::success(&format!("History archived to {}", archive.display()));
    }
    Ok(outcome)
}

// ============================================================================
// Execution
// ============================================================================

/// The running execution: `wip/execution_0` and its record
pub(crate) struct Execution {
    pub tree: ExecutionTree,
    pub paths: ExecutionPaths,
    pub store: MetadataStore,
    pub id: ExecutionId,
    working_dir: PathBuf,
    input_dir: PathBuf,
}

impl Execution {
    fn begin(ctx: &Context, request: &RunRequest, command: &str) -> Result<Self> {
        let tree = ctx.tree();
        let input_dir = ctx.input_dir();
        let paths = tree.begin(&input_dir)?;
        let store = MetadataStore::new(paths.dir());

        let record = ExecutionRecord {
            target: ctx.scope.target.clone(),
            customer: ctx.scope.customer.clone(),
            domain: ctx.scope.domain.clone(),
            project: ctx.scope.project.clone(),
            commit_comment: request.comment.clone(),
            post_rollback: request.post_rollback,
            ..ExecutionRecord::started(command)
        };
        store.create(&record)?;
        let id = record
            .execution_id
            .ok_or_else(|| anyhow::anyhow!("Execution record without id"))?;
        log::info!("Execution {id} started");

        Ok(Self {
            tree,
            paths,
            store,
            id,
            working_dir: ctx.working_dir(),
            input_dir,
        })
    }

    pub fn plan_run(&self) -> PlanRun<'_> {
        PlanRun {
            working_dir: &self.working_dir,
            input_dir: &self.input_dir,
            execution: &self.paths,
        }
    }

    pub fn input_dir(&self) -> &std::path::Path {
        &self.input_dir
    }

    pub fn update<F>(&self, change: F) -> Result<ExecutionRecord>
    where
        F: FnOnce(&mut ExecutionRecord),
    {
        Ok(self.store.update(change)?)
    }

    /// Record the exit code and publish the history when the code demands it
    fn finish(&self, ctx: &Context, code: ExitCode) -> Result<()> {
        self.update(|record| {
            record.exit_code = Some(code);
            record.finished_utc = Some(Utc::now());
        })?;
        if code.commits_history() {
            self.tree.commit()?;
        } else {
            log::debug!("{code} leaves the history of {} untouched", ctx.scope);
        }
        Ok(())
    }
}
