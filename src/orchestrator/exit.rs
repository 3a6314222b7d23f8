//! Farewell messages and the process status of a finished invocation.

use crate::ui;
use executions::ExitCode;

enum Tone {
    Good,
    Neutral,
    Bad,
}

fn message(code: ExitCode) -> (Tone, &'static str) {
    match code {
        ExitCode::TfReadOnlyOk => (Tone::Good, "Command finished. Nothing was changed."),
        ExitCode::TfCommandFailed => (
            Tone::Bad,
            "Command failed. Nothing was changed; see the execution logs.",
        ),
        ExitCode::TfPlanNoChanges => (
            Tone::Good,
            "Infrastructure matches the input files. Nothing was applied or committed.",
        ),
        ExitCode::TfPlanFailed => (
            Tone::Bad,
            "Plan generation failed. Nothing was applied and your input files are untouched.",
        ),
        ExitCode::TfPlanDeclined => (
            Tone::Neutral,
            "Plan declined. Nothing was applied and your input files are untouched.",
        ),
        ExitCode::TfExecOk => (Tone::Good, "Changes applied and committed."),
        ExitCode::TfExecOkStaged => (
            Tone::Good,
            "Changes applied and left staged on the controller. Commit them when ready.",
        ),
        ExitCode::TfExecWErrorsRevert => (
            Tone::Bad,
            "Execution failed and was rolled back. Your input files were restored to the \
             rollback target; the previous version is saved as input.tgz.reverted.",
        ),
        ExitCode::TfExecDeclinedRevert => (
            Tone::Neutral,
            "Changes declined and rolled back. Your input files were restored to the \
             rollback target; the previous version is saved as input.tgz.reverted.",
        ),
        ExitCode::TfExecRevertedNoHistory => (
            Tone::Bad,
            "Execution rolled back without a previous successful execution. Objects it \
             created were removed; your input files were left as they are.",
        ),
        ExitCode::TfExecWErrorsBlocked => (
            Tone::Bad,
            "The corrective execution after a rollback failed. Executions are blocked \
             until the blocked/ directory is removed.",
        ),
        ExitCode::TfDestroyOk => (
            Tone::Good,
            "Project destroyed. Its execution history was archived and removed.",
        ),
        ExitCode::TfDestroyWErrorsRevert => (
            Tone::Bad,
            "Destroy failed and was rolled back. Your input files were restored to the \
             rollback target.",
        ),
        ExitCode::UserRollback => (
            Tone::Neutral,
            "Rollback finished. Your input files were restored to the selected execution; \
             the previous version is saved as input.tgz.reverted.",
        ),
        ExitCode::ExecutionsBlocked => (
            Tone::Bad,
            "Refused: executions are blocked for this project. Nothing was changed.",
        ),
    }
}

/// Print the closing message of a run
pub fn farewell(code: ExitCode) {
    let (tone, text) = message(code);
    let line = format!("[{code}] {text}");
    println!();
    match tone {
        Tone::Good => ui::success(&line),
        Tone::Neutral => ui::info(&line),
        Tone::Bad => ui::error(&line),
    }
}

/// Process status for the codes of one invocation.
///
/// Always 0 unless `strict`; then blocked outcomes give 2 and failures 1.
pub fn process_status(codes: &[ExitCode], strict: bool) -> i32 {
    if !strict {
        return 0;
    }
    if codes.iter().any(ExitCode::is_blocked) {
        2
    } else if codes
        .iter()
        .any(|c| c.is_failure() || *c == ExitCode::TfPlanFailed)
    {
        1
    } else {
        0
    }
}
