//! Exit codes persisted with every execution.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal outcome of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitCode {
    /// A read-only command finished.
    TfReadOnlyOk,
    /// A read-only command failed.
    TfCommandFailed,
    /// The plan had nothing to do.
    TfPlanNoChanges,
    /// Plan generation failed.
    TfPlanFailed,
    /// The user declined the plan before applying it.
    TfPlanDeclined,
    /// Applied and committed.
    TfExecOk,
    /// Applied, changes left staged.
    TfExecOkStaged,
    /// Apply failure, drift or build errors; reverted.
    TfExecWErrorsRevert,
    /// The user declined the commit; reverted.
    TfExecDeclinedRevert,
    /// Reverted, but no earlier execution to return to.
    TfExecRevertedNoHistory,
    /// The post-rollback execution failed; executions are blocked.
    TfExecWErrorsBlocked,
    /// Destroyed, archived and purged.
    TfDestroyOk,
    /// Destroy failed; reverted.
    TfDestroyWErrorsRevert,
    /// Rollback requested by the user.
    UserRollback,
    /// Refused because executions are blocked.
    ExecutionsBlocked,
}

impl ExitCode {
    /// Whether the execution is a valid rollback target.
    #[must_use]
    pub fn is_successful(&self) -> bool {
        matches!(self, Self::TfExecOk | Self::TfExecOkStaged)
    }

    /// Whether the execution tree must be persisted after this outcome.
    #[must_use]
    pub fn commits_history(&self) -> bool {
        matches!(
            self,
            Self::TfExecOk
                | Self::TfExecOkStaged
                | Self::TfExecWErrorsRevert
                | Self::TfExecDeclinedRevert
                | Self::TfExecRevertedNoHistory
                | Self::TfExecWErrorsBlocked
                | Self::TfDestroyOk
                | Self::TfDestroyWErrorsRevert
                | Self::UserRollback
        )
    }

    /// Whether the outcome is a failure for the process exit status.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::TfCommandFailed
                | Self::TfPlanFailed
                | Self::TfExecWErrorsRevert
                | Self::TfExecRevertedNoHistory
                | Self::TfDestroyWErrorsRevert
        )
    }

    /// Whether further executions are refused after this outcome.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::TfExecWErrorsBlocked | Self::ExecutionsBlocked)
    }

    /// Persisted name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TfReadOnlyOk => "TF_READ_ONLY_OK",
            Self::TfCommandFailed => "TF_COMMAND_FAILED",
            Self::TfPlanNoChanges => "TF_PLAN_NO_CHANGES",
            Self::TfPlanFailed => "TF_PLAN_FAILED",
            Self::TfPlanDeclined => "TF_PLAN_DECLINED",
            Self::TfExecOk => "TF_EXEC_OK",
            Self::TfExecOkStaged => "TF_EXEC_OK_STAGED",
            Self::TfExecWErrorsRevert => "TF_EXEC_W_ERRORS_REVERT",
            Self::TfExecDeclinedRevert => "TF_EXEC_DECLINED_REVERT",
            Self::TfExecRevertedNoHistory => "TF_EXEC_REVERTED_NO_HISTORY",
            Self::TfExecWErrorsBlocked => "TF_EXEC_W_ERRORS_BLOCKED",
            Self::TfDestroyOk => "TF_DESTROY_OK",
            Self::TfDestroyWErrorsRevert => "TF_DESTROY_W_ERRORS_REVERT",
            Self::UserRollback => "USER_ROLLBACK",
            Self::ExecutionsBlocked => "EXECUTIONS_BLOCKED",
        }
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
