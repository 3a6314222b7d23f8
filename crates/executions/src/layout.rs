//! File layout of a single execution directory.

use crate::record::METADATA_FILE;
use std::path::{Path, PathBuf};

/// Prefix of execution directory names (`execution_0`, `execution_1`, ...).
pub const EXECUTION_PREFIX: &str = "execution_";

/// Subdirectories created for every execution.
pub const SUBDIRS: [&str; 5] = ["tfstate", "input", "logs", "plan", "data"];

/// Parse the index of an `execution_N` directory name.
#[must_use]
pub fn execution_index(name: &str) -> Option<usize> {
    name.strip_prefix(EXECUTION_PREFIX)?.parse().ok()
}

/// Paths inside one `execution_N` directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPaths {
    dir: PathBuf,
}

impl ExecutionPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn metadata(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    /// Backend state file handed to the plan tool.
    #[must_use]
    pub fn tfstate(&self) -> PathBuf {
        self.dir.join("tfstate").join("terraform.tfstate")
    }

    /// State file of the previous execution.
    #[must_use]
    pub fn tfstate_rollback(&self) -> PathBuf {
        self.dir.join("tfstate").join("terraform.tfstate.rollback")
    }

    /// Snapshot of the live input tree taken when the execution began.
    #[must_use]
    pub fn input_snapshot(&self) -> PathBuf {
        self.dir.join("input").join("input.tgz")
    }

    /// Input snapshot of the previous execution.
    #[must_use]
    pub fn input_rollback(&self) -> PathBuf {
        self.dir.join("input").join("input.tgz.rollback")
    }

    /// Input tree as it was before a rollback replaced it.
    #[must_use]
    pub fn input_reverted(&self) -> PathBuf {
        self.dir.join("input").join("input.tgz.reverted")
    }

    #[must_use]
    pub fn plan_binary(&self) -> PathBuf {
        self.dir.join("plan").join("plan.bin")
    }

    #[must_use]
    pub fn plan_text(&self) -> PathBuf {
        self.dir.join("plan").join("plan.txt")
    }

    #[must_use]
    pub fn plan_json(&self) -> PathBuf {
        self.dir.join("plan").join("plan.json")
    }

    #[must_use]
    pub fn plan_summary(&self) -> PathBuf {
        self.dir.join("plan").join("summary.yml")
    }

    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.dir.join("logs")
    }

    /// Log file for one plan-tool step.
    #[must_use]
    pub fn log_file(&self, step: &str) -> PathBuf {
        self.logs_dir().join(format!("{step}.log"))
    }

    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.dir.join("data")
    }

    /// Diff result of one non-declarative menu.
    #[must_use]
    pub fn diff_file(&self, menu: &str) -> PathBuf {
        self.data_dir().join(format!("diff_{menu}.yml"))
    }

    /// Extracted input of the previous execution, for diffing.
    #[must_use]
    pub fn previous_input_dir(&self) -> PathBuf {
        self.data_dir().join("previous_input")
    }

    #[must_use]
    pub fn raw_blueprint_data(&self) -> PathBuf {
        self.data_dir().join("raw_blueprint_data.yml")
    }

    /// Managed systems as seen at the start of the run.
    #[must_use]
    pub fn device_data(&self) -> PathBuf {
        self.data_dir().join("device_data.yml")
    }

    #[must_use]
    pub fn commit_check(&self) -> PathBuf {
        self.data_dir().join("commit_check.yml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_index() {
        assert_eq!(execution_index("execution_0"), Some(0));
        assert_eq!(execution_index("execution_42"), Some(42));
        assert_eq!(execution_index("execution_x"), None);
        assert_eq!(execution_index("wip"), None);
    }

    #[test]
    fn test_paths() {
        let paths = ExecutionPaths::new("/x/execution_0");
        assert_eq!(
            paths.tfstate_rollback(),
            Path::new("/x/execution_0/tfstate/terraform.tfstate.rollback")
        );
        assert_eq!(paths.diff_file("design"), Path::new("/x/execution_0/data/diff_design.yml"));
        assert_eq!(paths.device_data(), Path::new("/x/execution_0/data/device_data.yml"));
    }
}
