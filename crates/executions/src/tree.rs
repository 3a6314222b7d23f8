//! The execution directory tree of one project.
//!
//! ```text
//! executions/<customer>/<domain>/<project>/
//!   execution_0 … execution_N      persisted history, 0 is the newest
//!   wip/execution_0 … N            working copy of a running execution
//!   blocked/                       sentinel refusing new executions
//! ```
//!
//! A run works only inside `wip`. [`ExecutionTree::commit`] publishes it;
//! a run that is not committed leaves the persisted history untouched.

use crate::error::{Error, Result};
use crate::layout::{self, ExecutionPaths, SUBDIRS};
use crate::snapshot;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Default number of historical executions kept.
pub const DEFAULT_RETENTION: usize = 50;

const WIP: &str = "wip";
const BLOCKED: &str = "blocked";
const BLOCKED_REASON: &str = "reason.txt";

/// Execution history of one customer/domain/project scope.
#[derive(Debug, Clone)]
pub struct ExecutionTree {
    root: PathBuf,
    retention: usize,
}

impl ExecutionTree {
    /// Tree rooted at `root`, keeping `retention` historical executions.
    pub fn new(root: impl Into<PathBuf>, retention: usize) -> Self {
        Self {
            root: root.into(),
            retention,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn wip_dir(&self) -> PathBuf {
        self.root.join(WIP)
    }

    /// The running execution (`wip/execution_0`).
    #[must_use]
    pub fn current(&self) -> ExecutionPaths {
        ExecutionPaths::new(self.wip_dir().join(format!("{}0", layout::EXECUTION_PREFIX)))
    }

    /// A persisted execution by index.
    #[must_use]
    pub fn persisted(&self, index: usize) -> ExecutionPaths {
        ExecutionPaths::new(self.root.join(format!("{}{index}", layout::EXECUTION_PREFIX)))
    }

    /// Indices of the persisted executions, ascending.
    pub fn persisted_indices(&self) -> Result<Vec<usize>> {
        indices(&self.root)
    }

    // ------------------------------------------------------------------
    // Blocking sentinel
    // ------------------------------------------------------------------

    #[must_use]
    pub fn blocked_dir(&self) -> PathBuf {
        self.root.join(BLOCKED)
    }

    /// Whether executions are refused until a human removes the sentinel.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.blocked_dir().is_dir()
    }

    /// Create the sentinel, recording why.
    pub fn block(&self, reason: &str) -> Result<()> {
        let dir = self.blocked_dir();
        fs::create_dir_all(&dir).map_err(|e| Error::io("create", &dir, e))?;
        let file = dir.join(BLOCKED_REASON);
        fs::write(&file, format!("{}\n{reason}\n", Utc::now().to_rfc3339()))
            .map_err(|e| Error::io("write", &file, e))?;
        log::warn!("Executions blocked: {}", dir.display());
        Ok(())
    }

    /// Reason recorded in the sentinel, if blocked.
    #[must_use]
    pub fn blocked_reason(&self) -> Option<String> {
        fs::read_to_string(self.blocked_dir().join(BLOCKED_REASON)).ok()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Start a new execution.
    ///
    /// Rebuilds `wip` from the persisted history shifted by one, drops
    /// executions beyond the retention, creates a fresh `execution_0`,
    /// carries the previous state file and input snapshot forward as the
    /// rollback baseline and snapshots the live `input` tree.
    ///
    /// Only the creation of `execution_0` and the input snapshot are fatal.
    pub fn begin(&self, input: &Path) -> Result<ExecutionPaths> {
        let wip = self.wip_dir();
        if wip.exists()
            && let Err(e) = fs::remove_dir_all(&wip)
        {
            log::warn!("Could not clear stale {}: {e}", wip.display());
        }

        for index in self.persisted_indices()?.into_iter().rev() {
            let target = index + 1;
            if target > self.retention {
                log::debug!("Dropping execution_{index} beyond retention {}", self.retention);
                continue;
            }
            let from = self.persisted(index);
            let to = wip.join(format!("{}{target}", layout::EXECUTION_PREFIX));
            if let Err(e) = copy_dir(from.dir(), &to) {
                log::warn!("Could not carry {} forward: {e}", from.dir().display());
            }
        }

        let current = self.current();
        for sub in SUBDIRS {
            let dir = current.dir().join(sub);
            fs::create_dir_all(&dir).map_err(|source| Error::CreateExecution { path: dir, source })?;
        }

        let previous = ExecutionPaths::new(wip.join(format!("{}1", layout::EXECUTION_PREFIX)));
        carry(&previous.tfstate(), &current.tfstate());
        carry(&previous.tfstate(), &current.tfstate_rollback());
        carry(&previous.input_snapshot(), &current.input_rollback());

        if input.is_dir() {
            snapshot::pack(input, &current.input_snapshot())?;
        } else {
            log::warn!("Input tree {} does not exist, no snapshot taken", input.display());
        }

        log::info!("Execution started in {}", current.dir().display());
        Ok(current)
    }

    /// Publish `wip` as the persisted history.
    ///
    /// `wip` lives inside the root, so it is moved aside while the root is
    /// cleaned and moved back afterwards.
    pub fn commit(&self) -> Result<()> {
        let wip = self.wip_dir();
        let name = self
            .root
            .file_name()
            .map_or_else(|| "executions".to_string(), |n| n.to_string_lossy().into_owned());
        let staging = self.root.with_file_name(format!(".{name}.commit"));

        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| Error::io("remove", &staging, e))?;
        }
        fs::rename(&wip, &staging).map_err(|e| Error::io("move", &wip, e))?;

        for index in self.persisted_indices()? {
            let dir = self.persisted(index);
            if let Err(e) = fs::remove_dir_all(dir.dir()) {
                log::warn!("Could not remove {}: {e}", dir.dir().display());
            }
        }

        for index in indices(&staging)? {
            let name = format!("{}{index}", layout::EXECUTION_PREFIX);
            copy_dir(&staging.join(&name), &self.root.join(&name))?;
        }

        fs::rename(&staging, &wip).map_err(|e| Error::io("move", &staging, e))?;
        log::info!("Execution history committed to {}", self.root.display());
        Ok(())
    }

    /// Compress the whole history into `archive_dir` and delete the tree.
    ///
    /// Returns the archive path.
    pub fn archive_and_purge(&self, archive_dir: &Path, label: &str) -> Result<PathBuf> {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let archive = archive_dir.join(format!("{label}_{stamp}.tgz"));
        snapshot::pack(&self.root, &archive)?;
        fs::remove_dir_all(&self.root).map_err(|e| Error::io("remove", &self.root, e))?;
        log::info!("Archived {} to {}", self.root.display(), archive.display());
        Ok(archive)
    }

    /// Put the rollback state file back when a failed apply left none.
    ///
    /// Returns whether the baseline was restored.
    pub fn restore_tfstate_baseline(&self, paths: &ExecutionPaths) -> Result<bool> {
        let state = paths.tfstate();
        let baseline = paths.tfstate_rollback();
        if state.exists() || !baseline.exists() {
            return Ok(false);
        }
        fs::copy(&baseline, &state).map_err(|e| Error::io("copy", &baseline, e))?;
        log::warn!("Restored state baseline into {}", state.display());
        Ok(true)
    }
}

fn indices(dir: &Path) -> Result<Vec<usize>> {
    let mut found = Vec::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(found),
        Err(e) => return Err(Error::io("read", dir, e)),
    };
    for entry in entries.flatten() {
        if entry.path().is_dir()
            && let Some(index) = layout::execution_index(&entry.file_name().to_string_lossy())
        {
            found.push(index);
        }
    }
    found.sort_unstable();
    Ok(found)
}

fn carry(from: &Path, to: &Path) {
    if !from.exists() {
        log::debug!("Nothing to carry forward from {}", from.display());
        return;
    }
    if let Err(e) = fs::copy(from, to) {
        log::warn!("Could not copy {} to {}: {e}", from.display(), to.display());
    }
}

/// Recursively copy a directory.
pub fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| Error::io("create", &target, e))?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| Error::io("copy", entry.path(), e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ExecutionRecord, MetadataStore};
    use tempfile::TempDir;

    fn setup() -> (TempDir, ExecutionTree, PathBuf) {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("projects/acme/dc/p1");
        fs::create_dir_all(input.join("design")).unwrap();
        fs::write(input.join("design/configlets.yml"), "configlets: []\n").unwrap();
        let tree = ExecutionTree::new(temp.path().join("executions/acme/dc/p1"), 3);
        (temp, tree, input)
    }

    fn run(tree: &ExecutionTree, input: &Path, command: &str) -> ExecutionPaths {
        let current = tree.begin(input).unwrap();
        MetadataStore::new(current.dir())
            .create(&ExecutionRecord::started(command))
            .unwrap();
        tree.commit().unwrap();
        current
    }

    #[test]
    fn test_first_execution() {
        let (_temp, tree, input) = setup();
        let current = tree.begin(&input).unwrap();

        for sub in SUBDIRS {
            assert!(current.dir().join(sub).is_dir());
        }
        assert!(current.input_snapshot().exists());
        assert!(!current.input_rollback().exists());
        assert!(!current.tfstate_rollback().exists());
        assert!(tree.persisted_indices().unwrap().is_empty());
    }

    #[test]
    fn test_rotation_is_contiguous_and_bounded() {
        let (_temp, tree, input) = setup();
        for n in 0..6 {
            run(&tree, &input, &format!("run{n}"));
            let indices = tree.persisted_indices().unwrap();
            let expected: Vec<usize> = (0..=n.min(3)).collect();
            assert_eq!(indices, expected);
        }

        // newest first
        let newest = MetadataStore::new(tree.persisted(0).dir()).read().unwrap();
        let oldest = MetadataStore::new(tree.persisted(3).dir()).read().unwrap();
        assert_eq!(newest.command, "run5");
        assert_eq!(oldest.command, "run2");
    }

    #[test]
    fn test_begin_carries_rollback_baseline() {
        let (_temp, tree, input) = setup();
        let first = tree.begin(&input).unwrap();
        fs::write(first.tfstate(), "{\"serial\": 1}").unwrap();
        tree.commit().unwrap();

        let second = tree.begin(&input).unwrap();
        assert_eq!(fs::read_to_string(second.tfstate()).unwrap(), "{\"serial\": 1}");
        assert_eq!(fs::read_to_string(second.tfstate_rollback()).unwrap(), "{\"serial\": 1}");
        assert!(second.input_rollback().exists());
    }

    #[test]
    fn test_uncommitted_run_leaves_history() {
        let (_temp, tree, input) = setup();
        run(&tree, &input, "first");
        tree.begin(&input).unwrap();

        // not committed: the next run starts from the same history
        let current = tree.begin(&input).unwrap();
        assert_eq!(tree.persisted_indices().unwrap(), vec![0]);
        let previous = ExecutionPaths::new(tree.wip_dir().join("execution_1"));
        assert_eq!(MetadataStore::new(previous.dir()).read().unwrap().command, "first");
        assert!(!current.metadata().exists());
    }

    #[test]
    fn test_commit_keeps_wip_and_sentinel() {
        let (_temp, tree, input) = setup();
        tree.block("post-rollback execution failed").unwrap();
        run(&tree, &input, "x");
        assert!(tree.wip_dir().join("execution_0").is_dir());
        assert!(tree.is_blocked());
        assert!(tree.blocked_reason().unwrap().contains("post-rollback"));
    }

    #[test]
    fn test_archive_and_purge() {
        let (temp, tree, input) = setup();
        run(&tree, &input, "a");
        let archive = tree
            .archive_and_purge(&temp.path().join("archive"), "acme_dc_p1")
            .unwrap();
        assert!(archive.exists());
        assert!(!tree.root().exists());

        let restored = temp.path().join("restored");
        snapshot::unpack(&archive, &restored).unwrap();
        assert!(restored.join("execution_0").join("execution_data.yml").exists());
    }

    #[test]
    fn test_restore_tfstate_baseline() {
        let (_temp, tree, input) = setup();
        let current = tree.begin(&input).unwrap();
        assert!(!tree.restore_tfstate_baseline(&current).unwrap());

        fs::write(current.tfstate_rollback(), "{}").unwrap();
        assert!(tree.restore_tfstate_baseline(&current).unwrap());
        assert!(current.tfstate().exists());
        assert!(!tree.restore_tfstate_baseline(&current).unwrap());
    }
}
