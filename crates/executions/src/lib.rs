//! # executions
//!
//! Durable record of every orchestrator run.
//!
//! - [`ExecutionTree`]: `execution_N` rotation, the `wip` working copy,
//!   commit, archiving and the blocking sentinel
//! - [`MetadataStore`]: the per-execution `execution_data.yml`
//! - [`history`] / [`rollback_candidates`]: queries over persisted records
//! - [`snapshot`]: tgz snapshots of input trees
//!
//! ## Example
//!
//! ```no_run
//! use executions::{ExecutionRecord, ExecutionTree, ExitCode, MetadataStore};
//! use std::path::Path;
//!
//! let tree = ExecutionTree::new("executions/acme/dc1/fabric", 50);
//! let current = tree.begin(Path::new("projects/acme/dc1/fabric")).unwrap();
//!
//! let store = MetadataStore::new(current.dir());
//! store.create(&ExecutionRecord::started("aa")).unwrap();
//! let record = store.update(|r| r.exit_code = Some(ExitCode::TfExecOk)).unwrap();
//!
//! if record.exit_code.is_some_and(|c| c.commits_history()) {
//!     tree.commit().unwrap();
//! }
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod exit;
pub mod history;
pub mod id;
pub mod layout;
pub mod record;
pub mod snapshot;
pub mod tree;

pub use error::{Error, Result};
pub use exit::ExitCode;
pub use history::{ScopeFilter, StoredExecution, history, rollback_candidates};
pub use id::ExecutionId;
pub use layout::ExecutionPaths;
pub use record::{CommitAction, ExecutionRecord, MetadataStore};
pub use tree::{DEFAULT_RETENTION, ExecutionTree};
