//! Queries over the persisted execution records.

use crate::error::Result;
use crate::id::ExecutionId;
use crate::record::{self, ExecutionRecord, METADATA_FILE};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Which part of the executions tree to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeFilter {
    /// Every customer, domain and project.
    All,
    /// One project.
    Project {
        customer: String,
        domain: String,
        project: String,
    },
}

impl ScopeFilter {
    /// Filter for one project.
    pub fn project(customer: &str, domain: &str, project: &str) -> Self {
        Self::Project {
            customer: customer.to_string(),
            domain: domain.to_string(),
            project: project.to_string(),
        }
    }

    fn root(&self, base: &Path) -> PathBuf {
        match self {
            Self::All => base.to_path_buf(),
            Self::Project {
                customer,
                domain,
                project,
            } => base.join(customer).join(domain).join(project),
        }
    }

    /// Walk depth of a project's `wip` directory below the root.
    fn wip_depth(&self) -> usize {
        match self {
            Self::All => 4,
            Self::Project { .. } => 1,
        }
    }
}

/// A record together with the directory it was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredExecution {
    pub dir: PathBuf,
    pub record: ExecutionRecord,
}

impl StoredExecution {
    /// The record's id. Stored executions always carry one.
    #[must_use]
    pub fn id(&self) -> Option<&ExecutionId> {
        self.record.execution_id.as_ref()
    }
}

/// Every persisted record under `base` matching `filter`, newest first.
///
/// Working copies (`wip`) are skipped, as are records without an id.
/// Unreadable records are logged and skipped.
pub fn history(base: &Path, filter: &ScopeFilter) -> Result<Vec<StoredExecution>> {
    let root = filter.root(base);
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    let wip_depth = filter.wip_depth();
    let walker = WalkDir::new(&root).into_iter().filter_entry(|e| {
        let is_wip = e.depth() == wip_depth && e.file_name() == "wip";
        e.depth() == 0 || (!is_wip && !e.file_name().to_string_lossy().starts_with('.'))
    });
    for entry in walker {
        let entry = entry?;
        if entry.file_name() != METADATA_FILE {
            continue;
        }
        match record::load(entry.path()) {
            Ok(record) if record.execution_id.is_some() => {
                let dir = entry.path().parent().unwrap_or(&root).to_path_buf();
                found.push(StoredExecution { dir, record });
            }
            Ok(_) => log::debug!("Skipping record without id: {}", entry.path().display()),
            Err(e) => log::warn!("Skipping unreadable record: {e}"),
        }
    }

    found.sort_by(|a, b| b.record.execution_id.cmp(&a.record.execution_id));
    Ok(found)
}

/// Successful executions that can be rolled back to, newest first,
/// excluding `current`.
pub fn rollback_candidates(
    base: &Path,
    filter: &ScopeFilter,
    current: Option<&ExecutionId>,
) -> Result<Vec<StoredExecution>> {
    Ok(history(base, filter)?
        .into_iter()
        .filter(|e| e.record.exit_code.is_some_and(|c| c.is_successful()))
        .filter(|e| current.is_none_or(|id| e.id() != Some(id)))
        .collect())
}
