//! Execution metadata record and its YAML store.

use crate::error::{Error, Result};
use crate::exit::ExitCode;
use crate::id::ExecutionId;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata file name inside an execution directory.
pub const METADATA_FILE: &str = "execution_data.yml";

/// What happens to blueprint changes after a successful apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitAction {
    /// Deploy the staging blueprint.
    Commit,
    /// Leave the changes staged.
    Stage,
}

impl fmt::Display for CommitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Commit => f.write_str("commit"),
            Self::Stage => f.write_str("stage"),
        }
    }
}

/// One run of the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<ExecutionId>,

    /// Local creation time, for humans.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_local: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_utc: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_utc: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<ExitCode>,

    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub customer: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub project: String,

    /// Command alias that started the execution.
    #[serde(default)]
    pub command: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_action: Option<CommitAction>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_comment: Option<String>,

    /// Change flag per non-declarative menu.
    #[serde(default)]
    pub changes: BTreeMap<String, bool>,

    #[serde(default)]
    pub changes_in_blueprints: bool,

    #[serde(default)]
    pub blueprints_with_changes: Vec<String>,

    /// Set on the corrective execution launched after a rollback.
    #[serde(default)]
    pub post_rollback: bool,

    /// Execution reverted to, when this execution rolled back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_target: Option<ExecutionId>,
}

impl ExecutionRecord {
    /// A fresh record with identity and creation timestamps fixed.
    #[must_use]
    pub fn started(command: &str) -> Self {
        let now = Utc::now();
        Self {
            execution_id: Some(ExecutionId::from_time(now)),
            created_local: Some(now.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()),
            created_utc: Some(now),
            command: command.to_string(),
            ..Self::default()
        }
    }

    /// Whether any non-declarative menu changed.
    #[must_use]
    pub fn has_menu_changes(&self) -> bool {
        self.changes.values().any(|changed| *changed)
    }

    /// `customer/domain/project` of the execution.
    #[must_use]
    pub fn scope_label(&self) -> String {
        format!("{}/{}/{}", self.customer, self.domain, self.project)
    }
}

/// Reads and writes the metadata of one execution directory.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
}

impl MetadataStore {
    /// Store for the execution in `dir`.
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(METADATA_FILE),
        }
    }

    /// Path of the metadata file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the initial record. Fails when one already exists.
    pub fn create(&self, record: &ExecutionRecord) -> Result<()> {
        if self.path.exists() {
            return Err(Error::RecordExists(self.path.clone()));
        }
        self.write(record)
    }

    /// Read-modify-write the record.
    pub fn update<F>(&self, change: F) -> Result<ExecutionRecord>
    where
        F: FnOnce(&mut ExecutionRecord),
    {
        let mut record = self.read()?;
        change(&mut record);
        self.write(&record)?;
        Ok(record)
    }

    /// The full record, or an empty record when the file is missing.
    pub fn read(&self) -> Result<ExecutionRecord> {
        if !self.path.exists() {
            log::debug!("No metadata at {}, using empty record", self.path.display());
            return Ok(ExecutionRecord::default());
        }
        load(&self.path)
    }

    fn write(&self, record: &ExecutionRecord) -> Result<()> {
        let content = serde_yaml::to_string(record).map_err(|source| Error::Metadata {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, content).map_err(|e| Error::io("write", &self.path, e))?;
        log::debug!("Saved metadata to {}", self.path.display());
        Ok(())
    }
}

pub(crate) fn load(path: &Path) -> Result<ExecutionRecord> {
    let content = fs::read_to_string(path).map_err(|e| Error::io("read", path, e))?;
    serde_yaml::from_str(&content).map_err(|source| Error::Metadata {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_once() {
        let temp = TempDir::new().unwrap();
        let store = MetadataStore::new(temp.path());
        let record = ExecutionRecord::started("a");

        store.create(&record).unwrap();
        let err = store.create(&record).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(store.read().unwrap(), record);
    }

    #[test]
    fn test_read_missing_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = MetadataStore::new(temp.path());
        assert_eq!(store.read().unwrap(), ExecutionRecord::default());
    }

    #[test]
    fn test_update_keeps_identity() {
        let temp = TempDir::new().unwrap();
        let store = MetadataStore::new(temp.path());
        let record = ExecutionRecord::started("aa");
        store.create(&record).unwrap();

        store
            .update(|r| {
                r.exit_code = Some(ExitCode::TfExecOk);
                r.changes.insert("design".to_string(), true);
            })
            .unwrap();

        let read = store.read().unwrap();
        assert_eq!(read.execution_id, record.execution_id);
        assert_eq!(read.exit_code, Some(ExitCode::TfExecOk));
        assert!(read.has_menu_changes());
    }

    #[test]
    fn test_unknown_fields_tolerated() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(METADATA_FILE),
            "execution_id: '1'\nexit_code: TF_EXEC_OK\nlegacy_field: 3\n",
        )
        .unwrap();
        let record = MetadataStore::new(temp.path()).read().unwrap();
        assert_eq!(record.exit_code, Some(ExitCode::TfExecOk));
    }
}
