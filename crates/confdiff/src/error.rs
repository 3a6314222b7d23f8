//! Error types for the confdiff crate

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while diffing snapshots
#[derive(Error, Debug)]
pub enum Error {
    /// IO error on a specific path
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A YAML file could not be parsed
    #[error("invalid YAML in {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A menu file is not a mapping of object types
    #[error("{}: top level must be a mapping of object types", .0.display())]
    NotAMapping(PathBuf),

    /// The same object type is defined in two files of a menu
    #[error("object type '{kind}' defined twice in {}", .path.display())]
    DuplicateType { kind: String, path: PathBuf },

    /// Two objects of one type share a name
    #[error("{kind} '{name}' defined twice in {}", .path.display())]
    DuplicateName {
        kind: String,
        name: String,
        path: PathBuf,
    },

    /// Directory traversal failed
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for diff operations
pub type Result<T> = std::result::Result<T, Error>;
