//! Error types for the executions crate

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while managing executions
#[derive(Error, Debug)]
pub enum Error {
    /// IO error on a specific path
    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Metadata could not be parsed or serialized
    #[error("invalid execution metadata {}: {source}", .path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The metadata record of this execution was already created
    #[error("execution metadata already exists: {}", .0.display())]
    RecordExists(PathBuf),

    /// The current execution directory could not be created
    #[error("cannot create execution directory {}: {source}", .path.display())]
    CreateExecution {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal failed
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

impl Error {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// Whether the error leaves the execution state ambiguous.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CreateExecution { .. } | Self::RecordExists(_))
    }
}

/// Result type for execution operations
pub type Result<T> = std::result::Result<T, Error>;
