//! Error types for controller operations.
//!
//! Errors are categorized so the poll protocol and the rollback logic can
//! make decisions on structured kinds instead of message text.

use std::fmt;
use std::io;

/// Result type alias for controller operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of controller errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection, TLS or timeout problems (transient, retryable).
    Network,
    /// Login rejected or token expired.
    Auth,
    /// The named object does not exist on the controller.
    NotFound,
    /// The controller answered with a terminal, non-success status.
    Remote,
    /// A retry or poll budget ran out before a terminal answer.
    Exhausted,
    /// The response body could not be interpreted.
    Format,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Whether the operation can be treated as already done.
    #[must_use]
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Controller unreachable",
            Self::Auth => "Authentication failed",
            Self::NotFound => "Object not found",
            Self::Remote => "Controller rejected the request",
            Self::Exhausted => "Operation did not complete in time",
            Self::Format => "Unexpected controller response",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check the target URL and network reachability",
            Self::Auth => "Verify the target credentials (APSTRA_USERNAME / APSTRA_PASSWORD)",
            Self::NotFound => "Verify the object name in the input files",
            Self::Remote => "Inspect the blueprint in the controller UI for pending tasks",
            Self::Exhausted => "Wait for running controller tasks to finish and retry",
            Self::Format => "Check the controller version against the supported API",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to the controller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level failure (no HTTP status available).
    #[error("HTTP request failed: {message}")]
    Network {
        /// Error message from the transport.
        message: String,
    },

    /// Login was rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// A named object could not be resolved.
    #[error("{kind} not found: {name}")]
    NotFound {
        /// Object kind (blueprint, configlet, ...).
        kind: String,
        /// Display name that was looked up.
        name: String,
    },

    /// A terminal, non-success status was returned.
    #[error("{operation} failed with HTTP {status}: {body}")]
    Terminal {
        /// Operation being performed.
        operation: String,
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// Initial request kept conflicting until the retry budget ran out.
    #[error("{operation} still conflicting after {attempts} attempts")]
    RetryExhausted {
        /// Operation being performed.
        operation: String,
        /// Attempts made.
        attempts: u32,
    },

    /// The accepted operation never reported completion.
    #[error("{operation} not completed after {attempts} polls")]
    PollExhausted {
        /// Operation being performed.
        operation: String,
        /// Polls made.
        attempts: u32,
    },

    /// The response body did not have the expected shape.
    #[error("invalid controller response: {0}")]
    InvalidResponse(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Network { .. } | Self::Io(_) => ErrorCategory::Network,
            Self::Auth(_) => ErrorCategory::Auth,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Terminal { status, .. } => match status {
                401 | 403 => ErrorCategory::Auth,
                404 => ErrorCategory::NotFound,
                _ => ErrorCategory::Remote,
            },
            Self::RetryExhausted { .. } | Self::PollExhausted { .. } => ErrorCategory::Exhausted,
            Self::InvalidResponse(_) => ErrorCategory::Format,
            Self::Other(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether this error can be safely ignored.
    #[must_use]
    pub fn is_ignorable(&self) -> bool {
        self.category().is_ignorable()
    }

    /// The HTTP status carried by this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Terminal { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Terminal {
                operation: "request".to_string(),
                status: code,
                body: String::new(),
            },
            other => Self::Network {
                message: other.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
