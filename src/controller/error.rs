//! Error types for the controller.
//!
//! Defines custom error types with classification for retry behavior, and the
//! typed outcome of a CronJob create call.

use std::fmt;

use thiserror::Error;

/// Error type for controller operations
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Transient error that should be retried
    #[error("Transient error: {0}")]
    Transient(String),
}

impl Error {
    /// Check if this error indicates the object already exists
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Kube(kube::Error::Api(e)) if e.code == 409)
    }

    /// Check if a single watch item failed to decode.
    ///
    /// The stream stays usable after such an item.
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Kube(kube::Error::SerdeError(_)))
    }

    /// Check if this error should be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            // Network errors, rate limiting, and server errors
            Error::Kube(e) => {
                matches!(
                    e,
                    kube::Error::Api(api_err) if api_err.code >= 500 || api_err.code == 429
                ) || matches!(e, kube::Error::Service(_) | kube::Error::HyperError(_))
            }
            Error::Transient(_) => true,
        }
    }
}

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of a single CronJob create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The CronJob was created
    Created,
    /// A CronJob with the derived name already exists
    AlreadyExists,
    /// The API server failed in a way that may succeed on retry
    Transient(String),
    /// The request was rejected and will not succeed on retry
    Fatal(String),
}

impl CreateOutcome {
    /// Classify the result of a create call
    pub fn from_result<T>(result: Result<T>) -> Self {
        match result {
            Ok(_) => CreateOutcome::Created,
            Err(e) if e.is_conflict() => CreateOutcome::AlreadyExists,
            Err(e) if e.is_retryable() => CreateOutcome::Transient(e.to_string()),
            Err(e) => CreateOutcome::Fatal(e.to_string()),
        }
    }

    /// Whether another attempt could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, CreateOutcome::Transient(_))
    }

    /// Metric label for this outcome
    pub fn label(&self) -> &'static str {
        match self {
            CreateOutcome::Created => "created",
            CreateOutcome::AlreadyExists => "already_exists",
            CreateOutcome::Transient(_) => "transient_error",
            CreateOutcome::Fatal(_) => "fatal_error",
        }
    }
}

impl fmt::Display for CreateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreateOutcome::Created => write!(f, "Created"),
            CreateOutcome::AlreadyExists => write!(f, "AlreadyExists"),
            CreateOutcome::Transient(msg) => write!(f, "Transient: {}", msg),
            CreateOutcome::Fatal(msg) => write!(f, "Fatal: {}", msg),
        }
    }
}
