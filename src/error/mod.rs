//! Error types for netcheck

use thiserror::Error;

/// Main error type for netcheck
#[derive(Debug, Error)]
pub enum NcError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Resource not found: {kind}/{name}")]
    NotFound { kind: String, name: String },

    #[error("Multiple matches for '{pattern}': {}", matches.join(", "))]
    AmbiguousMatch { pattern: String, matches: Vec<String> },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Timeout after {timeout:?} waiting for {description}")]
    Timeout {
        description: String,
        timeout: std::time::Duration,
    },

    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("Skipped: {0}")]
    Skipped(String),

    #[error("Job {name} ended as {actual}, expected {expected}")]
    UnexpectedJobOutcome {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("VMI {name} reached terminal phase {phase} before becoming ready")]
    VmiFailed { name: String, phase: String },

    #[error("Suite setup failed: {0}")]
    SuiteSetup(String),
}

impl NcError {
    /// Whether this error marks a skipped spec rather than a failure
    pub fn is_skip(&self) -> bool {
        matches!(self, NcError::Skipped(_))
    }

    /// Attach context to an error, turning it into an assertion failure.
    ///
    /// Skips pass through untouched.
    pub fn context(self, message: impl Into<String>) -> Self {
        match self {
            NcError::Skipped(_) => self,
            other => NcError::Assertion(format!("{}: {}", message.into(), other)),
        }
    }
}

impl From<serde_json::Error> for NcError {
    fn from(e: serde_json::Error) -> Self {
        NcError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for NcError {
    fn from(e: serde_yaml::Error) -> Self {
        NcError::Serialization(e.to_string())
    }
}

/// Result type alias for netcheck
pub type Result<T> = std::result::Result<T, NcError>;

/// Extension for annotating fallible calls inside spec bodies
pub trait ResultExt<T> {
    /// Wrap the error with a human-readable expectation message
    fn expect_that(self, message: &str) -> Result<T>;
}

impl<T, E: Into<NcError>> ResultExt<T> for std::result::Result<T, E> {
    fn expect_that(self, message: &str) -> Result<T> {
        self.map_err(|e| e.into().context(message))
    }
}
