//! Unified error types for the harness workspace.
//!
//! Runtime failures, timeouts and assertion mismatches all end up here so a
//! scenario can bail out with `?` and the test report still carries the
//! observed value.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::ContainerId;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A container runtime call failed.
    #[error("container runtime failed to {operation}: {message}")]
    Runtime {
        /// Operation that was attempted (for example `start container`).
        operation: &'static str,
        /// Diagnostic reported by the runtime.
        message: String,
    },

    /// Spawning or talking to an external process failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Binary or file involved in the failure.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A bounded wait ran out of time.
    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout {
        /// What was being waited for.
        what: String,
        /// How long the wait lasted.
        waited: Duration,
    },

    /// A queue manager reported a status other than the one asserted.
    #[error(
        "expected queue manager in {container} to be {expected}, \
         dspmq returned status of {actual}"
    )]
    UnexpectedStatus {
        /// Container that was probed.
        container: ContainerId,
        /// Status the scenario asserted.
        expected: String,
        /// Status the probe observed.
        actual: String,
    },

    /// Two containers did not resolve into one active and one standby.
    #[error("expected one active and one standby queue manager, got {first} and {second}")]
    NotActiveStandby {
        /// Status of the first container, prefixed with its id.
        first: String,
        /// Status of the second container, prefixed with its id.
        second: String,
    },

    /// A container exited while the harness was still waiting on it.
    #[error("container {container} exited unexpectedly; last output:\n{logs}")]
    ContainerExited {
        /// Container that exited.
        container: ContainerId,
        /// Tail of the container output at the time it was noticed.
        logs: String,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl HarnessError {
    /// Builds a [`HarnessError::Runtime`] from any displayable diagnostic.
    pub fn runtime(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Runtime {
            operation,
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_status_reports_observed_value() {
        let err = HarnessError::UnexpectedStatus {
            container: ContainerId::new("qm1b"),
            expected: "Running".into(),
            actual: "Running as standby".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("qm1b"));
        assert!(msg.contains("dspmq returned status of Running as standby"));
    }

    #[test]
    fn timeout_mentions_subject() {
        let err = HarnessError::Timeout {
            what: "container abc to become ready".into(),
            waited: Duration::from_secs(30),
        };
        assert_eq!(
            err.to_string(),
            "timed out after 30s waiting for container abc to become ready"
        );
    }

    #[test]
    fn runtime_helper_keeps_operation() {
        let err = HarnessError::runtime("start container", "no such container: x");
        assert!(matches!(
            err,
            HarnessError::Runtime {
                operation: "start container",
                ..
            }
        ));
    }
}
