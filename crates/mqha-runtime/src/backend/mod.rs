//! Container runtime abstraction.

pub mod docker;
pub mod simulated;

use std::time::Duration;

use mqha_common::constants::CALL_TIMEOUT;
use mqha_common::error::Result;
#[cfg(doc)]
use mqha_common::error::HarnessError;
use mqha_common::types::{ContainerId, ContainerState, Mount, Volume};

use crate::exec::ExecOutput;

/// Configuration for creating a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Optional container name. The runtime picks one when unset.
    pub name: Option<String>,
    /// Image reference.
    pub image: String,
    /// Environment variables.
    pub env: Vec<(String, String)>,
    /// Volume mounts.
    pub mounts: Vec<Mount>,
}

impl ContainerSpec {
    /// Creates a spec for `image` with no environment and no mounts.
    #[must_use]
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Self::default()
        }
    }

    /// Adds environment variables.
    #[must_use]
    pub fn env<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.env.extend(vars);
        self
    }

    /// Adds a volume mount.
    #[must_use]
    pub fn mount(mut self, volume: &str, target: &str) -> Self {
        self.mounts.push(Mount::new(volume, target));
        self
    }

    /// Looks up an environment variable by name.
    #[must_use]
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the volume mounted at `target`, if any.
    #[must_use]
    pub fn volume_at(&self, target: &str) -> Option<&str> {
        self.mounts
            .iter()
            .find(|m| m.target == target)
            .map(|m| m.volume.as_str())
    }
}

/// Client for an external container runtime.
///
/// Every call is attempted once and is bounded in time. Failures, timeouts
/// included, are returned to the caller, which is expected to abort the
/// scenario.
pub trait ContainerRuntime: Send + Sync {
    /// Creates a named volume.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime rejects the volume.
    fn create_volume(&self, name: &str) -> Result<Volume>;

    /// Removes a named volume.
    ///
    /// # Errors
    ///
    /// Returns an error if the volume does not exist or is still in use.
    fn remove_volume(&self, name: &str) -> Result<()>;

    /// Creates a container without starting it.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be created.
    fn create(&self, spec: &ContainerSpec) -> Result<ContainerId>;

    /// Starts a created or stopped container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be started.
    fn start(&self, id: &ContainerId) -> Result<()>;

    /// Stops a container gracefully, returning once it has exited.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be stopped.
    fn stop(&self, id: &ContainerId) -> Result<()>;

    /// Sends `signal` (for example `SIGTERM`) to the container's main process.
    ///
    /// # Errors
    ///
    /// Returns an error if the container is not running or the signal is
    /// not recognised.
    fn kill(&self, id: &ContainerId, signal: &str) -> Result<()>;

    /// Removes a container, stopping it first if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be removed.
    fn remove(&self, id: &ContainerId) -> Result<()>;

    /// Executes a command inside a running container, giving up after
    /// `timeout`.
    ///
    /// A non-zero exit of the command itself is reported through
    /// [`ExecOutput::exit_code`], not as an error.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Timeout`] if the call does not complete in
    /// time, or a runtime error if the command cannot be launched at all.
    fn exec_within(
        &self,
        id: &ContainerId,
        cmd: &[String],
        timeout: Duration,
    ) -> Result<ExecOutput>;

    /// Returns everything the container has written to stdout and stderr,
    /// giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Timeout`] if the call does not complete in
    /// time, or an error if logs cannot be retrieved.
    fn logs_within(&self, id: &ContainerId, timeout: Duration) -> Result<String>;

    /// Returns the current run state of a container, giving up after
    /// `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Timeout`] if the call does not complete in
    /// time, or an error if the container cannot be inspected.
    fn state_within(&self, id: &ContainerId, timeout: Duration) -> Result<ContainerState>;

    /// Bound applied to calls that take no explicit timeout.
    fn call_timeout(&self) -> Duration {
        CALL_TIMEOUT
    }

    /// [`exec_within`](Self::exec_within) bounded by the call timeout.
    ///
    /// # Errors
    ///
    /// See [`exec_within`](Self::exec_within).
    fn exec(&self, id: &ContainerId, cmd: &[String]) -> Result<ExecOutput> {
        self.exec_within(id, cmd, self.call_timeout())
    }

    /// [`logs_within`](Self::logs_within) bounded by the call timeout.
    ///
    /// # Errors
    ///
    /// See [`logs_within`](Self::logs_within).
    fn logs(&self, id: &ContainerId) -> Result<String> {
        self.logs_within(id, self.call_timeout())
    }

    /// [`state_within`](Self::state_within) bounded by the call timeout.
    ///
    /// # Errors
    ///
    /// See [`state_within`](Self::state_within).
    fn state(&self, id: &ContainerId) -> Result<ContainerState> {
        self.state_within(id, self.call_timeout())
    }

    /// Returns whether the runtime is reachable.
    fn is_available(&self) -> bool;
}

/// Signals the harness knows how to name.
const KNOWN_SIGNALS: &[&str] = &[
    "SIGHUP", "SIGINT", "SIGQUIT", "SIGKILL", "SIGUSR1", "SIGUSR2", "SIGTERM",
];

/// Whether `signal` is a signal name or number the runtimes accept.
#[must_use]
pub fn is_valid_signal(signal: &str) -> bool {
    let upper = signal.to_ascii_uppercase();
    let named = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{upper}")
    };
    KNOWN_SIGNALS.contains(&named.as_str())
        || signal.parse::<u8>().is_ok_and(|n| (1..=64).contains(&n))
}
