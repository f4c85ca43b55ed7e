//! Output of commands executed inside containers.

use mqha_common::error::{HarnessError, Result};

/// Exit code the container runtime reports when the command exists but
/// cannot be invoked.
pub const EXIT_CANNOT_INVOKE: i32 = 126;
/// Exit code the container runtime reports when the command is not found.
pub const EXIT_NOT_FOUND: i32 = 127;

/// Output from a command run inside a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Standard output from the command.
    pub stdout: String,
    /// Standard error from the command.
    pub stderr: String,
    /// Exit code returned by the command.
    pub exit_code: i32,
}

impl ExecOutput {
    /// Whether the command exited 0.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout followed by stderr, the way a terminal would interleave them
    /// for short outputs.
    #[must_use]
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}{}", self.stdout, self.stderr),
        }
    }

    /// Whether the command actually ran, as opposed to the runtime failing
    /// to find or invoke it.
    #[must_use]
    pub const fn launched(&self) -> bool {
        !matches!(self.exit_code, EXIT_CANNOT_INVOKE | EXIT_NOT_FOUND)
    }

    /// Passes the output through if the command ran, whatever its exit code.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Runtime`] if the runtime could not launch
    /// `command` at all.
    pub fn into_launched(self, command: &str) -> Result<Self> {
        if self.launched() {
            return Ok(self);
        }
        Err(HarnessError::runtime(
            "exec in container",
            format!(
                "{command} could not be run (exit {}): {}",
                self.exit_code,
                self.combined().trim()
            ),
        ))
    }
}
