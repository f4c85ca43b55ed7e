//! Queue manager status probe.
//!
//! Runs `dspmq -m <name>` once inside a container and classifies the
//! result. The probe never retries; callers that need to wait poll it.

use mqha_common::constants::{STATUS_COMMAND, STATUS_RUNNING};
use mqha_common::error::{HarnessError, Result};
use mqha_common::types::{ContainerId, QueueManagerStatus};
use mqha_runtime::backend::ContainerRuntime;

/// Which container of a pair holds the active instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveStandby {
    /// Container whose queue manager reports `Running`.
    pub active: ContainerId,
    /// Container whose queue manager reports `Running as standby`.
    pub standby: ContainerId,
}

/// Issues status queries against a named queue manager.
#[derive(Clone, Copy)]
pub struct QueueManagerProbe<'a> {
    runtime: &'a dyn ContainerRuntime,
    qmgr_name: &'a str,
}

impl<'a> QueueManagerProbe<'a> {
    /// Creates a probe for `qmgr_name`.
    #[must_use]
    pub fn new(runtime: &'a dyn ContainerRuntime, qmgr_name: &'a str) -> Self {
        Self { runtime, qmgr_name }
    }

    /// Queries the queue manager status in `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the exec fails, `dspmq` exits non-zero, or its
    /// output carries no `STATUS(...)` field.
    pub fn status(&self, id: &ContainerId) -> Result<QueueManagerStatus> {
        let cmd = [
            STATUS_COMMAND.to_string(),
            "-m".to_string(),
            self.qmgr_name.to_string(),
        ];
        let out = self.runtime.exec(id, &cmd)?;
        if !out.success() {
            return Err(HarnessError::runtime(
                "query queue manager status",
                format!("dspmq exited with {}: {}", out.exit_code, out.combined().trim()),
            ));
        }
        let status = parse_dspmq(&out.stdout)?;
        tracing::debug!(id = %id.short(), qmgr = %self.qmgr_name, %status, "probed");
        Ok(status)
    }

    /// Fails unless `id` reports `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::UnexpectedStatus`] carrying the observed
    /// status, or any error from [`status`](Self::status).
    pub fn expect_status(&self, id: &ContainerId, expected: &QueueManagerStatus) -> Result<()> {
        let actual = self.status(id)?;
        if &actual == expected {
            return Ok(());
        }
        Err(HarnessError::UnexpectedStatus {
            container: id.clone(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }

    /// Fails unless `id` is the active instance.
    ///
    /// # Errors
    ///
    /// See [`expect_status`](Self::expect_status).
    pub fn expect_running(&self, id: &ContainerId) -> Result<()> {
        self.expect_status(id, &QueueManagerStatus::parse(STATUS_RUNNING))
    }

    /// Classifies two containers into active and standby.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::NotActiveStandby`] unless exactly one reports
    /// `Running` and the other `Running as standby`.
    pub fn active_standby(&self, a: &ContainerId, b: &ContainerId) -> Result<ActiveStandby> {
        let status_a = self.status(a)?;
        let status_b = self.status(b)?;
        let pair = match (&status_a, &status_b) {
            (QueueManagerStatus::Running, QueueManagerStatus::Standby) => ActiveStandby {
                active: a.clone(),
                standby: b.clone(),
            },
            (QueueManagerStatus::Standby, QueueManagerStatus::Running) => ActiveStandby {
                active: b.clone(),
                standby: a.clone(),
            },
            _ => {
                return Err(HarnessError::NotActiveStandby {
                    first: format!("{}: {status_a}", a.short()),
                    second: format!("{}: {status_b}", b.short()),
                });
            }
        };
        tracing::info!(
            active = %pair.active.short(),
            standby = %pair.standby.short(),
            "pair classified"
        );
        Ok(pair)
    }
}

/// Extracts the status from `dspmq` output such as
/// `QMNAME(QM1)      STATUS(Running as standby)`.
///
/// # Errors
///
/// Returns a runtime error if no `STATUS(...)` field is present.
pub fn parse_dspmq(output: &str) -> Result<QueueManagerStatus> {
    const FIELD: &str = "STATUS(";
    output
        .lines()
        .find_map(|line| {
            let start = line.find(FIELD)? + FIELD.len();
            let end = line[start..].find(')')? + start;
            Some(QueueManagerStatus::parse(&line[start..end]))
        })
        .ok_or_else(|| {
            HarnessError::runtime(
                "parse queue manager status",
                format!("no STATUS field in dspmq output: {:?}", output.trim()),
            )
        })
}
