//! The multi-instance failover scenarios.
//!
//! Each scenario takes the runtime and configuration explicitly, runs a
//! fixed sequence of runtime and probe calls, and releases everything it
//! created before returning.

use std::fmt;
use std::str::FromStr;

use mqha_common::config::HarnessConfig;
use mqha_common::constants::{
    MOUNT_DATA, MOUNT_SHARED_DATA, MOUNT_SHARED_LOG, SHARED_DATA_VOLUME, SHARED_LOGS_VOLUME,
    missing_mount_message,
};
use mqha_common::error::{HarnessError, Result};
use mqha_runtime::backend::ContainerRuntime;

use crate::scenario::Scenario;

/// Starts a multi-instance pair, kills the active instance, checks the
/// standby takes over, then restarts the killed container and checks the
/// pair recovers.
///
/// # Errors
///
/// Returns the first runtime, timeout or assertion failure.
pub fn start_stop(runtime: &dyn ContainerRuntime, config: &HarnessConfig) -> Result<()> {
    Scenario::new("start_stop", runtime, config).run(|s| {
        let pair = s.configure_multi_instance()?;
        s.wait_for_ready(&pair.first)?;
        s.wait_for_ready(&pair.second)?;

        let roles = s.probe().active_standby(&pair.first, &pair.second)?;

        s.kill(&roles.active)?;
        s.settle();
        s.probe().expect_running(&roles.standby)?;

        s.start(&roles.active)?;
        s.wait_for_ready(&roles.active)?;
        let _ = s.probe().active_standby(&pair.first, &pair.second)?;
        Ok(())
    })
}

/// Starts a multi-instance pair, stops the active container gracefully and
/// checks the standby takes over.
///
/// # Errors
///
/// Returns the first runtime, timeout or assertion failure.
pub fn container_stop(runtime: &dyn ContainerRuntime, config: &HarnessConfig) -> Result<()> {
    Scenario::new("container_stop", runtime, config).run(|s| {
        let pair = s.configure_multi_instance()?;
        s.wait_for_ready(&pair.first)?;
        s.wait_for_ready(&pair.second)?;

        let roles = s.probe().active_standby(&pair.first, &pair.second)?;

        s.stop(&roles.active)?;
        s.probe().expect_running(&roles.standby)
    })
}

/// Starts two queue managers concurrently against the same shared volumes
/// and checks one ends up active and the other standby.
///
/// # Errors
///
/// Returns the first runtime, timeout or assertion failure. Containers that
/// did start are released even when the other start failed.
#[cfg(feature = "file-lock")]
pub fn race(runtime: &dyn ContainerRuntime, config: &HarnessConfig) -> Result<()> {
    use std::sync::mpsc;

    use crate::scenario::{StartedQueueManager, launch_queue_manager};

    Scenario::new("race", runtime, config).run(|s| {
        let shared_logs = s.create_volume(SHARED_LOGS_VOLUME)?;
        let shared_data = s.create_volume(SHARED_DATA_VOLUME)?;

        let (tx, rx) = mpsc::sync_channel::<Result<StartedQueueManager>>(2);
        std::thread::scope(|scope| {
            for _ in 0..2 {
                let tx = tx.clone();
                let (logs, data) = (&shared_logs, &shared_data);
                let _ = scope.spawn(move || {
                    let started =
                        launch_queue_manager(runtime, config, true, Some(logs), Some(data));
                    let _ = tx.send(started);
                });
            }
        });
        drop(tx);

        let results: Vec<_> = rx.iter().collect();
        let mut ids = Vec::new();
        let mut first_error = None;
        for result in results {
            match result {
                Ok(qm) => {
                    s.adopt(&qm);
                    ids.push(qm.id);
                }
                Err(e) => {
                    let _ = first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        let [a, b] = ids.as_slice() else {
            return Err(HarnessError::runtime(
                "start queue managers",
                format!("expected 2 started containers, got {}", ids.len()),
            ));
        };

        s.wait_for_ready(a)?;
        s.wait_for_ready(b)?;
        let _ = s.probe().active_standby(a, b)?;
        Ok(())
    })
}

/// Starts a multi-instance queue manager with a private data volume but no
/// shared mounts and checks it terminates complaining about the log mount.
///
/// # Errors
///
/// Returns a timeout if the diagnostic never appears.
pub fn no_shared_mounts(runtime: &dyn ContainerRuntime, config: &HarnessConfig) -> Result<()> {
    Scenario::new("no_shared_mounts", runtime, config).run(|s| {
        let id = s.start_queue_manager(true, None, None)?;
        let _ = s.wait_for_termination_message(&id, &missing_mount_message(MOUNT_SHARED_LOG))?;
        Ok(())
    })
}

/// Starts a multi-instance queue manager with only the shared data mount
/// and checks it terminates complaining about the log mount.
///
/// # Errors
///
/// Returns a timeout if the diagnostic never appears.
pub fn no_shared_logs(runtime: &dyn ContainerRuntime, config: &HarnessConfig) -> Result<()> {
    Scenario::new("no_shared_logs", runtime, config).run(|s| {
        let shared_data = s.create_volume(SHARED_DATA_VOLUME)?;
        let id = s.start_queue_manager(true, None, Some(&shared_data))?;
        let _ = s.wait_for_termination_message(&id, &missing_mount_message(MOUNT_SHARED_LOG))?;
        Ok(())
    })
}

/// Starts a multi-instance queue manager with only the shared log mount and
/// checks it terminates complaining about the data mount.
///
/// # Errors
///
/// Returns a timeout if the diagnostic never appears.
pub fn no_shared_data(runtime: &dyn ContainerRuntime, config: &HarnessConfig) -> Result<()> {
    Scenario::new("no_shared_data", runtime, config).run(|s| {
        let shared_logs = s.create_volume(SHARED_LOGS_VOLUME)?;
        let id = s.start_queue_manager(true, Some(&shared_logs), None)?;
        let _ = s.wait_for_termination_message(&id, &missing_mount_message(MOUNT_SHARED_DATA))?;
        Ok(())
    })
}

/// Starts a multi-instance queue manager with no volumes at all and checks
/// it terminates complaining about the data mount.
///
/// # Errors
///
/// Returns a timeout if the diagnostic never appears.
pub fn no_mounts(runtime: &dyn ContainerRuntime, config: &HarnessConfig) -> Result<()> {
    Scenario::new("no_mounts", runtime, config).run(|s| {
        let id = s.start_queue_manager(false, None, None)?;
        let _ = s.wait_for_termination_message(&id, &missing_mount_message(MOUNT_DATA))?;
        Ok(())
    })
}

/// Every scenario the harness knows, for runners that select by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioKind {
    /// See [`start_stop`].
    StartStop,
    /// See [`container_stop`].
    ContainerStop,
    /// See `race`; only runnable with the `file-lock` feature.
    Race,
    /// See [`no_shared_mounts`].
    NoSharedMounts,
    /// See [`no_shared_logs`].
    NoSharedLogs,
    /// See [`no_shared_data`].
    NoSharedData,
    /// See [`no_mounts`].
    NoMounts,
}

impl ScenarioKind {
    /// All scenarios in the order a full run executes them.
    pub const ALL: [Self; 7] = [
        Self::StartStop,
        Self::ContainerStop,
        Self::Race,
        Self::NoSharedMounts,
        Self::NoSharedLogs,
        Self::NoSharedData,
        Self::NoMounts,
    ];

    /// Stable name used on the command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::StartStop => "start-stop",
            Self::ContainerStop => "container-stop",
            Self::Race => "race",
            Self::NoSharedMounts => "no-shared-mounts",
            Self::NoSharedLogs => "no-shared-logs",
            Self::NoSharedData => "no-shared-data",
            Self::NoMounts => "no-mounts",
        }
    }

    /// One-line description.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::StartStop => {
                "kill the active instance, standby takes over, restart recovers the pair"
            }
            Self::ContainerStop => "stop the active container, standby takes over",
            Self::Race => "start both instances concurrently, one becomes active",
            Self::NoSharedMounts => "no shared mounts, terminates on missing /mnt/mqm-log",
            Self::NoSharedLogs => "shared data only, terminates on missing /mnt/mqm-log",
            Self::NoSharedData => "shared logs only, terminates on missing /mnt/mqm-data",
            Self::NoMounts => "no volumes at all, terminates on missing /mnt/mqm",
        }
    }

    /// Whether this build can run the scenario.
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        match self {
            Self::Race => cfg!(feature = "file-lock"),
            _ => true,
        }
    }

    /// Runs the scenario.
    ///
    /// # Errors
    ///
    /// Returns the scenario's failure, or [`HarnessError::Config`] if the
    /// scenario is not enabled in this build.
    pub fn run(self, runtime: &dyn ContainerRuntime, config: &HarnessConfig) -> Result<()> {
        match self {
            Self::StartStop => start_stop(runtime, config),
            Self::ContainerStop => container_stop(runtime, config),
            #[cfg(feature = "file-lock")]
            Self::Race => race(runtime, config),
            #[cfg(not(feature = "file-lock"))]
            Self::Race => Err(HarnessError::Config {
                message: "the race scenario needs the `file-lock` feature".into(),
            }),
            Self::NoSharedMounts => no_shared_mounts(runtime, config),
            Self::NoSharedLogs => no_shared_logs(runtime, config),
            Self::NoSharedData => no_shared_data(runtime, config),
            Self::NoMounts => no_mounts(runtime, config),
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for ScenarioKind {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == s || k.name().replace('-', "_") == s)
            .ok_or_else(|| HarnessError::NotFound {
                kind: "scenario",
                id: s.to_string(),
            })
    }
}
