//! Scenario context and cleanup guard.
//!
//! A [`Scenario`] owns every container and volume registered with it and
//! removes them when dropped, whichever way the scenario ends: success,
//! an error returned with `?`, or a panicking assertion.

use mqha_common::config::HarnessConfig;
use mqha_common::constants::{
    KILL_SIGNAL, MOUNT_DATA, MOUNT_SHARED_DATA, MOUNT_SHARED_LOG, PRIVATE_DATA_VOLUME,
    SHARED_DATA_VOLUME, SHARED_LOGS_VOLUME,
};
use mqha_common::error::Result;
use mqha_common::types::{ContainerId, Volume};
use mqha_runtime::backend::{ContainerRuntime, ContainerSpec};
use mqha_runtime::logs::{DEFAULT_TAIL_LINES, tail};

use crate::probe::QueueManagerProbe;
use crate::wait::{self, PollPolicy};

/// A queue manager container started by the harness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedQueueManager {
    /// The running container.
    pub id: ContainerId,
    /// Private volume mounted at `/mnt/mqm`, if one was requested.
    pub data_volume: Option<Volume>,
}

/// Two queue managers sharing log and data volumes.
///
/// The shared volumes belong to the [`Scenario`] that created the pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiInstancePair {
    /// First container started.
    pub first: ContainerId,
    /// Second container started.
    pub second: ContainerId,
}

/// Creates and starts one queue manager container.
///
/// With `data_volume` set, a fresh private volume is mounted at `/mnt/mqm`.
/// Shared volumes are mounted when given. If any step fails, whatever was
/// already created is removed before the error is returned.
///
/// # Errors
///
/// Returns the first runtime error encountered.
pub fn launch_queue_manager(
    runtime: &dyn ContainerRuntime,
    config: &HarnessConfig,
    data_volume: bool,
    shared_logs: Option<&Volume>,
    shared_data: Option<&Volume>,
) -> Result<StartedQueueManager> {
    let private = if data_volume {
        Some(runtime.create_volume(&Volume::unique_name(PRIVATE_DATA_VOLUME))?)
    } else {
        None
    };

    let mut spec = ContainerSpec::new(config.image.clone()).env(config.environment());
    if let Some(v) = &private {
        spec = spec.mount(&v.name, MOUNT_DATA);
    }
    if let Some(v) = shared_logs {
        spec = spec.mount(&v.name, MOUNT_SHARED_LOG);
    }
    if let Some(v) = shared_data {
        spec = spec.mount(&v.name, MOUNT_SHARED_DATA);
    }

    let id = match runtime.create(&spec) {
        Ok(id) => id,
        Err(e) => {
            if let Some(v) = &private {
                release_volume(runtime, &v.name);
            }
            return Err(e);
        }
    };
    if let Err(e) = runtime.start(&id) {
        release_container(runtime, &id);
        if let Some(v) = &private {
            release_volume(runtime, &v.name);
        }
        return Err(e);
    }

    tracing::info!(
        id = %id.short(),
        data = ?private.as_ref().map(|v| v.name.as_str()),
        logs = ?shared_logs.map(|v| v.name.as_str()),
        shared_data = ?shared_data.map(|v| v.name.as_str()),
        "queue manager container started"
    );
    Ok(StartedQueueManager {
        id,
        data_volume: private,
    })
}

fn release_container(runtime: &dyn ContainerRuntime, id: &ContainerId) {
    if let Err(e) = runtime.remove(id) {
        tracing::warn!(id = %id.short(), error = %e, "failed to remove container");
    }
}

fn release_volume(runtime: &dyn ContainerRuntime, name: &str) {
    if let Err(e) = runtime.remove_volume(name) {
        tracing::warn!(volume = %name, error = %e, "failed to remove volume");
    }
}

/// Execution context for one scenario.
pub struct Scenario<'a> {
    name: &'static str,
    runtime: &'a dyn ContainerRuntime,
    config: &'a HarnessConfig,
    containers: Vec<ContainerId>,
    volumes: Vec<Volume>,
    failed: bool,
}

impl<'a> Scenario<'a> {
    /// Creates an empty scenario context.
    #[must_use]
    pub fn new(
        name: &'static str,
        runtime: &'a dyn ContainerRuntime,
        config: &'a HarnessConfig,
    ) -> Self {
        tracing::info!(scenario = name, image = %config.image, "scenario starting");
        Self {
            name,
            runtime,
            config,
            containers: Vec::new(),
            volumes: Vec::new(),
            failed: false,
        }
    }

    /// Runs `body` and releases every registered resource afterwards.
    ///
    /// On failure, the tail of each container's output is logged before
    /// removal.
    ///
    /// # Errors
    ///
    /// Returns whatever `body` returns.
    pub fn run<T>(mut self, body: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let result = body(&mut self);
        match &result {
            Ok(_) => tracing::info!(scenario = self.name, "scenario passed"),
            Err(e) => {
                self.failed = true;
                tracing::error!(scenario = self.name, error = %e, "scenario failed");
            }
        }
        result
    }

    /// Probe for the configured queue manager.
    #[must_use]
    pub fn probe(&self) -> QueueManagerProbe<'a> {
        QueueManagerProbe::new(self.runtime, &self.config.qmgr_name)
    }

    /// Takes ownership of a container created elsewhere.
    pub fn adopt_container(&mut self, id: ContainerId) {
        self.containers.push(id);
    }

    /// Takes ownership of a volume created elsewhere.
    pub fn adopt_volume(&mut self, volume: Volume) {
        self.volumes.push(volume);
    }

    /// Takes ownership of a launched queue manager and its private volume.
    pub fn adopt(&mut self, qm: &StartedQueueManager) {
        self.adopt_container(qm.id.clone());
        if let Some(v) = &qm.data_volume {
            self.adopt_volume(v.clone());
        }
    }

    /// Creates a uniquely named volume owned by this scenario.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime rejects the volume.
    pub fn create_volume(&mut self, prefix: &str) -> Result<Volume> {
        let volume = self.runtime.create_volume(&Volume::unique_name(prefix))?;
        self.adopt_volume(volume.clone());
        Ok(volume)
    }

    /// Starts a queue manager owned by this scenario.
    ///
    /// # Errors
    ///
    /// See [`launch_queue_manager`].
    pub fn start_queue_manager(
        &mut self,
        data_volume: bool,
        shared_logs: Option<&Volume>,
        shared_data: Option<&Volume>,
    ) -> Result<ContainerId> {
        let qm = launch_queue_manager(
            self.runtime,
            self.config,
            data_volume,
            shared_logs,
            shared_data,
        )?;
        self.adopt(&qm);
        Ok(qm.id)
    }

    /// Creates shared log and data volumes and starts two queue managers on
    /// them.
    ///
    /// # Errors
    ///
    /// Returns the first runtime error encountered.
    pub fn configure_multi_instance(&mut self) -> Result<MultiInstancePair> {
        let shared_logs = self.create_volume(SHARED_LOGS_VOLUME)?;
        let shared_data = self.create_volume(SHARED_DATA_VOLUME)?;
        let first = self.start_queue_manager(true, Some(&shared_logs), Some(&shared_data))?;
        let second = self.start_queue_manager(true, Some(&shared_logs), Some(&shared_data))?;
        Ok(MultiInstancePair { first, second })
    }

    /// Waits for the queue manager in `id` to be ready.
    ///
    /// # Errors
    ///
    /// See [`wait::wait_for_ready`].
    pub fn wait_for_ready(&self, id: &ContainerId) -> Result<()> {
        let policy = PollPolicy::new(self.config.ready_timeout(), self.config.poll_interval());
        wait::wait_for_ready(self.runtime, id, policy)
    }

    /// Waits for `id` to print `message`.
    ///
    /// # Errors
    ///
    /// See [`wait::wait_for_termination_message`].
    pub fn wait_for_termination_message(
        &self,
        id: &ContainerId,
        message: &str,
    ) -> Result<String> {
        let policy = PollPolicy::new(
            self.config.termination_timeout(),
            self.config.poll_interval(),
        );
        wait::wait_for_termination_message(self.runtime, id, message, policy)
    }

    /// Sends the kill signal to `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot deliver the signal.
    pub fn kill(&self, id: &ContainerId) -> Result<()> {
        self.runtime.kill(id, KILL_SIGNAL)
    }

    /// Stops `id` gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot stop the container.
    pub fn stop(&self, id: &ContainerId) -> Result<()> {
        self.runtime.stop(id)
    }

    /// Starts `id` again.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot start the container.
    pub fn start(&self, id: &ContainerId) -> Result<()> {
        self.runtime.start(id)
    }

    /// Sleeps for the configured failover settle delay.
    pub fn settle(&self) {
        let delay = self.config.settle_delay();
        tracing::debug!(?delay, "waiting for failover to settle");
        std::thread::sleep(delay);
    }

    fn dump_logs(&self, id: &ContainerId) {
        match self.runtime.logs(id) {
            Ok(logs) => tracing::warn!(
                id = %id.short(),
                logs = %tail(&logs, DEFAULT_TAIL_LINES),
                "container output"
            ),
            Err(e) => {
                tracing::warn!(id = %id.short(), error = %e, "could not fetch container output");
            }
        }
    }
}

impl Drop for Scenario<'_> {
    fn drop(&mut self) {
        let failed = self.failed || std::thread::panicking();
        for id in self.containers.iter().rev() {
            if failed {
                self.dump_logs(id);
            }
            release_container(self.runtime, id);
        }
        for volume in self.volumes.iter().rev() {
            release_volume(self.runtime, &volume.name);
        }
        tracing::debug!(
            scenario = self.name,
            containers = self.containers.len(),
            volumes = self.volumes.len(),
            "scenario resources released"
        );
        self.containers.clear();
        self.volumes.clear();
    }
}

#[cfg(test)]
mod tests {
    use mqha_common::error::HarnessError;
    use mqha_runtime::backend::simulated::SimulatedRuntime;

    use super::*;

    #[test]
    fn drop_releases_containers_then_volumes() {
        let rt = SimulatedRuntime::new();
        let config = HarnessConfig::default();
        {
            let mut scenario = Scenario::new("drop", &rt, &config);
            let pair = scenario.configure_multi_instance().expect("pair");
            assert_ne!(pair.first, pair.second);
            assert_eq!(rt.container_count().unwrap(), 2);
            // two shared plus one private per container
            assert_eq!(rt.volume_count().unwrap(), 4);
        }
        assert_eq!(rt.container_count().unwrap(), 0);
        assert_eq!(rt.volume_count().unwrap(), 0);
    }

    #[test]
    fn run_cleans_up_after_error() {
        let rt = SimulatedRuntime::new();
        let config = HarnessConfig::default();

        let result: Result<()> = Scenario::new("error", &rt, &config).run(|s| {
            let _ = s.start_queue_manager(true, None, None)?;
            Err(HarnessError::Config {
                message: "forced".into(),
            })
        });

        assert!(result.is_err());
        assert_eq!(rt.container_count().unwrap(), 0);
        assert_eq!(rt.volume_count().unwrap(), 0);
    }

    #[test]
    fn launch_failure_removes_private_volume() {
        let rt = SimulatedRuntime::new();
        let config = HarnessConfig::default();
        let missing = Volume {
            id: "gone".into(),
            name: "gone".into(),
        };

        let err = launch_queue_manager(&rt, &config, true, Some(&missing), None).unwrap_err();
        assert!(matches!(err, HarnessError::Runtime { .. }));
        assert_eq!(rt.volume_count().unwrap(), 0);
    }

    #[test]
    fn started_container_receives_configured_environment() {
        let rt = SimulatedRuntime::new();
        let config = HarnessConfig {
            qmgr_name: "QMX".into(),
            ..HarnessConfig::default()
        };
        let mut scenario = Scenario::new("env", &rt, &config);
        let logs = scenario.create_volume("logs").unwrap();
        let data = scenario.create_volume("data").unwrap();
        let id = scenario
            .start_queue_manager(true, Some(&logs), Some(&data))
            .unwrap();

        scenario.probe().expect_running(&id).expect("QMX active");
    }
}
