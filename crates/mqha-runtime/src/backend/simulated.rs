//! In-memory runtime that imitates the queue manager image.
//!
//! Used by the test suite to exercise scenario logic without a Docker
//! daemon. It models only what the scenarios can observe:
//!
//! - mount validation at start, with the image's diagnostics;
//! - one active instance per shared data volume, later starters become
//!   standby;
//! - promotion of the oldest running standby when the active instance
//!   stops or is killed;
//! - `chkmqready` and `dspmq -m <name>` inside running containers.
//!
//! Calls never block, so timeouts are accepted and ignored.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use mqha_common::constants::{
    ENV_MULTI_INSTANCE, ENV_QMGR_NAME, MOUNT_DATA, MOUNT_SHARED_DATA, MOUNT_SHARED_LOG,
    READY_COMMAND, STATUS_COMMAND, missing_mount_message,
};
use mqha_common::error::{HarnessError, Result};
use mqha_common::types::{ContainerId, ContainerState, Volume};

use super::{ContainerRuntime, ContainerSpec, is_valid_signal};
use crate::exec::{EXIT_NOT_FOUND, ExecOutput};

/// Exit code of `dspmq` for an unknown queue manager.
const DSPMQ_UNKNOWN_QMGR: i32 = 72;
/// Exit code of `chkmqready` while the queue manager is starting.
const NOT_READY: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Active,
    Standby,
}

#[derive(Debug)]
struct SimContainer {
    seq: u64,
    spec: ContainerSpec,
    state: ContainerState,
    role: Option<Role>,
    /// Readiness polls left before `chkmqready` succeeds.
    starting_polls: u32,
    logs: Vec<String>,
}

impl SimContainer {
    fn log(&mut self, line: impl AsRef<str>) {
        self.logs
            .push(format!("{} {}", chrono::Utc::now().to_rfc3339(), line.as_ref()));
    }

    fn qmgr_name(&self) -> &str {
        self.spec.env_var(ENV_QMGR_NAME).unwrap_or("QM1")
    }

    /// Volume whose lock decides which instance is active.
    fn lock_volume(&self) -> Option<&str> {
        self.spec
            .volume_at(MOUNT_SHARED_DATA)
            .or_else(|| self.spec.volume_at(MOUNT_DATA))
    }
}

#[derive(Debug, Default)]
struct SimState {
    next_seq: u64,
    volumes: HashSet<String>,
    containers: BTreeMap<ContainerId, SimContainer>,
}

impl SimState {
    fn container_mut(&mut self, id: &ContainerId) -> Result<&mut SimContainer> {
        self.containers.get_mut(id).ok_or_else(|| {
            HarnessError::runtime("find container", format!("No such container: {id}"))
        })
    }

    fn has_active_on(&self, volume: &str, except: &ContainerId) -> bool {
        self.containers.iter().any(|(id, c)| {
            id != except
                && c.state == ContainerState::Running
                && c.role == Some(Role::Active)
                && c.lock_volume() == Some(volume)
        })
    }

    /// Brings a container down and hands the lock to the oldest standby.
    fn bring_down(&mut self, id: &ContainerId, reason: &str) -> Result<()> {
        let container = self.container_mut(id)?;
        let was_active = container.role == Some(Role::Active);
        let volume = container.lock_volume().map(str::to_string);
        container.state = ContainerState::Exited;
        container.role = None;
        container.log(format!("Queue manager ended ({reason})"));

        if let (true, Some(volume)) = (was_active, volume) {
            let successor = self
                .containers
                .iter()
                .filter(|(other, c)| {
                    *other != id
                        && c.state == ContainerState::Running
                        && c.role == Some(Role::Standby)
                        && c.lock_volume() == Some(volume.as_str())
                })
                .min_by_key(|(_, c)| c.seq)
                .map(|(other, _)| other.clone());
            if let Some(next) = successor {
                let c = self.container_mut(&next)?;
                c.role = Some(Role::Active);
                c.log("Standby queue manager has become the active instance");
                tracing::debug!(id = %next, "simulated standby promoted");
            }
        }
        Ok(())
    }
}

/// Deterministic stand-in for a container runtime running the queue
/// manager image.
#[derive(Debug, Default)]
pub struct SimulatedRuntime {
    startup_polls: u32,
    state: Mutex<SimState>,
}

impl SimulatedRuntime {
    /// Creates a runtime whose queue managers are ready as soon as they start.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every start report "not ready" for `polls` readiness checks.
    #[must_use]
    pub fn with_startup_polls(mut self, polls: u32) -> Self {
        self.startup_polls = polls;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, SimState>> {
        self.state
            .lock()
            .map_err(|_| HarnessError::runtime("lock simulated state", "state mutex poisoned"))
    }

    /// Number of containers that exist (in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the internal state lock is poisoned.
    pub fn container_count(&self) -> Result<usize> {
        Ok(self.lock()?.containers.len())
    }

    /// Number of volumes that exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal state lock is poisoned.
    pub fn volume_count(&self) -> Result<usize> {
        Ok(self.lock()?.volumes.len())
    }
}

/// Checks mounts in the order the image's entrypoint does.
fn missing_mount(spec: &ContainerSpec) -> Option<&'static str> {
    if spec.volume_at(MOUNT_DATA).is_none() {
        return Some(MOUNT_DATA);
    }
    if spec.env_var(ENV_MULTI_INSTANCE) == Some("true") {
        if spec.volume_at(MOUNT_SHARED_LOG).is_none() {
            return Some(MOUNT_SHARED_LOG);
        }
        if spec.volume_at(MOUNT_SHARED_DATA).is_none() {
            return Some(MOUNT_SHARED_DATA);
        }
    }
    None
}

fn dspmq(container: &SimContainer, args: &[String]) -> ExecOutput {
    let wanted = args
        .windows(2)
        .find(|w| w[0] == "-m")
        .map(|w| w[1].as_str());
    let name = container.qmgr_name();
    if wanted.is_some_and(|w| w != name) {
        return ExecOutput {
            stdout: "AMQ7048E: The queue manager name is either not valid or not known.\n".into(),
            stderr: String::new(),
            exit_code: DSPMQ_UNKNOWN_QMGR,
        };
    }
    let status = match (container.starting_polls, container.role) {
        (n, _) if n > 0 => "Starting",
        (_, Some(Role::Active)) => "Running",
        (_, Some(Role::Standby)) => "Running as standby",
        (_, None) => "Ended unexpectedly",
    };
    ExecOutput {
        stdout: format!("QMNAME({name}){:>50}STATUS({status})\n", ""),
        stderr: String::new(),
        exit_code: 0,
    }
}

impl ContainerRuntime for SimulatedRuntime {
    fn create_volume(&self, name: &str) -> Result<Volume> {
        let mut state = self.lock()?;
        if !state.volumes.insert(name.to_string()) {
            tracing::debug!(volume = %name, "simulated volume already exists");
        }
        Ok(Volume {
            id: name.to_string(),
            name: name.to_string(),
        })
    }

    fn remove_volume(&self, name: &str) -> Result<()> {
        let mut state = self.lock()?;
        let in_use = state
            .containers
            .values()
            .any(|c| c.spec.mounts.iter().any(|m| m.volume == name));
        if in_use {
            return Err(HarnessError::runtime(
                "remove volume",
                format!("volume is in use: {name}"),
            ));
        }
        if !state.volumes.remove(name) {
            return Err(HarnessError::runtime(
                "remove volume",
                format!("no such volume: {name}"),
            ));
        }
        Ok(())
    }

    fn create(&self, spec: &ContainerSpec) -> Result<ContainerId> {
        if spec.image.trim().is_empty() {
            return Err(HarnessError::Config {
                message: "container image must not be empty".into(),
            });
        }
        let mut state = self.lock()?;
        if let Some(m) = spec.mounts.iter().find(|m| !state.volumes.contains(&m.volume)) {
            return Err(HarnessError::runtime(
                "create container",
                format!("no such volume: {}", m.volume),
            ));
        }
        let id = ContainerId::new(uuid::Uuid::new_v4().simple().to_string());
        let seq = state.next_seq;
        state.next_seq += 1;
        let _ = state.containers.insert(
            id.clone(),
            SimContainer {
                seq,
                spec: spec.clone(),
                state: ContainerState::Created,
                role: None,
                starting_polls: 0,
                logs: Vec::new(),
            },
        );
        Ok(id)
    }

    fn start(&self, id: &ContainerId) -> Result<()> {
        let startup_polls = self.startup_polls;
        let mut state = self.lock()?;
        let container = state.container_mut(id)?;
        if container.state == ContainerState::Running {
            return Ok(());
        }
        container.log("Starting queue manager container");

        if let Some(target) = missing_mount(&container.spec) {
            container.log(missing_mount_message(target));
            container.state = ContainerState::Exited;
            return Ok(());
        }

        let volume = container.lock_volume().map(str::to_string);
        let standby = volume.is_some_and(|v| state.has_active_on(&v, id));
        let container = state.container_mut(id)?;
        container.state = ContainerState::Running;
        container.starting_polls = startup_polls;
        if standby {
            container.role = Some(Role::Standby);
            container.log("Queue manager is running as standby");
        } else {
            container.role = Some(Role::Active);
            container.log("Queue manager started as the active instance");
        }
        Ok(())
    }

    fn stop(&self, id: &ContainerId) -> Result<()> {
        let mut state = self.lock()?;
        if state.container_mut(id)?.state != ContainerState::Running {
            return Ok(());
        }
        state.bring_down(id, "stopped")
    }

    fn kill(&self, id: &ContainerId, signal: &str) -> Result<()> {
        if !is_valid_signal(signal) {
            return Err(HarnessError::Config {
                message: format!("unknown signal: {signal}"),
            });
        }
        let mut state = self.lock()?;
        if state.container_mut(id)?.state != ContainerState::Running {
            return Err(HarnessError::runtime(
                "kill container",
                format!("Container {id} is not running"),
            ));
        }
        state.bring_down(id, signal)
    }

    fn remove(&self, id: &ContainerId) -> Result<()> {
        let mut state = self.lock()?;
        if state.container_mut(id)?.state == ContainerState::Running {
            state.bring_down(id, "removed")?;
        }
        let _ = state.containers.remove(id);
        Ok(())
    }

    fn exec_within(
        &self,
        id: &ContainerId,
        cmd: &[String],
        _timeout: Duration,
    ) -> Result<ExecOutput> {
        let mut state = self.lock()?;
        let container = state.container_mut(id)?;
        if container.state != ContainerState::Running {
            return Err(HarnessError::runtime(
                "exec in container",
                format!("Container {id} is not running"),
            ));
        }
        let Some((program, args)) = cmd.split_first() else {
            return Err(HarnessError::Config {
                message: "exec command is empty".into(),
            });
        };
        let out = match program.as_str() {
            READY_COMMAND => {
                if container.starting_polls > 0 {
                    container.starting_polls -= 1;
                    ExecOutput {
                        exit_code: NOT_READY,
                        ..ExecOutput::default()
                    }
                } else {
                    ExecOutput::default()
                }
            }
            STATUS_COMMAND => dspmq(container, args),
            other => ExecOutput {
                stdout: String::new(),
                stderr: format!("exec: \"{other}\": executable file not found in $PATH\n"),
                exit_code: EXIT_NOT_FOUND,
            },
        };
        out.into_launched(program)
    }

    fn logs_within(&self, id: &ContainerId, _timeout: Duration) -> Result<String> {
        let mut state = self.lock()?;
        let container = state.container_mut(id)?;
        let mut out = container.logs.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        Ok(out)
    }

    fn state_within(&self, id: &ContainerId, _timeout: Duration) -> Result<ContainerState> {
        let mut state = self.lock()?;
        Ok(state.container_mut(id)?.state)
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use mqha_common::constants::missing_mount_message;

    use super::*;

    fn multi_env() -> Vec<(String, String)> {
        vec![
            ("LICENSE".into(), "accept".into()),
            ("MQ_QMGR_NAME".into(), "QM1".into()),
            ("MQ_MULTI_INSTANCE".into(), "true".into()),
        ]
    }

    fn start_pair_member(rt: &SimulatedRuntime, private: &str) -> ContainerId {
        let _ = rt.create_volume(private).expect("private volume");
        let spec = ContainerSpec::new("mq")
            .env(multi_env())
            .mount(private, MOUNT_DATA)
            .mount("logs", MOUNT_SHARED_LOG)
            .mount("data", MOUNT_SHARED_DATA);
        let id = rt.create(&spec).expect("create");
        rt.start(&id).expect("start");
        id
    }

    fn status(rt: &SimulatedRuntime, id: &ContainerId) -> String {
        rt.exec(id, &["dspmq".to_string(), "-m".to_string(), "QM1".to_string()])
            .expect("dspmq")
            .stdout
    }

    #[test]
    fn second_instance_on_shared_data_is_standby() {
        let rt = SimulatedRuntime::new();
        let _ = rt.create_volume("logs").unwrap();
        let _ = rt.create_volume("data").unwrap();
        let a = start_pair_member(&rt, "qa");
        let b = start_pair_member(&rt, "qb");

        assert!(status(&rt, &a).contains("STATUS(Running)"));
        assert!(status(&rt, &b).contains("STATUS(Running as standby)"));
    }

    #[test]
    fn killing_active_promotes_standby() {
        let rt = SimulatedRuntime::new();
        let _ = rt.create_volume("logs").unwrap();
        let _ = rt.create_volume("data").unwrap();
        let a = start_pair_member(&rt, "qa");
        let b = start_pair_member(&rt, "qb");

        rt.kill(&a, "SIGTERM").expect("kill");
        assert_eq!(rt.state(&a).unwrap(), ContainerState::Exited);
        assert!(status(&rt, &b).contains("STATUS(Running)"));

        rt.start(&a).expect("restart");
        assert!(status(&rt, &a).contains("STATUS(Running as standby)"));
    }

    #[test]
    fn missing_mounts_terminate_with_diagnostic() {
        let rt = SimulatedRuntime::new();
        let id = rt.create(&ContainerSpec::new("mq").env(multi_env())).unwrap();
        rt.start(&id).unwrap();

        assert_eq!(rt.state(&id).unwrap(), ContainerState::Exited);
        assert!(rt.logs(&id).unwrap().contains(&missing_mount_message(MOUNT_DATA)));
    }

    #[test]
    fn startup_polls_delay_readiness() {
        let rt = SimulatedRuntime::new().with_startup_polls(2);
        let _ = rt.create_volume("q").unwrap();
        let id = rt.create(&ContainerSpec::new("mq").mount("q", MOUNT_DATA)).unwrap();
        rt.start(&id).unwrap();

        let ready = || rt.exec(&id, &["chkmqready".to_string()]).unwrap().exit_code;
        assert_eq!(ready(), NOT_READY);
        assert_eq!(ready(), NOT_READY);
        assert_eq!(ready(), 0);
    }

    #[test]
    fn volume_in_use_cannot_be_removed() {
        let rt = SimulatedRuntime::new();
        let _ = rt.create_volume("q").unwrap();
        let id = rt.create(&ContainerSpec::new("mq").mount("q", MOUNT_DATA)).unwrap();

        assert!(rt.remove_volume("q").is_err());
        rt.remove(&id).unwrap();
        rt.remove_volume("q").unwrap();
        assert_eq!(rt.volume_count().unwrap(), 0);
    }

    #[test]
    fn exec_requires_running_container() {
        let rt = SimulatedRuntime::new();
        let _ = rt.create_volume("q").unwrap();
        let id = rt.create(&ContainerSpec::new("mq").mount("q", MOUNT_DATA)).unwrap();

        let err = rt.exec(&id, &["dspmq".to_string()]).unwrap_err();
        assert!(matches!(err, HarnessError::Runtime { .. }));
    }

    #[test]
    fn dspmq_rejects_unknown_queue_manager() {
        let rt = SimulatedRuntime::new();
        let _ = rt.create_volume("q").unwrap();
        let id = rt.create(&ContainerSpec::new("mq").mount("q", MOUNT_DATA)).unwrap();
        rt.start(&id).unwrap();

        let out = rt
            .exec(&id, &["dspmq".to_string(), "-m".to_string(), "QM9".to_string()])
            .unwrap();
        assert_eq!(out.exit_code, DSPMQ_UNKNOWN_QMGR);
        assert!(out.stdout.contains("AMQ7048E"));
    }

    #[test]
    fn unknown_command_is_a_runtime_error() {
        let rt = SimulatedRuntime::new();
        let _ = rt.create_volume("q").unwrap();
        let id = rt.create(&ContainerSpec::new("mq").mount("q", MOUNT_DATA)).unwrap();
        rt.start(&id).unwrap();

        let err = rt.exec(&id, &["runmqsc".to_string()]).unwrap_err();
        assert!(matches!(err, HarnessError::Runtime { .. }));
        assert!(err.to_string().contains("runmqsc could not be run"));
    }
}
