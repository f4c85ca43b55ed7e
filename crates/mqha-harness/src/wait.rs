//! Bounded polling waits.
//!
//! Each wait is a fixed-sleep retry loop with a deadline. Nothing here
//! cancels early except a container that has visibly died. Runtime calls
//! made by an attempt are bounded by what is left of the deadline, so a
//! hung call cannot stretch the wait.

use std::time::{Duration, Instant};

use mqha_common::constants::READY_COMMAND;
use mqha_common::error::{HarnessError, Result};
use mqha_common::types::{ContainerId, ContainerState};
use mqha_runtime::backend::ContainerRuntime;
use mqha_runtime::logs::{DEFAULT_TAIL_LINES, find_line, tail};

/// Deadline and sleep for a polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Give up once this much time has passed.
    pub timeout: Duration,
    /// Sleep between attempts.
    pub interval: Duration,
}

impl PollPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

/// Calls `attempt` until it yields `Some`, the deadline passes, or it fails.
///
/// Each attempt is handed the time remaining before the deadline. A call
/// that times out inside an attempt ends the wait as a whole.
fn poll<T>(
    policy: PollPolicy,
    what: impl Fn() -> String,
    mut attempt: impl FnMut(Duration) -> Result<Option<T>>,
) -> Result<T> {
    let started = Instant::now();
    loop {
        let remaining = policy.timeout.saturating_sub(started.elapsed());
        match attempt(remaining) {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(HarnessError::Timeout { .. }) => {
                return Err(HarnessError::Timeout {
                    what: what(),
                    waited: started.elapsed(),
                });
            }
            Err(e) => return Err(e),
        }
        let waited = started.elapsed();
        if waited >= policy.timeout {
            return Err(HarnessError::Timeout {
                what: what(),
                waited,
            });
        }
        std::thread::sleep(policy.interval.min(policy.timeout - waited));
    }
}

/// Waits until `chkmqready` succeeds inside `id`.
///
/// # Errors
///
/// Returns [`HarnessError::ContainerExited`] as soon as the container is seen
/// to have exited, [`HarnessError::Timeout`] when the deadline passes, or any
/// runtime error from the underlying calls.
pub fn wait_for_ready(
    runtime: &dyn ContainerRuntime,
    id: &ContainerId,
    policy: PollPolicy,
) -> Result<()> {
    tracing::info!(
        id = %id.short(),
        timeout = ?policy.timeout,
        "waiting for queue manager to be ready"
    );
    let cmd = [READY_COMMAND.to_string()];
    let mut attempts = 0_u32;
    poll(
        policy,
        || format!("container {} to become ready", id.short()),
        |remaining| {
            attempts += 1;
            let bound = remaining.min(runtime.call_timeout());
            if runtime.state_within(id, bound)? == ContainerState::Exited {
                let logs = runtime.logs(id)?;
                return Err(HarnessError::ContainerExited {
                    container: id.clone(),
                    logs: tail(&logs, DEFAULT_TAIL_LINES),
                });
            }
            let out = runtime.exec_within(id, &cmd, bound)?;
            tracing::debug!(
                id = %id.short(),
                attempts,
                exit_code = out.exit_code,
                "readiness check"
            );
            Ok(out.success().then_some(()))
        },
    )?;
    tracing::info!(id = %id.short(), attempts, "queue manager ready");
    Ok(())
}

/// Waits until the output of `id` contains `message` verbatim, returning
/// the matching line.
///
/// # Errors
///
/// Returns [`HarnessError::Timeout`] when the deadline passes, or any
/// runtime error from fetching logs.
pub fn wait_for_termination_message(
    runtime: &dyn ContainerRuntime,
    id: &ContainerId,
    message: &str,
    policy: PollPolicy,
) -> Result<String> {
    tracing::info!(id = %id.short(), %message, "waiting for termination message");
    let line = poll(
        policy,
        || format!("container {} to terminate with {message:?}", id.short()),
        |remaining| {
            let logs = runtime.logs_within(id, remaining.min(runtime.call_timeout()))?;
            Ok(find_line(&logs, message).map(str::to_string))
        },
    )?;
    tracing::info!(id = %id.short(), %line, "termination message seen");
    Ok(line)
}

#[cfg(test)]
mod tests {
    use mqha_common::types::Volume;
    use mqha_runtime::backend::ContainerSpec;
    use mqha_runtime::backend::simulated::SimulatedRuntime;
    use mqha_runtime::exec::{EXIT_CANNOT_INVOKE, ExecOutput};

    use super::*;

    /// How the readiness command misbehaves.
    #[derive(Clone, Copy)]
    enum ExecFault {
        /// The call hangs for up to `STALL` or until its timeout.
        Stall,
        /// The command cannot be launched in the container.
        CannotInvoke,
    }

    const STALL: Duration = Duration::from_secs(3);

    /// Simulated runtime whose exec misbehaves.
    struct FaultyExec {
        sim: SimulatedRuntime,
        fault: ExecFault,
    }

    impl ContainerRuntime for FaultyExec {
        fn create_volume(&self, name: &str) -> Result<Volume> {
            self.sim.create_volume(name)
        }

        fn remove_volume(&self, name: &str) -> Result<()> {
            self.sim.remove_volume(name)
        }

        fn create(&self, spec: &ContainerSpec) -> Result<ContainerId> {
            self.sim.create(spec)
        }

        fn start(&self, id: &ContainerId) -> Result<()> {
            self.sim.start(id)
        }

        fn stop(&self, id: &ContainerId) -> Result<()> {
            self.sim.stop(id)
        }

        fn kill(&self, id: &ContainerId, signal: &str) -> Result<()> {
            self.sim.kill(id, signal)
        }

        fn remove(&self, id: &ContainerId) -> Result<()> {
            self.sim.remove(id)
        }

        fn exec_within(
            &self,
            _id: &ContainerId,
            cmd: &[String],
            timeout: Duration,
        ) -> Result<ExecOutput> {
            match self.fault {
                ExecFault::Stall => {
                    let waited = timeout.min(STALL);
                    std::thread::sleep(waited);
                    Err(HarnessError::Timeout {
                        what: "docker to exec in container".into(),
                        waited,
                    })
                }
                ExecFault::CannotInvoke => ExecOutput {
                    stdout: format!("exec failed: \"{}\": executable file not found\n", cmd[0]),
                    stderr: String::new(),
                    exit_code: EXIT_CANNOT_INVOKE,
                }
                .into_launched(&cmd[0]),
            }
        }

        fn logs_within(&self, id: &ContainerId, timeout: Duration) -> Result<String> {
            self.sim.logs_within(id, timeout)
        }

        fn state_within(&self, id: &ContainerId, timeout: Duration) -> Result<ContainerState> {
            self.sim.state_within(id, timeout)
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    const FAST: PollPolicy =
        PollPolicy::new(Duration::from_millis(200), Duration::from_millis(1));

    fn started(rt: &SimulatedRuntime, spec: &ContainerSpec) -> ContainerId {
        for m in &spec.mounts {
            let _ = rt.create_volume(&m.volume).unwrap();
        }
        let id = rt.create(spec).unwrap();
        rt.start(&id).unwrap();
        id
    }

    #[test]
    fn poll_times_out_with_subject() {
        let policy = PollPolicy::new(Duration::from_millis(5), Duration::from_millis(1));
        let err = poll::<()>(policy, || "nothing".to_string(), |_| Ok(None)).unwrap_err();
        match err {
            HarnessError::Timeout { what, waited } => {
                assert_eq!(what, "nothing");
                assert!(waited >= Duration::from_millis(5));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn poll_propagates_attempt_errors_immediately() {
        let mut calls = 0;
        let err = poll::<()>(FAST, || "x".to_string(), |_| {
            calls += 1;
            Err(HarnessError::runtime("exec in container", "boom"))
        })
        .unwrap_err();
        assert!(matches!(err, HarnessError::Runtime { .. }));
        assert_eq!(calls, 1);
    }

    #[test]
    fn ready_after_startup_polls() {
        let rt = SimulatedRuntime::new().with_startup_polls(3);
        let id = started(&rt, &ContainerSpec::new("mq").mount("q", "/mnt/mqm"));
        wait_for_ready(&rt, &id, FAST).expect("ready");
    }

    #[test]
    fn ready_wait_times_out() {
        let rt = SimulatedRuntime::new().with_startup_polls(u32::MAX);
        let id = started(&rt, &ContainerSpec::new("mq").mount("q", "/mnt/mqm"));
        let policy = PollPolicy::new(Duration::from_millis(10), Duration::from_millis(1));
        let err = wait_for_ready(&rt, &id, policy).unwrap_err();
        assert!(matches!(err, HarnessError::Timeout { .. }));
    }

    #[test]
    fn ready_wait_bounds_a_hung_exec_by_the_deadline() {
        let rt = FaultyExec {
            sim: SimulatedRuntime::new(),
            fault: ExecFault::Stall,
        };
        let id = started(&rt.sim, &ContainerSpec::new("mq").mount("q", "/mnt/mqm"));
        let policy = PollPolicy::new(Duration::from_millis(500), Duration::from_millis(10));

        let begun = Instant::now();
        let err = wait_for_ready(&rt, &id, policy).unwrap_err();
        let elapsed = begun.elapsed();
        match err {
            HarnessError::Timeout { what, .. } => assert!(what.contains("to become ready")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(elapsed < Duration::from_millis(1500), "wait overran: {elapsed:?}");
    }

    #[test]
    fn ready_wait_reports_uninvocable_command_as_runtime_error() {
        let rt = FaultyExec {
            sim: SimulatedRuntime::new(),
            fault: ExecFault::CannotInvoke,
        };
        let id = started(&rt.sim, &ContainerSpec::new("mq").mount("q", "/mnt/mqm"));
        let policy = PollPolicy::new(Duration::from_secs(5), Duration::from_millis(10));

        let begun = Instant::now();
        let err = wait_for_ready(&rt, &id, policy).unwrap_err();
        match err {
            HarnessError::Runtime { operation, message } => {
                assert_eq!(operation, "exec in container");
                assert!(message.contains("exit 126"), "{message}");
            }
            other => panic!("expected runtime error, got {other}"),
        }
        assert!(begun.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn ready_wait_fails_fast_on_exited_container() {
        let rt = SimulatedRuntime::new();
        let id = started(&rt, &ContainerSpec::new("mq"));
        let err = wait_for_ready(&rt, &id, FAST).unwrap_err();
        match err {
            HarnessError::ContainerExited { logs, .. } => {
                assert!(logs.contains("Missing required mount '/mnt/mqm'"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn termination_message_found() {
        let rt = SimulatedRuntime::new();
        let id = started(&rt, &ContainerSpec::new("mq"));
        let line =
            wait_for_termination_message(&rt, &id, "Missing required mount '/mnt/mqm'", FAST)
                .expect("message");
        assert!(line.ends_with("Missing required mount '/mnt/mqm'"));
    }

    #[test]
    fn termination_message_absent_times_out() {
        let rt = SimulatedRuntime::new();
        let id = started(&rt, &ContainerSpec::new("mq").mount("q", "/mnt/mqm"));
        let policy = PollPolicy::new(Duration::from_millis(10), Duration::from_millis(1));
        let err = wait_for_termination_message(&rt, &id, "Missing required mount", policy)
            .unwrap_err();
        assert!(err.to_string().contains("to terminate with"));
    }
}
