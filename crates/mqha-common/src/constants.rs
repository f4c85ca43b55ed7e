//! Fixed names, paths and timings shared by the image under test and the
//! harness.

use std::time::Duration;

/// Image run when no other image is configured.
pub const DEFAULT_IMAGE: &str = "ibmcom/mq:latest";

/// Queue manager name used by the multi-instance scenarios.
pub const DEFAULT_QMGR_NAME: &str = "QM1";

/// Environment variable accepting the product license.
pub const ENV_LICENSE: &str = "LICENSE";
/// Environment variable naming the queue manager.
pub const ENV_QMGR_NAME: &str = "MQ_QMGR_NAME";
/// Environment variable enabling multi-instance mode.
pub const ENV_MULTI_INSTANCE: &str = "MQ_MULTI_INSTANCE";

/// Private data mount used by a single-instance queue manager.
pub const MOUNT_DATA: &str = "/mnt/mqm";
/// Shared recovery log mount for a multi-instance pair.
pub const MOUNT_SHARED_LOG: &str = "/mnt/mqm-log";
/// Shared queue manager data mount for a multi-instance pair.
pub const MOUNT_SHARED_DATA: &str = "/mnt/mqm-data";

/// Prefix for volumes holding shared recovery logs.
pub const SHARED_LOGS_VOLUME: &str = "qmsharedlogs";
/// Prefix for volumes holding shared queue manager data.
pub const SHARED_DATA_VOLUME: &str = "qmshareddata";
/// Prefix for per-container private data volumes.
pub const PRIVATE_DATA_VOLUME: &str = "qmdata";

/// Command that exits 0 once the queue manager has finished starting.
pub const READY_COMMAND: &str = "chkmqready";
/// Command that prints queue manager status.
pub const STATUS_COMMAND: &str = "dspmq";

/// Status literal for the active instance.
pub const STATUS_RUNNING: &str = "Running";

/// Diagnostic printed when a required mount is absent.
#[must_use]
pub fn missing_mount_message(target: &str) -> String {
    format!("Missing required mount '{target}'")
}

/// Default bound on readiness waits.
pub const READY_TIMEOUT: Duration = Duration::from_secs(120);
/// Default bound on waits for a termination diagnostic.
pub const TERMINATION_TIMEOUT: Duration = Duration::from_secs(30);
/// Delay between killing the active instance and re-probing the standby.
pub const FAILOVER_SETTLE: Duration = Duration::from_secs(2);
/// Fixed sleep between polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Signal used to kill the active instance.
pub const KILL_SIGNAL: &str = "SIGTERM";

/// Label key applied to every container and volume the harness creates.
pub const HARNESS_LABEL: &str = "io.mqha.harness";

/// Default bound on a single call to the container runtime.
pub const CALL_TIMEOUT: Duration = Duration::from_secs(60);
/// Grace period a graceful stop gives the container before it is killed.
pub const STOP_GRACE: Duration = Duration::from_secs(10);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_mount_messages_are_verbatim() {
        assert_eq!(
            missing_mount_message(MOUNT_SHARED_LOG),
            "Missing required mount '/mnt/mqm-log'"
        );
        assert_eq!(
            missing_mount_message(MOUNT_SHARED_DATA),
            "Missing required mount '/mnt/mqm-data'"
        );
        assert_eq!(
            missing_mount_message(MOUNT_DATA),
            "Missing required mount '/mnt/mqm'"
        );
    }
}
