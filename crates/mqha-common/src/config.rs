//! Harness configuration.
//!
//! Every scenario receives a [`HarnessConfig`] explicitly; nothing about the
//! image or its environment lives in process-wide state.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{HarnessError, Result};

/// Root configuration for a harness run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Image containing the queue manager under test.
    pub image: String,
    /// Queue manager name passed as `MQ_QMGR_NAME` and probed with `dspmq`.
    pub qmgr_name: String,
    /// Additional `KEY=VALUE` variables appended to the container environment.
    pub extra_env: Vec<(String, String)>,
    /// Docker daemon endpoint (`unix:///path` or `tcp://host:port`). The
    /// local defaults, including `DOCKER_HOST`, apply when unset.
    pub docker_host: Option<String>,
    /// Bound on any single call to the container runtime, in seconds.
    pub call_timeout_secs: u64,
    /// Bound on readiness waits, in seconds.
    pub ready_timeout_secs: u64,
    /// Bound on termination diagnostic waits, in seconds.
    pub termination_timeout_secs: u64,
    /// Delay after killing the active instance, in milliseconds.
    pub settle_delay_ms: u64,
    /// Sleep between polls, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            image: constants::DEFAULT_IMAGE.to_string(),
            qmgr_name: constants::DEFAULT_QMGR_NAME.to_string(),
            extra_env: Vec::new(),
            docker_host: None,
            call_timeout_secs: constants::CALL_TIMEOUT.as_secs(),
            ready_timeout_secs: constants::READY_TIMEOUT.as_secs(),
            termination_timeout_secs: constants::TERMINATION_TIMEOUT.as_secs(),
            settle_delay_ms: duration_millis(constants::FAILOVER_SETTLE),
            poll_interval_ms: duration_millis(constants::POLL_INTERVAL),
        }
    }
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl HarnessConfig {
    /// Loads a configuration from a JSON file. Missing keys keep their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON, or
    /// if the resulting configuration fails [`validate`](Self::validate).
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "loading harness configuration");
        let content = std::fs::read_to_string(path).map_err(|e| HarnessError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Overrides fields from `MQHA_IMAGE`, `MQHA_QMGR_NAME` and
    /// `MQHA_DOCKER_HOST`.
    #[must_use]
    pub fn apply_env(self) -> Self {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(image) = var("MQHA_IMAGE").filter(|v| !v.is_empty()) {
            self.image = image;
        }
        if let Some(name) = var("MQHA_QMGR_NAME").filter(|v| !v.is_empty()) {
            self.qmgr_name = name;
        }
        if let Some(host) = var("MQHA_DOCKER_HOST").filter(|v| !v.is_empty()) {
            self.docker_host = Some(host);
        }
        self
    }

    /// Checks that the configuration can drive a scenario.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.image.trim().is_empty() {
            return Err(HarnessError::Config {
                message: "image must not be empty".into(),
            });
        }
        if self.qmgr_name.trim().is_empty() {
            return Err(HarnessError::Config {
                message: "qmgr_name must not be empty".into(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(HarnessError::Config {
                message: "poll_interval_ms must be greater than zero".into(),
            });
        }
        if self.call_timeout_secs == 0 {
            return Err(HarnessError::Config {
                message: "call_timeout_secs must be greater than zero".into(),
            });
        }
        let invalid = self
            .extra_env
            .iter()
            .find(|(k, _)| k.is_empty() || k.contains('='));
        if let Some((key, _)) = invalid {
            return Err(HarnessError::Config {
                message: format!("invalid environment variable name: {key:?}"),
            });
        }
        Ok(())
    }

    /// Environment handed to every multi-instance container.
    #[must_use]
    pub fn environment(&self) -> Vec<(String, String)> {
        let mut env = vec![
            (constants::ENV_LICENSE.to_string(), "accept".to_string()),
            (constants::ENV_QMGR_NAME.to_string(), self.qmgr_name.clone()),
            (constants::ENV_MULTI_INSTANCE.to_string(), "true".to_string()),
        ];
        env.extend(self.extra_env.iter().cloned());
        env
    }

    /// Bound on readiness waits.
    #[must_use]
    pub const fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    /// Bound on termination diagnostic waits.
    #[must_use]
    pub const fn termination_timeout(&self) -> Duration {
        Duration::from_secs(self.termination_timeout_secs)
    }

    /// Delay after killing the active instance.
    #[must_use]
    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Sleep between polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Bound on any single runtime call.
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn default_environment_enables_multi_instance() {
        let env = HarnessConfig::default().environment();
        assert_eq!(
            env,
            vec![
                ("LICENSE".to_string(), "accept".to_string()),
                ("MQ_QMGR_NAME".to_string(), "QM1".to_string()),
                ("MQ_MULTI_INSTANCE".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn default_timings_match_constants() {
        let cfg = HarnessConfig::default();
        assert_eq!(cfg.ready_timeout(), constants::READY_TIMEOUT);
        assert_eq!(cfg.termination_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.settle_delay(), Duration::from_secs(2));
        assert_eq!(cfg.poll_interval(), Duration::from_secs(1));
        assert_eq!(cfg.call_timeout(), constants::CALL_TIMEOUT);
    }

    #[test]
    fn extra_env_is_appended() {
        let cfg = HarnessConfig {
            extra_env: vec![("MQ_DEV".into(), "false".into())],
            ..HarnessConfig::default()
        };
        let env = cfg.environment();
        assert_eq!(env.len(), 4);
        assert_eq!(env[3], ("MQ_DEV".to_string(), "false".to_string()));
    }

    #[test]
    fn load_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mqha.json");
        std::fs::write(&path, r#"{ "image": "mq:9.3", "termination_timeout_secs": 10 }"#)
            .expect("write config");

        let cfg = HarnessConfig::load(&path).expect("load");
        assert_eq!(cfg.image, "mq:9.3");
        assert_eq!(cfg.termination_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.qmgr_name, "QM1");
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = HarnessConfig::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, HarnessError::Io { .. }));
    }

    #[test]
    fn load_rejects_invalid_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ image: ").expect("write config");
        let err = HarnessConfig::load(&path).unwrap_err();
        assert!(matches!(err, HarnessError::Serialization { .. }));
    }

    #[test]
    fn validate_rejects_empty_image_and_zero_poll() {
        let cfg = HarnessConfig {
            image: "  ".into(),
            ..HarnessConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(HarnessError::Config { .. })));

        let cfg = HarnessConfig {
            poll_interval_ms: 0,
            ..HarnessConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(HarnessError::Config { .. })));

        let cfg = HarnessConfig {
            call_timeout_secs: 0,
            ..HarnessConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(HarnessError::Config { .. })));
    }

    #[test]
    fn validate_rejects_malformed_env_names() {
        let cfg = HarnessConfig {
            extra_env: vec![("A=B".into(), "c".into())],
            ..HarnessConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn env_overrides_apply_and_ignore_empty_values() {
        let vars: HashMap<&str, &str> = [
            ("MQHA_IMAGE", "registry.local/mq:test"),
            ("MQHA_QMGR_NAME", ""),
            ("MQHA_DOCKER_HOST", "unix:///run/user/1000/docker.sock"),
        ]
        .into_iter()
        .collect();

        let cfg = HarnessConfig::default().apply_vars(|k| vars.get(k).map(|v| (*v).to_string()));
        assert_eq!(cfg.image, "registry.local/mq:test");
        assert_eq!(cfg.qmgr_name, "QM1");
        assert_eq!(
            cfg.docker_host.as_deref(),
            Some("unix:///run/user/1000/docker.sock")
        );
    }
}
