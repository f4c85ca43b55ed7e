//! # mqha-harness
//!
//! Failover scenarios for a multi-instance queue manager running in
//! containers.
//!
//! The queue manager decides which instance is active; this crate only
//! starts, stops and kills containers through a
//! [`ContainerRuntime`](mqha_runtime::backend::ContainerRuntime) and watches
//! what they report.
//!
//! - [`probe`]: one-shot `dspmq` status queries and active/standby
//!   classification.
//! - [`wait`]: bounded readiness and termination-message waits.
//! - [`scenario`]: the cleanup guard every scenario runs inside.
//! - [`scenarios`]: the scenarios themselves.
//!
//! # Example
//!
//! ```rust,no_run
//! use mqha_common::config::HarnessConfig;
//! use mqha_runtime::backend::docker::DockerBackend;
//!
//! let config = HarnessConfig::default().apply_env();
//! let docker = DockerBackend::from_config(&config)?;
//! mqha_harness::scenarios::container_stop(&docker, &config)?;
//! # Ok::<(), mqha_common::error::HarnessError>(())
//! ```

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod probe;
pub mod scenario;
pub mod scenarios;
pub mod wait;
