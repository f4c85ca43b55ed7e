//! Scenario tests against a real Docker daemon.
//!
//! Requires a reachable daemon and the queue manager image (`MQHA_IMAGE`,
//! default `ibmcom/mq:latest`) pulled locally:
//!
//! ```bash
//! cargo test -p mqha-harness --features docker-tests --test docker_test
//! ```
//!
//! Scenarios are run one at a time, except `no_shared_mounts`, which
//! touches no shared volume and is marked parallel.

#![cfg(feature = "docker-tests")]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use mqha_common::config::HarnessConfig;
use mqha_harness::scenarios;
use mqha_runtime::backend::ContainerRuntime;
use mqha_runtime::backend::docker::DockerBackend;
use serial_test::{parallel, serial};

fn setup() -> (DockerBackend, HarnessConfig) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let config = HarnessConfig::default().apply_env();
    config.validate().expect("valid configuration");
    let docker = DockerBackend::from_config(&config).expect("docker client");
    assert!(docker.is_available(), "docker daemon is not reachable");
    (docker, config)
}

#[test]
#[serial]
fn multi_instance_start_stop() {
    let (docker, config) = setup();
    scenarios::start_stop(&docker, &config).expect("start_stop");
}

#[test]
#[serial]
fn multi_instance_container_stop() {
    let (docker, config) = setup();
    scenarios::container_stop(&docker, &config).expect("container_stop");
}

#[cfg(feature = "file-lock")]
#[test]
#[serial]
fn multi_instance_race() {
    let (docker, config) = setup();
    scenarios::race(&docker, &config).expect("race");
}

#[test]
#[parallel]
fn multi_instance_no_shared_mounts() {
    let (docker, config) = setup();
    scenarios::no_shared_mounts(&docker, &config).expect("no_shared_mounts");
}

#[test]
#[serial]
fn multi_instance_no_shared_logs() {
    let (docker, config) = setup();
    scenarios::no_shared_logs(&docker, &config).expect("no_shared_logs");
}

#[test]
#[serial]
fn multi_instance_no_shared_data() {
    let (docker, config) = setup();
    scenarios::no_shared_data(&docker, &config).expect("no_shared_data");
}

#[test]
#[serial]
fn multi_instance_no_mounts() {
    let (docker, config) = setup();
    scenarios::no_mounts(&docker, &config).expect("no_mounts");
}
