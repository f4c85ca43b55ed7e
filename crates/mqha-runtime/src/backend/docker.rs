//! Runtime backend that talks to the Docker Engine API through `bollard`.
//!
//! The harness itself is synchronous. The backend owns a small tokio
//! runtime, blocks on it for each call and bounds every call with a
//! timeout, so a hung daemon surfaces as [`HarnessError::Timeout`].

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, KillContainerOptions, LogOutput,
    LogsOptions, RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::models::{ContainerInspectResponse, HostConfig};
use bollard::volume::{CreateVolumeOptions, RemoveVolumeOptions};
use bollard::{API_DEFAULT_VERSION, Docker};
use futures::TryStreamExt;
use mqha_common::config::HarnessConfig;
use mqha_common::constants::{HARNESS_LABEL, STOP_GRACE};
use mqha_common::error::{HarnessError, Result};
use mqha_common::types::{ContainerId, ContainerState, Volume};
use tokio::runtime::Runtime;

use super::{ContainerRuntime, ContainerSpec, is_valid_signal};
use crate::exec::ExecOutput;

/// How long bollard itself waits on a request. Calls are bounded more
/// tightly by the backend.
const CLIENT_TIMEOUT_SECS: u64 = 600;

type ApiResult<T> = std::result::Result<T, DockerError>;

/// Docker Engine API calls the backend relies on.
///
/// Implemented for [`bollard::Docker`]; tests substitute a recording double.
#[async_trait]
pub trait DockerApi: Send + Sync {
    /// `GET /_ping`.
    async fn ping(&self) -> ApiResult<()>;

    /// `POST /volumes/create`, returning the volume name.
    async fn create_volume(&self, options: CreateVolumeOptions<String>) -> ApiResult<String>;

    /// `DELETE /volumes/{name}`.
    async fn remove_volume(
        &self,
        name: &str,
        options: Option<RemoveVolumeOptions>,
    ) -> ApiResult<()>;

    /// `POST /containers/create`, returning the container id.
    async fn create_container(
        &self,
        options: Option<CreateContainerOptions<String>>,
        config: Config<String>,
    ) -> ApiResult<String>;

    /// `POST /containers/{id}/start`.
    async fn start_container(&self, id: &str) -> ApiResult<()>;

    /// `POST /containers/{id}/stop`.
    async fn stop_container(
        &self,
        id: &str,
        options: Option<StopContainerOptions>,
    ) -> ApiResult<()>;

    /// `POST /containers/{id}/kill`.
    async fn kill_container(
        &self,
        id: &str,
        options: Option<KillContainerOptions<String>>,
    ) -> ApiResult<()>;

    /// `DELETE /containers/{id}`.
    async fn remove_container(
        &self,
        id: &str,
        options: Option<RemoveContainerOptions>,
    ) -> ApiResult<()>;

    /// `GET /containers/{id}/json`.
    async fn inspect_container(&self, id: &str) -> ApiResult<ContainerInspectResponse>;

    /// `GET /containers/{id}/logs`, collected to the end.
    async fn logs(&self, id: &str, options: LogsOptions<String>) -> ApiResult<Vec<LogOutput>>;

    /// Creates, starts and inspects an exec, returning its attached output
    /// and exit code.
    async fn exec(
        &self,
        id: &str,
        options: CreateExecOptions<String>,
    ) -> ApiResult<(Vec<LogOutput>, Option<i64>)>;
}

#[async_trait]
impl DockerApi for Docker {
    async fn ping(&self) -> ApiResult<()> {
        Self::ping(self).await.map(|_| ())
    }

    async fn create_volume(&self, options: CreateVolumeOptions<String>) -> ApiResult<String> {
        Self::create_volume(self, options).await.map(|v| v.name)
    }

    async fn remove_volume(
        &self,
        name: &str,
        options: Option<RemoveVolumeOptions>,
    ) -> ApiResult<()> {
        Self::remove_volume(self, name, options).await
    }

    async fn create_container(
        &self,
        options: Option<CreateContainerOptions<String>>,
        config: Config<String>,
    ) -> ApiResult<String> {
        Self::create_container(self, options, config)
            .await
            .map(|r| r.id)
    }

    async fn start_container(&self, id: &str) -> ApiResult<()> {
        Self::start_container(self, id, None::<StartContainerOptions<String>>).await
    }

    async fn stop_container(
        &self,
        id: &str,
        options: Option<StopContainerOptions>,
    ) -> ApiResult<()> {
        Self::stop_container(self, id, options).await
    }

    async fn kill_container(
        &self,
        id: &str,
        options: Option<KillContainerOptions<String>>,
    ) -> ApiResult<()> {
        Self::kill_container(self, id, options).await
    }

    async fn remove_container(
        &self,
        id: &str,
        options: Option<RemoveContainerOptions>,
    ) -> ApiResult<()> {
        Self::remove_container(self, id, options).await
    }

    async fn inspect_container(&self, id: &str) -> ApiResult<ContainerInspectResponse> {
        Self::inspect_container(self, id, None::<InspectContainerOptions>).await
    }

    async fn logs(&self, id: &str, options: LogsOptions<String>) -> ApiResult<Vec<LogOutput>> {
        Self::logs(self, id, Some(options)).try_collect().await
    }

    async fn exec(
        &self,
        id: &str,
        options: CreateExecOptions<String>,
    ) -> ApiResult<(Vec<LogOutput>, Option<i64>)> {
        let created = self.create_exec(id, options).await?;
        let output = match self.start_exec(&created.id, None).await? {
            StartExecResults::Attached { output, .. } => output.try_collect::<Vec<_>>().await?,
            StartExecResults::Detached => Vec::new(),
        };
        let inspected = self.inspect_exec(&created.id).await?;
        Ok((output, inspected.exit_code))
    }
}

/// Backend driving a Docker daemon through its Engine API.
#[derive(Debug)]
pub struct DockerBackend<A = Docker> {
    api: A,
    runtime: Runtime,
    call_timeout: Duration,
}

impl DockerBackend<Docker> {
    /// Connects to the daemon named by the configuration, or the local
    /// defaults (`DOCKER_HOST`, then the platform socket) when unset.
    ///
    /// Connecting does not contact the daemon; use
    /// [`is_available`](ContainerRuntime::is_available) for that.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] for an unsupported host scheme, or a
    /// runtime error if the client cannot be set up.
    pub fn from_config(config: &HarnessConfig) -> Result<Self> {
        let runtime = build_runtime()?;
        let api = {
            let _guard = runtime.enter();
            connect(config.docker_host.as_deref())?
        };
        tracing::debug!(host = ?config.docker_host, "docker client ready");
        Ok(Self {
            api,
            runtime,
            call_timeout: config.call_timeout(),
        })
    }
}

impl<A: DockerApi> DockerBackend<A> {
    /// Creates a backend over an existing API client.
    ///
    /// # Errors
    ///
    /// Returns a runtime error if the async runtime cannot be started.
    pub fn with_api(api: A, call_timeout: Duration) -> Result<Self> {
        Ok(Self {
            api,
            runtime: build_runtime()?,
            call_timeout,
        })
    }

    /// Runs one API call to completion, bounded by `timeout`.
    fn call<T>(
        &self,
        operation: &'static str,
        timeout: Duration,
        fut: impl Future<Output = ApiResult<T>>,
    ) -> Result<T> {
        let started = Instant::now();
        match self.runtime.block_on(tokio::time::timeout(timeout, fut)) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::debug!(operation, error = %e, "docker call failed");
                Err(api_error(operation, e))
            }
            Err(_) => Err(HarnessError::Timeout {
                what: format!("docker to {operation}"),
                waited: started.elapsed(),
            }),
        }
    }
}

fn build_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("mqha-docker")
        .enable_all()
        .build()
        .map_err(|e| HarnessError::runtime("start the docker client runtime", e.to_string()))
}

fn connect(host: Option<&str>) -> Result<Docker> {
    let docker = match host {
        None => Docker::connect_with_local_defaults(),
        Some(h) if h.starts_with("unix://") => {
            Docker::connect_with_unix(h, CLIENT_TIMEOUT_SECS, API_DEFAULT_VERSION)
        }
        Some(h) if h.starts_with("tcp://") || h.starts_with("http://") => {
            Docker::connect_with_http(h, CLIENT_TIMEOUT_SECS, API_DEFAULT_VERSION)
        }
        Some(h) => {
            return Err(HarnessError::Config {
                message: format!("unsupported docker host: {h}"),
            });
        }
    };
    docker.map_err(|e| api_error("connect to docker", e))
}

fn api_error(operation: &'static str, err: DockerError) -> HarnessError {
    match err {
        DockerError::DockerResponseServerError {
            status_code,
            message,
        } => HarnessError::runtime(operation, format!("daemon returned {status_code}: {message}")),
        other => HarnessError::runtime(operation, other.to_string()),
    }
}

fn harness_labels() -> HashMap<String, String> {
    HashMap::from([(HARNESS_LABEL.to_string(), "true".to_string())])
}

/// Builds the create request for a container spec.
fn container_config(spec: &ContainerSpec) -> Config<String> {
    let env = spec.env.iter().map(|(k, v)| format!("{k}={v}")).collect();
    let binds = spec.mounts.iter().map(|m| m.to_bind()).collect();
    Config {
        image: Some(spec.image.clone()),
        env: Some(env),
        labels: Some(harness_labels()),
        host_config: Some(HostConfig {
            binds: Some(binds),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Splits attached exec output into stdout and stderr.
fn split_output(chunks: &[LogOutput]) -> (String, String) {
    let mut stdout = String::new();
    let mut stderr = String::new();
    for chunk in chunks {
        match chunk {
            LogOutput::StdErr { message } => stderr.push_str(&String::from_utf8_lossy(message)),
            LogOutput::StdOut { message } | LogOutput::Console { message } => {
                stdout.push_str(&String::from_utf8_lossy(message));
            }
            LogOutput::StdIn { .. } => {}
        }
    }
    (stdout, stderr)
}

impl<A: DockerApi> ContainerRuntime for DockerBackend<A> {
    fn create_volume(&self, name: &str) -> Result<Volume> {
        let options = CreateVolumeOptions {
            name: name.to_string(),
            labels: harness_labels(),
            ..Default::default()
        };
        let created = self.call(
            "create volume",
            self.call_timeout,
            self.api.create_volume(options),
        )?;
        tracing::info!(volume = %created, "volume created");
        Ok(Volume {
            id: created.clone(),
            name: created,
        })
    }

    fn remove_volume(&self, name: &str) -> Result<()> {
        let options = RemoveVolumeOptions { force: false };
        self.call(
            "remove volume",
            self.call_timeout,
            self.api.remove_volume(name, Some(options)),
        )?;
        tracing::info!(volume = %name, "volume removed");
        Ok(())
    }

    fn create(&self, spec: &ContainerSpec) -> Result<ContainerId> {
        if spec.image.trim().is_empty() {
            return Err(HarnessError::Config {
                message: "container image must not be empty".into(),
            });
        }
        let options = spec.name.clone().map(|name| CreateContainerOptions {
            name,
            ..Default::default()
        });
        let id = self.call(
            "create container",
            self.call_timeout,
            self.api.create_container(options, container_config(spec)),
        )?;
        let id = ContainerId::new(id);
        tracing::info!(id = %id.short(), image = %spec.image, "container created");
        Ok(id)
    }

    fn start(&self, id: &ContainerId) -> Result<()> {
        self.call(
            "start container",
            self.call_timeout,
            self.api.start_container(id.as_str()),
        )?;
        tracing::info!(id = %id.short(), "container started");
        Ok(())
    }

    fn stop(&self, id: &ContainerId) -> Result<()> {
        let options = StopContainerOptions {
            t: i64::try_from(STOP_GRACE.as_secs()).unwrap_or(i64::MAX),
        };
        self.call(
            "stop container",
            self.call_timeout + STOP_GRACE,
            self.api.stop_container(id.as_str(), Some(options)),
        )?;
        tracing::info!(id = %id.short(), "container stopped");
        Ok(())
    }

    fn kill(&self, id: &ContainerId, signal: &str) -> Result<()> {
        if !is_valid_signal(signal) {
            return Err(HarnessError::Config {
                message: format!("unknown signal: {signal}"),
            });
        }
        let options = KillContainerOptions {
            signal: signal.to_string(),
        };
        self.call(
            "kill container",
            self.call_timeout,
            self.api.kill_container(id.as_str(), Some(options)),
        )?;
        tracing::info!(id = %id.short(), signal, "signal sent");
        Ok(())
    }

    fn remove(&self, id: &ContainerId) -> Result<()> {
        let options = RemoveContainerOptions {
            v: true,
            force: true,
            link: false,
        };
        self.call(
            "remove container",
            self.call_timeout,
            self.api.remove_container(id.as_str(), Some(options)),
        )?;
        tracing::info!(id = %id.short(), "container removed");
        Ok(())
    }

    fn exec_within(
        &self,
        id: &ContainerId,
        cmd: &[String],
        timeout: Duration,
    ) -> Result<ExecOutput> {
        let Some(program) = cmd.first() else {
            return Err(HarnessError::Config {
                message: "exec command is empty".into(),
            });
        };
        let options = CreateExecOptions {
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            cmd: Some(cmd.to_vec()),
            ..Default::default()
        };
        let (chunks, exit_code) = self.call(
            "exec in container",
            timeout,
            self.api.exec(id.as_str(), options),
        )?;
        let Some(exit_code) = exit_code else {
            return Err(HarnessError::runtime(
                "exec in container",
                format!("{program} finished without an exit code"),
            ));
        };
        let (stdout, stderr) = split_output(&chunks);
        let out = ExecOutput {
            stdout,
            stderr,
            exit_code: i32::try_from(exit_code).unwrap_or(-1),
        };
        tracing::debug!(id = %id.short(), cmd = ?cmd, exit_code = out.exit_code, "exec finished");
        out.into_launched(program)
    }

    fn logs_within(&self, id: &ContainerId, timeout: Duration) -> Result<String> {
        let options = LogsOptions {
            follow: false,
            stdout: true,
            stderr: true,
            since: 0,
            until: 0,
            timestamps: false,
            tail: "all".to_string(),
        };
        let chunks = self.call("fetch logs", timeout, self.api.logs(id.as_str(), options))?;
        let (stdout, stderr) = split_output(&chunks);
        Ok(stdout + &stderr)
    }

    fn state_within(&self, id: &ContainerId, timeout: Duration) -> Result<ContainerState> {
        let inspected = self.call(
            "inspect container",
            timeout,
            self.api.inspect_container(id.as_str()),
        )?;
        let status = inspected
            .state
            .and_then(|s| s.status)
            .map(|s| s.to_string())
            .unwrap_or_default();
        tracing::debug!(id = %id.short(), %status, "inspected");
        Ok(ContainerState::from_status(&status))
    }

    fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    fn is_available(&self) -> bool {
        self.call("ping docker", self.call_timeout, self.api.ping())
            .is_ok()
    }
}
