//! `mqha doctor` — Check that the docker daemon answers.

use clap::Args;
use mqha_common::config::HarnessConfig;
use mqha_runtime::backend::ContainerRuntime;

/// Arguments for the `doctor` command.
#[derive(Args, Debug)]
pub struct DoctorArgs {}

/// Executes the `doctor` command.
///
/// # Errors
///
/// Returns an error if the docker host is unusable or the daemon does not
/// answer.
pub fn execute(_args: &DoctorArgs, config: &HarnessConfig) -> anyhow::Result<()> {
    let docker = super::docker(config)?;
    let host = config.docker_host.as_deref().unwrap_or("local defaults");
    println!("docker host:   {host}");
    if !docker.is_available() {
        anyhow::bail!("docker daemon is not reachable");
    }
    println!("docker daemon: reachable");
    println!("image:         {}", config.image);
    Ok(())
}
