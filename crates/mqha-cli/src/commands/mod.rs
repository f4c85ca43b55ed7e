//! CLI command definitions and dispatch.

pub mod doctor;
pub mod list;
pub mod run;
pub mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mqha_common::config::HarnessConfig;
use mqha_runtime::backend::docker::DockerBackend;

/// mqha — failover scenarios for multi-instance queue manager containers.
#[derive(Parser, Debug)]
#[command(name = "mqha", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// JSON configuration file.
    #[arg(long, global = true, env = "MQHA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Image to test, overriding the configuration.
    #[arg(long, global = true)]
    pub image: Option<String>,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one scenario, or all of them.
    Run(run::RunArgs),
    /// List the available scenarios.
    List(list::ListArgs),
    /// Query the queue manager status in a running container.
    Status(status::StatusArgs),
    /// Check that the docker daemon is reachable.
    Doctor(doctor::DoctorArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    match cli.command {
        Command::Run(args) => run::execute(args, &config),
        Command::List(args) => list::execute(&args),
        Command::Status(args) => status::execute(args, &config),
        Command::Doctor(args) => doctor::execute(&args, &config),
    }
}

/// Builds the effective configuration: file, then environment, then flags.
fn load_config(cli: &Cli) -> anyhow::Result<HarnessConfig> {
    let base = match &cli.config {
        Some(path) => HarnessConfig::load(path).map_err(|e| anyhow::anyhow!("{e}"))?,
        None => HarnessConfig::default(),
    };
    let mut config = base.apply_env();
    if let Some(image) = &cli.image {
        config.image.clone_from(image);
    }
    config.validate().map_err(|e| anyhow::anyhow!("{e}"))?;
    tracing::debug!(?config, "effective configuration");
    Ok(config)
}

/// Connects to the configured Docker daemon.
fn docker(config: &HarnessConfig) -> anyhow::Result<DockerBackend> {
    DockerBackend::from_config(config).map_err(|e| anyhow::anyhow!("{e}"))
}
