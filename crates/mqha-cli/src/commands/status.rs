//! `mqha status` — Query the queue manager in a running container.

use clap::Args;
use mqha_common::config::HarnessConfig;
use mqha_common::types::ContainerId;
use mqha_harness::probe::QueueManagerProbe;

/// Arguments for the `status` command.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Container ID or name.
    pub container: String,

    /// A second container; classifies the pair as active and standby.
    pub partner: Option<String>,

    /// Queue manager name, overriding the configuration.
    #[arg(long)]
    pub qmgr: Option<String>,
}

/// Executes the `status` command.
///
/// # Errors
///
/// Returns an error if the probe fails or the pair is not one active and
/// one standby.
pub fn execute(args: StatusArgs, config: &HarnessConfig) -> anyhow::Result<()> {
    let docker = super::docker(config)?;
    let qmgr = args.qmgr.unwrap_or_else(|| config.qmgr_name.clone());
    let probe = QueueManagerProbe::new(&docker, &qmgr);
    let id = ContainerId::new(args.container);

    if let Some(partner) = args.partner {
        let partner = ContainerId::new(partner);
        let pair = probe
            .active_standby(&id, &partner)
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        println!("active:  {}", pair.active);
        println!("standby: {}", pair.standby);
        return Ok(());
    }

    let status = probe.status(&id).map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("{qmgr} in {id}: {status}");
    Ok(())
}
