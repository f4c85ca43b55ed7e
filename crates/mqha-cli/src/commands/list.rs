//! `mqha list` — List the available scenarios.

use clap::Args;
use mqha_harness::scenarios::ScenarioKind;

/// Arguments for the `list` command.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Include scenarios this build cannot run.
    #[arg(short, long)]
    pub all: bool,
}

/// Executes the `list` command.
///
/// # Errors
///
/// Never fails; returns `Result` for dispatch uniformity.
pub fn execute(args: &ListArgs) -> anyhow::Result<()> {
    for kind in ScenarioKind::ALL {
        if !kind.is_enabled() && !args.all {
            continue;
        }
        let note = if kind.is_enabled() { "" } else { " (needs --features file-lock)" };
        println!("{:<18} {}{note}", kind.name(), kind.description());
    }
    Ok(())
}
