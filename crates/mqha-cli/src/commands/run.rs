//! `mqha run` — Run failover scenarios against Docker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use clap::Args;
use mqha_common::config::HarnessConfig;
use mqha_harness::scenarios::ScenarioKind;
use mqha_runtime::backend::ContainerRuntime;

use crate::output::{Outcome, format_duration, print_outcome};

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenario name (see `mqha list`), or `all`.
    #[arg(default_value = "all")]
    pub scenario: String,

    /// Keep running the remaining scenarios after a failure.
    #[arg(short, long)]
    pub keep_going: bool,
}

const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";

/// Executes the `run` command.
///
/// Ctrl+C lets the scenario in progress finish and clean up, then skips
/// the rest.
///
/// # Errors
///
/// Returns an error if Docker is unusable, the scenario name is unknown, or
/// any scenario fails.
pub fn execute(args: RunArgs, config: &HarnessConfig) -> anyhow::Result<()> {
    let selected = select(&args.scenario)?;
    let docker = super::docker(config)?;
    if !docker.is_available() {
        anyhow::bail!("docker daemon is not reachable (run `mqha doctor`)");
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {e}"))?;

    print_header(config, selected.len());
    let total_start = Instant::now();
    let mut failures = 0_usize;

    for kind in selected {
        if interrupted.load(Ordering::SeqCst) {
            print_outcome(kind, &Outcome::Skipped("interrupted".into()));
            continue;
        }
        let started = Instant::now();
        let outcome = match kind.run(&docker, config) {
            Ok(()) => Outcome::Passed(started.elapsed()),
            Err(e) => {
                failures += 1;
                Outcome::Failed(started.elapsed(), e.to_string())
            }
        };
        print_outcome(kind, &outcome);
        if failures > 0 && !args.keep_going {
            break;
        }
    }

    eprintln!();
    if failures == 0 {
        eprintln!(
            "  {GREEN}{BOLD}All scenarios passed{RESET} {DIM}in {}{RESET}",
            format_duration(total_start.elapsed())
        );
        Ok(())
    } else {
        eprintln!("  {RED}{BOLD}{failures} scenario(s) failed{RESET}");
        anyhow::bail!("{failures} scenario(s) failed")
    }
}

/// Resolves the scenario argument, dropping scenarios this build cannot run
/// when `all` is requested.
fn select(name: &str) -> anyhow::Result<Vec<ScenarioKind>> {
    if name == "all" {
        return Ok(ScenarioKind::ALL
            .into_iter()
            .filter(|k| k.is_enabled())
            .collect());
    }
    let kind: ScenarioKind = name.parse().map_err(|e| anyhow::anyhow!("{e}"))?;
    if !kind.is_enabled() {
        anyhow::bail!("scenario '{kind}' is not enabled in this build");
    }
    Ok(vec![kind])
}

fn print_header(config: &HarnessConfig, count: usize) {
    eprintln!();
    eprintln!("  {BOLD}mqha{RESET} {DIM}v{}{RESET}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "  {DIM}image {} · queue manager {} · {count} scenario(s){RESET}",
        config.image, config.qmgr_name
    );
    eprintln!();
}
