//! Formatted output helpers for CLI commands.

use std::time::Duration;

use mqha_harness::scenarios::ScenarioKind;

const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// Result of one scenario run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Passed after the given time.
    Passed(Duration),
    /// Failed after the given time with the given error.
    Failed(Duration, String),
    /// Not run, with the reason.
    Skipped(String),
}

/// Formats a duration as seconds with one decimal, or minutes past 60s.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs >= 60.0 {
        format!("{}m{:02}s", d.as_secs() / 60, d.as_secs() % 60)
    } else {
        format!("{secs:.1}s")
    }
}

/// Prints one result line for a scenario.
pub fn print_outcome(kind: ScenarioKind, outcome: &Outcome) {
    match outcome {
        Outcome::Passed(d) => {
            eprintln!("  {GREEN}✔{RESET} {kind:<18} {DIM}{}{RESET}", format_duration(*d));
        }
        Outcome::Failed(d, error) => {
            eprintln!("  {RED}✘{RESET} {kind:<18} {DIM}{}{RESET}", format_duration(*d));
            for line in error.lines() {
                eprintln!("      {RED}{line}{RESET}");
            }
        }
        Outcome::Skipped(reason) => {
            eprintln!("  {YELLOW}-{RESET} {kind:<18} {DIM}skipped: {reason}{RESET}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_duration_sub_minute() {
        assert_eq!(format_duration(Duration::from_millis(2_340)), "2.3s");
    }

    #[test]
    fn format_duration_minutes() {
        assert_eq!(format_duration(Duration::from_secs(125)), "2m05s");
    }

    #[test]
    fn format_duration_zero() {
        assert_eq!(format_duration(Duration::ZERO), "0.0s");
    }
}
