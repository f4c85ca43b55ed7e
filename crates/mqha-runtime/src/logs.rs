//! Helpers for inspecting container output.

/// Number of lines kept when a container's output is attached to an error.
pub const DEFAULT_TAIL_LINES: usize = 20;

/// Returns the last `n` lines of `logs`, newline-joined.
#[must_use]
pub fn tail(logs: &str, n: usize) -> String {
    let lines: Vec<&str> = logs.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

/// Returns the first line of `logs` containing `needle` verbatim.
#[must_use]
pub fn find_line<'a>(logs: &'a str, needle: &str) -> Option<&'a str> {
    logs.lines().find(|line| line.contains(needle))
}
