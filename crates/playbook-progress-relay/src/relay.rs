//! Line relay
//!
//! Every non-blank input line is one [`HookCall`]. A line that does not parse
//! is logged and skipped; the rest of the stream is still relayed.

use std::io::{self, BufRead};

use playbook_progress::{HookCall, ProgressBridge};

/// What happened to the lines of one relay session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Lines read, blank ones included
    pub lines: u64,
    pub dispatched: u64,
    pub malformed: u64,
}

/// Dispatch every hook call read from `reader` until EOF.
///
/// Only a failure to read the input is an error.
pub fn run_relay<R: BufRead>(reader: R, bridge: &ProgressBridge) -> io::Result<RelayStats> {
    let mut stats = RelayStats::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        stats.lines += 1;

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match HookCall::from_json(line) {
            Ok(call) => {
                tracing::trace!(line = index + 1, hook = %call.hook(), "relaying hook call");
                bridge.dispatch(call);
                stats.dispatched += 1;
            }
            Err(e) => {
                tracing::warn!(line = index + 1, error = %e, "skipping malformed hook call");
                stats.malformed += 1;
            }
        }
    }

    tracing::debug!(
        lines = stats.lines,
        dispatched = stats.dispatched,
        malformed = stats.malformed,
        "relay input exhausted"
    );
    Ok(stats)
}
