//! # Playbook Progress Relay
//!
//! Reads hook invocations, one JSON object per line, from the engine-side
//! shim and feeds them to a [`ProgressBridge`](playbook_progress::ProgressBridge).

pub mod cli;
pub mod relay;

pub use cli::{log_filter, run, ExitCode, RelayCli, RelayCommands, DEFAULT_LOG_FILTER};
pub use relay::{run_relay, RelayStats};
