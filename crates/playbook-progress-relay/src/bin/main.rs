//! Playbook progress relay
//!
//! # Usage
//!
//! ```bash
//! # Relay hook calls from the engine shim on stdin
//! ANSIBLE_ENV_SOCKET=/run/progress.sock playbook-progress-relay relay
//!
//! # Replay a captured session and show what was delivered
//! playbook-progress-relay relay --input session.ndjson --socket /tmp/p.sock --print-metrics
//!
//! # Show the hook table
//! playbook-progress-relay hooks --format json
//! ```
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 3: Invalid input (input file missing or unreadable)
//! - 10: Internal error
//!
//! Delivery problems with the consumer never change the exit code.

use clap::Parser;
use playbook_progress_relay::{log_filter, run, ExitCode, RelayCli};

fn main() {
    // Logs go to stderr; stdout belongs to `hooks`. RUST_LOG wins over the default.
    let rust_log = std::env::var("RUST_LOG").ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(rust_log.as_deref()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = RelayCli::parse();

    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "relay failed");
            eprintln!("error: {:#}", e);
            ExitCode::InternalError
        }
    };
    std::process::exit(exit_code.into());
}
