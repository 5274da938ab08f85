//! CLI command definitions for the progress relay

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use playbook_progress::{BridgeConfig, TimingRetention};

/// Playbook progress relay
///
/// Forwards hook invocations from the engine-side shim to the progress
/// consumer socket.
#[derive(Parser, Debug)]
#[command(name = "playbook-progress-relay")]
#[command(about = "Relay playbook lifecycle hooks to a progress consumer", long_about = None)]
#[command(version)]
pub struct RelayCli {
    #[command(subcommand)]
    pub command: RelayCommands,
}

/// Available relay commands
#[derive(Subcommand, Debug)]
pub enum RelayCommands {
    /// Relay hook calls read as JSON lines
    ///
    /// Connection settings come from ANSIBLE_ENV_SOCKET,
    /// ANSIBLE_ENV_SOCKET_TIMEOUT_MS and ANSIBLE_ENV_TIMING_RETENTION;
    /// flags given here take precedence.
    Relay(RelayArgs),

    /// List the hooks and the event each one emits
    Hooks {
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(clap::Args, Debug, Default)]
pub struct RelayArgs {
    /// File to read hook calls from instead of stdin
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Consumer socket path
    #[arg(short, long)]
    pub socket: Option<PathBuf>,

    /// Per-write timeout in milliseconds; 0 blocks
    #[arg(long)]
    pub send_timeout_ms: Option<u64>,

    /// How long task start times are kept
    #[arg(long, value_enum)]
    pub timing_retention: Option<RetentionArg>,

    /// Print delivery metrics to stderr at end of input
    #[arg(long)]
    pub print_metrics: bool,
}

impl RelayArgs {
    /// Settings from the environment, overridden by any flags given
    pub fn bridge_config(&self, mut base: BridgeConfig) -> BridgeConfig {
        if let Some(socket) = &self.socket {
            base.socket_path = Some(socket.clone()).filter(|p| !p.as_os_str().is_empty());
        }
        if let Some(ms) = self.send_timeout_ms {
            base.send_timeout = Some(Duration::from_millis(ms)).filter(|t| !t.is_zero());
        }
        if let Some(retention) = self.timing_retention {
            base.timing_retention = retention.into();
        }
        base
    }
}

/// Timing retention as accepted on the command line
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum RetentionArg {
    /// Keep start times for the whole run
    Run,
    /// Forget start times at each play
    Play,
}

impl From<RetentionArg> for TimingRetention {
    fn from(arg: RetentionArg) -> Self {
        match arg {
            RetentionArg::Run => TimingRetention::Run,
            RetentionArg::Play => TimingRetention::Play,
        }
    }
}

/// Output format for `hooks`
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug, Default)]
pub enum OutputFormat {
    /// Aligned two-column table
    #[default]
    Text,
    /// JSON array
    Json,
}
