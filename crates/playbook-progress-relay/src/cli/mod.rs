//! CLI module for the progress relay
//!
//! `relay` streams hook calls into a [`ProgressBridge`]; `hooks` prints the
//! hook table so shim authors can check their names against it.

pub mod commands;

pub use commands::{OutputFormat, RelayArgs, RelayCli, RelayCommands, RetentionArg};

use anyhow::Context;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use tracing_subscriber::EnvFilter;

use playbook_progress::{BridgeConfig, ProgressBridge, HOOKS};

use crate::relay::run_relay;

/// Exit codes for CLI operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Input fully relayed
    Success = 0,
    /// Input file missing or unreadable
    InvalidInput = 3,
    /// Internal error
    InternalError = 10,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

/// Filter used when `RUST_LOG` is unset or unparseable
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Log filter from `RUST_LOG` directives, falling back to [`DEFAULT_LOG_FILTER`]
pub fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Run the CLI with the given arguments and return the exit code
pub fn run(cli: RelayCli) -> anyhow::Result<ExitCode> {
    match cli.command {
        RelayCommands::Relay(args) => execute_relay(args),
        RelayCommands::Hooks { format } => {
            let stdout = io::stdout();
            execute_hooks(format, &mut stdout.lock()).context("writing hook table")?;
            Ok(ExitCode::Success)
        }
    }
}

fn execute_relay(args: RelayArgs) -> anyhow::Result<ExitCode> {
    let config = args.bridge_config(BridgeConfig::from_env());
    let bridge = ProgressBridge::new(config);

    let reader: Box<dyn BufRead> = match &args.input {
        Some(path) => match File::open(path) {
            Ok(file) => Box::new(BufReader::new(file)),
            Err(e) => {
                eprintln!("cannot open {}: {}", path.display(), e);
                return Ok(ExitCode::InvalidInput);
            }
        },
        None => Box::new(io::stdin().lock()),
    };

    let stats = run_relay(reader, &bridge).context("reading hook calls")?;
    tracing::info!(
        dispatched = stats.dispatched,
        malformed = stats.malformed,
        connected = bridge.connection().is_connected(),
        "relay finished"
    );

    if args.print_metrics {
        if let Some(metrics) = bridge.metrics() {
            eprint!("{}", metrics.encode_text().context("encoding metrics")?);
        }
    }

    Ok(ExitCode::Success)
}

#[derive(Serialize)]
struct HookRow {
    hook: &'static str,
    event: &'static str,
}

/// Write the hook table in `format`
pub fn execute_hooks<W: Write>(format: OutputFormat, out: &mut W) -> io::Result<()> {
    let rows: Vec<HookRow> = HOOKS
        .iter()
        .map(|&(name, _, kind)| HookRow {
            hook: name,
            event: kind.as_str(),
        })
        .collect();

    match format {
        OutputFormat::Text => {
            let width = rows.iter().map(|row| row.hook.len()).max().unwrap_or(0);
            for row in &rows {
                writeln!(out, "{:<width$}  {}", row.hook, row.event, width = width)?;
            }
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &rows)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_conversion() {
        assert_eq!(i32::from(ExitCode::Success), 0);
        assert_eq!(i32::from(ExitCode::InvalidInput), 3);
        assert_eq!(i32::from(ExitCode::InternalError), 10);
    }

    #[test]
    fn test_rust_log_overrides_default_level() {
        use tracing_subscriber::filter::LevelFilter;

        assert_eq!(
            log_filter(Some("debug")).max_level_hint(),
            Some(LevelFilter::DEBUG)
        );
        assert_eq!(
            log_filter(Some("playbook_progress=trace")).max_level_hint(),
            Some(LevelFilter::TRACE)
        );
        assert_eq!(log_filter(None).max_level_hint(), Some(LevelFilter::WARN));
        assert_eq!(log_filter(Some("  ")).max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn test_hooks_text() {
        let mut out = Vec::new();
        execute_hooks(OutputFormat::Text, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(text.lines().count(), HOOKS.len());
        let first: Vec<&str> = text.lines().next().unwrap().split_whitespace().collect();
        assert_eq!(first, vec!["v2_playbook_on_start", "playbook_start"]);
    }

    #[test]
    fn test_hooks_json() {
        let mut out = Vec::new();
        execute_hooks(OutputFormat::Json, &mut out).unwrap();
        let rows: serde_json::Value = serde_json::from_slice(&out).unwrap();

        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 16);
        assert_eq!(
            rows[3],
            serde_json::json!({"hook": "v2_playbook_on_handler_task_start", "event": "task_start"})
        );
    }

    #[test]
    fn test_missing_input_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let args = RelayArgs {
            input: Some(dir.path().join("absent.ndjson")),
            ..Default::default()
        };
        assert_eq!(execute_relay(args).unwrap(), ExitCode::InvalidInput);
    }

    #[test]
    fn test_relay_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("hooks.ndjson");
        std::fs::write(
            &input,
            "{\"hook\":\"v2_playbook_on_start\",\"args\":{}}\nnot json\n",
        )
        .unwrap();

        let args = RelayArgs {
            input: Some(input),
            socket: Some(dir.path().join("nobody.sock")),
            ..Default::default()
        };
        assert_eq!(execute_relay(args).unwrap(), ExitCode::Success);
    }
}
