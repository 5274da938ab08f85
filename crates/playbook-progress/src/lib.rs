//! # Playbook Progress
//!
//! Best-effort progress telemetry for playbook runs. Lifecycle hooks from the
//! orchestration engine are turned into self-describing JSON events and
//! streamed, one per line, to a consumer listening on a local Unix socket.
//!
//! Telemetry is strictly a side channel. It is opt-in through
//! `ANSIBLE_ENV_SOCKET`, it never blocks or fails the run, and a missing or
//! vanished consumer only costs the events it did not receive.
//!
//! ## Example
//!
//! ```no_run
//! use playbook_progress::{Playbook, ProgressBridge, Task, TaskResult};
//! use serde_json::json;
//!
//! let bridge = ProgressBridge::from_env();
//!
//! let task = Task::new("Ping hosts", "5f1c", "ansible.builtin.ping");
//! bridge.on_playbook_start(&Playbook::new("site.yml"));
//! bridge.on_task_start(&task);
//! bridge.on_runner_ok(&TaskResult::new("web1", task, json!({"ping": "pong"})));
//! ```

pub mod bridge;
pub mod config;
pub mod connection;
pub mod envelope;
pub mod error;
pub mod event;
pub mod hooks;
pub mod host;
pub mod metrics;
pub mod sanitize;
pub mod timing;

pub use bridge::{ProgressBridge, ProgressBridgeBuilder};
pub use config::{BridgeConfig, BridgeConfigBuilder, TimingRetention};
pub use connection::Connection;
pub use envelope::Envelope;
pub use error::{BridgeError, DisabledReason, Result};
pub use event::EventKind;
pub use hooks::{Hook, HookCall, HOOKS};
pub use host::{HostStats, IncludedFile, Play, Playbook, PlaybookStats, Task, TaskResult};
pub use metrics::BridgeMetrics;
pub use sanitize::{sanitize_result, SanitizePolicy};
pub use timing::{Clock, ManualClock, MonotonicClock, TimingTracker};
