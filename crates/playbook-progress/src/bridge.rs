//! Lifecycle hook dispatcher
//!
//! [`ProgressBridge`] is the per-run context: one connection, one timing
//! table, one set of counters. The engine (or the relay) calls one method
//! per lifecycle hook. Each method builds its payload, wraps it in an
//! envelope and writes it to the consumer.
//!
//! No method returns an error. Every failure is logged at debug level,
//! counted, and dropped, so a broken telemetry stream can never change the
//! outcome or output of the run.

use serde_json::{json, Map, Value};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crate::config::{BridgeConfig, TimingRetention};
use crate::connection::Connection;
use crate::envelope::Envelope;
use crate::error::{BridgeError, Result};
use crate::event::EventKind;
use crate::hooks::HookCall;
use crate::host::{is_truthy, IncludedFile, Play, Playbook, PlaybookStats, Task, TaskResult};
use crate::metrics::BridgeMetrics;
use crate::timing::{round_secs, Clock, MonotonicClock, TimingTracker};

/// Streams playbook lifecycle events to the consumer
pub struct ProgressBridge {
    config: BridgeConfig,
    connection: Connection,
    timings: TimingTracker,
    clock: Arc<dyn Clock>,
    metrics: Option<BridgeMetrics>,
    run_started: Mutex<Option<Instant>>,
}

impl ProgressBridge {
    /// Configure from the environment and connect
    pub fn from_env() -> Self {
        Self::new(BridgeConfig::from_env())
    }

    /// Connect using `config`
    pub fn new(config: BridgeConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: BridgeConfig) -> ProgressBridgeBuilder {
        ProgressBridgeBuilder::new(config)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn timings(&self) -> &TimingTracker {
        &self.timings
    }

    pub fn metrics(&self) -> Option<&BridgeMetrics> {
        self.metrics.as_ref()
    }

    /// Route one hook invocation to its handler.
    ///
    /// A panic inside a handler is caught here and only costs that event.
    pub fn dispatch(&self, call: HookCall) {
        let hook = call.hook();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.handle(call)));
        if outcome.is_err() {
            tracing::warn!(hook = %hook, "progress hook handler panicked, event dropped");
            self.record_drop_reason("panic");
        }
    }

    fn handle(&self, call: HookCall) {
        match call {
            HookCall::PlaybookOnStart { playbook } => self.on_playbook_start(&playbook),
            HookCall::PlaybookOnPlayStart { play } => self.on_play_start(&play),
            HookCall::PlaybookOnTaskStart { task, .. } => self.on_task_start(&task),
            HookCall::PlaybookOnHandlerTaskStart { task } => self.on_handler_task_start(&task),
            HookCall::RunnerOnStart { host, task } => self.on_runner_start(&host, &task),
            HookCall::RunnerOnOk { result } => self.on_runner_ok(&result),
            HookCall::RunnerOnFailed {
                result,
                ignore_errors,
            } => self.on_runner_failed(&result, ignore_errors),
            HookCall::RunnerOnSkipped { result } => self.on_runner_skipped(&result),
            HookCall::RunnerOnUnreachable { result } => self.on_runner_unreachable(&result),
            HookCall::RunnerItemOnOk { result } => self.on_runner_item_ok(&result),
            HookCall::RunnerItemOnFailed { result } => self.on_runner_item_failed(&result),
            HookCall::RunnerItemOnSkipped { result } => self.on_runner_item_skipped(&result),
            HookCall::RunnerRetry { result } => self.on_runner_retry(&result),
            HookCall::OnFileDiff { result } => self.on_file_diff(&result),
            HookCall::PlaybookOnInclude { included_file } => self.on_include(&included_file),
            HookCall::PlaybookOnStats { stats } => self.on_stats(&stats),
        }
    }

    // === Playbook events ===

    pub fn on_playbook_start(&self, playbook: &Playbook) {
        *self.lock_run_started() = Some(self.clock.now());

        self.emit_with(EventKind::PlaybookStart, || {
            object(json!({
                "playbook": playbook.basename(),
                "path": playbook.file_name,
            }))
        });
    }

    pub fn on_play_start(&self, play: &Play) {
        if self.config.timing_retention == TimingRetention::Play {
            self.timings.clear();
        }

        self.emit_with(EventKind::PlayStart, || {
            object(json!({
                "name": play.name,
                "uuid": play.uuid,
                "hosts": play.host_list(),
                "serial": play.serial,
            }))
        });
    }

    pub fn on_task_start(&self, task: &Task) {
        self.start_task(task, false);
    }

    pub fn on_handler_task_start(&self, task: &Task) {
        self.start_task(task, true);
    }

    fn start_task(&self, task: &Task, is_handler: bool) {
        self.timings.start_at(&task.uuid, self.clock.now());

        self.emit_with(EventKind::TaskStart, || {
            object(json!({
                "name": task.display_name(),
                "uuid": task.uuid,
                "action": task.action,
                "args": task.args_map(),
                "path": task.path,
                "is_handler": is_handler,
            }))
        });
    }

    pub fn on_stats(&self, stats: &PlaybookStats) {
        let started = *self.lock_run_started();
        let duration = started
            .map(|started| round_secs(self.clock.now().saturating_duration_since(started)))
            .unwrap_or(0.0);

        self.emit_with(EventKind::PlaybookComplete, || {
            let summary: Map<String, Value> = stats
                .hosts
                .iter()
                .map(|(host, s)| {
                    let counts = json!({
                        "ok": s.ok,
                        "changed": s.changed,
                        "failures": s.failures,
                        "unreachable": s.unreachable,
                        "skipped": s.skipped,
                        "rescued": s.rescued,
                        "ignored": s.ignored,
                    });
                    (host.clone(), counts)
                })
                .collect();

            object(json!({
                "stats": summary,
                "duration": duration,
            }))
        });
    }

    pub fn on_include(&self, included_file: &IncludedFile) {
        self.emit_with(EventKind::Include, || {
            object(json!({
                "file": included_file.filename,
                "hosts": included_file.hosts,
            }))
        });
    }

    // === Runner events ===

    pub fn on_runner_start(&self, host: &str, task: &Task) {
        self.emit_with(EventKind::HostTaskStart, || {
            object(json!({
                "host": host,
                "task": task.display_name(),
                "task_uuid": task.uuid,
                "action": task.action,
                "args": task.args_map(),
                "path": task.path,
                "is_handler": task.is_handler,
            }))
        });
    }

    pub fn on_runner_ok(&self, result: &TaskResult) {
        self.emit_host_result(EventKind::HostOk, result, |_| {});
    }

    pub fn on_runner_failed(&self, result: &TaskResult, ignore_errors: bool) {
        self.emit_host_result(EventKind::HostFailed, result, |data| {
            data.insert("ignore_errors".to_string(), Value::Bool(ignore_errors));
        });
    }

    pub fn on_runner_skipped(&self, result: &TaskResult) {
        self.emit_host_result(EventKind::HostSkipped, result, |_| {});
    }

    pub fn on_runner_unreachable(&self, result: &TaskResult) {
        self.emit_host_result(EventKind::HostUnreachable, result, |_| {});
    }

    // === Loop item events ===

    pub fn on_runner_item_ok(&self, result: &TaskResult) {
        self.emit_host_result(EventKind::ItemOk, result, |data| add_item(data, result));
    }

    pub fn on_runner_item_failed(&self, result: &TaskResult) {
        self.emit_host_result(EventKind::ItemFailed, result, |data| add_item(data, result));
    }

    pub fn on_runner_item_skipped(&self, result: &TaskResult) {
        self.emit_host_result(EventKind::ItemSkipped, result, |data| add_item(data, result));
    }

    // === Retry events ===

    pub fn on_runner_retry(&self, result: &TaskResult) {
        self.emit_host_result(EventKind::HostRetry, result, |data| {
            data.insert("retries".to_string(), result.field_or("retries", json!(0)));
            data.insert("attempts".to_string(), result.field_or("attempts", json!(0)));
        });
    }

    // === Diff events ===

    /// Only emitted when the result actually carries a diff
    pub fn on_file_diff(&self, result: &TaskResult) {
        let Some(diff) = result.field("diff").filter(|diff| is_truthy(diff)) else {
            return;
        };

        self.emit_with(EventKind::FileDiff, || {
            object(json!({
                "host": result.host,
                "task": result.task.display_name(),
                "diff": diff,
            }))
        });
    }

    /// Common fields of every per-host outcome
    pub fn host_result(&self, result: &TaskResult) -> Map<String, Value> {
        let duration = self
            .timings
            .duration_since_at(&result.task.uuid, self.clock.now());

        object(json!({
            "host": result.host,
            "task": result.task.display_name(),
            "task_uuid": result.task.uuid,
            "action": result.task.action,
            "changed": result.changed(),
            "duration": duration,
            "result": self.config.sanitize.sanitize(&result.result),
        }))
    }

    fn emit_host_result<F>(&self, kind: EventKind, result: &TaskResult, extend: F)
    where
        F: FnOnce(&mut Map<String, Value>),
    {
        self.emit_with(kind, || {
            let mut data = self.host_result(result);
            extend(&mut data);
            data
        });
    }

    /// Build the payload only if it can go anywhere, then send it.
    fn emit_with<F>(&self, kind: EventKind, build: F)
    where
        F: FnOnce() -> Map<String, Value>,
    {
        let outcome = match self.connection.disabled_reason() {
            Some(reason) => Err(BridgeError::Disabled(reason)),
            None => self.send(kind, build()),
        };

        if let Err(e) = outcome {
            self.record_drop(kind, &e);
        }
    }

    fn send(&self, kind: EventKind, data: Map<String, Value>) -> Result<()> {
        let line = Envelope::new(kind, data).to_line()?;
        self.connection.send(&line)?;

        tracing::trace!(kind = %kind, bytes = line.len(), "progress event sent");
        if let Some(metrics) = &self.metrics {
            metrics.record_sent(kind, line.len());
        }
        Ok(())
    }

    fn record_drop(&self, kind: EventKind, error: &BridgeError) {
        if error.is_disabled() {
            tracing::trace!(kind = %kind, "telemetry disabled, event skipped");
        } else {
            tracing::debug!(kind = %kind, error = %error, "dropping progress event");
        }
        self.record_drop_reason(error.drop_reason());
    }

    fn record_drop_reason(&self, reason: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_dropped(reason);
        }
    }

    fn lock_run_started(&self) -> std::sync::MutexGuard<'_, Option<Instant>> {
        self.run_started.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ProgressBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressBridge")
            .field("config", &self.config)
            .field("connection", &self.connection)
            .field("tracked_tasks", &self.timings.len())
            .finish()
    }
}

/// Builder for ProgressBridge
pub struct ProgressBridgeBuilder {
    config: BridgeConfig,
    connection: Option<Connection>,
    clock: Option<Arc<dyn Clock>>,
    metrics: Option<BridgeMetrics>,
}

impl ProgressBridgeBuilder {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            connection: None,
            clock: None,
            metrics: None,
        }
    }

    /// Use this connection instead of connecting from the config
    pub fn connection(mut self, connection: Connection) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Set the time source
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Record into existing metrics
    pub fn metrics(mut self, metrics: BridgeMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the bridge, connecting if no connection was supplied
    pub fn build(self) -> ProgressBridge {
        let connection = self
            .connection
            .unwrap_or_else(|| Connection::from_config(&self.config));

        let metrics = match self.metrics {
            Some(metrics) => Some(metrics),
            None => match BridgeMetrics::new() {
                Ok(metrics) => Some(metrics),
                Err(e) => {
                    tracing::debug!(error = %e, "delivery metrics unavailable");
                    None
                }
            },
        };

        ProgressBridge {
            config: self.config,
            connection,
            timings: TimingTracker::new(),
            clock: self.clock.unwrap_or_else(|| Arc::new(MonotonicClock)),
            metrics,
            run_started: Mutex::new(None),
        }
    }
}

/// Loop item value and the name of the loop variable
fn add_item(data: &mut Map<String, Value>, result: &TaskResult) {
    data.insert("item".to_string(), result.field_or("item", json!("")));
    data.insert(
        "item_label".to_string(),
        result.field_or("ansible_loop_var", json!("item")),
    );
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
