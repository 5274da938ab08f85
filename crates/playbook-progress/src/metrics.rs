//! Delivery metrics
//!
//! Telemetry failures are never surfaced to the orchestration engine, so
//! these counters are how an operator finds out why the stream went quiet:
//!
//! - `playbook_progress_events_sent_total` (counter, by `kind`)
//! - `playbook_progress_events_dropped_total` (counter, by `reason`)
//! - `playbook_progress_bytes_sent_total` (counter)

use prometheus::{Counter, CounterVec, Encoder, Opts, Registry, TextEncoder};

use crate::event::EventKind;

/// Counters for frames written and dropped
#[derive(Clone)]
pub struct BridgeMetrics {
    registry: Registry,
    events_sent_total: CounterVec,
    events_dropped_total: CounterVec,
    bytes_sent_total: Counter,
}

impl BridgeMetrics {
    /// Create the counters in a fresh registry
    pub fn new() -> prometheus::Result<Self> {
        Self::with_registry(Registry::new())
    }

    /// Create the counters and register them with `registry`
    pub fn with_registry(registry: Registry) -> prometheus::Result<Self> {
        let events_sent_total = CounterVec::new(
            Opts::new(
                "events_sent_total",
                "Total number of progress events written to the consumer",
            )
            .namespace("playbook_progress"),
            &["kind"],
        )?;

        let events_dropped_total = CounterVec::new(
            Opts::new(
                "events_dropped_total",
                "Total number of progress events that were not delivered",
            )
            .namespace("playbook_progress"),
            &["reason"],
        )?;

        let bytes_sent_total = Counter::with_opts(
            Opts::new(
                "bytes_sent_total",
                "Total number of bytes written to the consumer",
            )
            .namespace("playbook_progress"),
        )?;

        registry.register(Box::new(events_sent_total.clone()))?;
        registry.register(Box::new(events_dropped_total.clone()))?;
        registry.register(Box::new(bytes_sent_total.clone()))?;

        Ok(Self {
            registry,
            events_sent_total,
            events_dropped_total,
            bytes_sent_total,
        })
    }

    /// Record a delivered frame
    pub fn record_sent(&self, kind: EventKind, bytes: usize) {
        self.events_sent_total
            .with_label_values(&[kind.as_str()])
            .inc();
        self.bytes_sent_total.inc_by(bytes as f64);
    }

    /// Record a frame that was not delivered
    pub fn record_dropped(&self, reason: &str) {
        self.events_dropped_total.with_label_values(&[reason]).inc();
    }

    pub fn sent(&self, kind: EventKind) -> u64 {
        self.events_sent_total
            .with_label_values(&[kind.as_str()])
            .get() as u64
    }

    pub fn sent_total(&self) -> u64 {
        EventKind::ALL.iter().map(|kind| self.sent(*kind)).sum()
    }

    pub fn dropped(&self, reason: &str) -> u64 {
        self.events_dropped_total.with_label_values(&[reason]).get() as u64
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent_total.get() as u64
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render every counter in the Prometheus text format
    pub fn encode_text(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
