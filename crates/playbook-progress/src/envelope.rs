//! Envelope that wraps every event sent to the consumer.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::event::EventKind;

/// A self-describing event: kind, dispatch time and payload.
///
/// On the wire this is exactly one line of JSON with the three keys
/// `type`, `timestamp` and `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// RFC 3339 UTC with a `Z` suffix, taken when the envelope is built.
    pub timestamp: String,
    pub data: Map<String, Value>,
}

impl Envelope {
    /// Stamp `data` with the current time.
    ///
    /// Build the envelope right before sending it so the timestamp reflects
    /// dispatch order rather than when the engine observed the event.
    pub fn new(kind: EventKind, data: Map<String, Value>) -> Self {
        Self::at(kind, data, Utc::now())
    }

    pub fn at(kind: EventKind, data: Map<String, Value>, at: DateTime<Utc>) -> Self {
        Self {
            kind,
            timestamp: format_timestamp(at),
            data,
        }
    }

    /// Serialize into a single `\n`-terminated line.
    pub fn to_line(&self) -> Result<Vec<u8>> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}

/// `2026-10-16T12:00:00.123456Z`
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
