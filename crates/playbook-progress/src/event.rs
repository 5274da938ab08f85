//! The closed set of event kinds carried on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a progress event.
///
/// Serialized as the snake_case `type` field of every envelope. The set is
/// closed: consumers may rely on never seeing any other value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PlaybookStart,
    PlayStart,
    TaskStart,
    HostTaskStart,
    HostOk,
    HostFailed,
    HostSkipped,
    HostUnreachable,
    ItemOk,
    ItemFailed,
    ItemSkipped,
    HostRetry,
    FileDiff,
    Include,
    PlaybookComplete,
}

impl EventKind {
    /// Every kind, in lifecycle order.
    pub const ALL: [EventKind; 15] = [
        EventKind::PlaybookStart,
        EventKind::PlayStart,
        EventKind::TaskStart,
        EventKind::HostTaskStart,
        EventKind::HostOk,
        EventKind::HostFailed,
        EventKind::HostSkipped,
        EventKind::HostUnreachable,
        EventKind::ItemOk,
        EventKind::ItemFailed,
        EventKind::ItemSkipped,
        EventKind::HostRetry,
        EventKind::FileDiff,
        EventKind::Include,
        EventKind::PlaybookComplete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PlaybookStart => "playbook_start",
            EventKind::PlayStart => "play_start",
            EventKind::TaskStart => "task_start",
            EventKind::HostTaskStart => "host_task_start",
            EventKind::HostOk => "host_ok",
            EventKind::HostFailed => "host_failed",
            EventKind::HostSkipped => "host_skipped",
            EventKind::HostUnreachable => "host_unreachable",
            EventKind::ItemOk => "item_ok",
            EventKind::ItemFailed => "item_failed",
            EventKind::ItemSkipped => "item_skipped",
            EventKind::HostRetry => "host_retry",
            EventKind::FileDiff => "file_diff",
            EventKind::Include => "include",
            EventKind::PlaybookComplete => "playbook_complete",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown event kind: {}", s))
    }
}
