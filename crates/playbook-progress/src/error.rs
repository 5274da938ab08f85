//! Error types for the progress bridge
//!
//! Every fallible step of the pipeline reports one of these. None of them
//! ever reaches the orchestration engine: the dispatcher logs and counts
//! them, then carries on with the next hook.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Why a connection is permanently disabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisabledReason {
    /// No socket path was configured
    NotConfigured,
    /// The socket path was configured but connecting failed at startup
    ConnectFailed,
    /// Local stream sockets are not available on this platform
    Unsupported,
}

impl DisabledReason {
    /// Stable label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            DisabledReason::NotConfigured => "not_configured",
            DisabledReason::ConnectFailed => "connect_failed",
            DisabledReason::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for DisabledReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for bridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Telemetry is switched off for the rest of the process
    #[error("Telemetry disabled: {0}")]
    Disabled(DisabledReason),

    /// Connecting to the consumer socket failed
    #[error("Failed to connect to {}: {source}", path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing a frame to the consumer failed
    #[error("Write error: {0}")]
    Write(#[from] std::io::Error),

    /// Encoding an envelope failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A relayed hook call could not be understood
    #[error("Invalid hook call: {0}")]
    InvalidHookCall(String),
}

impl BridgeError {
    /// Create an invalid hook call error
    pub fn invalid_hook_call(msg: impl Into<String>) -> Self {
        BridgeError::InvalidHookCall(msg.into())
    }

    /// Label used for the `reason` dimension of the dropped-events counter
    pub fn drop_reason(&self) -> &'static str {
        match self {
            BridgeError::Disabled(_) => "disabled",
            BridgeError::Connect { .. } => "connect",
            BridgeError::Write(_) => "write",
            BridgeError::Serialization(_) => "serialize",
            BridgeError::InvalidHookCall(_) => "invalid_hook",
        }
    }

    /// Check if this error only means telemetry is switched off
    pub fn is_disabled(&self) -> bool {
        matches!(self, BridgeError::Disabled(_))
    }
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
