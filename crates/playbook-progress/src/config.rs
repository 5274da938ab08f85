//! Bridge configuration
//!
//! Everything is read from the environment the orchestration engine was
//! started with. A missing socket path is not an error: it simply leaves
//! telemetry switched off.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::sanitize::SanitizePolicy;

/// Socket path of the consumer
pub const SOCKET_ENV: &str = "ANSIBLE_ENV_SOCKET";

/// Per-write timeout in milliseconds, `0` for blocking writes
pub const SEND_TIMEOUT_ENV: &str = "ANSIBLE_ENV_SOCKET_TIMEOUT_MS";

/// `run` or `play`
pub const TIMING_RETENTION_ENV: &str = "ANSIBLE_ENV_TIMING_RETENTION";

pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 250;

/// How long task start times are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimingRetention {
    /// Keep every start time until the bridge is dropped
    #[default]
    Run,
    /// Forget all start times whenever a new play starts
    Play,
}

impl TimingRetention {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimingRetention::Run => "run",
            TimingRetention::Play => "play",
        }
    }
}

impl FromStr for TimingRetention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "run" => Ok(TimingRetention::Run),
            "play" => Ok(TimingRetention::Play),
            other => Err(format!("unknown timing retention: {}", other)),
        }
    }
}

/// Bridge configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Consumer socket; `None` disables telemetry
    pub socket_path: Option<PathBuf>,

    /// Upper bound on a single write; `None` blocks until the peer reads
    pub send_timeout: Option<Duration>,

    /// Result sanitization thresholds
    pub sanitize: SanitizePolicy,

    /// Start-time retention
    pub timing_retention: TimingRetention,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            send_timeout: Some(Duration::from_millis(DEFAULT_SEND_TIMEOUT_MS)),
            sanitize: SanitizePolicy::default(),
            timing_retention: TimingRetention::Run,
        }
    }
}

impl BridgeConfig {
    /// Create a new config builder
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::new()
    }

    /// Create config from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create config from an arbitrary variable lookup.
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let socket_path = lookup(SOCKET_ENV)
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        let send_timeout = match lookup(SEND_TIMEOUT_ENV).map(|v| v.trim().parse::<u64>()) {
            Some(Ok(0)) => None,
            Some(Ok(ms)) => Some(Duration::from_millis(ms)),
            Some(Err(_)) | None => defaults.send_timeout,
        };

        let timing_retention = lookup(TIMING_RETENTION_ENV)
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.timing_retention);

        Self {
            socket_path,
            send_timeout,
            sanitize: defaults.sanitize,
            timing_retention,
        }
    }

    /// Whether a consumer endpoint is configured at all
    pub fn is_enabled(&self) -> bool {
        self.socket_path.is_some()
    }
}

/// Builder for BridgeConfig
pub struct BridgeConfigBuilder {
    config: BridgeConfig,
}

impl BridgeConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self {
            config: BridgeConfig::default(),
        }
    }

    /// Set the consumer socket path
    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.socket_path = Some(path.into());
        self
    }

    /// Set the write timeout; `None` blocks
    pub fn send_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.send_timeout = timeout;
        self
    }

    /// Set the sanitization policy
    pub fn sanitize(mut self, policy: SanitizePolicy) -> Self {
        self.config.sanitize = policy;
        self
    }

    /// Set the timing retention
    pub fn timing_retention(mut self, retention: TimingRetention) -> Self {
        self.config.timing_retention = retention;
        self
    }

    /// Build the configuration
    pub fn build(self) -> BridgeConfig {
        self.config
    }
}

impl Default for BridgeConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
