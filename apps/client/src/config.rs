use hamlet_link_common::{
    Scheme,
    constants::{
        CONNECT_TIMEOUT_MS, HEARTBEAT_INTERVAL_SECS, MAX_PROCESSED_IDS, MAX_RECONNECT_ATTEMPTS,
        OBFUSCATION_KEY, POLL_INTERVAL_MS, PROCESSED_IDS_RETAIN, RECONNECT_BASE_DELAY_MS,
        RECONNECT_MAX_DELAY_MS, REQUEST_TIMEOUT_SECS,
    },
};
use std::time::Duration;

/// Configuration for a session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Time allowed for the WebSocket handshake
    pub connect_timeout: Duration,

    /// Interval between application-level pings; zero disables the heartbeat
    pub heartbeat_interval: Duration,

    /// Default reply timeout for correlated requests; `None` waits forever
    pub request_timeout: Option<Duration>,

    /// Reconnection strategy
    pub reconnect: ReconnectConfig,

    /// Processed message ids kept before eviction
    pub processed_capacity: usize,

    /// Processed message ids kept after eviction
    pub processed_retain: usize,

    /// XOR key for chat text
    pub obfuscation_key: u8,

    /// Scheme used when a bare host matches no known pattern
    pub default_scheme: Scheme,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(CONNECT_TIMEOUT_MS),
            heartbeat_interval: Duration::from_secs(HEARTBEAT_INTERVAL_SECS),
            request_timeout: Some(Duration::from_secs(REQUEST_TIMEOUT_SECS)),
            reconnect: ReconnectConfig::default(),
            processed_capacity: MAX_PROCESSED_IDS,
            processed_retain: PROCESSED_IDS_RETAIN,
            obfuscation_key: OBFUSCATION_KEY,
            default_scheme: Scheme::default(),
        }
    }
}

/// How the delay grows between reconnection attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `base * attempt`
    Linear,

    /// `min(base * 2^(attempt - 1), max_delay)`
    Exponential { max_delay: Duration },
}

/// Reconnection configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    pub base_delay: Duration,
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(RECONNECT_BASE_DELAY_MS),
            max_attempts: MAX_RECONNECT_ATTEMPTS,
            backoff: Backoff::Linear,
        }
    }
}

impl ReconnectConfig {
    /// Exponential backoff capped at the default maximum delay
    pub fn exponential(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
            backoff: Backoff::Exponential {
                max_delay: Duration::from_millis(RECONNECT_MAX_DELAY_MS),
            },
        }
    }

    /// Delay before the given attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match self.backoff {
            Backoff::Linear => self.base_delay.saturating_mul(attempt),
            Backoff::Exponential { max_delay } => {
                let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor).min(max_delay)
            }
        }
    }
}

/// Where poll requests go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    /// `{"action":"poll"}` over the session socket
    WebSocket,

    /// `GET <http base>/poll` next to the WebSocket endpoint
    Http,
}

/// Polling fallback configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    pub mode: PollMode,
    pub interval: Duration,
    pub request_timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            mode: PollMode::WebSocket,
            interval: Duration::from_millis(POLL_INTERVAL_MS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}
