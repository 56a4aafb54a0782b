/// Delay unit for reconnection backoff (2 seconds)
pub const RECONNECT_BASE_DELAY_MS: u64 = 2000;

/// Upper bound on a single reconnection delay when exponential backoff is used (30 seconds)
pub const RECONNECT_MAX_DELAY_MS: u64 = 30_000;

/// Consecutive reconnection attempts before the session is considered lost
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Time allowed for the WebSocket handshake to complete (8 seconds)
pub const CONNECT_TIMEOUT_MS: u64 = 8000;

/// Interval between application-level pings while connected (30 seconds)
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Default time a correlated request waits for its reply
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Time to wait for a pong when measuring latency
pub const PING_TIMEOUT_MS: u64 = 5000;

/// Interval between poll requests when the polling fallback is enabled
pub const POLL_INTERVAL_MS: u64 = 300;

/// Processed message ids kept before eviction kicks in
pub const MAX_PROCESSED_IDS: usize = 200;

/// Newest processed message ids retained after eviction
pub const PROCESSED_IDS_RETAIN: usize = 150;

/// XOR key applied to outgoing chat text
pub const OBFUSCATION_KEY: u8 = 42;

/// Maximum chat message length in characters
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// Port used by game servers reached over loopback or a private network
pub const LOCAL_SERVER_PORT: u16 = 8766;

/// Capacity of the per-socket outgoing frame queue
pub const OUTGOING_QUEUE_SIZE: usize = 100;

/// Capacity of the session event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// JSON field carrying the correlation id
pub const REQUEST_ID_FIELD: &str = "requestId";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_values() {
        const _: () = assert!(PROCESSED_IDS_RETAIN < MAX_PROCESSED_IDS);
        const _: () = assert!(RECONNECT_BASE_DELAY_MS < RECONNECT_MAX_DELAY_MS);
        const _: () = assert!(PING_TIMEOUT_MS < HEARTBEAT_INTERVAL_SECS * 1000);
        const _: () = assert!(MAX_RECONNECT_ATTEMPTS > 0);

        assert_eq!(REQUEST_ID_FIELD, "requestId");
        assert_eq!(LOCAL_SERVER_PORT, 8766);
    }
}
