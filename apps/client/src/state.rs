use std::fmt;
use std::time::Duration;

/// Connection state tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting {
        attempt: u32,
        delay: Duration,
    },
    Failed,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Reconnecting { attempt, delay } => {
                write!(f, "reconnecting (attempt {attempt}, in {delay:?})")
            }
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Lifecycle notifications broadcast to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },

    /// Terminal: retries are exhausted and the user must log in again
    ReconnectExhausted { attempts: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_variants() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());

        let state = ConnectionState::Reconnecting {
            attempt: 2,
            delay: Duration::from_secs(4),
        };
        assert!(matches!(state, ConnectionState::Reconnecting { attempt: 2, .. }));
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Failed.to_string(), "failed");
        assert_eq!(
            ConnectionState::Reconnecting {
                attempt: 1,
                delay: Duration::from_secs(2)
            }
            .to_string(),
            "reconnecting (attempt 1, in 2s)"
        );
    }
}
