//! WebSocket session client for the LeafHamlet chat server
//!
//! [`SessionManager`] owns the socket and reconnects with backoff while a
//! user session is active. Replies are matched to requests by `requestId`.
//! [`Poller`] fetches missed messages on a separate timer.

pub mod config;
pub mod handlers;
pub mod poller;
pub mod session;
pub mod state;

pub use config::{Backoff, PollConfig, PollMode, ReconnectConfig, SessionConfig};
pub use handlers::{EventHandler, HandlerRegistry, PushHandler};
pub use poller::Poller;
pub use session::SessionManager;
pub use state::{ConnectionState, SessionEvent};
