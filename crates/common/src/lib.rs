//! Common types and utilities for the LeafHamlet session client
//!
//! This crate holds everything that does not touch the network: the JSON
//! message dialect spoken with the game server, the request correlation
//! table, duplicate suppression, server address normalization and input
//! validation.

pub mod constants;
pub mod error;
pub mod models;
pub mod protocol;
pub mod utils;
pub mod validation;

// Re-export commonly used types for convenience
pub use error::{LinkError, Result};
pub use models::{PendingRequest, PendingRequests, ProcessedMessageSet};
pub use protocol::{
    ChatBroadcast, ClientMessage, GameAction, MessageId, NotificationKind, PollBatch, Push,
    PushKind, Reply, ServerMessage, SystemNotification,
};
pub use utils::{Scheme, http_base_url, normalize_url, normalize_url_with, xor_obfuscate};
pub use validation::{ValidationError, validate_chat_message, validate_credentials};
