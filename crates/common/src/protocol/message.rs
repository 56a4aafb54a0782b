use serde_json::Value;

use super::{ChatBroadcast, PollBatch, Push, Reply, SystemNotification};
use crate::constants::REQUEST_ID_FIELD;
use crate::error::Result;

/// Inbound server message after routing classification
///
/// The server dialect has no single discriminator field, so messages are
/// classified by shape in a fixed order: known push types first, then
/// correlated replies, then named events.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Fire-and-forget broadcast or notification
    Push(Push),

    /// Heartbeat acknowledgement
    Pong,

    /// Buffered messages returned for a poll request
    PollResponse { messages: Vec<Value> },

    /// Reply carrying the `requestId` of an earlier request
    Reply(Reply),

    /// Any other message naming an `action` or `type`
    Event { name: String, body: Value },

    /// Nothing to route on
    Unrecognized(Value),
}

impl ServerMessage {
    /// Parse a text frame
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::classify(value))
    }

    /// Classify an already-decoded message
    pub fn classify(value: Value) -> Self {
        let action = str_field(&value, "action");
        let kind = str_field(&value, "type");

        if action == Some("system_notification") {
            return match serde_json::from_value::<SystemNotification>(value.clone()) {
                Ok(notification) => Self::Push(Push::SystemNotification(notification)),
                Err(_) => Self::Unrecognized(value),
            };
        }

        if kind == Some("pong") || action == Some("pong") {
            return Self::Pong;
        }

        if action == Some("poll_response") {
            return match serde_json::from_value::<PollBatch>(value.clone()) {
                Ok(batch) => Self::PollResponse {
                    messages: batch.messages,
                },
                Err(_) => Self::Unrecognized(value),
            };
        }

        if is_chat_broadcast(&value) {
            if let Ok(chat) = serde_json::from_value::<ChatBroadcast>(value.clone()) {
                return Self::Push(Push::Chat(chat));
            }
        }

        if let Some(request_id) = request_id(&value) {
            return Self::Reply(Reply::new(request_id, value));
        }

        match action.or(kind) {
            Some(name) => Self::Event {
                name: name.to_string(),
                body: value,
            },
            None => Self::Unrecognized(value),
        }
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// Chat lines carry `msg` plus either `isServer` or a sender `name`, and never
/// the `ok`/`success` flags of a reply.
fn is_chat_broadcast(value: &Value) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };

    object.get("msg").is_some_and(Value::is_string)
        && (object.contains_key("isServer") || object.contains_key("name"))
        && !object.contains_key("ok")
        && !object.contains_key("success")
}

/// Accept the id as a number or a numeric string
fn request_id(value: &Value) -> Option<u64> {
    match value.get(REQUEST_ID_FIELD)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
