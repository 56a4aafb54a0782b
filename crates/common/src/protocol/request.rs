use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::utils::xor_obfuscate;

/// Messages the client sends to the game server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Credential submission
    Login { user: String, pw: String },
    Register { user: String, pw: String },

    /// Chat line; `msg` carries obfuscated text
    Send { msg: String },

    /// Ask for buffered or missed messages
    Poll,

    /// Heartbeat
    Ping,
}

impl ClientMessage {
    /// Build a chat message, obfuscating the text with `key`
    pub fn chat(text: &str, key: u8) -> Self {
        Self::Send {
            msg: xor_obfuscate(text, key),
        }
    }

    /// Wire name of the action
    pub fn action(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::Register { .. } => "register",
            Self::Send { .. } => "send",
            Self::Poll => "poll",
            Self::Ping => "ping",
        }
    }
}

/// Game-specific request (`find_monster`, `attack`, `equip`, ...)
///
/// The payload is opaque to the client; fields are forwarded as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameAction {
    pub action: String,

    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl GameAction {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            params: Map::new(),
        }
    }

    /// Add a parameter
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_login_serialization() {
        let msg = ClientMessage::Login {
            user: "alice".to_string(),
            pw: "secret".to_string(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({"action": "login", "user": "alice", "pw": "secret"})
        );
        assert_eq!(msg.action(), "login");
    }

    #[test]
    fn test_action_name_matches_wire_tag() {
        let messages = [
            ClientMessage::Register {
                user: "bob".to_string(),
                pw: "pw".to_string(),
            },
            ClientMessage::chat("hi", 42),
            ClientMessage::Poll,
            ClientMessage::Ping,
        ];
        for msg in messages {
            let value = serde_json::to_value(&msg).unwrap();
            assert_eq!(value["action"], msg.action());
        }
    }

    #[test]
    fn test_unit_actions_serialization() {
        assert_eq!(
            serde_json::to_string(&ClientMessage::Ping).unwrap(),
            r#"{"action":"ping"}"#
        );
        assert_eq!(
            serde_json::to_string(&ClientMessage::Poll).unwrap(),
            r#"{"action":"poll"}"#
        );
    }

    #[test]
    fn test_chat_is_obfuscated() {
        let msg = ClientMessage::chat("hi", 42);
        match &msg {
            ClientMessage::Send { msg } => {
                assert_ne!(msg, "hi");
                assert_eq!(xor_obfuscate(msg, 42), "hi");
            }
            other => panic!("Expected Send, got {other:?}"),
        }

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["action"], "send");
    }

    #[test]
    fn test_game_action_flattens_params() {
        let action = GameAction::new("equip").with("item", "sword").with("slot", 1);
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value, json!({"action": "equip", "item": "sword", "slot": 1}));

        let parsed: GameAction = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, action);
    }
}
