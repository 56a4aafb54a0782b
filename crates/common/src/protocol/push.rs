use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-assigned message id; the server uses both numbers and strings
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Number(u64),
    Text(String),
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

/// Severity/category of a system notification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Join,
    Leave,
    #[default]
    Info,
    Warning,
    Success,
    Error,
    #[serde(other)]
    Other,
}

/// `{action: "system_notification", id, text, type}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemNotification {
    #[serde(default)]
    pub id: Option<MessageId>,

    pub text: String,

    #[serde(rename = "type", default)]
    pub kind: NotificationKind,
}

/// Chat line broadcast to every connected player
///
/// Server lines carry `isServer` and optionally `targetUser`; player lines
/// carry the sender `name` and whether the text was a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBroadcast {
    #[serde(default)]
    pub id: Option<MessageId>,

    #[serde(default)]
    pub is_server: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub msg: String,

    #[serde(default)]
    pub is_command: bool,
}

impl ChatBroadcast {
    /// Whether a server line is addressed to `user`
    pub fn is_for(&self, user: &str) -> bool {
        self.target_user.as_deref() == Some(user)
    }

    /// Whether a player line was written by `user`
    pub fn is_from(&self, user: &str) -> bool {
        !self.is_server && self.name.as_deref() == Some(user)
    }
}

/// Routing key for push handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushKind {
    SystemNotification,
    Chat,
}

/// Server-initiated message delivered to push handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Push {
    SystemNotification(SystemNotification),
    Chat(ChatBroadcast),
}

impl Push {
    pub fn kind(&self) -> PushKind {
        match self {
            Self::SystemNotification(_) => PushKind::SystemNotification,
            Self::Chat(_) => PushKind::Chat,
        }
    }

    /// Server-assigned id used for duplicate suppression
    pub fn id(&self) -> Option<&MessageId> {
        match self {
            Self::SystemNotification(n) => n.id.as_ref(),
            Self::Chat(c) => c.id.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_accepts_numbers_and_strings() {
        let id: MessageId = serde_json::from_str("42").unwrap();
        assert_eq!(id, MessageId::Number(42));
        assert_eq!(id.to_string(), "42");

        let id: MessageId = serde_json::from_str(r#""m-7""#).unwrap();
        assert_eq!(id, MessageId::Text("m-7".to_string()));
        assert_eq!(id.to_string(), "m-7");
    }

    #[test]
    fn test_notification_kind_fallback() {
        let n: SystemNotification =
            serde_json::from_str(r#"{"id":1,"text":"bob joined","type":"join"}"#).unwrap();
        assert_eq!(n.kind, NotificationKind::Join);

        let n: SystemNotification =
            serde_json::from_str(r#"{"text":"maintenance","type":"shutdown"}"#).unwrap();
        assert_eq!(n.kind, NotificationKind::Other);
        assert!(n.id.is_none());

        let n: SystemNotification = serde_json::from_str(r#"{"text":"hello"}"#).unwrap();
        assert_eq!(n.kind, NotificationKind::Info);
    }

    #[test]
    fn test_chat_broadcast_shapes() {
        let server: ChatBroadcast = serde_json::from_str(
            r#"{"id":5,"isServer":true,"targetUser":"alice","msg":"You found a potion"}"#,
        )
        .unwrap();
        assert!(server.is_server);
        assert!(server.is_for("alice"));
        assert!(!server.is_for("bob"));
        assert!(!server.is_from("alice"));

        let player: ChatBroadcast =
            serde_json::from_str(r#"{"id":6,"name":"bob","msg":"/help","isCommand":true}"#)
                .unwrap();
        assert!(!player.is_server);
        assert!(player.is_command);
        assert!(player.is_from("bob"));
    }

    #[test]
    fn test_push_kind_and_id() {
        let push = Push::Chat(ChatBroadcast {
            id: Some(MessageId::Number(9)),
            is_server: false,
            target_user: None,
            name: Some("bob".to_string()),
            msg: "hey".to_string(),
            is_command: false,
        });
        assert_eq!(push.kind(), PushKind::Chat);
        assert_eq!(push.id(), Some(&MessageId::Number(9)));
    }
}
