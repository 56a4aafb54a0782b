mod message;
mod push;
mod request;
mod response;

pub use message::ServerMessage;
pub use push::{ChatBroadcast, MessageId, NotificationKind, Push, PushKind, SystemNotification};
pub use request::{ClientMessage, GameAction};
pub use response::{PollBatch, Reply};
