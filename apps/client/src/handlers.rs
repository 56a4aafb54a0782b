//! Handler registry for server pushes and named events

use hamlet_link_common::{Push, PushKind};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub type PushHandler = Arc<dyn Fn(&Push) + Send + Sync>;
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// One handler per push kind and per event name; registering again replaces
#[derive(Default)]
pub struct HandlerRegistry {
    push: RwLock<HashMap<PushKind, PushHandler>>,
    events: RwLock<HashMap<String, EventHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_push(&self, kind: PushKind, handler: PushHandler) {
        self.push.write().await.insert(kind, handler);
    }

    pub async fn set_event(&self, name: String, handler: EventHandler) {
        self.events.write().await.insert(name, handler);
    }

    pub async fn push(&self, kind: PushKind) -> Option<PushHandler> {
        self.push.read().await.get(&kind).cloned()
    }

    pub async fn event(&self, name: &str) -> Option<EventHandler> {
        self.events.read().await.get(name).cloned()
    }
}
