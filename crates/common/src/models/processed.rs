use std::collections::{HashSet, VecDeque};

use crate::constants::{MAX_PROCESSED_IDS, PROCESSED_IDS_RETAIN};
use crate::protocol::MessageId;

/// Bounded record of server message ids that were already delivered
///
/// Membership is exact. When an insert pushes the size past `capacity`, the
/// oldest ids by arrival are evicted until `retain` remain.
#[derive(Debug, Clone)]
pub struct ProcessedMessageSet {
    capacity: usize,
    retain: usize,
    ids: HashSet<MessageId>,
    order: VecDeque<MessageId>,
}

impl Default for ProcessedMessageSet {
    fn default() -> Self {
        Self::new(MAX_PROCESSED_IDS, PROCESSED_IDS_RETAIN)
    }
}

impl ProcessedMessageSet {
    /// Create a set with the given cap and post-eviction size.
    ///
    /// `retain` is clamped to `capacity`.
    pub fn new(capacity: usize, retain: usize) -> Self {
        Self {
            capacity,
            retain: retain.min(capacity),
            ids: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    /// Record an id. Returns false if it had already been processed.
    pub fn insert(&mut self, id: MessageId) -> bool {
        if !self.ids.insert(id.clone()) {
            return false;
        }
        self.order.push_back(id);

        if self.order.len() > self.capacity {
            while self.order.len() > self.retain {
                if let Some(oldest) = self.order.pop_front() {
                    self.ids.remove(&oldest);
                }
            }
        }

        true
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.order.clear();
    }
}
