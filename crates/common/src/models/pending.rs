use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// A request awaiting its correlated reply
#[derive(Debug)]
pub struct PendingRequest<T> {
    /// Correlation id sent as `requestId`
    pub request_id: u64,

    /// When the request was registered
    pub created_at: Instant,

    responder: oneshot::Sender<T>,
}

impl<T> PendingRequest<T> {
    /// Time elapsed since the request was registered
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Settle the request. Returns false if the caller stopped waiting.
    pub fn respond(self, value: T) -> bool {
        self.responder.send(value).is_ok()
    }
}

/// Table of in-flight requests keyed by request id
///
/// Ids increase monotonically from 1 and are never handed out twice, so an id
/// cannot be reused while a request holding it is outstanding.
#[derive(Debug)]
pub struct PendingRequests<T> {
    next_id: u64,
    entries: HashMap<u64, PendingRequest<T>>,
}

impl<T> Default for PendingRequests<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PendingRequests<T> {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            entries: HashMap::new(),
        }
    }

    /// Allocate a fresh request id and the receiver its reply will arrive on
    pub fn register(&mut self) -> (u64, oneshot::Receiver<T>) {
        let request_id = self.next_id;
        self.next_id += 1;

        let (responder, receiver) = oneshot::channel();
        self.entries.insert(
            request_id,
            PendingRequest {
                request_id,
                created_at: Instant::now(),
                responder,
            },
        );

        (request_id, receiver)
    }

    /// Settle and remove the request with this id.
    ///
    /// Returns false when no such request is outstanding, which is the case
    /// for replies that arrive twice or after a timeout.
    pub fn resolve(&mut self, request_id: u64, value: T) -> bool {
        match self.entries.remove(&request_id) {
            Some(request) => {
                request.respond(value);
                true
            }
            None => false,
        }
    }

    /// Drop the request with this id without settling it
    pub fn remove(&mut self, request_id: u64) -> Option<PendingRequest<T>> {
        self.entries.remove(&request_id)
    }

    /// Take every outstanding request out of the table
    pub fn drain(&mut self) -> Vec<PendingRequest<T>> {
        self.entries.drain().map(|(_, request)| request).collect()
    }

    pub fn contains(&self, request_id: u64) -> bool {
        self.entries.contains_key(&request_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_assigns_increasing_ids() {
        let mut pending: PendingRequests<&str> = PendingRequests::new();
        let (first, _rx1) = pending.register();
        let (second, _rx2) = pending.register();
        let (third, _rx3) = pending.register();

        assert_eq!((first, second, third), (1, 2, 3));
        assert_eq!(pending.len(), 3);
    }

    #[test]
    fn test_ids_not_reused_after_resolution() {
        let mut pending: PendingRequests<u8> = PendingRequests::new();
        let (id, _rx) = pending.register();
        assert!(pending.resolve(id, 1));

        let (next, _rx) = pending.register();
        assert_ne!(id, next);
    }

    #[tokio::test]
    async fn test_resolve_delivers_value_once() {
        let mut pending = PendingRequests::new();
        let (id, rx) = pending.register();

        assert!(pending.resolve(id, "reply"));
        assert!(!pending.resolve(id, "duplicate"));
        assert!(pending.is_empty());

        assert_eq!(rx.await.unwrap(), "reply");
    }

    #[tokio::test]
    async fn test_resolve_out_of_order() {
        let mut pending = PendingRequests::new();
        let (a, rx_a) = pending.register();
        let (b, rx_b) = pending.register();

        assert!(pending.resolve(b, "for b"));
        assert!(pending.resolve(a, "for a"));

        assert_eq!(rx_b.await.unwrap(), "for b");
        assert_eq!(rx_a.await.unwrap(), "for a");
    }

    #[test]
    fn test_resolve_unknown_id() {
        let mut pending: PendingRequests<()> = PendingRequests::new();
        assert!(!pending.resolve(42, ()));
    }

    #[tokio::test]
    async fn test_remove_closes_receiver() {
        let mut pending: PendingRequests<()> = PendingRequests::new();
        let (id, rx) = pending.register();

        let removed = pending.remove(id).unwrap();
        assert_eq!(removed.request_id, id);
        drop(removed);

        assert!(!pending.contains(id));
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn test_drain_empties_table() {
        let mut pending = PendingRequests::new();
        let (_, rx1) = pending.register();
        let (_, rx2) = pending.register();

        for request in pending.drain() {
            assert!(request.age() < Duration::from_secs(5));
            request.respond("closed");
        }

        assert!(pending.is_empty());
        assert_eq!(rx1.await.unwrap(), "closed");
        assert_eq!(rx2.await.unwrap(), "closed");
    }
}
