//! Live notification fanout
//!
//! Subscribers are outbound channels keyed by session. Payloads are rendered
//! under the matchmaker lock and packed into [`Delivery`] batches; the actual
//! sends happen in [`dispatch`] after the lock is gone. Failed connections are
//! reported back so the caller can prune them in a later critical section.

use crate::types::SessionId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub type ConnectionId = u64;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique connection id
pub fn next_connection_id() -> ConnectionId {
    NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanoutError {
    #[error("Connection closed")]
    Closed,

    #[error("Connection buffer full")]
    Full,
}

/// Frame written to a channel-backed connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveFrame {
    Payload(Arc<str>),
    Close,
}

/// Outbound half of a live client connection
///
/// Implementations must not block: a send that cannot complete immediately
/// is a failed send.
pub trait LiveConnection: Send + Sync {
    fn id(&self) -> ConnectionId;

    fn send(&self, payload: Arc<str>) -> Result<(), FanoutError>;

    /// Best effort; errors are ignored
    fn close(&self);
}

/// Connection backed by a bounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelConnection {
    id: ConnectionId,
    tx: mpsc::Sender<LiveFrame>,
}

impl ChannelConnection {
    /// Create a connection and the receiver a transport task would drain
    pub fn pair(buffer: usize) -> (Self, mpsc::Receiver<LiveFrame>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (
            Self {
                id: next_connection_id(),
                tx,
            },
            rx,
        )
    }
}

impl LiveConnection for ChannelConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, payload: Arc<str>) -> Result<(), FanoutError> {
        self.tx.try_send(LiveFrame::Payload(payload)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => FanoutError::Full,
            mpsc::error::TrySendError::Closed(_) => FanoutError::Closed,
        })
    }

    fn close(&self) {
        let _ = self.tx.try_send(LiveFrame::Close);
    }
}

/// Live connections per session
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: HashMap<SessionId, Vec<Arc<dyn LiveConnection>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection; re-adding the same connection id is a no-op
    pub fn add(&mut self, session_id: &str, connection: Arc<dyn LiveConnection>) -> bool {
        let connections = self.subscribers.entry(session_id.to_string()).or_default();
        if connections.iter().any(|c| c.id() == connection.id()) {
            return false;
        }
        connections.push(connection);
        true
    }

    /// Remove one connection; unknown pairs are ignored
    pub fn remove(&mut self, session_id: &str, connection_id: ConnectionId) -> bool {
        let Some(connections) = self.subscribers.get_mut(session_id) else {
            return false;
        };
        let before = connections.len();
        connections.retain(|c| c.id() != connection_id);
        let removed = connections.len() != before;
        if connections.is_empty() {
            self.subscribers.remove(session_id);
        }
        removed
    }

    /// Detach every connection of a session
    pub fn take_all(&mut self, session_id: &str) -> Vec<Arc<dyn LiveConnection>> {
        self.subscribers.remove(session_id).unwrap_or_default()
    }

    /// Clone the current connection list of a session
    pub fn snapshot(&self, session_id: &str) -> Vec<Arc<dyn LiveConnection>> {
        self.subscribers.get(session_id).cloned().unwrap_or_default()
    }

    pub fn has_subscribers(&self, session_id: &str) -> bool {
        self.subscribers.contains_key(session_id)
    }

    pub fn connection_count(&self) -> usize {
        self.subscribers.values().map(Vec::len).sum()
    }

    /// Drop connections whose sends failed
    pub fn prune(&mut self, stale: &[(SessionId, ConnectionId)]) -> usize {
        stale
            .iter()
            .filter(|(session_id, connection_id)| self.remove(session_id, *connection_id))
            .count()
    }
}

/// One rendered payload and the connections it goes to
pub struct Delivery {
    pub session_id: SessionId,
    pub payload: Arc<str>,
    pub connections: Vec<Arc<dyn LiveConnection>>,
    /// Close each connection after the payload is sent
    pub close_after: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub stale: Vec<(SessionId, ConnectionId)>,
}

impl DeliveryReport {
    pub fn failed(&self) -> usize {
        self.stale.len()
    }
}

/// Push every payload to its connections
///
/// Never retries. Failed connections are collected, not removed here.
pub fn dispatch(deliveries: &[Delivery]) -> DeliveryReport {
    let mut report = DeliveryReport::default();

    for delivery in deliveries {
        for connection in &delivery.connections {
            match connection.send(delivery.payload.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    debug!(
                        "Dropping connection {} of session {}: {}",
                        connection.id(),
                        delivery.session_id,
                        e
                    );
                    report
                        .stale
                        .push((delivery.session_id.clone(), connection.id()));
                }
            }
            if delivery.close_after {
                connection.close();
            }
        }
    }

    if !report.stale.is_empty() {
        warn!("{} live connections failed during fanout", report.stale.len());
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Connection that records payloads and can be told to fail
    struct RecordingConnection {
        id: ConnectionId,
        fail: bool,
        sent: Mutex<Vec<String>>,
        closed: Mutex<bool>,
    }

    impl RecordingConnection {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                id: next_connection_id(),
                fail,
                sent: Mutex::new(Vec::new()),
                closed: Mutex::new(false),
            })
        }
    }

    impl LiveConnection for RecordingConnection {
        fn id(&self) -> ConnectionId {
            self.id
        }

        fn send(&self, payload: Arc<str>) -> Result<(), FanoutError> {
            if self.fail {
                return Err(FanoutError::Closed);
            }
            self.sent.lock().unwrap().push(payload.to_string());
            Ok(())
        }

        fn close(&self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    #[test]
    fn test_add_is_deduplicated_and_remove_idempotent() {
        let mut registry = SubscriberRegistry::new();
        let conn = RecordingConnection::new(false);

        assert!(registry.add("s1", conn.clone()));
        assert!(!registry.add("s1", conn.clone()));
        assert_eq!(registry.connection_count(), 1);

        assert!(registry.remove("s1", conn.id()));
        assert!(!registry.remove("s1", conn.id()));
        assert!(!registry.remove("unknown", 42));
        assert!(!registry.has_subscribers("s1"));
    }

    #[test]
    fn test_dispatch_collects_failures_without_mutating() {
        let mut registry = SubscriberRegistry::new();
        let good = RecordingConnection::new(false);
        let bad = RecordingConnection::new(true);
        registry.add("s1", good.clone());
        registry.add("s1", bad.clone());

        let deliveries = vec![Delivery {
            session_id: "s1".to_string(),
            payload: Arc::from("{\"status\":\"waiting\"}"),
            connections: registry.snapshot("s1"),
            close_after: false,
        }];

        let report = dispatch(&deliveries);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.stale, vec![("s1".to_string(), bad.id())]);
        assert_eq!(registry.connection_count(), 2);

        assert_eq!(registry.prune(&report.stale), 1);
        assert_eq!(registry.connection_count(), 1);
        assert_eq!(good.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_close_after_closes_every_connection() {
        let conn = RecordingConnection::new(false);
        let deliveries = vec![Delivery {
            session_id: "gone".to_string(),
            payload: Arc::from("{\"status\":\"closed\"}"),
            connections: vec![conn.clone() as Arc<dyn LiveConnection>],
            close_after: true,
        }];

        dispatch(&deliveries);
        assert!(*conn.closed.lock().unwrap());
        assert_eq!(conn.sent.lock().unwrap().as_slice(), ["{\"status\":\"closed\"}"]);
    }

    #[test]
    fn test_channel_connection_frames() {
        let (conn, mut rx) = ChannelConnection::pair(2);
        conn.send(Arc::from("one")).unwrap();
        conn.close();

        assert_eq!(
            tokio_test::block_on(rx.recv()),
            Some(LiveFrame::Payload(Arc::from("one")))
        );
        assert_eq!(tokio_test::block_on(rx.recv()), Some(LiveFrame::Close));
    }

    #[test]
    fn test_channel_connection_full_and_closed() {
        let (conn, rx) = ChannelConnection::pair(1);
        assert!(conn.send(Arc::from("one")).is_ok());
        assert_eq!(conn.send(Arc::from("two")), Err(FanoutError::Full));

        drop(rx);
        assert_eq!(conn.send(Arc::from("three")), Err(FanoutError::Closed));
    }
}
