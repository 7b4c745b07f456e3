//! Connection handles shared between the transport and the registry

use crate::error::SignalingError;
use axum::extract::ws::{Message, Utf8Bytes};
use std::fmt;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Receiving half of a connection's outbound queue, drained by its writer task
pub type OutboundReceiver = mpsc::UnboundedReceiver<Message>;

/// Transport-assigned connection identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// A fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A non-owning handle to a live connection.
///
/// Cloning is cheap. The transport owns the socket; holding a handle only
/// allows queueing outbound frames, and [`Connection::is_open`] turns false
/// once the writer task has gone away.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    sender: mpsc::UnboundedSender<Message>,
}

impl Connection {
    /// Create a handle and the queue its writer task will drain
    pub fn new() -> (Self, OutboundReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let connection = Self {
            id: ConnectionId::new(),
            sender,
        };
        (connection, receiver)
    }

    /// Connection id
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Whether the connection can still take outbound frames
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Queue a text frame. Never blocks; fails fast if the peer is gone.
    pub fn send(&self, text: Utf8Bytes) -> Result<(), SignalingError> {
        self.send_frame(Message::Text(text))
    }

    /// Queue an arbitrary frame (pings, close frames)
    pub(crate) fn send_frame(&self, frame: Message) -> Result<(), SignalingError> {
        self.sender
            .send(frame)
            .map_err(|_| SignalingError::ConnectionClosed(self.id))
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Connection {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_fails_once_receiver_is_dropped() {
        let (connection, mut receiver) = Connection::new();
        assert!(connection.is_open());
        connection.send("hello".into()).unwrap();
        assert_eq!(receiver.try_recv().unwrap(), Message::Text("hello".into()));

        drop(receiver);
        assert!(!connection.is_open());
        assert!(matches!(
            connection.send("again".into()),
            Err(SignalingError::ConnectionClosed(id)) if id == connection.id()
        ));
    }

    #[test]
    fn handles_compare_by_id() {
        let (a, _rx_a) = Connection::new();
        let (b, _rx_b) = Connection::new();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
