//! Message routing: registration, direct delivery and broadcast fallback

use crate::connection::{Connection, ConnectionId};
use crate::envelope::Envelope;
use crate::state::{Identity, ServerState, format_snapshot};
use axum::extract::ws::Utf8Bytes;

/// What happened to one inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Unparseable; nothing was sent
    Dropped,
    /// The sender registered under this identity
    Registered(Identity),
    /// Handed to the addressed recipient
    Direct(ConnectionId),
    /// The addressed recipient is registered but its send failed
    Undeliverable(ConnectionId),
    /// Fanned out to every other open connection
    Broadcast {
        /// How many peers took the message
        delivered: usize,
    },
}

/// Routes inbound messages against the shared server state
#[derive(Clone, Default)]
pub struct Dispatcher {
    state: ServerState,
}

impl Dispatcher {
    /// Create a dispatcher over `state`
    pub fn new(state: ServerState) -> Self {
        Self { state }
    }

    /// The state this dispatcher routes against
    pub fn state(&self) -> &ServerState {
        &self.state
    }

    /// Handle one message from `sender`.
    ///
    /// `raw` is forwarded exactly as received; only the routing fields are
    /// ever parsed.
    pub fn handle_message(&self, sender: &Connection, raw: Utf8Bytes) -> Route {
        let envelope = match Envelope::parse(raw.as_str()) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(connection = %sender.id(), error = %err, "Invalid message received");
                return Route::Dropped;
            }
        };

        if let Some(identity) = envelope.registration() {
            return self.register(identity.clone(), sender);
        }

        // Lookup releases the registry lock before anything is sent.
        let recipient = envelope
            .to()
            .and_then(|to| self.state.registry().lookup(to));

        match recipient {
            Some(recipient) => self.forward(&envelope, sender, &recipient, raw),
            None => self.broadcast(&envelope, sender, raw),
        }
    }

    /// Handle the transport closing `connection`. Safe to call twice.
    pub fn handle_close(&self, connection: ConnectionId) {
        let identities = self.state.registry().unregister(connection);
        self.state.disconnect(connection);

        if identities.is_empty() {
            tracing::debug!(%connection, "Unregistered connection closed");
            return;
        }
        for identity in &identities {
            tracing::info!(%identity, %connection, "Client disconnected");
        }
        self.log_snapshot();
    }

    fn register(&self, identity: Identity, sender: &Connection) -> Route {
        self.state.registry().register(identity.clone(), sender);
        tracing::info!(%identity, connection = %sender.id(), "Client registered");
        self.log_snapshot();
        Route::Registered(identity)
    }

    fn forward(
        &self,
        envelope: &Envelope,
        sender: &Connection,
        recipient: &Connection,
        raw: Utf8Bytes,
    ) -> Route {
        tracing::debug!(
            from = ?envelope.from(),
            to = ?envelope.to(),
            connection = %sender.id(),
            "Forwarding message"
        );
        match recipient.send(raw) {
            Ok(()) => Route::Direct(recipient.id()),
            Err(err) => {
                tracing::debug!(error = %err, "Dropping message for closed recipient");
                Route::Undeliverable(recipient.id())
            }
        }
    }

    fn broadcast(&self, envelope: &Envelope, sender: &Connection, raw: Utf8Bytes) -> Route {
        tracing::debug!(
            to = ?envelope.to(),
            connection = %sender.id(),
            "Recipient not found, broadcasting"
        );

        let mut delivered = 0;
        for peer in self.state.open_connections() {
            if peer == *sender {
                continue;
            }
            match peer.send(raw.clone()) {
                Ok(()) => delivered += 1,
                Err(err) => tracing::debug!(error = %err, "Skipping closed peer"),
            }
        }
        Route::Broadcast { delivered }
    }

    fn log_snapshot(&self) {
        let registry = self.state.registry();
        let snapshot = registry.snapshot();
        tracing::info!(
            clients = %format_snapshot(&snapshot),
            registered = registry.len(),
            "Currently connected clients"
        );
    }
}
