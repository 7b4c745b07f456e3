//! Server state management for the signaling relay
//!
//! This module holds the identity registry and the table of open
//! connections. Both are in-memory only and live for the lifetime of the
//! process.

use crate::connection::{Connection, ConnectionId, OutboundReceiver};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Client-chosen identity used to address a peer
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity(pub String);

impl Identity {
    /// The identity as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identity {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for Identity {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Default, Debug)]
struct RegistryInner {
    /// identity -> connection currently registered under it
    by_identity: HashMap<Identity, Connection>,
    /// connection -> every identity it currently owns
    by_connection: HashMap<ConnectionId, BTreeSet<Identity>>,
    /// Known identities, kept for diagnostics
    known: BTreeSet<Identity>,
}

/// Identity -> connection registry.
///
/// Every operation takes the lock once, so the forward map, the reverse
/// index and the known set are always observed in agreement.
#[derive(Default, Clone)]
pub struct Registry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `connection` under `identity`.
    ///
    /// Overwrites whatever held `identity` before. The superseded connection
    /// is not closed, it just can no longer be addressed by this identity.
    /// Other identities the connection already holds are untouched.
    pub fn register(&self, identity: Identity, connection: &Connection) {
        let mut inner = self.lock();

        if let Some(superseded) = inner.by_identity.insert(identity.clone(), connection.clone()) {
            if superseded != *connection {
                if let Some(owned) = inner.by_connection.get_mut(&superseded.id()) {
                    owned.remove(&identity);
                    if owned.is_empty() {
                        inner.by_connection.remove(&superseded.id());
                    }
                }
            }
        }
        inner
            .by_connection
            .entry(connection.id())
            .or_default()
            .insert(identity.clone());
        inner.known.insert(identity);
    }

    /// The connection registered under `identity`
    pub fn lookup(&self, identity: &Identity) -> Option<Connection> {
        self.lock().by_identity.get(identity).cloned()
    }

    /// Drop every identity `connection` owns and return them, sorted.
    /// Empty if it owns none.
    pub fn unregister(&self, connection: ConnectionId) -> Vec<Identity> {
        let mut inner = self.lock();
        let Some(owned) = inner.by_connection.remove(&connection) else {
            return Vec::new();
        };
        for identity in &owned {
            inner.by_identity.remove(identity);
            inner.known.remove(identity);
        }
        owned.into_iter().collect()
    }

    /// Currently known identities, sorted
    pub fn snapshot(&self) -> Vec<Identity> {
        self.lock().known.iter().cloned().collect()
    }

    /// Number of registered identities
    pub fn len(&self) -> usize {
        self.lock().by_identity.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Render a snapshot for the "currently connected" log line
pub fn format_snapshot(identities: &[Identity]) -> String {
    if identities.is_empty() {
        return "None".to_owned();
    }
    identities
        .iter()
        .map(Identity::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// The main server state: registry plus every open connection
#[derive(Default, Clone)]
pub struct ServerState {
    registry: Registry,
    connections: Arc<Mutex<HashMap<ConnectionId, Connection>>>,
}

impl ServerState {
    /// Create a new server state handle
    pub fn new() -> Self {
        Self::default()
    }

    /// The identity registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn connections(&self) -> MutexGuard<'_, HashMap<ConnectionId, Connection>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Accept a new connection.
    ///
    /// Returns its handle and the outbound queue the transport must drain.
    pub fn connect(&self) -> (Connection, OutboundReceiver) {
        let (connection, receiver) = Connection::new();
        self.connections()
            .insert(connection.id(), connection.clone());
        (connection, receiver)
    }

    /// Forget a connection. Returns false if it was already gone.
    pub fn disconnect(&self, connection: ConnectionId) -> bool {
        self.connections().remove(&connection).is_some()
    }

    /// Snapshot of all connections that are still open
    pub fn open_connections(&self) -> Vec<Connection> {
        self.connections()
            .values()
            .filter(|c| c.is_open())
            .cloned()
            .collect()
    }

    /// Number of connections the transport currently tracks
    pub fn connection_count(&self) -> usize {
        self.connections().len()
    }
}
