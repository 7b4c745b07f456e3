//! WebSocket signaling relay for WebRTC peer-to-peer connections
//!
//! Clients register an identity, then exchange signaling payloads (offers,
//! answers, ICE candidates) by addressing each other through the relay. The
//! relay forwards every payload byte-for-byte and keeps no call state beyond
//! an identity -> connection registry.
//!
//! # Protocol
//!
//! One JSON object per WebSocket text frame:
//!
//! - `{"type": "register", "from": "<identity>"}` - claim an identity
//! - `{"to": "<identity>", ...}` - delivered only to that identity
//! - anything else, or a `to` nobody holds - broadcast to every other open
//!   connection
//!
//! Only `type`, `from` and `to` are ever inspected. Unparseable messages are
//! dropped and the connection stays open.
//!
//! # Example
//!
//! ```bash
//! # Start the relay
//! signal-relay --port 3000
//!
//! # Register and send (using websocat)
//! websocat ws://127.0.0.1:3000
//! {"type":"register","from":"alice"}
//! {"type":"sdp","from":"alice","to":"bob","sdp":{"type":"offer","sdp":"v=0..."}}
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod state;

pub use config::RelayConfig;
pub use connection::{Connection, ConnectionId};
pub use dispatch::{Dispatcher, Route};
pub use error::{ClientRequestError, SignalingError};
pub use handler::router;
pub use state::{Identity, Registry, ServerState};

use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;

/// Bind the configured address and serve until Ctrl-C
pub async fn serve(config: &RelayConfig) -> Result<(), SignalingError> {
    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| SignalingError::Bind { addr, source })?;
    let local_addr = listener.local_addr().map_err(SignalingError::Serve)?;
    tracing::info!("Signaling relay is running on ws://{local_addr}");

    run(
        listener,
        Dispatcher::default(),
        config.ping_interval(),
        shutdown_signal(),
    )
    .await
}

/// Serve relay connections on an already bound listener until `shutdown` resolves
pub async fn run<F>(
    listener: TcpListener,
    dispatcher: Dispatcher,
    ping_interval: Option<Duration>,
    shutdown: F,
) -> Result<(), SignalingError>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(dispatcher, ping_interval))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(SignalingError::Serve)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutting down"),
        Err(err) => {
            tracing::warn!(error = %err, "Failed to listen for Ctrl-C, running until killed");
            std::future::pending::<()>().await;
        }
    }
}
