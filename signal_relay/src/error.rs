//! Error types for the signaling relay

use crate::connection::ConnectionId;
use std::net::SocketAddr;
use thiserror::Error;

/// Errors that can occur while relaying
#[derive(Error, Debug)]
pub enum SignalingError {
    /// The peer's outbound channel is gone
    #[error("Connection {0} is closed")]
    ConnectionClosed(ConnectionId),

    /// Failed to bind the listening socket
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address we tried to listen on
        addr: SocketAddr,
        /// Underlying socket error
        source: std::io::Error,
    },

    /// The HTTP server stopped with an error
    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),

    /// Logging could not be installed
    #[error("Logging error: {0}")]
    Logging(String),
}

/// Errors from client requests
#[derive(Error, Debug)]
pub enum ClientRequestError {
    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Valid JSON, but not an object
    #[error("Message is not a JSON object")]
    NotAnObject,

    /// Binary frame that is not UTF-8 text
    #[error("Binary message is not valid UTF-8")]
    InvalidUtf8,
}
