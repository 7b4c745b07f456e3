//! WebSocket transport for the signaling relay
//!
//! Every upgraded socket gets one actor task that reads frames in order and
//! hands them to the [`Dispatcher`], plus one writer task that drains the
//! connection's outbound queue into the socket sink.

use crate::connection::{Connection, ConnectionId, OutboundReceiver};
use crate::dispatch::Dispatcher;
use crate::error::ClientRequestError;
use axum::{
    Router,
    extract::{
        State,
        ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
    },
    response::Response,
    routing::get,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// A connection silent for this many keepalive periods is dropped.
const KEEPALIVE_GRACE_PERIODS: u32 = 2;

/// Shared context for every connection handler
#[derive(Clone)]
pub struct RelayContext {
    dispatcher: Dispatcher,
    ping_interval: Option<Duration>,
}

/// Build the relay's HTTP router.
///
/// WebSocket upgrades are accepted on any path; `/health` answers plain GETs.
pub fn router(dispatcher: Dispatcher, ping_interval: Option<Duration>) -> Router {
    let context = RelayContext {
        dispatcher,
        ping_interval,
    };
    Router::new()
        .route("/health", get(health))
        .route("/", get(ws_upgrade))
        .route("/{*path}", get(ws_upgrade))
        .with_state(context)
}

async fn health() -> &'static str {
    "OK"
}

async fn ws_upgrade(State(context): State<RelayContext>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_connection(socket, context))
}

/// Run one relay connection until the peer goes away.
///
/// The close path runs exactly once, whatever ended the connection (even a
/// panic), so the registry never keeps an entry for a dead socket.
pub async fn run_connection(socket: WebSocket, context: RelayContext) {
    let RelayContext {
        dispatcher,
        ping_interval,
    } = context;

    let (ws_sender, mut ws_receiver) = socket.split();
    let (connection, rx) = dispatcher.state().connect();
    tracing::info!(
        connection = %connection.id(),
        open = dispatcher.state().connection_count(),
        "A new client connected"
    );

    let _guard = CloseGuard {
        dispatcher: dispatcher.clone(),
        connection: connection.id(),
        writer: tokio::spawn(writer_task(ws_sender, rx)),
    };

    let mut keepalive = ping_interval.and_then(|period| {
        let Some(start) = Instant::now().checked_add(period) else {
            tracing::warn!(?period, "Keepalive interval out of range, keepalive disabled");
            return None;
        };
        let mut ticker = interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Some((ticker, period))
    });
    let mut last_seen = Instant::now();

    loop {
        let frame = tokio::select! {
            frame = ws_receiver.next() => frame,
            period = next_tick(keepalive.as_mut()) => {
                if last_seen.elapsed() >= period.saturating_mul(KEEPALIVE_GRACE_PERIODS) {
                    tracing::warn!(connection = %connection.id(), "Keepalive timeout, closing connection");
                    break;
                }
                if send_ping(&connection).is_err() {
                    break;
                }
                continue;
            }
        };
        last_seen = Instant::now();

        match frame {
            Some(Ok(Message::Text(text))) => {
                dispatcher.handle_message(&connection, text);
            }
            Some(Ok(Message::Binary(data))) => match binary_text(&data) {
                Ok(text) => {
                    dispatcher.handle_message(&connection, text);
                }
                Err(err) => {
                    tracing::warn!(connection = %connection.id(), error = %err, "Invalid message received");
                }
            },
            // Pings are answered by the socket itself.
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            Some(Ok(Message::Close(frame))) => {
                tracing::debug!(connection = %connection.id(), reason = ?frame, "Client initiated close");
                break;
            }
            Some(Err(err)) => {
                tracing::warn!(connection = %connection.id(), error = %err, "WebSocket error occurred");
                break;
            }
            None => {
                tracing::debug!(connection = %connection.id(), "WebSocket stream ended");
                break;
            }
        }
    }
}

/// Runs the close path when the connection actor exits, however it exits.
struct CloseGuard {
    dispatcher: Dispatcher,
    connection: ConnectionId,
    writer: JoinHandle<()>,
}

impl Drop for CloseGuard {
    fn drop(&mut self) {
        self.dispatcher.handle_close(self.connection);
        self.writer.abort();
        tracing::info!(
            connection = %self.connection,
            open = self.dispatcher.state().connection_count(),
            "Client connection closed"
        );
    }
}

/// Forward queued frames to the socket until either side goes away
async fn writer_task(mut ws_sender: SplitSink<WebSocket, Message>, mut rx: OutboundReceiver) {
    while let Some(frame) = rx.recv().await {
        if let Err(err) = ws_sender.send(frame).await {
            tracing::debug!(error = %err, "WebSocket send failed");
            break;
        }
    }
}

async fn next_tick(keepalive: Option<&mut (Interval, Duration)>) -> Duration {
    match keepalive {
        Some((ticker, period)) => {
            ticker.tick().await;
            *period
        }
        None => std::future::pending().await,
    }
}

fn send_ping(connection: &Connection) -> Result<(), crate::SignalingError> {
    connection.send_frame(Message::Ping(Default::default()))
}

fn binary_text(data: &[u8]) -> Result<Utf8Bytes, ClientRequestError> {
    String::from_utf8(data.to_vec())
        .map(Utf8Bytes::from)
        .map_err(|_| ClientRequestError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_frames_must_be_utf8() {
        assert_eq!(binary_text(br#"{"data":1}"#).unwrap().as_str(), r#"{"data":1}"#);
        assert!(matches!(
            binary_text(&[0xff, 0xfe]),
            Err(ClientRequestError::InvalidUtf8)
        ));
    }

    #[tokio::test]
    async fn disabled_keepalive_never_ticks() {
        let tick = tokio::time::timeout(Duration::from_millis(50), next_tick(None)).await;
        assert!(tick.is_err());
    }
}
