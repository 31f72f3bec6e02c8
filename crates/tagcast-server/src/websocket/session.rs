//! One client session, from upgrade to disconnect.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use tagcast_core::{ClientId, Envelope};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::broadcast::BroadcastManager;
use super::connection::ClientConnection;
use crate::config::ServerConfig;
use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};

/// Why a session ended. Logged on disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The client sent a Close frame.
    ClientClosed,
    /// The socket stream ended without a Close frame.
    StreamEnded,
    /// Reading or writing the socket failed.
    Transport(String),
    /// No Pong within the configured timeout.
    PongTimeout,
    /// Evicted after too many dropped frames.
    SlowClient,
    /// The server is shutting down.
    ServerShutdown,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientClosed => f.write_str("client closed"),
            Self::StreamEnded => f.write_str("stream ended"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::PongTimeout => f.write_str("pong timeout"),
            Self::SlowClient => f.write_str("slow client evicted"),
            Self::ServerShutdown => f.write_str("server shutdown"),
        }
    }
}

/// Run a session until the client goes away, is evicted, or the server stops.
///
/// 1. Queues `connection.established`, then registers with the broadcast manager
/// 2. Forwards queued frames and sends periodic Pings from a writer task
/// 3. Reads the socket for Close/Pong; inbound text is not part of the protocol
/// 4. Deregisters and logs the disconnect reason
#[instrument(skip_all, fields(client_id = %client_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    client_id: ClientId,
    broadcast: Arc<BroadcastManager>,
    config: ServerConfig,
    shutdown: CancellationToken,
) -> DisconnectReason {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Utf8Bytes>(config.send_buffer.max(1));
    let connection = Arc::new(ClientConnection::new(client_id.clone(), send_tx));

    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    // Queued before registration so the greeting is always the first frame.
    match Envelope::connection_established(&client_id).to_json() {
        Ok(json) => {
            let _ = connection.send(json.into());
        }
        Err(e) => warn!(error = %e, "failed to serialize greeting"),
    }
    broadcast.add(connection.clone());

    let writer_conn = connection.clone();
    let evicted = connection.eviction_token();
    let heartbeat = config.heartbeat_interval;
    let pong_timeout = config.pong_timeout;
    let mut writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(heartbeat);
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                frame = send_rx.recv() => {
                    let Some(frame) = frame else {
                        return DisconnectReason::StreamEnded;
                    };
                    if let Err(e) = ws_tx.send(Message::Text(frame)).await {
                        return DisconnectReason::Transport(e.to_string());
                    }
                }
                _ = ping_interval.tick() => {
                    if !writer_conn.check_alive() && writer_conn.last_pong_elapsed() > pong_timeout {
                        warn!(timeout = ?pong_timeout, "client unresponsive");
                        let _ = ws_tx.send(Message::Close(None)).await;
                        return DisconnectReason::PongTimeout;
                    }
                    if let Err(e) = ws_tx.send(Message::Ping(Vec::new().into())).await {
                        return DisconnectReason::Transport(e.to_string());
                    }
                }
                () = evicted.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    return DisconnectReason::SlowClient;
                }
                () = shutdown.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    return DisconnectReason::ServerShutdown;
                }
            }
        }
    });

    let reason = loop {
        tokio::select! {
            incoming = ws_rx.next() => match incoming {
                Some(Ok(Message::Close(_))) => break DisconnectReason::ClientClosed,
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => connection.mark_alive(),
                Some(Ok(Message::Text(text))) => {
                    connection.mark_alive();
                    debug!(len = text.len(), "ignoring inbound text frame");
                }
                Some(Ok(Message::Binary(data))) => {
                    connection.mark_alive();
                    debug!(len = data.len(), "ignoring inbound binary frame");
                }
                Some(Err(e)) => break DisconnectReason::Transport(e.to_string()),
                None => break DisconnectReason::StreamEnded,
            },
            finished = &mut writer => {
                break finished.unwrap_or_else(|e| DisconnectReason::Transport(e.to_string()));
            }
        }
    };

    writer.abort();
    broadcast.remove(&client_id);
    info!(reason = %reason, age_ms = duration_ms(connection.age()), "client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    reason
}

#[allow(clippy::cast_possible_truncation)]
fn duration_ms(d: Duration) -> u64 {
    d.as_millis() as u64
}

#[cfg(test)]
mod tests {
    // Socket-level behavior is covered by tests/realtime.rs.
    use super::*;

    #[test]
    fn reason_display() {
        assert_eq!(DisconnectReason::ClientClosed.to_string(), "client closed");
        assert_eq!(
            DisconnectReason::Transport("reset".into()).to_string(),
            "transport error: reset"
        );
        assert_eq!(DisconnectReason::SlowClient.to_string(), "slow client evicted");
    }
}
