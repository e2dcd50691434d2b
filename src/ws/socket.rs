//! WebSocket upgrade and the per-connection read/write loops.
//!
//! Each accepted socket gets two tasks: the read loop decodes inbound frames
//! and hands them to the hub for fan-out; the write loop drains the
//! connection's outbound queue and sends liveness probes. Either loop exiting
//! funnels into the same idempotent `Hub::unregister`.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use metrics::counter;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ConnectionError;
use crate::metrics::{WS_DISCONNECTIONS_TOTAL, WS_LIVENESS_TIMEOUTS_TOTAL};
use crate::server::AppState;

use super::connection::ClientConnection;
use super::hub::Hub;

/// GET /ws — upgrade the request and hand the socket to the hub.
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    if state.hub.connection_count().await >= state.config.max_connections {
        warn!(
            max_connections = state.config.max_connections,
            "connection limit reached, refusing upgrade"
        );
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// Own one client socket for its whole lifetime.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sink, stream) = socket.split();
    let (tx, rx) = mpsc::channel(state.config.outbound_queue_capacity);
    let conn = Arc::new(ClientConnection::new(Uuid::now_v7().to_string(), tx));
    state.hub.register(conn.clone()).await;
    info!(conn_id = %conn.id, "client connected");

    let write_task = tokio::spawn(write_loop(
        sink,
        conn.clone(),
        rx,
        state.config.probe_interval(),
        state.config.idle_timeout(),
        state.hub.clone(),
    ));

    let read_reason = read_loop(stream, &conn, &state.hub).await;

    // Same teardown on every exit path; idempotent with the write loop's.
    let _ = state.hub.unregister(&conn.id).await;

    // The close signal from unregister makes the write loop exit promptly.
    // When the write side failed first, its reason is the real one: the read
    // loop only saw the close signal.
    let write_reason = write_task
        .await
        .unwrap_or(ConnectionError::ClosedGracefully);
    let reason = if read_reason.is_graceful() && !write_reason.is_graceful() {
        write_reason
    } else {
        read_reason
    };

    counter!(WS_DISCONNECTIONS_TOTAL, "reason" => reason.reason()).increment(1);
    if reason.is_graceful() {
        info!(conn_id = %conn.id, age_secs = conn.age().as_secs(), "client disconnected");
    } else {
        warn!(conn_id = %conn.id, reason = reason.reason(), error = %reason, "client disconnected");
    }
}

/// Read inbound frames until the peer goes away.
///
/// Data frames are opaque to the hub and forwarded byte-for-byte. Any
/// inbound frame counts as liveness. Returns the exit reason; the loop never
/// ends except through one.
async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    conn: &Arc<ClientConnection>,
    hub: &Arc<Hub>,
) -> ConnectionError {
    let closed = conn.close_token();
    loop {
        tokio::select! {
            // Hub-initiated close (slow client, shutdown): stop reading so a
            // removed connection can never feed another broadcast.
            () = closed.cancelled() => return ConnectionError::ClosedGracefully,
            frame = stream.next() => match frame {
                Some(Ok(frame)) => {
                    conn.mark_alive();
                    match frame {
                        Message::Text(_) | Message::Binary(_) => {
                            hub.broadcast(&conn.id, frame).await;
                        }
                        Message::Close(_) => return ConnectionError::ClosedGracefully,
                        // axum answers pings itself; pongs only refresh liveness
                        Message::Ping(_) | Message::Pong(_) => {}
                    }
                }
                Some(Err(source)) => return ConnectionError::ClosedAbnormally { source },
                None => return ConnectionError::ClosedGracefully,
            },
        }
    }
}

/// Drain the outbound queue and probe for liveness.
///
/// Multiplexes the queue against the probe timer; `select!` polls branches
/// in random order so neither side can starve the other. The probe interval
/// is strictly shorter than the idle deadline, so a responsive peer always
/// gets at least one ping before its deadline could lapse.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    conn: Arc<ClientConnection>,
    mut rx: mpsc::Receiver<Message>,
    probe_interval: Duration,
    idle_timeout: Duration,
    hub: Arc<Hub>,
) -> ConnectionError {
    let mut probes = tokio::time::interval(probe_interval);
    let mut missed: u32 = 0;
    let max_missed = max_missed_probes(idle_timeout, probe_interval);
    let closed = conn.close_token();

    let reason = loop {
        tokio::select! {
            next = rx.recv() => match next {
                Some(frame) => {
                    if let Err(source) = sink.send(frame).await {
                        break ConnectionError::WriteFailed { source };
                    }
                }
                // Queue closed: the connection is shutting down
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break ConnectionError::ClosedGracefully;
                }
            },
            _ = probes.tick() => {
                if conn.take_alive() {
                    missed = 0;
                } else {
                    missed += 1;
                    if missed >= max_missed {
                        counter!(WS_LIVENESS_TIMEOUTS_TOTAL).increment(1);
                        break ConnectionError::LivenessTimeout;
                    }
                }
                debug!(conn_id = %conn.id, missed, "sending liveness probe");
                if let Err(source) = sink.send(Message::Ping(Bytes::new())).await {
                    break ConnectionError::WriteFailed { source };
                }
            },
            () = closed.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break ConnectionError::ClosedGracefully;
            }
        }
    };

    if !reason.is_graceful() {
        warn!(conn_id = %conn.id, reason = reason.reason(), "write loop exiting");
    }
    let _ = hub.unregister(&conn.id).await;
    reason
}

/// Probe ticks without inbound activity before the peer is declared dead.
///
/// Rounds the deadline up to whole probe intervals: with the default 10s
/// deadline and 9s interval a silent peer is removed on the second missed
/// tick, within one probe interval plus one deadline window.
fn max_missed_probes(idle_timeout: Duration, probe_interval: Duration) -> u32 {
    let deadline = idle_timeout.as_millis();
    let interval = probe_interval.as_millis().max(1);
    #[allow(clippy::cast_possible_truncation)]
    let ticks = deadline.div_ceil(interval) as u32;
    ticks.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ratio_allows_two_missed_probes() {
        let n = max_missed_probes(Duration::from_secs(10), Duration::from_millis(9_000));
        assert_eq!(n, 2);
    }

    #[test]
    fn equal_interval_and_deadline() {
        let n = max_missed_probes(Duration::from_secs(5), Duration::from_secs(5));
        assert_eq!(n, 1);
    }

    #[test]
    fn at_least_one_probe_always_required() {
        let n = max_missed_probes(Duration::ZERO, Duration::from_secs(1));
        assert_eq!(n, 1);
    }

    #[test]
    fn long_deadline_short_interval() {
        let n = max_missed_probes(Duration::from_secs(30), Duration::from_secs(9));
        assert_eq!(n, 4);
    }
}
