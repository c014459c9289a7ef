//! Relay server: shared state, WebSocket handler, and server startup.
//!
//! Every upgraded socket is registered with the [`Hub`] and served by two
//! tasks. The reader hands each text or binary frame to
//! [`Hub::broadcast`]; the writer drains the connection's outbound queue
//! onto the socket. When either task ends the connection is unregistered.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};

use crate::config::RelayConfig;
use crate::hub::Hub;

/// Path of the single WebSocket endpoint.
pub const WS_PATH: &str = "/";

/// Default maximum inbound message size in bytes (64 KB).
const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Default upper bound on a single socket write.
const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur while starting the relay server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listener could not bind to the requested address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The bound listener did not report its local address.
    #[error("failed to read listener address: {0}")]
    LocalAddr(#[source] std::io::Error),
}

/// Shared relay server state.
pub struct RelayState {
    /// Registry of open connections.
    pub hub: Hub,
    /// Largest inbound message accepted from a client.
    max_message_size: usize,
    /// Upper bound on a single socket write.
    send_timeout: Duration,
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayState {
    /// Creates relay state with an empty hub and default limits.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hub: Hub::new(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Creates relay state from a resolved [`RelayConfig`].
    #[must_use]
    pub fn with_config(config: &RelayConfig) -> Self {
        Self {
            hub: Hub::with_peer_buffer(config.peer_buffer),
            max_message_size: config.max_message_size,
            send_timeout: config.send_timeout,
        }
    }
}

/// Serves one upgraded WebSocket until either side goes away.
pub async fn handle_socket(socket: WebSocket, state: Arc<RelayState>) {
    let (conn_id, mut rx) = state.hub.accept();
    tracing::info!(conn_id = %conn_id, peers = state.hub.len(), "connection opened");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Writer: outbound queue -> socket, each write bounded by the send timeout.
    let send_timeout = state.send_timeout;
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            match tokio::time::timeout(send_timeout, ws_sender.send(msg)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(conn_id = %conn_id, error = %e, "WebSocket write failed");
                    break;
                }
                Err(_) => {
                    tracing::warn!(
                        conn_id = %conn_id,
                        timeout = ?send_timeout,
                        "WebSocket write stalled, dropping connection"
                    );
                    break;
                }
            }
            if closing {
                break;
            }
        }
    });

    // Reader: socket -> hub broadcast, in arrival order.
    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(msg @ (Message::Text(_) | Message::Binary(_))) => {
                    let report = reader_state.hub.broadcast(conn_id, &msg);
                    tracing::debug!(
                        conn_id = %conn_id,
                        delivered = report.delivered,
                        dropped = report.dropped(),
                        "broadcast message"
                    );
                }
                Ok(Message::Close(_)) => {
                    tracing::info!(conn_id = %conn_id, "received close frame");
                    break;
                }
                Ok(Message::Ping(_) | Message::Pong(_)) => {
                    // Answered by the WebSocket layer.
                }
                Err(e) => {
                    tracing::warn!(conn_id = %conn_id, error = %e, "WebSocket read failed");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut read_task => {}
        _ = &mut write_task => {}
    }

    // Unregister before tearing down so no broadcast targets a dead writer.
    state.hub.disconnect(conn_id);
    read_task.abort();
    write_task.abort();
    tracing::info!(conn_id = %conn_id, peers = state.hub.len(), "connection closed");
}

/// axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<RelayState>>,
) -> impl IntoResponse {
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// Builds the relay router.
pub fn router(state: Arc<RelayState>) -> axum::Router {
    axum::Router::new()
        .route(WS_PATH, axum::routing::get(ws_handler))
        .with_state(state)
}

/// Starts the relay server with default state on the given address.
///
/// Returns the bound address and the server task's join handle.
///
/// # Errors
///
/// Returns [`ServerError`] if the TCP listener cannot bind to the address.
pub async fn start_server(
    addr: &str,
) -> Result<(SocketAddr, tokio::task::JoinHandle<()>), ServerError> {
    start_server_with_state(addr, Arc::new(RelayState::new())).await
}

/// Starts the relay server with a pre-configured [`RelayState`].
///
/// The server runs until its task is aborted.
///
/// # Errors
///
/// Returns [`ServerError`] if the TCP listener cannot bind to the address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<RelayState>,
) -> Result<(SocketAddr, tokio::task::JoinHandle<()>), ServerError> {
    start_server_with_shutdown(addr, state, std::future::pending()).await
}

/// Starts the relay server and stops it when `shutdown` completes.
///
/// On shutdown every open connection is sent a Close frame and the hub is
/// emptied before the server task finishes.
///
/// # Errors
///
/// Returns [`ServerError`] if the TCP listener cannot bind to the address.
pub async fn start_server_with_shutdown<F>(
    addr: &str,
    state: Arc<RelayState>,
    shutdown: F,
) -> Result<(SocketAddr, tokio::task::JoinHandle<()>), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    let bound_addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

    let app = router(Arc::clone(&state));
    let handle = tokio::spawn(async move {
        let signal = async move {
            shutdown.await;
            let closed = state.hub.close_all();
            tracing::info!(closed, "relay shutting down");
        };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await
        {
            tracing::error!(error = %e, "relay server error");
        }
    });

    Ok((bound_addr, handle))
}
