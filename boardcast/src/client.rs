//! WebSocket client for the Boardcast relay.
//!
//! [`RelayClient`] owns one connection to the relay. Outgoing moves are sent
//! as JSON text frames; a background reader task decodes incoming frames
//! into [`ClientEvent`]s. The relay does not acknowledge anything, so a
//! successful send only means the frame left this process.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use boardcast_proto::envelope::{self, ClientMessage, ProtoError};
use boardcast_proto::square::Square;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// Relay address used when none is configured.
pub const DEFAULT_RELAY_URL: &str = "ws://localhost:4000/";

/// Timeout for establishing the WebSocket connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Capacity of the channel between the reader task and [`RelayClient::next_event`].
const INCOMING_BUFFER: usize = 256;

type WsSender = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

type WsReader =
    futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

/// Errors returned by [`RelayClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The relay URL could not be parsed or is not `ws://`/`wss://`.
    #[error("invalid relay URL {url:?}: {reason}")]
    InvalidUrl {
        /// URL as given.
        url: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The relay did not complete the handshake in time.
    #[error("relay connection timed out")]
    Timeout,

    /// The WebSocket handshake or transport failed.
    #[error("relay connection failed: {0}")]
    Connect(#[source] Box<tungstenite::Error>),

    /// The connection to the relay has been closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// A move could not be encoded.
    #[error(transparent)]
    Proto(#[from] ProtoError),
}

/// Something another board sent through the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Another board moved a piece.
    Move {
        /// Origin square.
        from: Square,
        /// Destination square.
        to: Square,
    },
    /// A payload that is not a move envelope, passed through as text.
    Other(String),
}

/// A board's connection to the relay.
pub struct RelayClient {
    url: String,
    ws_sender: Mutex<WsSender>,
    incoming: Mutex<mpsc::Receiver<ClientEvent>>,
    connected: Arc<AtomicBool>,
    reader_handle: tokio::task::JoinHandle<()>,
}

impl RelayClient {
    /// Connects to the relay at `url` and starts the background reader.
    ///
    /// # Errors
    ///
    /// - [`ClientError::InvalidUrl`] if `url` is not a `ws://` or `wss://` URL.
    /// - [`ClientError::Timeout`] if the handshake takes longer than 10 s.
    /// - [`ClientError::Connect`] if the connection or handshake fails.
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let parsed = parse_relay_url(url)?;

        let (ws_stream, _response) =
            tokio::time::timeout(CONNECT_TIMEOUT, connect_async(parsed.as_str()))
                .await
                .map_err(|_| {
                    tracing::warn!(url, "relay connect timed out");
                    ClientError::Timeout
                })?
                .map_err(|e| {
                    tracing::warn!(url, error = %e, "relay connect failed");
                    ClientError::Connect(Box::new(e))
                })?;

        let (ws_sender, ws_reader) = ws_stream.split();
        let (tx, rx) = mpsc::channel(INCOMING_BUFFER);
        let connected = Arc::new(AtomicBool::new(true));
        let reader_handle = tokio::spawn(reader_loop(ws_reader, tx, Arc::clone(&connected)));

        tracing::info!(url, "connected to relay");

        Ok(Self {
            url: parsed.to_string(),
            ws_sender: Mutex::new(ws_sender),
            incoming: Mutex::new(rx),
            connected,
            reader_handle,
        })
    }

    /// The relay URL this client is connected to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the reader still sees an open connection.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Publishes a move to every other board.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConnectionClosed`] if the relay connection is down.
    pub async fn send_move(&self, from: Square, to: Square) -> Result<(), ClientError> {
        let text = envelope::encode(&ClientMessage::Move { from, to })?;
        self.send_raw(text).await
    }

    /// Sends an arbitrary text payload.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConnectionClosed`] if the relay connection is down.
    pub async fn send_raw(&self, text: impl Into<String>) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::ConnectionClosed);
        }
        let text: String = text.into();
        let mut sender = self.ws_sender.lock().await;
        sender
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "relay send failed");
                self.connected.store(false, Ordering::Relaxed);
                ClientError::ConnectionClosed
            })
    }

    /// Waits for the next event from another board.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConnectionClosed`] once the connection has
    /// ended and every buffered event has been returned.
    pub async fn next_event(&self) -> Result<ClientEvent, ClientError> {
        let mut rx = self.incoming.lock().await;
        rx.recv().await.ok_or(ClientError::ConnectionClosed)
    }

    /// Sends a Close frame to the relay.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConnectionClosed`] if the connection was already gone.
    pub async fn close(&self) -> Result<(), ClientError> {
        let mut sender = self.ws_sender.lock().await;
        sender
            .close()
            .await
            .map_err(|_| ClientError::ConnectionClosed)
    }
}

impl Drop for RelayClient {
    fn drop(&mut self) {
        self.reader_handle.abort();
    }
}

/// Validates a relay URL.
fn parse_relay_url(url: &str) -> Result<url::Url, ClientError> {
    let parsed = url::Url::parse(url).map_err(|e| ClientError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(parsed),
        other => Err(ClientError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme {other:?}"),
        }),
    }
}

/// Turns one relayed payload into an event.
///
/// Malformed payloads are logged and passed through; they never end the
/// connection.
fn classify(text: &str) -> Option<ClientEvent> {
    match envelope::decode(text) {
        Ok(ClientMessage::Move { from, to }) => Some(ClientEvent::Move { from, to }),
        Ok(ClientMessage::Unknown) => {
            tracing::debug!(payload = text, "ignoring unknown envelope type");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "payload is not a move envelope");
            Some(ClientEvent::Other(text.to_string()))
        }
    }
}

/// Background task that reads frames and forwards decoded events.
///
/// Marks the client disconnected when the socket closes or errors.
async fn reader_loop(
    mut ws_reader: WsReader,
    tx: mpsc::Sender<ClientEvent>,
    connected: Arc<AtomicBool>,
) {
    while let Some(msg_result) = ws_reader.next().await {
        let event = match msg_result {
            Ok(Message::Text(text)) => classify(text.as_str()),
            Ok(Message::Binary(data)) => Some(ClientEvent::Other(
                String::from_utf8_lossy(&data).into_owned(),
            )),
            Ok(Message::Close(_)) => {
                tracing::info!("relay closed the connection");
                break;
            }
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => None,
            Err(e) => {
                tracing::warn!(error = %e, "relay read failed");
                break;
            }
        };
        if let Some(event) = event
            && tx.send(event).await.is_err()
        {
            // Client dropped.
            break;
        }
    }
    connected.store(false, Ordering::Relaxed);
    tracing::debug!("relay reader task exiting");
}
