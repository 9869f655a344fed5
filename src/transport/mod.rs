//! Realtime transports.
//!
//! DESIGN
//! ======
//! A [`Connector`] performs the handshake for one transport and hands back a
//! [`Link`]: an outbound sender and an inbound receiver of [`Frame`]s. Each
//! transport runs its own I/O task behind those channels, so the realtime
//! client never touches sockets or HTTP directly.
//!
//! - Dropping `Link::outbound` asks the transport to close.
//! - The transport closing (server hangup, I/O error) ends `Link::inbound`.
//!
//! [`UpgradeConnector`] tries connectors in preference order: a persistent
//! websocket first, long polling when the websocket cannot be established.

pub mod memory;
pub mod polling;
pub mod websocket;

use std::fmt;
use std::sync::Arc;

use frames::Frame;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Event the server sends first on a new connection, carrying its id.
pub const SESSION_CONNECTED: &str = "session:connected";

/// Which transport carries a link.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransportKind {
    WebSocket,
    Polling,
    Memory,
}

impl TransportKind {
    /// Parse a transport name as used in `CHAT_TRANSPORTS`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "websocket" | "ws" => Some(Self::WebSocket),
            "polling" => Some(Self::Polling),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::WebSocket => "websocket",
            Self::Polling => "polling",
            Self::Memory => "memory",
        })
    }
}

/// Error type for transport handshakes.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The realtime base URL could not be mapped to a transport URL.
    #[error("invalid realtime URL: {0}")]
    InvalidUrl(String),
    /// The websocket connection or handshake failed.
    #[error("websocket connect failed: {0}")]
    WsConnect(Box<tokio_tungstenite::tungstenite::Error>),
    /// An HTTP request of the polling transport failed.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The server answered the handshake with something unexpected.
    #[error("handshake failed: {0}")]
    Handshake(String),
    /// The handshake did not complete before the connect timeout.
    #[error("timed out waiting for transport handshake")]
    Timeout,
    /// The transport declined the connection.
    #[error("connection refused: {0}")]
    Refused(String),
    /// The transport closed during the handshake.
    #[error("transport closed")]
    Closed,
    /// A handshake frame could not be decoded.
    #[error("frame decode failed: {0}")]
    Decode(#[from] frames::CodecError),
    /// No transports were configured.
    #[error("no transports configured")]
    NoTransports,
}

/// An established connection: frames out, frames in.
pub struct Link {
    pub connection_id: String,
    pub kind: TransportKind,
    pub outbound: mpsc::UnboundedSender<Frame>,
    pub inbound: mpsc::UnboundedReceiver<Frame>,
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("connection_id", &self.connection_id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Establishes links for one transport.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Which transport this connector produces.
    fn kind(&self) -> TransportKind;

    /// Perform the handshake using the caller's credential token.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the transport cannot be established.
    async fn connect(&self, token: &str) -> Result<Link, TransportError>;
}

// =============================================================================
// UPGRADE CONNECTOR
// =============================================================================

/// Tries each connector in order and returns the first link established.
pub struct UpgradeConnector {
    connectors: Vec<Arc<dyn Connector>>,
}

impl UpgradeConnector {
    #[must_use]
    pub fn new(connectors: Vec<Arc<dyn Connector>>) -> Self {
        Self { connectors }
    }

    /// Build the websocket/polling chain named by `config.transports`.
    #[must_use]
    pub fn from_config(config: &crate::ChatConfig) -> Self {
        let connectors = config
            .transports
            .iter()
            .filter_map(|kind| -> Option<Arc<dyn Connector>> {
                match kind {
                    TransportKind::WebSocket => Some(Arc::new(websocket::WebSocketConnector::new(
                        config.realtime_url.clone(),
                        config.connect_timeout,
                    ))),
                    TransportKind::Polling => Some(Arc::new(polling::PollingConnector::new(
                        config.realtime_url.clone(),
                        config.connect_timeout,
                        config.poll_wait,
                    ))),
                    TransportKind::Memory => {
                        warn!("realtime: memory transport cannot be built from config; skipping");
                        None
                    }
                }
            })
            .collect();
        Self::new(connectors)
    }
}

#[async_trait::async_trait]
impl Connector for UpgradeConnector {
    fn kind(&self) -> TransportKind {
        self.connectors
            .first()
            .map_or(TransportKind::WebSocket, |c| c.kind())
    }

    async fn connect(&self, token: &str) -> Result<Link, TransportError> {
        let mut last_error = TransportError::NoTransports;
        for connector in &self.connectors {
            match connector.connect(token).await {
                Ok(link) => {
                    info!(transport = %link.kind, connection_id = %link.connection_id, "realtime: transport established");
                    return Ok(link);
                }
                Err(e) => {
                    warn!(transport = %connector.kind(), error = %e, "realtime: transport unavailable, trying next");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
