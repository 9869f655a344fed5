//! Websocket transport over `tokio-tungstenite`.
//!
//! LIFECYCLE
//! =========
//! 1. Dial `{realtime}/realtime/ws?token=…`
//! 2. Wait for `session:connected` carrying the connection id
//! 3. One task relays outbound frames (binary protobuf) and inbound frames
//!    (binary protobuf or JSON text) until either side closes

use std::time::Duration;

use frames::Frame;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use super::{Connector, Link, SESSION_CONNECTED, TransportError, TransportKind};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WebSocketConnector {
    base_url: String,
    connect_timeout: Duration,
}

impl WebSocketConnector {
    #[must_use]
    pub fn new(base_url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self { base_url: base_url.into(), connect_timeout }
    }
}

#[async_trait::async_trait]
impl Connector for WebSocketConnector {
    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    async fn connect(&self, token: &str) -> Result<Link, TransportError> {
        let url = ws_url(&self.base_url, token)?;

        let handshake = async {
            let (mut stream, _) = connect_async(url)
                .await
                .map_err(|e| TransportError::WsConnect(Box::new(e)))?;
            let connection_id = wait_for_session_connected(&mut stream).await?;
            Ok::<_, TransportError>((stream, connection_id))
        };
        let (stream, connection_id) = tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| TransportError::Timeout)??;

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(stream, connection_id.clone(), outbound_rx, inbound_tx));

        Ok(Link { connection_id, kind: TransportKind::WebSocket, outbound, inbound })
    }
}

/// Map an http(s) base URL to the websocket endpoint. The token is
/// form-encoded into the query.
///
/// # Errors
///
/// Returns [`TransportError::InvalidUrl`] for unsupported schemes.
pub fn ws_url(base_url: &str, token: &str) -> Result<String, TransportError> {
    let trimmed = base_url.trim_end_matches('/');

    let origin = if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if trimmed.starts_with("ws://") || trimmed.starts_with("wss://") {
        trimmed.to_owned()
    } else {
        return Err(TransportError::InvalidUrl(base_url.to_owned()));
    };

    let mut url = reqwest::Url::parse(&format!("{origin}/realtime/ws"))
        .map_err(|_| TransportError::InvalidUrl(base_url.to_owned()))?;
    url.query_pairs_mut().append_pair("token", token);
    Ok(url.into())
}

async fn wait_for_session_connected(stream: &mut WsStream) -> Result<String, TransportError> {
    loop {
        let Some(message) = stream.next().await else {
            return Err(TransportError::Closed);
        };
        let frame = match message.map_err(|e| TransportError::WsConnect(Box::new(e)))? {
            Message::Binary(bytes) => frames::decode_frame(&bytes)?,
            Message::Text(text) => frames::decode_text(text.as_str())?,
            Message::Close(_) => return Err(TransportError::Closed),
            _ => continue,
        };
        if frame.event != SESSION_CONNECTED {
            debug!(event = %frame.event, "ws: ignoring frame before session:connected");
            continue;
        }
        return frame
            .str_field("connectionId")
            .map(ToOwned::to_owned)
            .ok_or_else(|| TransportError::Handshake("session:connected without connectionId".to_owned()));
    }
}

async fn run_socket(
    mut stream: WsStream,
    connection_id: String,
    mut outbound: mpsc::UnboundedReceiver<Frame>,
    inbound: mpsc::UnboundedSender<Frame>,
) {
    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    // Client dropped its sender: close politely.
                    let _ = stream.close(None).await;
                    break;
                };
                debug!(%connection_id, event = %frame.event, "ws: send frame");
                if let Err(e) = stream.send(Message::Binary(frames::encode_frame(&frame).into())).await {
                    warn!(%connection_id, error = %e, "ws: send failed");
                    break;
                }
            }
            message = stream.next() => {
                let Some(message) = message else { break };
                let decoded = match message {
                    Ok(Message::Binary(bytes)) => frames::decode_frame(&bytes),
                    Ok(Message::Text(text)) => frames::decode_text(text.as_str()),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(%connection_id, error = %e, "ws: recv failed");
                        break;
                    }
                };
                match decoded {
                    Ok(frame) => {
                        if inbound.send(frame).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(%connection_id, error = %e, "ws: undecodable frame skipped"),
                }
            }
        }
    }
    info!(%connection_id, "ws: socket closed");
}

#[cfg(test)]
#[path = "websocket_test.rs"]
mod tests;
