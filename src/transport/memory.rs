//! In-process transport.
//!
//! Each successful `connect` hands a [`MemoryPeer`] to whoever holds the
//! receiver returned by [`MemoryConnector::new`]. The peer plays the server:
//! it reads what the client emitted and pushes server events back.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use frames::Frame;
use tokio::sync::mpsc;

use super::{Connector, Link, TransportError, TransportKind};

pub struct MemoryConnector {
    peers: mpsc::UnboundedSender<MemoryPeer>,
    refusing: AtomicBool,
    next_id: AtomicU64,
}

impl MemoryConnector {
    #[must_use]
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            peers,
            refusing: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        });
        (connector, rx)
    }

    /// Make subsequent connects fail with [`TransportError::Refused`].
    pub fn set_refusing(&self, refusing: bool) {
        self.refusing.store(refusing, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Connector for MemoryConnector {
    fn kind(&self) -> TransportKind {
        TransportKind::Memory
    }

    async fn connect(&self, token: &str) -> Result<Link, TransportError> {
        if self.refusing.load(Ordering::SeqCst) {
            return Err(TransportError::Refused("memory transport refusing".to_owned()));
        }

        let connection_id = format!("mem-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let (client_tx, client_rx) = mpsc::unbounded_channel();
        let (server_tx, server_rx) = mpsc::unbounded_channel();

        let peer = MemoryPeer {
            connection_id: connection_id.clone(),
            token: token.to_owned(),
            from_client: client_rx,
            to_client: server_tx,
        };
        if self.peers.send(peer).is_err() {
            return Err(TransportError::Refused("no memory server listening".to_owned()));
        }

        Ok(Link { connection_id, kind: TransportKind::Memory, outbound: client_tx, inbound: server_rx })
    }
}

/// Server side of an in-process link.
pub struct MemoryPeer {
    pub connection_id: String,
    /// Credential token the client connected with.
    pub token: String,
    from_client: mpsc::UnboundedReceiver<Frame>,
    to_client: mpsc::UnboundedSender<Frame>,
}

impl MemoryPeer {
    /// Push a server frame to the client. Returns `false` once the client is gone.
    pub fn push(&self, frame: Frame) -> bool {
        self.to_client.send(frame).is_ok()
    }

    /// Wait for the next frame the client emitted. `None` once the client closed.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        self.from_client.recv().await
    }

    /// Take the next already-emitted client frame without waiting.
    pub fn try_next_frame(&mut self) -> Option<Frame> {
        self.from_client.try_recv().ok()
    }

    /// Drain every frame emitted so far.
    pub fn drain(&mut self) -> Vec<Frame> {
        std::iter::from_fn(|| self.try_next_frame()).collect()
    }

    /// Whether the client side has dropped its sender.
    #[must_use]
    pub fn is_client_closed(&self) -> bool {
        self.to_client.is_closed()
    }
}
