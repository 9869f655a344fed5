//! Shared helpers for unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use frames::Frame;
use tokio::sync::mpsc;

use crate::api::{ApiError, ChatApi, SendMessageRequest};
use crate::realtime::RealtimeClient;
use crate::transport::memory::{MemoryConnector, MemoryPeer};
use crate::types::{ActiveRoom, ChatMessage, ChatRoom, RoomEntity, UserRole};

/// Install a test-writer subscriber once so `tracing` output shows up on failures.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Serve an axum router on an ephemeral localhost port; returns its http base URL.
pub async fn spawn_server(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server failed");
    });
    format!("http://{addr}")
}

/// Let spawned tasks run. Under a paused clock this auto-advances only after
/// every other task is idle, so pushed frames are fully dispatched.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

/// A realtime client over the memory transport plus its peer channel.
pub struct MemoryHarness {
    pub client: RealtimeClient,
    pub connector: Arc<MemoryConnector>,
    pub peers: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryHarness {
    pub fn new() -> Self {
        init_tracing();
        let (connector, peers) = MemoryConnector::new();
        let client = RealtimeClient::new(connector.clone());
        Self { client, connector, peers }
    }

    /// Connect the client and return the server side of the new link.
    pub async fn connect(&mut self) -> MemoryPeer {
        assert!(self.client.connect("tok").await, "memory connect should succeed");
        self.peers.recv().await.expect("peer for new link")
    }
}

/// Build a `new-message` server frame.
pub fn message_frame(id: &str, user_id: &str, text: &str) -> Frame {
    Frame::new(
        crate::events::NEW_MESSAGE,
        serde_json::json!({
            "id": id,
            "userId": user_id,
            "userName": format!("name-{user_id}"),
            "userRole": "donor",
            "message": text,
            "timestamp": "2024-05-01T10:00:00Z"
        }),
    )
}

/// Build a history message as the REST layer would return it.
pub fn history_message(id: &str) -> ChatMessage {
    ChatMessage {
        id: id.to_owned(),
        user_id: "u-h".to_owned(),
        user_name: "History".to_owned(),
        user_role: UserRole::Donor,
        message: format!("history {id}"),
        timestamp: String::new(),
        room_id: Some("room_c1".to_owned()),
    }
}

/// Scripted [`ChatApi`] that records what it was asked to do.
pub struct FakeChatApi {
    /// History page to serve; `None` makes the fetch fail.
    pub history: Mutex<Option<Vec<ChatMessage>>>,
    /// How long a history fetch takes.
    pub history_delay: Mutex<Duration>,
    pub fail_sends: AtomicBool,
    pub sent: Mutex<Vec<SendMessageRequest>>,
    pub history_requests: Mutex<Vec<(String, u32, u32)>>,
}

impl FakeChatApi {
    pub fn new(history: Vec<ChatMessage>) -> Arc<Self> {
        Arc::new(Self {
            history: Mutex::new(Some(history)),
            history_delay: Mutex::new(Duration::ZERO),
            fail_sends: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            history_requests: Mutex::new(Vec::new()),
        })
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("lock").len()
    }
}

#[async_trait]
impl ChatApi for FakeChatApi {
    async fn join_room(&self, entity: &RoomEntity) -> Result<ChatRoom, ApiError> {
        if entity.id() == "missing" {
            return Err(ApiError::Status { status: 404, message: "not found".to_owned() });
        }
        Ok(ChatRoom { room_id: format!("room_{}", entity.id()), entity: entity.clone(), title: None })
    }

    async fn fetch_messages(&self, room_id: &str, page: u32, limit: u32) -> Result<Vec<ChatMessage>, ApiError> {
        self.history_requests.lock().expect("lock").push((room_id.to_owned(), page, limit));
        let delay = *self.history_delay.lock().expect("lock");
        tokio::time::sleep(delay).await;
        let history = self.history.lock().expect("lock").clone();
        history.ok_or(ApiError::Status { status: 500, message: "history unavailable".to_owned() })
    }

    async fn send_message(&self, request: &SendMessageRequest) -> Result<Option<ChatMessage>, ApiError> {
        self.sent.lock().expect("lock").push(request.clone());
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ApiError::Status { status: 503, message: "unavailable".to_owned() });
        }
        let n = self.sent_count();
        Ok(Some(ChatMessage {
            id: format!("rest-{n}"),
            user_id: "me".to_owned(),
            user_name: "Me".to_owned(),
            user_role: UserRole::Donor,
            message: request.message.clone(),
            timestamp: String::new(),
            room_id: Some(request.room_id.clone()),
        }))
    }

    async fn active_rooms(&self) -> Result<Vec<ActiveRoom>, ApiError> {
        Ok(Vec::new())
    }
}
