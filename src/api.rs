//! REST chat endpoints.
//!
//! Thin reqwest wrapper for the `/chat` routes. Response bodies are parsed by
//! the pure `parse_*` functions so they can be tested without a server.
//! [`ChatApi`] is the seam sessions and views depend on.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::ChatConfig;
use crate::credentials::{TokenStore, credential_token};
use crate::types::{ActiveRoom, ChatMessage, ChatRoom, MessageType, RoomEntity};

/// Error type for REST calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request could not be sent or its body could not be read.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The response lacked a field the caller needs.
    #[error("response missing field: {0}")]
    MissingField(&'static str),

    /// The response body was not the expected JSON.
    #[error("invalid response body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The REST base URL cannot carry endpoint paths.
    #[error("invalid API base URL: {0}")]
    InvalidUrl(String),
}

/// Body of `POST /chat/messages`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub room_id: String,
    pub message: String,
    pub message_type: MessageType,
}

#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Resolve (and join) the room for a campaign or charity.
    async fn join_room(&self, entity: &RoomEntity) -> Result<ChatRoom, ApiError>;

    /// One page of history, in the order the server returns it.
    async fn fetch_messages(&self, room_id: &str, page: u32, limit: u32) -> Result<Vec<ChatMessage>, ApiError>;

    /// Send a message. Returns the stored message when the server echoes it.
    async fn send_message(&self, request: &SendMessageRequest) -> Result<Option<ChatMessage>, ApiError>;

    async fn active_rooms(&self) -> Result<Vec<ActiveRoom>, ApiError>;
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct RestChatApi {
    http: reqwest::Client,
    base_url: Url,
    tokens: Arc<dyn TokenStore>,
}

impl std::fmt::Debug for RestChatApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestChatApi").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}

impl RestChatApi {
    pub fn new(
        base_url: impl Into<String>,
        tokens: Arc<dyn TokenStore>,
        connect_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let raw = base_url.into();
        let base_url = Url::parse(&raw).map_err(|_| ApiError::InvalidUrl(raw.clone()))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(raw));
        }
        let http = reqwest::Client::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self { http, base_url, tokens })
    }

    pub fn from_config(config: &ChatConfig, tokens: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        Self::new(config.api_base_url.clone(), tokens, config.connect_timeout)
    }

    /// The base URL extended by `segments`, each percent-encoded as one
    /// path segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: reqwest::Method, segments: &[&str]) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, self.endpoint(segments));
        match credential_token(self.tokens.as_ref()) {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn execute(&self, builder: reqwest::RequestBuilder) -> Result<String, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Status { status: status.as_u16(), message: error_message(&text, status) });
        }
        Ok(text)
    }
}

#[async_trait]
impl ChatApi for RestChatApi {
    async fn join_room(&self, entity: &RoomEntity) -> Result<ChatRoom, ApiError> {
        debug!(%entity, "chat: resolving room");
        let segments = ["chat", entity.kind(), entity.id(), "join"];
        let text = self.execute(self.request(reqwest::Method::POST, &segments)).await?;
        parse_join_response(&text, entity)
    }

    async fn fetch_messages(&self, room_id: &str, page: u32, limit: u32) -> Result<Vec<ChatMessage>, ApiError> {
        let builder = self
            .request(reqwest::Method::GET, &["chat", "messages", room_id])
            .query(&[("page", page), ("limit", limit)]);
        let text = self.execute(builder).await?;
        parse_messages(&text)
    }

    async fn send_message(&self, request: &SendMessageRequest) -> Result<Option<ChatMessage>, ApiError> {
        let builder = self.request(reqwest::Method::POST, &["chat", "messages"]).json(request);
        let text = self.execute(builder).await?;
        Ok(parse_sent_message(&text))
    }

    async fn active_rooms(&self) -> Result<Vec<ActiveRoom>, ApiError> {
        let text = self.execute(self.request(reqwest::Method::GET, &["chat", "rooms", "active"])).await?;
        parse_active_rooms(&text)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinData {
    room_id: Option<String>,
    campaign: Option<Named>,
    charity: Option<Named>,
}

#[derive(Deserialize)]
struct Named {
    title: Option<String>,
    name: Option<String>,
}

impl Named {
    fn label(self) -> Option<String> {
        self.title.or(self.name)
    }
}

// =============================================================================
// PARSING
// =============================================================================

fn parse_join_response(json: &str, entity: &RoomEntity) -> Result<ChatRoom, ApiError> {
    let envelope: Envelope<JoinData> = serde_json::from_str(json)?;
    let data = envelope.data.ok_or(ApiError::MissingField("data"))?;
    let room_id = data.room_id.filter(|id| !id.is_empty()).ok_or(ApiError::MissingField("data.roomId"))?;
    let title = match entity {
        RoomEntity::Campaign(_) => data.campaign.and_then(Named::label),
        RoomEntity::Charity(_) => data.charity.and_then(Named::label),
    };
    Ok(ChatRoom { room_id, entity: entity.clone(), title })
}

fn parse_messages(json: &str) -> Result<Vec<ChatMessage>, ApiError> {
    let envelope: Envelope<Vec<ChatMessage>> = serde_json::from_str(json)?;
    Ok(envelope.data.unwrap_or_default())
}

/// The echoed message, if the body carries a well-formed one.
fn parse_sent_message(json: &str) -> Option<ChatMessage> {
    let envelope: Envelope<Value> = serde_json::from_str(json).ok()?;
    serde_json::from_value(envelope.data?).ok()
}

fn parse_active_rooms(json: &str) -> Result<Vec<ActiveRoom>, ApiError> {
    let envelope: Envelope<Vec<ActiveRoom>> = serde_json::from_str(json)?;
    Ok(envelope.data.unwrap_or_default())
}

/// The server's `message` field when present, else the status reason.
fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_owned())
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
