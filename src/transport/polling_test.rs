use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use tokio::time::timeout;

use super::*;
use crate::test_support::{init_tracing, spawn_server};

#[derive(Default)]
struct PollServer {
    queued: Mutex<VecDeque<Frame>>,
    received: Mutex<Vec<Frame>>,
    deleted: Mutex<bool>,
    expired: Mutex<bool>,
}

type Shared = Arc<PollServer>;

fn authorized(headers: &HeaderMap) -> bool {
    headers.get("authorization").and_then(|v| v.to_str().ok()) == Some("Bearer secret")
}

async fn open_session(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({ "connectionId": "poll-1" })).into_response()
}

async fn poll(State(server): State<Shared>, Path(id): Path<String>) -> Response {
    if id != "poll-1" || *server.expired.lock().expect("lock") {
        return StatusCode::GONE.into_response();
    }
    let batch: Vec<Frame> = server.queued.lock().expect("lock").drain(..).collect();
    if batch.is_empty() {
        tokio::time::sleep(Duration::from_millis(20)).await;
        return StatusCode::NO_CONTENT.into_response();
    }
    Json(batch).into_response()
}

async fn deliver(State(server): State<Shared>, Json(batch): Json<Vec<Frame>>) -> StatusCode {
    for frame in batch {
        if frame.event == "join-room" {
            server
                .queued
                .lock()
                .expect("lock")
                .push_back(Frame::new("room-joined", json!({ "roomId": frame.data["roomId"] })));
        }
        server.received.lock().expect("lock").push(frame);
    }
    StatusCode::NO_CONTENT
}

async fn close_session(State(server): State<Shared>) -> StatusCode {
    *server.deleted.lock().expect("lock") = true;
    StatusCode::NO_CONTENT
}

async fn start() -> (Shared, PollingConnector) {
    init_tracing();
    let server: Shared = Arc::new(PollServer::default());
    let app = Router::new()
        .route("/realtime/poll", post(open_session))
        .route("/realtime/poll/{id}", post(deliver).get(poll).delete(close_session))
        .with_state(server.clone());
    let base = spawn_server(app).await;
    (server, PollingConnector::new(base, Duration::from_secs(5), Duration::from_secs(1)))
}

#[tokio::test]
async fn connect_opens_session_and_exchanges_frames() {
    let (server, connector) = start().await;

    let mut link = connector.connect("secret").await.expect("connect");
    assert_eq!(link.connection_id, "poll-1");
    assert_eq!(link.kind, TransportKind::Polling);

    let join = crate::events::ClientEvent::JoinRoom {
        room_id: "room_c1".into(),
        user_id: "u1".into(),
        user_token: "secret".into(),
    };
    link.outbound.send(join.to_frame()).expect("outbound open");

    let ack = timeout(Duration::from_secs(3), link.inbound.recv()).await.expect("ack in time").expect("ack");
    assert_eq!(ack.event, "room-joined");
    assert_eq!(ack.data["roomId"], "room_c1");
    assert_eq!(server.received.lock().expect("lock").len(), 1);
}

#[tokio::test]
async fn unauthorized_session_is_refused() {
    let (_server, connector) = start().await;
    let err = connector.connect("wrong").await.expect_err("refused");
    assert!(matches!(err, TransportError::Refused(ref status) if status == "HTTP 401"));
}

#[tokio::test]
async fn dropping_outbound_deletes_session_and_ends_inbound() {
    let (server, connector) = start().await;
    let Link { outbound, mut inbound, .. } = connector.connect("secret").await.expect("connect");

    drop(outbound);
    let end = timeout(Duration::from_secs(3), inbound.recv()).await.expect("closed in time");
    assert!(end.is_none());

    // The delete is issued before the poller is told to stop.
    assert!(*server.deleted.lock().expect("lock"));
}

#[tokio::test]
async fn expired_session_ends_inbound() {
    let (server, connector) = start().await;
    let mut link = connector.connect("secret").await.expect("connect");

    *server.expired.lock().expect("lock") = true;
    let end = timeout(Duration::from_secs(3), link.inbound.recv()).await.expect("closed in time");
    assert!(end.is_none());
}

#[tokio::test]
async fn invalid_base_url_is_rejected_before_io() {
    let connector = PollingConnector::new("ftp://nowhere", Duration::from_secs(1), Duration::from_secs(1));
    let err = connector.connect("secret").await.expect_err("invalid url");
    assert!(matches!(err, TransportError::InvalidUrl(_)));
}
