//! HTTP long-polling transport, used when a websocket cannot be established.
//!
//! DESIGN
//! ======
//! - `POST {realtime}/realtime/poll` opens a session and returns its id.
//! - A poller task holds `GET …/poll/{id}?wait=N` open and forwards every
//!   frame of the JSON batch it receives (204 means nothing arrived).
//! - A sender task batches queued outbound frames into `POST …/poll/{id}`.
//! - When the client drops its sender, the session is deleted and the poller
//!   stops. Any HTTP failure, or a 404/410 for the session, ends the link.

use std::time::Duration;

use frames::Frame;
use reqwest::StatusCode;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::{Connector, Link, TransportError, TransportKind};

pub struct PollingConnector {
    base_url: String,
    connect_timeout: Duration,
    poll_wait: Duration,
    client: reqwest::Client,
}

impl PollingConnector {
    #[must_use]
    pub fn new(base_url: impl Into<String>, connect_timeout: Duration, poll_wait: Duration) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "poll: client builder failed; using defaults");
                reqwest::Client::new()
            });
        Self { base_url: base_url.into(), connect_timeout, poll_wait, client }
    }

    fn sessions_url(&self) -> String {
        format!("{}/realtime/poll", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl Connector for PollingConnector {
    fn kind(&self) -> TransportKind {
        TransportKind::Polling
    }

    async fn connect(&self, token: &str) -> Result<Link, TransportError> {
        let sessions_url = self.sessions_url();
        if !sessions_url.starts_with("http://") && !sessions_url.starts_with("https://") {
            return Err(TransportError::InvalidUrl(self.base_url.clone()));
        }

        let request = self.client.post(&sessions_url).bearer_auth(token).send();
        let response = tokio::time::timeout(self.connect_timeout, request)
            .await
            .map_err(|_| TransportError::Timeout)??;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Refused(format!("HTTP {}", status.as_u16())));
        }

        let body = response.json::<Value>().await?;
        let connection_id = body
            .get("connectionId")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| TransportError::Handshake("poll session without connectionId".to_owned()))?;

        let session = PollSession {
            client: self.client.clone(),
            url: format!("{sessions_url}/{connection_id}"),
            token: token.to_owned(),
            connection_id: connection_id.clone(),
        };

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();

        tokio::spawn(run_sender(session.clone(), outbound_rx, stop_tx));
        tokio::spawn(run_poller(session, self.poll_wait, inbound_tx, stop_rx));

        Ok(Link { connection_id, kind: TransportKind::Polling, outbound, inbound })
    }
}

#[derive(Clone)]
struct PollSession {
    client: reqwest::Client,
    url: String,
    token: String,
    connection_id: String,
}

async fn run_sender(
    session: PollSession,
    mut outbound: mpsc::UnboundedReceiver<Frame>,
    stop: oneshot::Sender<()>,
) {
    while let Some(first) = outbound.recv().await {
        let mut batch = vec![first];
        while let Ok(frame) = outbound.try_recv() {
            batch.push(frame);
        }
        debug!(connection_id = %session.connection_id, count = batch.len(), "poll: send batch");

        let result = session
            .client
            .post(&session.url)
            .bearer_auth(&session.token)
            .json(&batch)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                warn!(connection_id = %session.connection_id, status = response.status().as_u16(), "poll: send rejected");
                break;
            }
            Err(e) => {
                warn!(connection_id = %session.connection_id, error = %e, "poll: send failed");
                break;
            }
        }
    }

    if let Err(e) = session.client.delete(&session.url).bearer_auth(&session.token).send().await {
        debug!(connection_id = %session.connection_id, error = %e, "poll: session delete failed");
    }
    drop(stop);
}

async fn run_poller(
    session: PollSession,
    wait: Duration,
    inbound: mpsc::UnboundedSender<Frame>,
    mut stop: oneshot::Receiver<()>,
) {
    let poll_url = format!("{}?wait={}", session.url, wait.as_secs());
    loop {
        let request = session.client.get(&poll_url).bearer_auth(&session.token).send();
        let response = tokio::select! {
            _ = &mut stop => break,
            () = inbound.closed() => break,
            response = request => response,
        };

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!(connection_id = %session.connection_id, error = %e, "poll: request failed");
                break;
            }
        };

        match response.status() {
            StatusCode::NO_CONTENT => continue,
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                info!(connection_id = %session.connection_id, "poll: session expired");
                break;
            }
            status if !status.is_success() => {
                warn!(connection_id = %session.connection_id, status = status.as_u16(), "poll: unexpected status");
                break;
            }
            _ => {}
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(connection_id = %session.connection_id, error = %e, "poll: body read failed");
                break;
            }
        };
        match frames::decode_text_batch(&body) {
            Ok(batch) => {
                if batch.into_iter().any(|frame| inbound.send(frame).is_err()) {
                    break;
                }
            }
            Err(e) => warn!(connection_id = %session.connection_id, error = %e, "poll: undecodable batch skipped"),
        }
    }
    info!(connection_id = %session.connection_id, "poll: session closed");
}

#[cfg(test)]
#[path = "polling_test.rs"]
mod tests;
