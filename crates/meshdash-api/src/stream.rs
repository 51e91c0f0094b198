// SPDX-License-Identifier: Apache-2.0
//! SSE push channel: adapts the coordinator's `/v1/stream/nodes` event
//! stream to the store engine's `PushChannel` port.
//!
//! Each `open()` spawns one reader task that owns the HTTP connection,
//! feeds decoded events to the handle, and reports the first failure
//! (transport, status, or payload decode) as a single `Lost` event.
//! Retry policy belongs to the caller; the reader never reconnects.

use futures_util::StreamExt;
use meshdash_proto::sse::{decode_node_update, SseDecoder, NODE_UPDATE_EVENT};
use meshdash_store::{PushChannel, PushEvent, PushHandle};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

/// Buffered events per open connection; the engine drains promptly, so a
/// small buffer suffices.
const EVENT_BUFFER: usize = 64;

/// Push channel over HTTP server-sent events.
#[derive(Debug, Clone)]
pub struct HttpPushChannel {
    http: reqwest::Client,
    url: String,
}

impl HttpPushChannel {
    /// Channel for the stream endpoint at `url`.
    pub fn new(http: reqwest::Client, url: String) -> Self {
        Self { http, url }
    }
}

impl PushChannel for HttpPushChannel {
    fn open(&self) -> PushHandle {
        let (events, receiver) = mpsc::channel(EVENT_BUFFER);
        let (stop, stop_rx) = oneshot::channel();
        let http = self.http.clone();
        let url = self.url.clone();
        tokio::spawn(run_reader(http, url, events, stop_rx));
        PushHandle::new(receiver, stop)
    }
}

/// Drive one connection until it fails or the handle is disposed.
async fn run_reader(
    http: reqwest::Client,
    url: String,
    events: mpsc::Sender<PushEvent>,
    mut stop: oneshot::Receiver<()>,
) {
    debug!(url = %url, "opening node update stream");
    let outcome = tokio::select! {
        outcome = read_events(&http, &url, &events) => outcome,
        // Handle disposed: drop the connection, deliver nothing further.
        _ = &mut stop => return,
    };
    if let Err(reason) = outcome {
        debug!(reason = %reason, "node update stream lost");
        let _ = events.send(PushEvent::Lost(reason)).await;
    }
}

/// Returns `Ok(())` only when the consumer went away; every channel-level
/// failure (including payload decode) is an `Err` with the reason.
async fn read_events(
    http: &reqwest::Client,
    url: &str,
    events: &mpsc::Sender<PushEvent>,
) -> Result<(), String> {
    let response = http
        .get(url)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await
        .map_err(|err| format!("connect failed: {err}"))?;
    if !response.status().is_success() {
        return Err(format!("unexpected status {}", response.status().as_u16()));
    }

    let mut body = response.bytes_stream();
    let mut decoder = SseDecoder::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|err| format!("stream read failed: {err}"))?;
        for event in decoder.feed(&chunk) {
            if event.name.as_deref() != Some(NODE_UPDATE_EVENT) {
                trace!(name = ?event.name, "skipping unrecognized stream event");
                continue;
            }
            let update =
                decode_node_update(&event).map_err(|err| format!("bad notification: {err}"))?;
            if events.send(PushEvent::Update(update)).await.is_err() {
                return Ok(());
            }
        }
    }
    Err("stream closed by server".to_string())
}
