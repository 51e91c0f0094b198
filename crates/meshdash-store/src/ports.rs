// SPDX-License-Identifier: Apache-2.0
//! Ports the engine talks through: the remote authority for reads/writes
//! and the push channel for change notifications. Transport crates
//! implement these; tests script them.

use std::future::Future;

use meshdash_proto::{Node, NodePolicy, NodeUpdateEvent};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Failure of an authoritative request.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),
    /// The server answered with a non-success status.
    #[error("unexpected status {0}")]
    Status(u16),
    /// The response body was not a valid payload.
    #[error("malformed payload: {0}")]
    Decode(String),
}

/// Authoritative source of node state.
///
/// `fetch_nodes` must be side-effect-free on failure and safe to call
/// concurrently; the engine's single-flight guard normally ensures it is
/// not.
pub trait NodeAuthority: Send + Sync + 'static {
    /// Read the full node collection.
    fn fetch_nodes(&self) -> impl Future<Output = Result<Vec<Node>, TransportError>> + Send;

    /// Write a node's policy; the response is the authoritative node,
    /// which may differ from what was submitted (server-side clamping).
    fn update_policy(
        &self,
        node_id: &str,
        policy: &NodePolicy,
    ) -> impl Future<Output = Result<Node, TransportError>> + Send;
}

/// One event delivered by an open push channel.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// A node changed. Advisory only: triggers a refresh, never a merge.
    Update(NodeUpdateEvent),
    /// The channel is no longer usable. Emitted at most once per open.
    Lost(String),
}

/// A long-lived notification stream.
pub trait PushChannel: Send + Sync + 'static {
    /// Open one streaming connection.
    fn open(&self) -> PushHandle;
}

/// Handle to an open push connection.
///
/// Dropping or [`dispose`](Self::dispose)-ing the handle releases the
/// underlying connection; no events are observable afterwards.
#[derive(Debug)]
pub struct PushHandle {
    events: mpsc::Receiver<PushEvent>,
    stop: Option<oneshot::Sender<()>>,
}

impl PushHandle {
    /// Assemble a handle from the event receiver and the stop signal the
    /// producing task listens on.
    pub fn new(events: mpsc::Receiver<PushEvent>, stop: oneshot::Sender<()>) -> Self {
        Self {
            events,
            stop: Some(stop),
        }
    }

    /// Wait for the next event. `None` once the producer is gone.
    pub async fn next_event(&mut self) -> Option<PushEvent> {
        self.events.recv().await
    }

    /// Release the connection. Idempotent.
    pub fn dispose(&mut self) {
        // Dropping the stop sender halts the producer; closing the
        // receiver makes any racing send fail instead of being buffered.
        self.stop.take();
        self.events.close();
    }
}

impl Drop for PushHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}
