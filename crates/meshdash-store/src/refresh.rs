// SPDX-License-Identifier: Apache-2.0
//! Shared engine state and the single-flight snapshot refresh.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::ports::NodeAuthority;
use crate::state::StoreState;

/// Owns the store state and the authority for one subscription.
///
/// All mutation funnels through [`mutate`](Self::mutate), which publishes
/// to watchers synchronously and is gated on subscription liveness so a
/// late-arriving completion can never touch a disposed store.
pub(crate) struct Coordinator<A> {
    state: watch::Sender<StoreState>,
    authority: A,
    in_flight: AtomicBool,
    active: AtomicBool,
}

impl<A> Coordinator<A> {
    pub(crate) fn new(authority: A) -> Arc<Self> {
        let (state, _) = watch::channel(StoreState::initial());
        Arc::new(Self {
            state,
            authority,
            in_flight: AtomicBool::new(false),
            active: AtomicBool::new(true),
        })
    }

    pub(crate) fn authority(&self) -> &A {
        &self.authority
    }

    pub(crate) fn snapshot(&self) -> StoreState {
        self.state.borrow().clone()
    }

    pub(crate) fn watch(&self) -> watch::Receiver<StoreState> {
        self.state.subscribe()
    }

    /// Stop accepting mutations. Called once at teardown.
    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Apply `f` to the state and notify watchers, unless the
    /// subscription has been torn down. Returns whether it ran.
    pub(crate) fn mutate(&self, f: impl FnOnce(&mut StoreState)) -> bool {
        if !self.is_active() {
            return false;
        }
        self.state.send_modify(f);
        true
    }
}

impl<A: NodeAuthority> Coordinator<A> {
    /// Fetch the authoritative snapshot and replace the mirror wholesale.
    ///
    /// Single-flight: a call arriving while another fetch is outstanding
    /// returns immediately without touching the network; the dropped
    /// trigger's cause is picked up by a later tick or notification. On
    /// failure the stale collection is kept and only `error` is set.
    /// Either way `loading` clears once the first call completes.
    pub(crate) async fn refresh(&self) {
        if !self.is_active() {
            return;
        }
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!("refresh already in flight; dropping trigger");
            return;
        }
        let result = self.authority.fetch_nodes().await;
        match result {
            Ok(nodes) => {
                self.mutate(|s| {
                    s.nodes = nodes;
                    s.error = None;
                    s.loading = false;
                });
            }
            Err(err) => {
                warn!(%err, "node snapshot fetch failed");
                self.mutate(|s| {
                    s.error = Some(format!("failed to refresh nodes: {err}"));
                    s.loading = false;
                });
            }
        }
        self.in_flight.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::TransportError;
    use crate::state::TransportMode;
    use meshdash_proto::{
        Node, NodeCapabilities, NodeIdentity, NodeMetrics, NodePolicy, NodeStatus,
    };
    use std::future::Future;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    fn node(id: &str) -> Node {
        let ts = chrono::Utc::now();
        Node {
            identity: NodeIdentity {
                node_id: id.to_string(),
                display_name: id.to_string(),
                ip: "10.0.0.1".to_string(),
                port: 7001,
            },
            capabilities: NodeCapabilities::default(),
            metrics: NodeMetrics::default(),
            policy: NodePolicy::default(),
            status: NodeStatus::Online,
            last_seen: ts,
            created_at: ts,
            updated_at: ts,
        }
    }

    /// Scripted authority: pops one canned response per fetch, counts
    /// calls, and optionally blocks until released.
    struct Scripted {
        responses: Mutex<Vec<Result<Vec<Node>, TransportError>>>,
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<Vec<Node>, TransportError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
                gate: None,
            }
        }

        fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn pop(&self) -> Result<Vec<Node>, TransportError> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(Vec::new())
            } else {
                responses.remove(0)
            }
        }
    }

    impl NodeAuthority for Arc<Scripted> {
        fn fetch_nodes(&self) -> impl Future<Output = Result<Vec<Node>, TransportError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.gate.clone();
            let result = self.pop();
            async move {
                if let Some(gate) = gate {
                    gate.notified().await;
                }
                result
            }
        }

        fn update_policy(
            &self,
            _node_id: &str,
            _policy: &NodePolicy,
        ) -> impl Future<Output = Result<Node, TransportError>> + Send {
            async move { Err(TransportError::Status(501)) }
        }
    }

    #[tokio::test]
    async fn refresh_replaces_nodes_wholesale() {
        let scripted = Arc::new(Scripted::new(vec![
            Ok(vec![node("a"), node("b")]),
            Ok(vec![node("b")]),
        ]));
        let core = Coordinator::new(scripted);

        core.refresh().await;
        let state = core.snapshot();
        assert!(!state.loading);
        assert_eq!(state.nodes.len(), 2);

        // Second snapshot is not merged into the first.
        core.refresh().await;
        let state = core.snapshot();
        assert_eq!(state.nodes.len(), 1);
        assert_eq!(state.nodes[0].id(), "b");
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_stale_nodes_and_sets_error() {
        let scripted = Arc::new(Scripted::new(vec![
            Ok(vec![node("a")]),
            Err(TransportError::Status(502)),
        ]));
        let core = Coordinator::new(scripted);

        core.refresh().await;
        core.refresh().await;

        let state = core.snapshot();
        assert_eq!(state.nodes.len(), 1, "stale nodes preferred over empty");
        assert!(state.error.as_deref().unwrap().contains("502"));
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn overlapping_refreshes_fetch_once() {
        let gate = Arc::new(Notify::new());
        let scripted = Arc::new(Scripted::new(vec![Ok(vec![node("a")])]).gated(gate.clone()));
        let core = Coordinator::new(scripted.clone());

        let first = tokio::spawn({
            let core = core.clone();
            async move { core.refresh().await }
        });
        tokio::task::yield_now().await;
        assert_eq!(scripted.calls(), 1);

        // These arrive while the first fetch is outstanding: dropped, not
        // queued, and they return without blocking.
        core.refresh().await;
        core.refresh().await;
        assert_eq!(scripted.calls(), 1);

        gate.notify_one();
        first.await.unwrap();
        assert_eq!(core.snapshot().nodes.len(), 1);

        // Once the window closes, refreshes fetch again.
        core.refresh().await;
        assert_eq!(scripted.calls(), 2);
    }

    #[tokio::test]
    async fn late_completion_after_teardown_is_discarded() {
        let gate = Arc::new(Notify::new());
        let scripted = Arc::new(Scripted::new(vec![Ok(vec![node("a")])]).gated(gate.clone()));
        let core = Coordinator::new(scripted);

        let pending = tokio::spawn({
            let core = core.clone();
            async move { core.refresh().await }
        });
        tokio::task::yield_now().await;

        core.deactivate();
        gate.notify_one();
        pending.await.unwrap();

        let state = core.snapshot();
        assert!(state.nodes.is_empty(), "disposed store must stay untouched");
        assert!(state.loading);
        assert_eq!(state.mode, TransportMode::Connecting);
    }
}
