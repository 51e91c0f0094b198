// SPDX-License-Identifier: Apache-2.0
//! Public store facade: mount, observe, refresh, mutate, dispose.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use meshdash_proto::NodePolicy;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::ports::{NodeAuthority, PushChannel};
use crate::refresh::Coordinator;
use crate::state::StoreState;
use crate::supervisor;

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Fallback poll period once the push channel is lost.
    pub poll_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(3000),
        }
    }
}

/// A mounted node store: one subscription's mirror of the fleet.
///
/// Owns the store state, the push connection and the fallback timer for
/// its lifetime. Dropping the store (or calling
/// [`dispose`](Self::dispose)) detaches everything deterministically;
/// in-flight request completions are discarded rather than applied to the
/// disposed state.
pub struct NodeStore<A> {
    core: Arc<Coordinator<A>>,
    shutdown: watch::Sender<bool>,
    supervisor: Option<JoinHandle<()>>,
}

impl<A: NodeAuthority> NodeStore<A> {
    /// Start a subscription: open the push channel, trigger the first
    /// snapshot fetch, and hand back the observable store.
    ///
    /// The state begins `{nodes: [], loading: true, mode: Connecting}`.
    /// Each store is independent; mounting twice yields two isolated
    /// mirrors.
    pub fn mount<C: PushChannel>(authority: A, channel: &C, config: SyncConfig) -> Self {
        let core = Coordinator::new(authority);
        let listener = channel.open();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(supervisor::run(
            Arc::clone(&core),
            listener,
            shutdown_rx,
            config.poll_interval,
        ));
        Self {
            core,
            shutdown,
            supervisor: Some(task),
        }
    }

    /// Current state, cloned.
    pub fn snapshot(&self) -> StoreState {
        self.core.snapshot()
    }

    /// Observe state changes. Every mutation is published synchronously;
    /// a receiver always sees the latest state.
    pub fn watch(&self) -> watch::Receiver<StoreState> {
        self.core.watch()
    }

    /// Re-fetch the authoritative snapshot now. Collapses into an
    /// already-outstanding fetch instead of stacking requests.
    pub async fn refresh(&self) {
        self.core.refresh().await;
    }

    /// Apply a policy change: the local mirror is patched before this
    /// function returns, then the returned future performs the remote
    /// write and reconciles.
    ///
    /// On a confirmed write the server's node (which may differ from the
    /// submitted policy, e.g. clamped caps) replaces the optimistic
    /// value. On failure the error is surfaced and one refresh discards
    /// the unconfirmed patch. Reconciliation is purely re-fetch; there
    /// is no local rollback. Concurrent writes to the same node are not
    /// serialized; the last server response wins.
    pub fn apply_policy(
        &self,
        node_id: &str,
        policy: NodePolicy,
    ) -> impl Future<Output = ()> + Send + 'static {
        let node_id = node_id.to_string();
        let mut patched = false;
        self.core.mutate(|s| patched = s.patch_policy(&node_id, &policy));
        if !patched {
            // Non-fatal: the write below may still succeed on the server.
            debug!(node_id = %node_id, "policy target not in local mirror");
        }

        let core = Arc::clone(&self.core);
        async move {
            match core.authority().update_policy(&node_id, &policy).await {
                Ok(node) => {
                    core.mutate(|s| s.upsert_node(node));
                }
                Err(err) => {
                    warn!(%err, node_id = %node_id, "policy write failed; reconciling");
                    core.mutate(|s| {
                        s.error = Some(format!("policy update for {node_id} failed: {err}"));
                    });
                    core.refresh().await;
                }
            }
        }
    }

    /// End the subscription: stop accepting mutations, stop the
    /// supervisor, release the push connection and the fallback timer.
    pub fn dispose(self) {
        drop(self);
    }
}

impl<A> Drop for NodeStore<A> {
    fn drop(&mut self) {
        self.core.deactivate();
        let _ = self.shutdown.send(true);
        // The supervisor exits on the shutdown signal; the handle is kept
        // only so the task is not silently detached before that.
        self.supervisor.take();
    }
}
