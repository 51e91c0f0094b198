// SPDX-License-Identifier: Apache-2.0
//! Store state owned by one subscription.

use meshdash_proto::{Node, NodePolicy};

/// How freshness is currently being obtained. Surfaced to observers;
/// never used to gate correctness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransportMode {
    /// Push channel opening; no notification received yet.
    #[default]
    Connecting,
    /// Push channel live; notifications drive refreshes.
    Push,
    /// Push channel lost; a fixed-interval timer drives refreshes.
    Poll,
}

/// The mirrored view of the fleet, one instance per subscription.
///
/// Mutated only by the refresh path and the optimistic mutator; observers
/// see each mutation as a whole (never a partial snapshot).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreState {
    /// Current node collection, insertion-ordered, unique by identity.
    pub nodes: Vec<Node>,
    /// True until the first refresh completes (successfully or not).
    pub loading: bool,
    /// Human-readable message from the most recent failure, if any.
    pub error: Option<String>,
    /// Current freshness transport.
    pub mode: TransportMode,
}

impl StoreState {
    /// State at subscription start: empty, loading, connecting.
    pub(crate) fn initial() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }

    /// Replace the node matching `node`'s identity in place, preserving
    /// its position; append when the identity is unseen.
    pub(crate) fn upsert_node(&mut self, node: Node) {
        match self.nodes.iter_mut().find(|n| n.id() == node.id()) {
            Some(slot) => *slot = node,
            None => self.nodes.push(node),
        }
    }

    /// Overwrite the policy of the node with `node_id`, leaving every
    /// other field and the node's position untouched. Returns false when
    /// the identity is not mirrored locally.
    pub(crate) fn patch_policy(&mut self, node_id: &str, policy: &NodePolicy) -> bool {
        match self.nodes.iter_mut().find(|n| n.id() == node_id) {
            Some(node) => {
                node.policy = policy.clone();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use meshdash_proto::{NodeCapabilities, NodeIdentity, NodeMetrics, NodeStatus};

    fn node(id: &str) -> Node {
        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
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

    #[test]
    fn upsert_replaces_in_place_and_appends_unseen() {
        let mut state = StoreState {
            nodes: vec![node("a"), node("b"), node("c")],
            ..StoreState::default()
        };

        let mut replacement = node("b");
        replacement.metrics.running_jobs = 7;
        state.upsert_node(replacement);
        let ids: Vec<&str> = state.nodes.iter().map(Node::id).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(state.nodes[1].metrics.running_jobs, 7);

        state.upsert_node(node("d"));
        let ids: Vec<&str> = state.nodes.iter().map(Node::id).collect();
        assert_eq!(ids, ["a", "b", "c", "d"]);
    }

    #[test]
    fn patch_policy_touches_only_the_policy() {
        let mut state = StoreState {
            nodes: vec![node("a"), node("b")],
            ..StoreState::default()
        };
        let before = state.nodes[1].metrics.clone();

        let policy = NodePolicy {
            enabled: false,
            ..NodePolicy::default()
        };
        assert!(state.patch_policy("b", &policy));
        assert!(!state.nodes[1].policy.enabled);
        assert_eq!(state.nodes[1].metrics, before);
        assert!(state.nodes[0].policy.enabled);

        assert!(!state.patch_policy("missing", &policy));
    }
}
