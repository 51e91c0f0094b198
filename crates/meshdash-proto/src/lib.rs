// SPDX-License-Identifier: Apache-2.0
//! Domain model for the meshdash coordinator API (nodes, jobs, cluster
//! aggregates) plus the server-sent-event framing used by the node update
//! stream.
//!
//! Everything here is JSON on the wire; the coordinator is the authority
//! for every field. Clients replace node records wholesale on each
//! snapshot; only `NodeIdentity` is immutable once created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod sse;

/// Default coordinator base address when no override is configured.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Task categories a node can execute.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    /// Model inference requests.
    Inference,
    /// Embedding generation.
    Embeddings,
    /// Index build/maintenance work.
    Index,
    /// Tokenization batches.
    Tokenize,
    /// Dataset preprocessing.
    Preprocess,
}

impl TaskType {
    /// All task types, in canonical order.
    pub const ALL: [Self; 5] = [
        Self::Inference,
        Self::Embeddings,
        Self::Index,
        Self::Tokenize,
        Self::Preprocess,
    ];
}

/// Scheduling bias an operator can assign to a node.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RolePreference {
    /// No bias; the scheduler decides.
    #[default]
    Auto,
    /// Prefer routing inference work here.
    PreferInference,
    /// Prefer routing embedding work here.
    PreferEmbeddings,
}

/// Derived liveness classification of a node.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    /// Registered but no heartbeat observed yet.
    #[default]
    Unknown,
    /// Heartbeating within the staleness window.
    Online,
    /// Heartbeat missing past the staleness window.
    Offline,
}

/// Stable identity of a node. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeIdentity {
    /// Unique node identifier.
    pub node_id: String,
    /// Human-readable name.
    pub display_name: String,
    /// Reachable address of the agent.
    pub ip: String,
    /// Agent port.
    pub port: u16,
}

/// Static hardware/task facts reported at registration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeCapabilities {
    /// Task types this node accepts.
    #[serde(default)]
    pub task_types: Vec<TaskType>,
    /// Free-form operator labels.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Whether a GPU is present.
    #[serde(default)]
    pub has_gpu: bool,
    /// Physical CPU cores.
    #[serde(default)]
    pub cpu_cores: Option<u32>,
    /// Logical CPU threads.
    #[serde(default)]
    pub cpu_threads: Option<u32>,
    /// Total RAM in GiB.
    #[serde(default)]
    pub ram_total_gb: Option<f64>,
    /// GPU model name, if any.
    #[serde(default)]
    pub gpu_name: Option<String>,
    /// Total VRAM in GiB, if any.
    #[serde(default)]
    pub vram_total_gb: Option<f64>,
    /// Operating system.
    #[serde(default)]
    pub os: Option<String>,
    /// CPU architecture.
    #[serde(default)]
    pub arch: Option<String>,
}

/// Live measurements from the most recent heartbeat.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeMetrics {
    /// CPU utilization in percent.
    #[serde(default)]
    pub cpu_percent: f64,
    /// RAM in use, GiB.
    #[serde(default)]
    pub ram_used_gb: f64,
    /// RAM utilization in percent.
    #[serde(default)]
    pub ram_percent: f64,
    /// GPU utilization in percent, if a GPU is present.
    #[serde(default)]
    pub gpu_percent: Option<f64>,
    /// VRAM in use, GiB, if a GPU is present.
    #[serde(default)]
    pub vram_used_gb: Option<f64>,
    /// Jobs currently running on the node.
    #[serde(default)]
    pub running_jobs: u32,
    /// Timestamp of the heartbeat that produced this sample.
    #[serde(default)]
    pub heartbeat_ts: Option<DateTime<Utc>>,
}

/// Operator-controlled scheduling constraints. Percent caps are 0..=100.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodePolicy {
    /// Whether the node accepts new work at all.
    pub enabled: bool,
    /// CPU utilization ceiling in percent.
    pub cpu_cap_percent: u8,
    /// GPU utilization ceiling in percent.
    #[serde(default)]
    pub gpu_cap_percent: Option<u8>,
    /// RAM utilization ceiling in percent.
    pub ram_cap_percent: u8,
    /// Task types the node may be assigned.
    #[serde(default)]
    pub task_allowlist: Vec<TaskType>,
    /// Scheduling bias.
    #[serde(default)]
    pub role_preference: RolePreference,
}

impl Default for NodePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            cpu_cap_percent: 100,
            gpu_cap_percent: Some(100),
            ram_cap_percent: 100,
            task_allowlist: TaskType::ALL.to_vec(),
            role_preference: RolePreference::Auto,
        }
    }
}

/// One managed compute endpoint as the coordinator sees it.
///
/// `identity` is immutable; every other field is replaced wholesale each
/// time the coordinator returns the node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Stable identity.
    pub identity: NodeIdentity,
    /// Static facts from registration.
    pub capabilities: NodeCapabilities,
    /// Latest heartbeat measurements.
    pub metrics: NodeMetrics,
    /// Operator policy.
    pub policy: NodePolicy,
    /// Derived liveness.
    pub status: NodeStatus,
    /// Last heartbeat arrival time.
    pub last_seen: DateTime<Utc>,
    /// Record creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// Shorthand for the node's unique identifier.
    pub fn id(&self) -> &str {
        &self.identity.node_id
    }
}

/// Advisory change notification emitted on the node update stream.
///
/// Carries the fields that changed, but it is a trigger, not a patch:
/// consumers re-fetch the authoritative snapshot instead of merging these
/// fields into local state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeUpdateEvent {
    /// Node that changed.
    pub node_id: String,
    /// Status at event time.
    pub status: NodeStatus,
    /// Metrics at event time.
    pub metrics: NodeMetrics,
    /// Mutation time on the coordinator.
    pub updated_at: DateTime<Utc>,
}

/// Single-node read with optional bounded metrics history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeDetail {
    /// The node record.
    pub node: Node,
    /// Recent metrics samples, newest last; present only when requested.
    #[serde(default)]
    pub metrics_history: Option<Vec<NodeMetrics>>,
}

/// Fleet-wide aggregate counters for the dashboard header.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClusterSummary {
    /// All registered nodes.
    pub total_nodes: u64,
    /// Nodes currently online.
    pub online_nodes: u64,
    /// Nodes currently offline.
    pub offline_nodes: u64,
    /// Sum of policy-capped CPU threads across online nodes.
    pub total_effective_cpu_threads: f64,
    /// Sum of policy-capped RAM across online nodes, GiB.
    pub total_effective_ram_gb: f64,
    /// Sum of policy-capped VRAM across online nodes, GiB.
    pub total_effective_vram_gb: f64,
    /// Running jobs across the fleet.
    pub active_running_jobs_total: u64,
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Accepted, waiting for assignment.
    #[default]
    Queued,
    /// Executing on a node.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Cancelled before completion.
    Cancelled,
}

/// One unit of scheduled work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    /// Unique job identifier.
    pub id: String,
    /// Task category.
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// Lifecycle state.
    pub status: JobStatus,
    /// Opaque reference to the job payload, if any.
    #[serde(default)]
    pub payload_ref: Option<String>,
    /// Node the job was assigned to, if any.
    #[serde(default)]
    pub assigned_node_id: Option<String>,
    /// Scheduling attempts so far.
    #[serde(default)]
    pub attempts: u32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
    /// Execution start time, if started.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Completion time, if finished.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure detail, if failed.
    #[serde(default)]
    pub error: Option<String>,
}

/// Request body for creating a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobCreateRequest {
    /// Task category to run.
    pub task_type: TaskType,
    /// Opaque payload reference, if any.
    #[serde(default)]
    pub payload_ref: Option<String>,
}

/// Request body for a job status transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobStatusUpdate {
    /// Target lifecycle state.
    pub status: JobStatus,
    /// Failure detail when transitioning to `Failed`.
    #[serde(default)]
    pub error: Option<String>,
}
