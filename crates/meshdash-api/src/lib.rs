// SPDX-License-Identifier: Apache-2.0
//! HTTP client for the meshdash coordinator REST API, plus the SSE push
//! channel adapter ([`stream::HttpPushChannel`]).
//!
//! [`ApiClient`] implements the store engine's [`NodeAuthority`] port, so
//! wiring the live dashboard is:
//!
//! ```no_run
//! # use meshdash_api::ApiClient;
//! # use meshdash_store::{NodeStore, SyncConfig};
//! # async fn wire() -> Result<(), meshdash_store::TransportError> {
//! let client = ApiClient::new(meshdash_proto::DEFAULT_BASE_URL)?;
//! let channel = client.push_channel();
//! let store = NodeStore::mount(client.clone(), &channel, SyncConfig::default());
//! # drop(store);
//! # Ok(())
//! # }
//! ```

use std::future::Future;

use meshdash_proto::{
    ClusterSummary, Job, JobCreateRequest, JobStatusUpdate, Node, NodeDetail, NodePolicy,
};
use meshdash_store::{NodeAuthority, TransportError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

pub mod stream;

pub use stream::HttpPushChannel;

/// Client for the coordinator's REST endpoints.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    /// Create a client for the coordinator at `base_url` (scheme + host +
    /// port, no trailing path).
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let base = base_url.trim_end_matches('/').to_string();
        if base.is_empty() {
            return Err(TransportError::Network("empty base url".to_string()));
        }
        let http = reqwest::Client::builder()
            .build()
            .map_err(|err| TransportError::Network(err.to_string()))?;
        Ok(Self { http, base })
    }

    /// The configured base address.
    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// A push channel for this coordinator's node update stream.
    pub fn push_channel(&self) -> HttpPushChannel {
        HttpPushChannel::new(self.http.clone(), format!("{}/v1/stream/nodes", self.base))
    }

    /// `GET /v1/nodes`: the full node collection, insertion-ordered.
    pub async fn list_nodes(&self) -> Result<Vec<Node>, TransportError> {
        self.get_json(format!("{}/v1/nodes", self.base)).await
    }

    /// `GET /v1/nodes/{id}`: one node, with up to `history_limit` recent
    /// metrics samples when a limit is given.
    pub async fn node_detail(
        &self,
        node_id: &str,
        history_limit: Option<u32>,
    ) -> Result<NodeDetail, TransportError> {
        let mut url = format!("{}/v1/nodes/{node_id}", self.base);
        if let Some(limit) = history_limit {
            url.push_str(&format!(
                "?include_metrics_history=true&history_limit={limit}"
            ));
        }
        self.get_json(url).await
    }

    /// `PUT /v1/nodes/{id}/policy`: write a policy; returns the
    /// authoritative updated node.
    pub async fn put_node_policy(
        &self,
        node_id: &str,
        policy: &NodePolicy,
    ) -> Result<Node, TransportError> {
        let url = format!("{}/v1/nodes/{node_id}/policy", self.base);
        debug!(node_id, "writing node policy");
        let response = self
            .http
            .put(&url)
            .json(policy)
            .send()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;
        decode_response(response).await
    }

    /// `GET /v1/cluster/summary`: fleet-wide aggregate counters.
    pub async fn cluster_summary(&self) -> Result<ClusterSummary, TransportError> {
        self.get_json(format!("{}/v1/cluster/summary", self.base))
            .await
    }

    /// `GET /v1/jobs`: all known jobs.
    pub async fn list_jobs(&self) -> Result<Vec<Job>, TransportError> {
        self.get_json(format!("{}/v1/jobs", self.base)).await
    }

    /// `POST /v1/jobs`: submit a job.
    pub async fn create_job(&self, request: &JobCreateRequest) -> Result<Job, TransportError> {
        self.post_json(format!("{}/v1/jobs", self.base), request)
            .await
    }

    /// `POST /v1/jobs/{id}/status`: transition a job's lifecycle state.
    pub async fn update_job_status(
        &self,
        job_id: &str,
        update: &JobStatusUpdate,
    ) -> Result<Job, TransportError> {
        self.post_json(format!("{}/v1/jobs/{job_id}/status", self.base), update)
            .await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, TransportError> {
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;
        decode_response(response).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        url: String,
        body: &impl Serialize,
    ) -> Result<T, TransportError> {
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;
        decode_response(response).await
    }
}

/// Map a response to the error taxonomy: non-success status first, then
/// payload decoding.
async fn decode_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, TransportError> {
    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status(status.as_u16()));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|err| TransportError::Network(err.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|err| TransportError::Decode(err.to_string()))
}

impl NodeAuthority for ApiClient {
    fn fetch_nodes(&self) -> impl Future<Output = Result<Vec<Node>, TransportError>> + Send {
        self.list_nodes()
    }

    fn update_policy(
        &self,
        node_id: &str,
        policy: &NodePolicy,
    ) -> impl Future<Output = Result<Node, TransportError>> + Send {
        self.put_node_policy(node_id, policy)
    }
}
