// SPDX-License-Identifier: Apache-2.0
//! Headless fleet monitor. Mounts the node store against a coordinator
//! and logs every state change: snapshots, transport transitions,
//! errors. Useful for soak-testing a coordinator and as the reference
//! wiring of client + push channel + store.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use meshdash_api::ApiClient;
use meshdash_proto::DEFAULT_BASE_URL;
use meshdash_store::{NodeStore, StoreState, SyncConfig, TransportMode};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "meshdash fleet monitor")]
struct Args {
    /// Coordinator base address
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,
    /// Fallback poll period in milliseconds once the push channel is lost
    #[arg(long, default_value_t = 3000)]
    poll_interval_ms: u64,
    /// Print one node's detail (with recent metrics history) and exit
    #[arg(long)]
    detail: Option<String>,
    /// Metrics history samples to request with --detail
    #[arg(long, default_value_t = 20)]
    history_limit: u32,
    /// Print the cluster summary and exit
    #[arg(long)]
    summary: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let client = ApiClient::new(&args.base_url)?;

    if let Some(node_id) = &args.detail {
        let detail = client
            .node_detail(node_id, Some(args.history_limit))
            .await?;
        let node = &detail.node;
        info!(
            node_id = %node.id(),
            display_name = %node.identity.display_name,
            status = ?node.status,
            cpu = node.metrics.cpu_percent,
            ram = node.metrics.ram_percent,
            "node detail"
        );
        for sample in detail.metrics_history.unwrap_or_default() {
            info!(
                cpu = sample.cpu_percent,
                ram = sample.ram_percent,
                jobs = sample.running_jobs,
                ts = ?sample.heartbeat_ts,
                "history sample"
            );
        }
        return Ok(());
    }

    if args.summary {
        let summary = client.cluster_summary().await?;
        info!(
            total = summary.total_nodes,
            online = summary.online_nodes,
            offline = summary.offline_nodes,
            running_jobs = summary.active_running_jobs_total,
            "cluster summary"
        );
        return Ok(());
    }

    info!(base_url = %args.base_url, "mounting node store");
    let channel = client.push_channel();
    let store = NodeStore::mount(
        client,
        &channel,
        SyncConfig {
            poll_interval: Duration::from_millis(args.poll_interval_ms),
        },
    );

    let mut watch = store.watch();
    let mut last_mode = TransportMode::Connecting;
    loop {
        tokio::select! {
            changed = watch.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = watch.borrow().clone();
                log_state(&state, &mut last_mode);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    store.dispose();
    Ok(())
}

fn log_state(state: &StoreState, last_mode: &mut TransportMode) {
    if state.mode != *last_mode {
        info!(from = ?*last_mode, to = ?state.mode, "transport mode changed");
        *last_mode = state.mode;
    }
    if let Some(message) = &state.error {
        error!(%message, "store error");
    }
    if state.loading {
        return;
    }
    let online = state
        .nodes
        .iter()
        .filter(|n| n.status == meshdash_proto::NodeStatus::Online)
        .count();
    info!(nodes = state.nodes.len(), online, "fleet state");
    for node in &state.nodes {
        info!(
            node_id = %node.id(),
            status = ?node.status,
            cpu = node.metrics.cpu_percent,
            ram = node.metrics.ram_percent,
            jobs = node.metrics.running_jobs,
            enabled = node.policy.enabled,
            "node"
        );
    }
}
