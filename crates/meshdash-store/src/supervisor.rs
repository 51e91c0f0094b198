// SPDX-License-Identifier: Apache-2.0
//! Transport supervision: push mode with a polling fallback.
//!
//! One task per subscription drives the `{connecting, push, poll}`
//! machine. The push listener and the fallback interval are owned here
//! and released on every exit path, including teardown mid-`connecting`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, Instant, Interval};
use tracing::{debug, trace, warn};

use crate::ports::{NodeAuthority, PushEvent, PushHandle};
use crate::refresh::Coordinator;
use crate::state::TransportMode;

/// Trigger a refresh without blocking the supervision loop, so push
/// events keep draining while a fetch is outstanding.
fn spawn_refresh<A: NodeAuthority>(core: &Arc<Coordinator<A>>) {
    let core = Arc::clone(core);
    tokio::spawn(async move { core.refresh().await });
}

fn fallback_timer(period: Duration) -> Interval {
    // First tick a full period out; the refresh that preceded the
    // fallback decision already covered "now".
    interval_at(Instant::now() + period, period)
}

pub(crate) async fn run<A: NodeAuthority>(
    core: Arc<Coordinator<A>>,
    listener: PushHandle,
    mut shutdown: watch::Receiver<bool>,
    poll_interval: Duration,
) {
    let mut listener = Some(listener);
    let mut poll: Option<Interval> = None;

    // Immediate first snapshot while the push channel is still opening.
    spawn_refresh(&core);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,

            event = next_push(&mut listener), if listener.is_some() => {
                match event {
                    Some(PushEvent::Update(update)) => {
                        trace!(node_id = %update.node_id, "node update notification");
                        if core.snapshot().mode == TransportMode::Connecting {
                            debug!("push channel live");
                            core.mutate(|s| s.mode = TransportMode::Push);
                            poll = None;
                        }
                        // Advisory only: request authoritative state
                        // rather than merging the event's fields.
                        spawn_refresh(&core);
                    }
                    Some(PushEvent::Lost(reason)) => {
                        enter_poll_mode(&core, &mut listener, &mut poll, poll_interval, &reason);
                    }
                    None => {
                        enter_poll_mode(&core, &mut listener, &mut poll, poll_interval, "push channel closed");
                    }
                }
            }

            _ = next_tick(&mut poll), if poll.is_some() => {
                trace!("fallback poll tick");
                spawn_refresh(&core);
            }
        }
    }

    // Teardown: release the connection and the timer whatever state we
    // were in.
    if let Some(mut handle) = listener.take() {
        handle.dispose();
    }
    drop(poll);
}

/// Wait on the listener when one is open. The select guard keeps this
/// branch disabled otherwise; pending() covers the race where the guard
/// was checked before the listener was taken.
async fn next_push(listener: &mut Option<PushHandle>) -> Option<PushEvent> {
    match listener.as_mut() {
        Some(handle) => handle.next_event().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(poll: &mut Option<Interval>) {
    match poll.as_mut() {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Dispose the listener and fall back to fixed-interval polling. There is
/// no path back to push mode within this subscription; recovery happens
/// on the next mount.
fn enter_poll_mode<A: NodeAuthority>(
    core: &Arc<Coordinator<A>>,
    listener: &mut Option<PushHandle>,
    poll: &mut Option<Interval>,
    period: Duration,
    reason: &str,
) {
    warn!(reason, "push channel lost; falling back to polling");
    if let Some(mut handle) = listener.take() {
        handle.dispose();
    }
    core.mutate(|s| s.mode = TransportMode::Poll);
    *poll = Some(fallback_timer(period));
}
