// SPDX-License-Identifier: Apache-2.0
//! Client-side node state synchronization engine.
//!
//! Keeps a local mirror of the coordinator's node fleet consistent: a push
//! channel supplies change notifications when available, a fixed-interval
//! poll takes over when it fails, and every notification funnels into one
//! single-flight snapshot refresh. Locally-originated policy writes are
//! applied optimistically and reconciled against server-confirmed truth.
//!
//! The engine talks to the outside world through two ports,
//! [`NodeAuthority`] for authoritative reads/writes and [`PushChannel`]
//! for the notification stream, so transports stay swappable and tests
//! can script both sides.
//!
//! ```no_run
//! # use meshdash_store::{NodeStore, SyncConfig};
//! # async fn demo(authority: impl meshdash_store::NodeAuthority + Clone,
//! #               channel: impl meshdash_store::PushChannel) {
//! let store = NodeStore::mount(authority, &channel, SyncConfig::default());
//! let mut watch = store.watch();
//! while watch.changed().await.is_ok() {
//!     let state = watch.borrow().clone();
//!     println!("{} nodes ({:?})", state.nodes.len(), state.mode);
//! }
//! # }
//! ```

mod ports;
mod refresh;
mod state;
mod store;
mod supervisor;

pub use ports::{NodeAuthority, PushChannel, PushEvent, PushHandle, TransportError};
pub use state::{StoreState, TransportMode};
pub use store::{NodeStore, SyncConfig};
