//! Watch Module
//!
//! Prefix subscriptions over the key tree.
//!
//! ## Delivery Model
//! - Registration delivers one batch with every node currently under the
//!   prefix (all `exists: true`)
//! - Each later mutation under the prefix delivers a batch of one update
//! - Batches are handed to the scheduler under the store lock, so a
//!   watcher sees mutations in the order they were applied
//!
//! ## Teardown
//! Every registration is tied to a [`CancellationToken`]. Cancelling the
//! token removes the registration and resolves the token as `Cancelled`.
//! A batch scheduled before the cancellation may still be delivered.

mod registry;
mod token;

use std::sync::Arc;

pub use registry::WatchRegistry;
pub use token::CancellationToken;

use crate::store::Node;

/// One change delivered to a watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchUpdate {
    /// Node state after the change (marked `deleted` for removals)
    pub node: Node,

    /// `false` when the change was a delete or an expiry
    pub exists: bool,
}

impl WatchUpdate {
    pub fn new(node: Node, exists: bool) -> Self {
        Self { node, exists }
    }

    /// Update describing `node` as it stands (exists unless deleted)
    pub fn of(node: &Node) -> Self {
        Self::new(node.clone(), !node.deleted)
    }
}

/// Receives batches of watch updates
pub type WatchCallback = Arc<dyn Fn(Vec<WatchUpdate>) + Send + Sync + 'static>;
