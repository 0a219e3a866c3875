//! Watch registry
//!
//! Prefix → watchers map. Owned by the engine next to the entry store and
//! guarded by the same lock.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::scheduler::Scheduler;
use crate::store::Node;

use super::{CancellationToken, WatchCallback, WatchUpdate};

struct Watcher {
    callback: WatchCallback,
    token: CancellationToken,
}

/// Registered watchers grouped by watched prefix
#[derive(Default)]
pub struct WatchRegistry {
    watches: BTreeMap<String, Vec<Watcher>>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a watcher for `prefix`. Future notifications include it.
    pub fn register(&mut self, prefix: &str, callback: WatchCallback, token: CancellationToken) {
        trace!(prefix, token = token.id(), "watcher registered");
        self.watches
            .entry(prefix.to_string())
            .or_default()
            .push(Watcher { callback, token });
    }

    /// Schedule one single-update batch for every watcher whose prefix
    /// matches `node.key`. Returns the number of batches scheduled.
    pub fn notify(&self, node: &Node, scheduler: &dyn Scheduler) -> usize {
        let mut scheduled = 0;
        for (prefix, watchers) in &self.watches {
            if !node.key.starts_with(prefix.as_str()) {
                continue;
            }
            for watcher in watchers {
                let callback = WatchCallback::clone(&watcher.callback);
                let update = WatchUpdate::of(node);
                scheduler.schedule(Box::new(move || callback(vec![update])));
                scheduled += 1;
            }
        }
        trace!(key = %node.key, watchers = scheduled, "notified");
        scheduled
    }

    /// Remove the watcher tied to `token`.
    ///
    /// # Panics
    /// If the token is registered more than once.
    pub fn remove(&mut self, token: &CancellationToken) -> bool {
        let mut found = false;
        for (prefix, watchers) in self.watches.iter_mut() {
            let before = watchers.len();
            watchers.retain(|w| w.token != *token);
            let removed = before - watchers.len();
            if removed > 0 {
                assert!(
                    !found && removed == 1,
                    "watch token {} registered more than once",
                    token.id()
                );
                found = true;
                debug!(prefix = %prefix, token = token.id(), "Removing watcher");
            }
        }
        self.watches.retain(|_, watchers| !watchers.is_empty());
        found
    }

    /// Total number of registered watchers
    pub fn len(&self) -> usize {
        self.watches.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }
}
