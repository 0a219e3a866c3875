//! Expiry Sweeper
//!
//! Runs before every request. Removes entries whose TTL deadline is in the
//! past and tells watchers about each removal. Expiry does not consume an
//! index: the delete notification carries the entry's last `modified_index`.

use std::time::{Duration, SystemTime};

use tracing::debug;

use crate::error::{CoordError, Result};
use crate::scheduler::Scheduler;
use crate::store::EntryStore;
use crate::watch::WatchRegistry;

/// Remove expired entries and notify watchers. Called with the store lock held.
///
/// Returns how many entries were removed.
pub fn sweep(
    now: SystemTime,
    store: &mut EntryStore,
    watches: &WatchRegistry,
    scheduler: &dyn Scheduler,
) -> usize {
    let expired = store.remove_expired(now);
    for node in &expired {
        debug!(key = %node.key, "Deleting expired entry");
        watches.notify(node, scheduler);
    }
    expired.len()
}

/// Absolute deadline for an entry written at `now` with `ttl`
pub fn deadline(now: SystemTime, ttl: Option<Duration>) -> Result<Option<SystemTime>> {
    ttl.map(|ttl| {
        now.checked_add(ttl)
            .ok_or_else(|| CoordError::InvalidArgument(format!("ttl too large: {}s", ttl.as_secs())))
    })
    .transpose()
}
