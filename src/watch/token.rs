//! Cancellation token
//!
//! Explicit handle for tearing down a watch: Active until `cancel()` is
//! called, after which its teardown handlers run exactly once. The handler
//! registered by the engine removes the watch and resolves the token.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::protocol::Status;

type CancelHandler = Box<dyn FnOnce(&CancellationToken) + Send + 'static>;

static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(1);

struct TokenState {
    cancelled: bool,
    handlers: Vec<CancelHandler>,
    outcome: Option<Status>,
}

struct TokenInner {
    id: u64,
    state: Mutex<TokenState>,
    resolved: Condvar,
}

/// Cloneable cancellation handle; clones share state
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                id: NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed),
                state: Mutex::new(TokenState {
                    cancelled: false,
                    handlers: Vec::new(),
                    outcome: None,
                }),
                resolved: Condvar::new(),
            }),
        }
    }

    /// Process-unique identifier
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.state.lock().cancelled
    }

    /// Request cancellation. Idempotent.
    ///
    /// Handlers run on the calling thread, after the token's own lock has
    /// been released, so they are free to take other locks.
    pub fn cancel(&self) {
        let handlers = {
            let mut state = self.inner.state.lock();
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            std::mem::take(&mut state.handlers)
        };

        for handler in handlers {
            handler(self);
        }
    }

    /// Register a teardown handler. Runs immediately if already cancelled.
    pub fn when_cancelled<F>(&self, handler: F)
    where
        F: FnOnce(&CancellationToken) + Send + 'static,
    {
        {
            let mut state = self.inner.state.lock();
            if !state.cancelled {
                state.handlers.push(Box::new(handler));
                return;
            }
        }
        handler(self);
    }

    /// Record the terminal outcome. Only the first call has any effect.
    pub fn resolve(&self, status: Status) -> bool {
        let mut state = self.inner.state.lock();
        if state.outcome.is_some() {
            return false;
        }
        state.outcome = Some(status);
        self.inner.resolved.notify_all();
        true
    }

    /// Terminal outcome, if resolved
    pub fn outcome(&self) -> Option<Status> {
        self.inner.state.lock().outcome
    }

    /// Block until resolved or `timeout` elapses.
    pub fn wait_resolved(&self, timeout: Duration) -> Option<Status> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        while state.outcome.is_none() {
            if self
                .inner
                .resolved
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                break;
            }
        }
        state.outcome
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for CancellationToken {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for CancellationToken {}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("CancellationToken")
            .field("id", &self.inner.id)
            .field("cancelled", &state.cancelled)
            .field("outcome", &state.outcome)
            .finish()
    }
}
