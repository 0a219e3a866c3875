//! Engine Module
//!
//! The store-and-watch engine that coordinates all components.
//!
//! ## Responsibilities
//! - Sweep expired entries before every request
//! - Dispatch GET / POST / PUT / DELETE to their handlers
//! - Register and tear down prefix watches
//! - Hand every response and watch batch to the scheduler
//!
//! ## Request Flow
//! ```text
//! generic(request, cb)
//!   ├─ sweep expired entries        (lock, notify deletes)
//!   └─ handler                      (lock)
//!        ├─ validate + mutate store
//!        ├─ schedule cb(response)
//!        └─ schedule watcher batches
//! ```

use std::sync::{Arc, Weak};

use crossbeam::channel;
use parking_lot::Mutex;
use tracing::{debug, enabled, trace, Level};

use crate::clock::{Clock, SystemClock};
use crate::error::{CoordError, Result};
use crate::expiry;
use crate::protocol::{Action, ActionResult, Params, Request, Response, Status, Verb};
use crate::scheduler::Scheduler;
use crate::store::{is_directory_key, EntryStore, Node, Preconditions};
use crate::watch::{CancellationToken, WatchCallback, WatchRegistry, WatchUpdate};

/// Receives the response to one request
pub type ResponseCallback = Box<dyn FnOnce(Response) + Send + 'static>;

/// Everything guarded by the engine lock
struct State {
    store: EntryStore,
    watches: WatchRegistry,
}

struct Shared {
    state: Mutex<State>,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
}

/// The coordination-service emulation engine
///
/// ## Concurrency Model: single lock
///
/// - The entry store and the watch registry sit behind one mutex
/// - Validation, mutation, index bump and notification all happen while it
///   is held, so concurrent requests apply in lock-acquisition order
/// - Callbacks never run under the lock; they are queued on the scheduler
///   and observed later, so a callback may call back into the engine
///
/// Cloning an `Engine` yields another handle to the same store.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
}

impl Engine {
    /// Create an empty engine that reads wall-clock time
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self::with_clock(scheduler, Arc::new(SystemClock))
    }

    /// Create an empty engine with an explicit time source
    pub fn with_clock(scheduler: Arc<dyn Scheduler>, clock: Arc<dyn Clock>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    store: EntryStore::new(),
                    watches: WatchRegistry::new(),
                }),
                scheduler,
                clock,
            }),
        }
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Execute a request; the response is delivered to `callback` later
    pub fn generic<F>(&self, request: Request, callback: F)
    where
        F: FnOnce(Response) + Send + 'static,
    {
        self.purge_expired();

        let callback: ResponseCallback = Box::new(callback);
        let Request { verb, key, params } = request;
        match verb {
            Verb::Get => self.handle_get(&key, callback),
            Verb::Post => self.handle_post(&key, &params, callback),
            Verb::Put => self.handle_put(&key, &params, callback),
            Verb::Delete => self.handle_delete(&key, &params, callback),
        }

        self.dump_entries();
    }

    /// Execute a request and wait for its response
    ///
    /// Needs a scheduler that runs jobs on another thread; with a
    /// [`ManualScheduler`](crate::scheduler::ManualScheduler) this blocks
    /// forever. Called from inside a scheduled callback, where the response
    /// could never run, it fails with `InvalidArgument` and leaves the store
    /// untouched; use [`generic`](Self::generic) there instead.
    pub fn execute(&self, request: Request) -> Result<Response> {
        if self.shared.scheduler.in_callback() {
            return Err(CoordError::InvalidArgument(format!(
                "blocking {} {} from a scheduled callback",
                request.verb, request.key
            )));
        }

        let (tx, rx) = channel::bounded(1);
        self.generic(request, move |response| {
            let _ = tx.send(response);
        });
        rx.recv().map_err(|_| CoordError::Cancelled)
    }

    pub fn get<F>(&self, key: &str, callback: F)
    where
        F: FnOnce(Response) + Send + 'static,
    {
        self.generic(Request::get(key), callback)
    }

    pub fn post<F>(&self, dir: &str, value: &str, ttl: Option<u64>, callback: F)
    where
        F: FnOnce(Response) + Send + 'static,
    {
        let mut request = Request::post(dir, value);
        if let Some(seconds) = ttl {
            request = request.ttl(seconds);
        }
        self.generic(request, callback)
    }

    pub fn put<F>(
        &self,
        key: &str,
        value: &str,
        ttl: Option<u64>,
        preconditions: Preconditions,
        callback: F,
    ) where
        F: FnOnce(Response) + Send + 'static,
    {
        let mut request = Request::put(key, value);
        if let Some(seconds) = ttl {
            request = request.ttl(seconds);
        }
        self.generic(with_preconditions(request, preconditions), callback)
    }

    pub fn delete<F>(&self, key: &str, preconditions: Preconditions, callback: F)
    where
        F: FnOnce(Response) + Send + 'static,
    {
        self.generic(with_preconditions(Request::delete(key), preconditions), callback)
    }

    // =========================================================================
    // Handlers
    // =========================================================================

    fn handle_get(&self, key: &str, callback: ResponseCallback) {
        debug!("GET {}", key);
        let state = self.shared.state.lock();
        let index = state.store.index();

        let response = if is_directory_key(key) {
            let nodes = state.store.get_directory(key);
            Response::ok(ActionResult::directory(Action::Get, &nodes), index)
        } else {
            match state.store.get(key) {
                Ok(node) => Response::ok(ActionResult::single(Action::Get, node), index),
                Err(e) => Response::from_error(&e, index),
            }
        };

        self.schedule_response(response, callback);
    }

    fn handle_post(&self, key: &str, params: &Params, callback: ResponseCallback) {
        debug!("POST {}", key);
        self.mutate(Action::Create, callback, |store, now| {
            let value = params.value()?;
            let expires = expiry::deadline(now, params.ttl()?)?;
            Ok(store.create(key, value.to_string(), expires))
        });
    }

    fn handle_put(&self, key: &str, params: &Params, callback: ResponseCallback) {
        debug!("PUT {}", key);
        self.mutate(Action::Set, callback, |store, now| {
            reject_directory(Verb::Put, key)?;
            let value = params.value()?;
            let expires = expiry::deadline(now, params.ttl()?)?;
            let preconditions = params.preconditions()?;
            store.set(key, value.to_string(), expires, &preconditions)
        });
    }

    fn handle_delete(&self, key: &str, params: &Params, callback: ResponseCallback) {
        debug!("DELETE {}", key);
        self.mutate(Action::Delete, callback, |store, _| {
            reject_directory(Verb::Delete, key)?;
            let preconditions = params.preconditions()?;
            store.delete(key, &preconditions)
        });
    }

    /// Apply `op` under the lock, then schedule the response followed by the
    /// watcher notifications for the mutated node.
    fn mutate<F>(&self, action: Action, callback: ResponseCallback, op: F)
    where
        F: FnOnce(&mut EntryStore, std::time::SystemTime) -> Result<Node>,
    {
        let now = self.shared.clock.now();
        let mut state = self.shared.state.lock();

        match op(&mut state.store, now) {
            Ok(node) => {
                let response = Response::ok(ActionResult::single(action, &node), state.store.index());
                self.schedule_response(response, callback);
                state.watches.notify(&node, self.shared.scheduler.as_ref());
            }
            Err(e) => {
                debug!("{:?} rejected: {}", action, e);
                let response = Response::from_error(&e, state.store.index());
                self.schedule_response(response, callback);
            }
        }
    }

    fn schedule_response(&self, response: Response, callback: ResponseCallback) {
        self.shared
            .scheduler
            .schedule(Box::new(move || callback(response)));
    }

    // =========================================================================
    // Watches
    // =========================================================================

    /// Watch every key under `prefix`
    ///
    /// `callback` first receives the current matching entries as one batch,
    /// then one single-update batch per later mutation. Cancelling `token`
    /// tears the watch down and resolves the token as `Cancelled`.
    pub fn watch<F>(&self, prefix: &str, callback: F, token: CancellationToken)
    where
        F: Fn(Vec<WatchUpdate>) + Send + Sync + 'static,
    {
        let callback: WatchCallback = Arc::new(callback);
        {
            let mut state = self.shared.state.lock();

            // Snapshot and registration are one step under the lock
            let initial: Vec<WatchUpdate> = state
                .store
                .get_directory(prefix)
                .into_iter()
                .map(|node| WatchUpdate::new(node, true))
                .collect();
            debug!(prefix, entries = initial.len(), "WATCH");

            let first = WatchCallback::clone(&callback);
            self.shared.scheduler.schedule(Box::new(move || first(initial)));
            state.watches.register(prefix, callback, token.clone());
        }

        // Registered outside the lock: runs at once if already cancelled
        let engine = Arc::downgrade(&self.shared);
        token.when_cancelled(move |token| remove_watch(&engine, token));
    }

    /// Cancel `token`, removing its watch
    pub fn cancel_watch(&self, token: &CancellationToken) {
        token.cancel();
    }

    // =========================================================================
    // Expiry
    // =========================================================================

    /// Remove expired entries now, notifying watchers. Returns the count.
    pub fn purge_expired(&self) -> usize {
        let now = self.shared.clock.now();
        let mut state = self.shared.state.lock();
        let State { store, watches } = &mut *state;
        expiry::sweep(now, store, watches, self.shared.scheduler.as_ref())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Current global index
    pub fn index(&self) -> u64 {
        self.shared.state.lock().store.index()
    }

    /// Number of stored entries (including expired ones not yet swept)
    pub fn len(&self) -> usize {
        self.shared.state.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.state.lock().store.is_empty()
    }

    /// Number of registered watchers
    pub fn watch_count(&self) -> usize {
        self.shared.state.lock().watches.len()
    }

    /// Log every stored entry at trace level
    pub fn dump_entries(&self) {
        if !enabled!(Level::TRACE) {
            return;
        }
        let state = self.shared.state.lock();
        for node in state.store.iter() {
            trace!(?node, "entry");
        }
    }
}

/// Teardown handler installed on every watch token
fn remove_watch(engine: &Weak<Shared>, token: &CancellationToken) {
    if let Some(shared) = engine.upgrade() {
        shared.state.lock().watches.remove(token);
    }
    token.resolve(Status::Cancelled);
}

fn reject_directory(verb: Verb, key: &str) -> Result<()> {
    if is_directory_key(key) {
        return Err(CoordError::InvalidArgument(format!(
            "{} on directory key {}",
            verb, key
        )));
    }
    Ok(())
}

fn with_preconditions(mut request: Request, preconditions: Preconditions) -> Request {
    if let Some(exists) = preconditions.prev_exist {
        request = request.prev_exist(exists);
    }
    if let Some(index) = preconditions.prev_index {
        request = request.prev_index(index);
    }
    request
}
