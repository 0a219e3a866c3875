//! Shared test harness
//!
//! Engine wired to a manual scheduler and a manual clock, so every test
//! decides exactly when callbacks run and when time moves.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use coordkv::clock::ManualClock;
use coordkv::engine::Engine;
use coordkv::protocol::{Request, Response};
use coordkv::scheduler::ManualScheduler;
use coordkv::watch::{CancellationToken, WatchUpdate};
use parking_lot::Mutex;

pub struct Harness {
    pub engine: Engine,
    pub scheduler: Arc<ManualScheduler>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        let scheduler = Arc::new(ManualScheduler::new());
        let clock = Arc::new(ManualClock::default());
        let engine = Engine::with_clock(scheduler.clone(), clock.clone());
        Self {
            engine,
            scheduler,
            clock,
        }
    }

    /// Send a request and run the scheduler until its response arrives
    pub fn call(&self, request: Request) -> Response {
        let slot = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&slot);
        self.engine.generic(request, move |response| {
            *sink.lock() = Some(response);
        });
        self.scheduler.run_pending();
        let response = slot.lock().take();
        response.expect("response callback was not run")
    }

    pub fn put(&self, key: &str, value: &str) -> Response {
        self.call(Request::put(key, value))
    }

    pub fn post(&self, dir: &str, value: &str) -> Response {
        self.call(Request::post(dir, value))
    }

    pub fn get(&self, key: &str) -> Response {
        self.call(Request::get(key))
    }

    pub fn delete(&self, key: &str) -> Response {
        self.call(Request::delete(key))
    }

    /// Register a watch and deliver its initial snapshot
    pub fn watch(&self, prefix: &str) -> (Recorder, CancellationToken) {
        let recorder = Recorder::default();
        let token = CancellationToken::new();
        let sink = recorder.clone();
        self.engine
            .watch(prefix, move |updates| sink.record(updates), token.clone());
        self.scheduler.run_pending();
        (recorder, token)
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }
}

/// Collects watch batches in delivery order
#[derive(Clone, Default)]
pub struct Recorder {
    batches: Arc<Mutex<Vec<Vec<WatchUpdate>>>>,
}

impl Recorder {
    pub fn record(&self, updates: Vec<WatchUpdate>) {
        self.batches.lock().push(updates);
    }

    /// Remove and return everything recorded so far
    pub fn take(&self) -> Vec<Vec<WatchUpdate>> {
        std::mem::take(&mut *self.batches.lock())
    }

    pub fn len(&self) -> usize {
        self.batches.lock().len()
    }
}

/// (key, exists) pairs of a batch
pub fn keys(batch: &[WatchUpdate]) -> Vec<(String, bool)> {
    batch
        .iter()
        .map(|update| (update.node.key.clone(), update.exists))
        .collect()
}
