//! Tests for watches and cancellation tokens
//!
//! These tests verify:
//! - Initial snapshot delivery on registration
//! - One batch per later mutation, in mutation order
//! - Prefix matching
//! - Cancellation tears the watch down and resolves the token
//! - Watches through the threaded executor

mod common;

use std::sync::{Arc, Barrier};
use std::time::Duration;

use common::{keys, Harness};
use coordkv::engine::Engine;
use coordkv::protocol::{Request, Status};
use coordkv::scheduler::CallbackExecutor;
use coordkv::watch::CancellationToken;
use crossbeam::channel;
use parking_lot::Mutex;

// =============================================================================
// Snapshot Tests
// =============================================================================

#[test]
fn test_watch_delivers_snapshot_of_matching_entries() {
    let h = Harness::new();
    h.put("/a/1", "x");
    h.put("/a/2", "y");
    h.put("/b/1", "z");

    let (recorder, _token) = h.watch("/a/");

    let batches = recorder.take();
    assert_eq!(batches.len(), 1);
    assert_eq!(
        keys(&batches[0]),
        vec![("/a/1".to_string(), true), ("/a/2".to_string(), true)]
    );
    assert_eq!(batches[0][1].node.value, "y");
}

#[test]
fn test_watch_on_empty_prefix_delivers_empty_snapshot() {
    let h = Harness::new();

    let (recorder, _token) = h.watch("/nothing/");

    let batches = recorder.take();
    assert_eq!(batches.len(), 1);
    assert!(batches[0].is_empty());
}

// =============================================================================
// Notification Tests
// =============================================================================

#[test]
fn test_put_after_watch_yields_one_batch() {
    let h = Harness::new();
    let (recorder, _token) = h.watch("/a/");
    recorder.take();

    h.put("/a/b", "v");

    let batches = recorder.take();
    assert_eq!(batches.len(), 1);
    assert_eq!(keys(&batches[0]), vec![("/a/b".to_string(), true)]);
    assert_eq!(batches[0][0].node.modified_index, 1);
}

#[test]
fn test_delete_notifies_with_exists_false() {
    let h = Harness::new();
    h.put("/k", "v");
    let (recorder, _token) = h.watch("/k");
    recorder.take();

    h.delete("/k");

    let batches = recorder.take();
    assert_eq!(batches.len(), 1);
    let update = &batches[0][0];
    assert!(!update.exists);
    assert!(update.node.deleted);
    assert_eq!(update.node.modified_index, 2);
}

#[test]
fn test_post_notifies_directory_watchers() {
    let h = Harness::new();
    let (recorder, _token) = h.watch("/queue/");
    recorder.take();

    h.post("/queue/", "job");

    assert_eq!(keys(&recorder.take()[0]), vec![("/queue/1".to_string(), true)]);
}

#[test]
fn test_unrelated_and_failed_mutations_are_not_delivered() {
    let h = Harness::new();
    h.put("/a/k", "v");
    let (recorder, _token) = h.watch("/a/");
    recorder.take();

    h.put("/b/k", "v");
    h.put("/ab", "v");
    h.call(Request::put("/a/k", "w").prev_index(99));
    h.get("/a/k");

    assert_eq!(recorder.len(), 0);
}

#[test]
fn test_updates_arrive_in_mutation_order() {
    let h = Harness::new();
    let (recorder, _token) = h.watch("/");
    recorder.take();

    h.put("/x", "1");
    h.post("/q/", "2");
    h.put("/x", "3");
    h.delete("/x");

    let indexes: Vec<(u64, bool)> = recorder
        .take()
        .iter()
        .map(|batch| (batch[0].node.modified_index, batch[0].exists))
        .collect();
    assert_eq!(indexes, vec![(1, true), (2, true), (3, true), (4, false)]);
}

#[test]
fn test_every_matching_watcher_is_notified() {
    let h = Harness::new();
    let (outer, _t1) = h.watch("/a/");
    let (inner, _t2) = h.watch("/a/b/");
    let (same, _t3) = h.watch("/a/");
    outer.take();
    inner.take();
    same.take();

    h.put("/a/b/c", "v");
    h.put("/a/z", "v");

    assert_eq!(outer.take().len(), 2);
    assert_eq!(same.take().len(), 2);
    assert_eq!(inner.take().len(), 1);
}

// =============================================================================
// Cancellation Tests
// =============================================================================

#[test]
fn test_cancel_removes_watch_and_resolves_token() {
    let h = Harness::new();
    let (recorder, token) = h.watch("/a/");
    recorder.take();
    assert_eq!(h.engine.watch_count(), 1);

    token.cancel();

    assert!(token.is_cancelled());
    assert_eq!(token.outcome(), Some(Status::Cancelled));
    assert_eq!(h.engine.watch_count(), 0);

    h.put("/a/k", "v");
    assert_eq!(recorder.len(), 0);
}

#[test]
fn test_cancel_is_idempotent() {
    let h = Harness::new();
    let (_recorder, token) = h.watch("/a/");

    h.engine.cancel_watch(&token);
    token.cancel();
    h.engine.cancel_watch(&token);

    assert_eq!(token.outcome(), Some(Status::Cancelled));
    assert_eq!(h.engine.watch_count(), 0);
}

#[test]
fn test_cancel_leaves_other_watchers() {
    let h = Harness::new();
    let (first, first_token) = h.watch("/a/");
    let (second, _second_token) = h.watch("/a/");
    first.take();
    second.take();

    first_token.cancel();
    h.put("/a/k", "v");

    assert_eq!(first.len(), 0);
    assert_eq!(second.len(), 1);
    assert_eq!(h.engine.watch_count(), 1);
}

#[test]
fn test_batch_scheduled_before_cancel_may_still_arrive() {
    let h = Harness::new();
    let (recorder, token) = h.watch("/a/");
    recorder.take();

    h.engine.generic(Request::put("/a/k", "v"), |_| {});
    token.cancel();
    h.scheduler.run_pending();

    assert_eq!(recorder.len(), 1);
    assert_eq!(h.engine.watch_count(), 0);
}

#[test]
fn test_watch_with_already_cancelled_token_is_removed_immediately() {
    let h = Harness::new();
    let token = CancellationToken::new();
    token.cancel();

    h.engine.watch("/a/", |_| {}, token.clone());

    assert_eq!(h.engine.watch_count(), 0);
    assert_eq!(token.outcome(), Some(Status::Cancelled));
}

#[test]
fn test_token_handlers_run_once() {
    let token = CancellationToken::new();
    let count = Arc::new(Mutex::new(0));

    let counter = Arc::clone(&count);
    token.when_cancelled(move |_| *counter.lock() += 1);
    token.cancel();
    token.cancel();

    let counter = Arc::clone(&count);
    token.when_cancelled(move |_| *counter.lock() += 1);

    assert_eq!(*count.lock(), 2);
}

#[test]
fn test_token_resolves_once() {
    let token = CancellationToken::new();
    assert!(token.resolve(Status::Cancelled));
    assert!(!token.resolve(Status::Ok));
    assert_eq!(token.outcome(), Some(Status::Cancelled));
    assert_eq!(token.wait_resolved(Duration::from_millis(1)), Some(Status::Cancelled));
}

#[test]
fn test_unresolved_token_wait_times_out() {
    let token = CancellationToken::new();
    assert_eq!(token.wait_resolved(Duration::from_millis(20)), None);
    assert_ne!(token, CancellationToken::new());
    assert_eq!(token, token.clone());
}

#[test]
#[should_panic(expected = "registered more than once")]
fn test_token_shared_by_two_watches_is_fatal_on_cancel() {
    let h = Harness::new();
    let token = CancellationToken::new();

    h.engine.watch("/a/", |_| {}, token.clone());
    h.engine.watch("/b/", |_| {}, token.clone());
    h.scheduler.run_pending();

    token.cancel();
}

// =============================================================================
// Threaded Executor Tests
// =============================================================================

#[test]
fn test_watch_through_executor() {
    let executor = Arc::new(CallbackExecutor::start("test-callbacks").unwrap());
    let engine = Engine::new(executor.clone());
    engine.execute(Request::put("/svc/a", "1")).unwrap();

    let (tx, rx) = channel::unbounded();
    let token = CancellationToken::new();
    engine.watch(
        "/svc/",
        move |updates| {
            let _ = tx.send(updates);
        },
        token.clone(),
    );

    engine.execute(Request::put("/svc/b", "2")).unwrap();
    engine.execute(Request::delete("/svc/a")).unwrap();

    let timeout = Duration::from_secs(5);
    let snapshot = rx.recv_timeout(timeout).unwrap();
    assert_eq!(keys(&snapshot), vec![("/svc/a".to_string(), true)]);
    assert_eq!(keys(&rx.recv_timeout(timeout).unwrap()), vec![("/svc/b".to_string(), true)]);
    assert_eq!(keys(&rx.recv_timeout(timeout).unwrap()), vec![("/svc/a".to_string(), false)]);

    // Cancelling from another thread resolves the token
    let canceller = token.clone();
    std::thread::spawn(move || canceller.cancel()).join().unwrap();
    assert_eq!(token.wait_resolved(timeout), Some(Status::Cancelled));

    // The registration held the only sender; its removal closes the channel
    executor.drain();
    assert!(rx.recv_timeout(timeout).is_err());

    executor.shutdown();
}

#[test]
fn test_watch_callback_may_cancel_itself() {
    let executor = Arc::new(CallbackExecutor::start("test-callbacks").unwrap());
    let engine = Engine::new(executor.clone());
    let token = CancellationToken::new();

    let own = token.clone();
    let seen = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&seen);
    engine.watch(
        "/",
        move |updates| {
            if updates.iter().any(|u| u.node.key == "/stop") {
                own.cancel();
            }
            *counter.lock() += 1;
        },
        token.clone(),
    );

    engine.execute(Request::put("/stop", "now")).unwrap();
    assert_eq!(token.wait_resolved(Duration::from_secs(5)), Some(Status::Cancelled));

    engine.execute(Request::put("/after", "x")).unwrap();
    executor.drain();

    // snapshot + /stop
    assert_eq!(*seen.lock(), 2);
    assert_eq!(engine.watch_count(), 0);

    executor.shutdown();
}

#[test]
fn test_watch_registration_concurrent_with_writers() {
    const KEYS: usize = 300;

    for _ in 0..10 {
        let executor = Arc::new(CallbackExecutor::start("test-callbacks").unwrap());
        let engine = Engine::new(executor.clone());
        let start = Arc::new(Barrier::new(2));

        let writer = {
            let engine = engine.clone();
            let start = Arc::clone(&start);
            std::thread::spawn(move || {
                start.wait();
                for i in 0..KEYS {
                    engine.generic(Request::put(format!("/a/{}", i), "v"), |_| {});
                }
            })
        };

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let token = CancellationToken::new();
        start.wait();
        engine.watch("/a/", move |updates| sink.lock().extend(keys(&updates)), token.clone());

        writer.join().unwrap();
        executor.drain();

        // Every key exactly once, from either the snapshot or a later batch
        let mut seen = std::mem::take(&mut *seen.lock());
        seen.sort();
        let mut expected: Vec<(String, bool)> =
            (0..KEYS).map(|i| (format!("/a/{}", i), true)).collect();
        expected.sort();
        assert_eq!(seen, expected);

        token.cancel();
        executor.shutdown();
    }
}
