//! Tests for TTL expiry
//!
//! These tests verify:
//! - Expired entries disappear on the next request
//! - Expiry is strict (deadline must be in the past)
//! - Watchers receive a delete carrying the last modified index
//! - Expiry does not consume an index

mod common;

use std::time::Duration;

use common::{keys, Harness};
use coordkv::protocol::{Request, Status};

#[test]
fn test_entry_expires_after_ttl() {
    let h = Harness::new();
    assert!(h.call(Request::put("/lease", "me").ttl(1)).is_ok());
    assert!(h.get("/lease").is_ok());

    h.advance(Duration::from_secs(2));

    assert_eq!(h.get("/lease").status, Status::NotFound);
    assert!(h.engine.is_empty());
}

#[test]
fn test_entry_survives_until_deadline_has_passed() {
    let h = Harness::new();
    h.call(Request::put("/lease", "me").ttl(1));

    h.advance(Duration::from_secs(1));
    assert!(h.get("/lease").is_ok());

    h.advance(Duration::from_millis(1));
    assert_eq!(h.get("/lease").status, Status::NotFound);
}

#[test]
fn test_expiry_notifies_watchers_without_bumping_index() {
    let h = Harness::new();
    h.call(Request::put("/svc/a", "1").ttl(1));
    h.put("/svc/b", "2");
    let (recorder, _token) = h.watch("/svc/");
    recorder.take();

    h.advance(Duration::from_secs(5));
    let response = h.get("/svc/");

    let batches = recorder.take();
    assert_eq!(batches.len(), 1);
    assert_eq!(keys(&batches[0]), vec![("/svc/a".to_string(), false)]);
    assert_eq!(batches[0][0].node.modified_index, 1);

    assert_eq!(response.index, 3);
    assert_eq!(response.dir().unwrap().nodes.len(), 1);
}

#[test]
fn test_sweep_runs_before_every_verb() {
    let h = Harness::new();
    h.call(Request::put("/lock", "me").ttl(1));
    h.advance(Duration::from_secs(2));

    // The stale lock is gone by the time the CAS is checked
    let response = h.call(Request::put("/lock", "you").prev_exist(false));

    assert!(response.is_ok());
    assert_eq!(response.node().unwrap().created_index, 2);
}

#[test]
fn test_refresh_without_ttl_makes_entry_permanent() {
    let h = Harness::new();
    h.call(Request::put("/k", "v").ttl(1));
    h.put("/k", "v2");

    h.advance(Duration::from_secs(60));

    assert!(h.get("/k").is_ok());
}

#[test]
fn test_refresh_with_ttl_extends_deadline() {
    let h = Harness::new();
    h.call(Request::put("/k", "v").ttl(2));
    h.advance(Duration::from_secs(1));
    h.call(Request::put("/k", "v").ttl(2));

    h.advance(Duration::from_secs(2));
    assert!(h.get("/k").is_ok());

    h.advance(Duration::from_secs(1));
    assert_eq!(h.get("/k").status, Status::NotFound);
}

#[test]
fn test_posted_entry_expires() {
    let h = Harness::new();
    let key = h.call(Request::post("/q/", "job").ttl(3)).node().unwrap().key.clone();

    h.advance(Duration::from_secs(4));

    assert_eq!(h.get(&key).status, Status::NotFound);
}

#[test]
fn test_explicit_purge() {
    let h = Harness::new();
    h.call(Request::put("/a", "1").ttl(1));
    h.call(Request::put("/b", "2").ttl(1));
    h.put("/c", "3");

    assert_eq!(h.engine.purge_expired(), 0);
    h.advance(Duration::from_secs(2));
    assert_eq!(h.engine.purge_expired(), 2);
    assert_eq!(h.engine.len(), 1);
}
