//! Tests for compare-and-swap preconditions and request parameters
//!
//! These tests verify:
//! - prevExist / prevIndex evaluation against the current node
//! - Parsing of request parameters into preconditions and TTLs

use std::time::Duration;

use coordkv::protocol::{Params, Request};
use coordkv::store::{Node, Preconditions};
use coordkv::CoordError;

fn failed(result: coordkv::Result<()>) -> String {
    match result {
        Err(CoordError::FailedPrecondition(reason)) => reason,
        other => panic!("expected FailedPrecondition, got {:?}", other),
    }
}

// =============================================================================
// Precondition Tests
// =============================================================================

#[test]
fn test_no_preconditions_always_pass() {
    let node = Node::new("/k", "v", 3);
    assert!(Preconditions::none().check("/k", Some(&node)).is_ok());
    assert!(Preconditions::none().check("/k", None).is_ok());
}

#[test]
fn test_prev_exist_false_fails_when_present() {
    let node = Node::new("/k", "v", 3);
    let reason = failed(Preconditions::none().prev_exist(false).check("/k", Some(&node)));
    assert!(reason.contains("already exists"));
    assert!(Preconditions::none().prev_exist(false).check("/k", None).is_ok());
}

#[test]
fn test_prev_exist_true_fails_when_absent() {
    let node = Node::new("/k", "v", 3);
    let reason = failed(Preconditions::none().prev_exist(true).check("/k", None));
    assert!(reason.contains("not found"));
    assert!(Preconditions::none().prev_exist(true).check("/k", Some(&node)).is_ok());
}

#[test]
fn test_prev_index_requires_existing_key() {
    let reason = failed(Preconditions::none().prev_index(3).check("/k", None));
    assert!(reason.contains("/k"));
}

#[test]
fn test_prev_index_must_match_modified_index() {
    let mut node = Node::new("/k", "v", 3);
    node.modified_index = 7;

    let reason = failed(Preconditions::none().prev_index(3).check("/k", Some(&node)));
    assert!(reason.contains("prevIndex=3"));
    assert!(reason.contains("modified_index=7"));

    assert!(Preconditions::none().prev_index(7).check("/k", Some(&node)).is_ok());
}

#[test]
fn test_both_guards_must_hold() {
    let node = Node::new("/k", "v", 3);
    let both = Preconditions::none().prev_exist(true).prev_index(3);
    assert!(both.check("/k", Some(&node)).is_ok());

    let stale = Preconditions::none().prev_exist(true).prev_index(2);
    failed(stale.check("/k", Some(&node)));
}

// =============================================================================
// Parameter Parsing Tests
// =============================================================================

#[test]
fn test_params_parse_preconditions() {
    let request = Request::put("/k", "v").prev_exist(true).prev_index(12);
    let preconditions = request.params.preconditions().unwrap();
    assert_eq!(preconditions, Preconditions::none().prev_exist(true).prev_index(12));
}

#[test]
fn test_params_reject_malformed_values() {
    let bad_exist: Params = [("prevExist", "yes")].into_iter().collect();
    assert!(matches!(bad_exist.preconditions(), Err(CoordError::InvalidArgument(_))));

    let bad_index: Params = [("prevIndex", "-1")].into_iter().collect();
    assert!(matches!(bad_index.preconditions(), Err(CoordError::InvalidArgument(_))));

    let bad_ttl: Params = [("ttl", "soon")].into_iter().collect();
    assert!(matches!(bad_ttl.ttl(), Err(CoordError::InvalidArgument(_))));
}

#[test]
fn test_params_ttl_and_value() {
    let request = Request::post("/q/", "job").ttl(30);
    assert_eq!(request.params.value().unwrap(), "job");
    assert_eq!(request.params.ttl().unwrap(), Some(Duration::from_secs(30)));

    let empty = Params::new();
    assert_eq!(empty.ttl().unwrap(), None);
    assert!(matches!(empty.value(), Err(CoordError::InvalidArgument(_))));
}
