//! Node definitions
//!
//! A single key/value record in the tree.

use std::time::SystemTime;

/// Path separator. A key ending in it names a directory.
pub const SEPARATOR: char = '/';

/// Whether `key` addresses a directory rather than a single entry
pub fn is_directory_key(key: &str) -> bool {
    key.ends_with(SEPARATOR)
}

/// A key/value record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Full path, unique within the tree
    pub key: String,

    /// Opaque payload (not reported once `deleted` is set)
    pub value: String,

    /// Index assigned when this key was first created
    pub created_index: u64,

    /// Index assigned by the most recent mutation of this key
    pub modified_index: u64,

    /// Absolute expiry time, `None` = never expires
    pub expires: Option<SystemTime>,

    /// Set on the copy handed to watchers when the key is deleted or expires
    pub deleted: bool,
}

impl Node {
    /// Create a live node whose created and modified index are both `index`
    pub fn new(key: impl Into<String>, value: impl Into<String>, index: u64) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            created_index: index,
            modified_index: index,
            expires: None,
            deleted: false,
        }
    }

    /// Attach an expiry deadline
    pub fn with_expiry(mut self, expires: Option<SystemTime>) -> Self {
        self.expires = expires;
        self
    }

    /// Expired when the deadline is strictly in the past
    pub fn is_expired(&self, now: SystemTime) -> bool {
        matches!(self.expires, Some(deadline) if deadline < now)
    }
}
