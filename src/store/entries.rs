//! Entry store implementation
//!
//! BTreeMap-based key/value tree plus the global version counter.

use std::collections::BTreeMap;
use std::time::SystemTime;

use tracing::trace;

use crate::error::{CoordError, Result};

use super::{Node, Preconditions, SEPARATOR};

/// Key → Node map and the monotonic version index
///
/// Every successful mutation (create, set, delete) takes the current
/// `next_index` as its `modified_index` and then bumps the counter, so
/// modified indexes are strictly increasing across the whole store.
#[derive(Debug)]
pub struct EntryStore {
    entries: BTreeMap<String, Node>,
    next_index: u64,
}

impl EntryStore {
    /// Create an empty store with the counter at 1
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_index: 1,
        }
    }

    /// Current global index (the index the next mutation will receive)
    pub fn index(&self) -> u64 {
        self.next_index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over every stored node in key order
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.entries.values()
    }

    /// Exact lookup
    pub fn get(&self, key: &str) -> Result<&Node> {
        self.entries
            .get(key)
            .ok_or_else(|| CoordError::NotFound("not found".to_string()))
    }

    /// Every node whose key starts with `prefix`
    pub fn get_directory(&self, prefix: &str) -> Vec<Node> {
        self.entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, node)| node.clone())
            .collect()
    }

    /// Create an auto-named child `dir/<index>` under `dir`
    ///
    /// A missing trailing separator on `dir` is added.
    pub fn create(&mut self, dir: &str, value: String, expires: Option<SystemTime>) -> Node {
        let mut key = dir.to_string();
        if !key.ends_with(SEPARATOR) {
            key.push(SEPARATOR);
        }
        key.push_str(&self.next_index.to_string());

        let node = Node::new(key, value, self.next_index).with_expiry(expires);
        trace!(key = %node.key, index = node.modified_index, "create");

        self.entries.insert(node.key.clone(), node.clone());
        self.next_index += 1;
        node
    }

    /// Insert or overwrite `key` if `preconditions` hold
    ///
    /// An overwrite keeps the existing `created_index`.
    pub fn set(
        &mut self,
        key: &str,
        value: String,
        expires: Option<SystemTime>,
        preconditions: &Preconditions,
    ) -> Result<Node> {
        let current = self.entries.get(key);
        preconditions.check(key, current)?;

        let mut node = Node::new(key, value, self.next_index).with_expiry(expires);
        if let Some(existing) = current {
            node.created_index = existing.created_index;
        }
        trace!(
            key = %node.key,
            created = node.created_index,
            modified = node.modified_index,
            "set"
        );

        self.entries.insert(node.key.clone(), node.clone());
        self.next_index += 1;
        Ok(node)
    }

    /// Remove `key` if `preconditions` hold
    ///
    /// Returns the removed node marked `deleted`, stamped with a fresh
    /// `modified_index`.
    pub fn delete(&mut self, key: &str, preconditions: &Preconditions) -> Result<Node> {
        preconditions.check(key, self.entries.get(key))?;

        let mut node = self
            .entries
            .remove(key)
            .ok_or_else(|| CoordError::NotFound("not found".to_string()))?;
        node.deleted = true;
        node.modified_index = self.next_index;
        self.next_index += 1;

        trace!(key = %node.key, modified = node.modified_index, "delete");
        Ok(node)
    }

    /// Remove every node whose expiry is strictly before `now`
    ///
    /// Expiry is not a new mutation: the counter is untouched and each
    /// returned node keeps its last `modified_index`, marked `deleted`.
    pub fn remove_expired(&mut self, now: SystemTime) -> Vec<Node> {
        let expired: Vec<String> = self
            .entries
            .values()
            .filter(|node| node.is_expired(now))
            .map(|node| node.key.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|key| self.entries.remove(&key))
            .map(|mut node| {
                node.deleted = true;
                node
            })
            .collect()
    }
}

impl Default for EntryStore {
    fn default() -> Self {
        Self::new()
    }
}
