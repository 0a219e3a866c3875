//! Compare-and-swap preconditions
//!
//! Checked against the current node for a key, inside the same critical
//! section as the mutation they guard.

use crate::error::{CoordError, Result};

use super::Node;

/// Optional `prevExist` / `prevIndex` guards for PUT and DELETE
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Preconditions {
    /// Require the key to exist (`true`) or to be absent (`false`)
    pub prev_exist: Option<bool>,

    /// Require the key's current `modified_index` to equal this
    pub prev_index: Option<u64>,
}

impl Preconditions {
    /// No guards: always passes
    pub fn none() -> Self {
        Self::default()
    }

    pub fn prev_exist(mut self, exists: bool) -> Self {
        self.prev_exist = Some(exists);
        self
    }

    pub fn prev_index(mut self, index: u64) -> Self {
        self.prev_index = Some(index);
        self
    }

    /// Evaluate against `current`, the node stored under `key` (if any).
    pub fn check(&self, key: &str, current: Option<&Node>) -> Result<()> {
        match (self.prev_exist, current) {
            (Some(false), Some(_)) => {
                return Err(CoordError::FailedPrecondition(format!(
                    "{} already exists",
                    key
                )));
            }
            (Some(true), None) => {
                return Err(CoordError::FailedPrecondition(format!("{} not found", key)));
            }
            _ => {}
        }

        if let Some(expected) = self.prev_index {
            let node = current.ok_or_else(|| {
                CoordError::FailedPrecondition(format!("Node doesn't exist: {}", key))
            })?;
            if node.modified_index != expected {
                return Err(CoordError::FailedPrecondition(format!(
                    "Incorrect index: prevIndex={} but modified_index={}",
                    expected, node.modified_index
                )));
            }
        }

        Ok(())
    }
}
