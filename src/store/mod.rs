//! Store Module
//!
//! The key/value tree and its global version index.
//!
//! ## Responsibilities
//! - Exact and prefix (directory) lookups
//! - Auto-named creation under a directory
//! - Set / delete guarded by compare-and-swap preconditions
//! - TTL bookkeeping and removal of expired entries
//!
//! ## Data Structure Choice
//! A `BTreeMap<String, Node>`: iteration order is deterministic, and a
//! directory listing is a range scan starting at the prefix. The store has
//! no lock of its own; the engine owns it behind a single mutex together
//! with the watch registry.

mod cas;
mod entries;
mod node;

pub use cas::Preconditions;
pub use entries::EntryStore;
pub use node::{is_directory_key, Node, SEPARATOR};
