//! # CoordKV
//!
//! An in-memory emulation of a coordination-service key/value API, for
//! exercising components that depend on such a service without a cluster:
//! - Hierarchical keys with directory listings and auto-named children
//! - A global, strictly increasing modification index
//! - Compare-and-swap guards (`prevExist`, `prevIndex`)
//! - TTL expiry swept before every request
//! - Prefix watches: initial snapshot, then one batch per mutation
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                TCP Server (optional adapter)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Engine                                │
//! │       sweep expired → GET / POST / PUT / DELETE / WATCH      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  single lock
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   ┌─────────────┐          ┌───────────────┐
//!   │ EntryStore  │ notify → │ WatchRegistry │
//!   └─────────────┘          └───────┬───────┘
//!                                    │ schedule
//!                                    ▼
//!                           ┌─────────────────┐
//!                           │    Scheduler    │
//!                           │ (callbacks run  │
//!                           │  off the lock)  │
//!                           └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod clock;
pub mod scheduler;
pub mod store;
pub mod watch;
pub mod expiry;
pub mod protocol;
pub mod network;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CoordError, Result};
pub use config::Config;
pub use engine::Engine;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of CoordKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
