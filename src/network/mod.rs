//! Network Module
//!
//! TCP server and client handling for the line protocol.
//!
//! ## Architecture
//! - Single acceptor thread
//! - One thread per connection, capped by `max_connections`
//! - Requests routed through Engine; watch streams keep their connection

mod connection;
mod server;

pub use connection::Connection;
pub use server::{Server, ShutdownHandle};
