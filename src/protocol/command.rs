//! Command definitions
//!
//! Represents one line received from a client.

use super::{Request, Verb};

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    Get,
    Post,
    Put,
    Delete,
    Watch,
    Cancel,
    Ping,
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// A key/value request (GET, POST, PUT, DELETE)
    Request(Request),

    /// Subscribe to every change under a prefix
    Watch { prefix: String },

    /// End the current watch stream
    Cancel,

    /// Ping (health check)
    Ping,
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Request(request) => match request.verb {
                Verb::Get => CommandType::Get,
                Verb::Post => CommandType::Post,
                Verb::Put => CommandType::Put,
                Verb::Delete => CommandType::Delete,
            },
            Command::Watch { .. } => CommandType::Watch,
            Command::Cancel => CommandType::Cancel,
            Command::Ping => CommandType::Ping,
        }
    }
}
