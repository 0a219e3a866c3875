//! Protocol codec
//!
//! Encoding and decoding functions for the line protocol.
//!
//! ## Request Line
//! ```text
//! VERB KEY [name=value&name=value...]
//! WATCH PREFIX
//! CANCEL
//! PING
//! ```
//! Tokens are separated by whitespace. Parameters are
//! `application/x-www-form-urlencoded`, so values may carry any bytes,
//! including whitespace, `&` and `=`.
//!
//! ## Response Line
//! One JSON object per line (see [`Response`]). Watch streams emit
//! `{"status":"ok","updates":[{node, exists}, ...]}` per batch.

use serde::Serialize;
use url::form_urlencoded;

use crate::error::{CoordError, Result};
use crate::watch::WatchUpdate;

use super::{Command, Params, Request, Response, Status, Verb, WatchUpdateView};

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Decode one request line
pub fn decode_command(line: &str) -> Result<Command> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let (&head, rest) = tokens
        .split_first()
        .ok_or_else(|| CoordError::Protocol("empty command".to_string()))?;

    match head.to_ascii_uppercase().as_str() {
        "PING" => expect_args(head, rest, 0).map(|_| Command::Ping),
        "CANCEL" => expect_args(head, rest, 0).map(|_| Command::Cancel),
        "WATCH" => {
            expect_args(head, rest, 1)?;
            Ok(Command::Watch {
                prefix: rest[0].to_string(),
            })
        }
        _ => {
            let verb: Verb = head.parse()?;
            if rest.is_empty() || rest.len() > 2 {
                return Err(CoordError::Protocol(format!(
                    "{}: expected KEY [PARAMS], got {} arguments",
                    verb,
                    rest.len()
                )));
            }
            let params = match rest.get(1) {
                Some(raw) => decode_params(raw)?,
                None => Params::new(),
            };
            Ok(Command::Request(Request {
                verb,
                key: rest[0].to_string(),
                params,
            }))
        }
    }
}

fn expect_args(head: &str, args: &[&str], count: usize) -> Result<()> {
    if args.len() != count {
        return Err(CoordError::Protocol(format!(
            "{}: expected {} arguments, got {}",
            head.to_ascii_uppercase(),
            count,
            args.len()
        )));
    }
    Ok(())
}

/// Decode `name=value&name=value`, percent-decoding names and values
fn decode_params(raw: &str) -> Result<Params> {
    for pair in raw.split('&').filter(|pair| !pair.is_empty()) {
        match pair.split_once('=') {
            Some((name, _)) if !name.is_empty() => {}
            _ => {
                return Err(CoordError::Protocol(format!(
                    "malformed parameter: {}",
                    pair
                )))
            }
        }
    }
    Ok(form_urlencoded::parse(raw.as_bytes()).collect())
}

/// Encode parameters as `name=value&name=value`, percent-encoding both sides
fn encode_params(params: &Params) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (name, value) in params.iter() {
        serializer.append_pair(name, value);
    }
    serializer.finish()
}

/// Encode a command as a request line (without the trailing newline)
pub fn encode_command(command: &Command) -> String {
    match command {
        Command::Request(request) => {
            let mut line = format!("{} {}", request.verb, request.key);
            if !request.params.is_empty() {
                line.push(' ');
                line.push_str(&encode_params(&request.params));
            }
            line
        }
        Command::Watch { prefix } => format!("WATCH {}", prefix),
        Command::Cancel => "CANCEL".to_string(),
        Command::Ping => "PING".to_string(),
    }
}

// =============================================================================
// Response Encoding
// =============================================================================

/// Encode a response as one JSON line (without the trailing newline)
pub fn encode_response(response: &Response) -> Result<String> {
    serde_json::to_string(response).map_err(|e| CoordError::Protocol(e.to_string()))
}

#[derive(Serialize)]
struct WatchBatch {
    status: Status,
    updates: Vec<WatchUpdateView>,
}

/// Encode a watch batch as one JSON line (without the trailing newline)
pub fn encode_watch_batch(updates: &[WatchUpdate]) -> Result<String> {
    let batch = WatchBatch {
        status: Status::Ok,
        updates: updates.iter().map(WatchUpdateView::from).collect(),
    };
    serde_json::to_string(&batch).map_err(|e| CoordError::Protocol(e.to_string()))
}
