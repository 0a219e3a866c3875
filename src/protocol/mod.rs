//! Protocol Module
//!
//! The logical request and response shapes of the coordination API, plus a
//! line-oriented text encoding used by the TCP adapter.
//!
//! ## Requests
//! A verb (GET, POST, PUT, DELETE), a key, and string parameters:
//! - `value`: payload (required for POST and PUT)
//! - `ttl`: seconds until the entry expires
//! - `prevExist`: `true` / `false`
//! - `prevIndex`: decimal modified index
//!
//! ## Responses
//! ```text
//! { status, message?, result?: { action, node }, index }
//! ```
//! `node` is either a single entry `{key, value?, createdIndex, modifiedIndex}`
//! or a directory `{dir: true, createdIndex, modifiedIndex, nodes?}`.
//!
//! ## Wire Format (one line per message)
//! ```text
//! PUT /key value=v&prevIndex=3     →  {"status":"ok","result":{...},"index":4}
//! WATCH /dir/                      →  {"status":"ok","updates":[...]} ...
//! CANCEL                           →  {"status":"cancelled","index":0}
//! PING                             →  PONG
//! ```

mod codec;
mod command;
mod request;
mod response;

pub use codec::{decode_command, encode_command, encode_response, encode_watch_batch};
pub use command::{Command, CommandType};
pub use request::{Params, Request, Verb};
pub use response::{Action, ActionResult, DirView, NodeView, ResultNode, Response, Status, WatchUpdateView};
