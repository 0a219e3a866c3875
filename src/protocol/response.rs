//! Response definitions
//!
//! Logical response fields, serialized with the coordination service's
//! camelCase field names.

use serde::Serialize;

use crate::error::CoordError;
use crate::store::Node;
use crate::watch::WatchUpdate;

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    NotFound,
    FailedPrecondition,
    Cancelled,
    InvalidArgument,
    Internal,
}

/// Action names reported in a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Get,
    Create,
    Set,
    Delete,
}

/// A single entry as reported to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeView {
    pub key: String,

    /// Omitted for deleted nodes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    pub created_index: u64,
    pub modified_index: u64,
}

impl From<&Node> for NodeView {
    fn from(node: &Node) -> Self {
        Self {
            key: node.key.clone(),
            value: (!node.deleted).then(|| node.value.clone()),
            created_index: node.created_index,
            modified_index: node.modified_index,
        }
    }
}

/// A directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirView {
    pub dir: bool,
    pub created_index: u64,
    pub modified_index: u64,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<NodeView>,
}

/// The `node` member of a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResultNode {
    Single(NodeView),
    Directory(DirView),
}

/// `{action, node}` payload of a successful response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResult {
    pub action: Action,
    pub node: ResultNode,
}

impl ActionResult {
    pub fn single(action: Action, node: &Node) -> Self {
        Self {
            action,
            node: ResultNode::Single(NodeView::from(node)),
        }
    }

    /// Directories carry no index of their own; both are reported as 1.
    pub fn directory(action: Action, nodes: &[Node]) -> Self {
        Self {
            action,
            node: ResultNode::Directory(DirView {
                dir: true,
                created_index: 1,
                modified_index: 1,
                nodes: nodes.iter().map(NodeView::from).collect(),
            }),
        }
    }
}

/// A response delivered to a request callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    /// Status code
    pub status: Status,

    /// Human-readable reason for a non-OK status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Action payload (OK responses only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ActionResult>,

    /// Store's global index when the response was produced
    pub index: u64,
}

impl Response {
    /// Create an OK response
    pub fn ok(result: ActionResult, index: u64) -> Self {
        Self {
            status: Status::Ok,
            message: None,
            result: Some(result),
            index,
        }
    }

    /// Create a response reporting `error`
    pub fn from_error(error: &CoordError, index: u64) -> Self {
        Self {
            status: error.status(),
            message: Some(error.to_string()),
            result: None,
            index,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    pub fn action(&self) -> Option<Action> {
        self.result.as_ref().map(|r| r.action)
    }

    /// The single-entry node, if this is a single-entry result
    pub fn node(&self) -> Option<&NodeView> {
        match self.result.as_ref().map(|r| &r.node) {
            Some(ResultNode::Single(node)) => Some(node),
            _ => None,
        }
    }

    /// The directory listing, if this is a directory result
    pub fn dir(&self) -> Option<&DirView> {
        match self.result.as_ref().map(|r| &r.node) {
            Some(ResultNode::Directory(dir)) => Some(dir),
            _ => None,
        }
    }
}

/// `{node, exists}` as delivered to watch streams
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchUpdateView {
    pub node: NodeView,
    pub exists: bool,
}

impl From<&WatchUpdate> for WatchUpdateView {
    fn from(update: &WatchUpdate) -> Self {
        Self {
            node: NodeView::from(&update.node),
            exists: update.exists,
        }
    }
}
