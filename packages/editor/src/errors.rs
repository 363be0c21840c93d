//! Error types for the editor

use crate::surface::AnchorId;
use crate::tree::NodeId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditorError {
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    #[error("Anchor not found: {0:?}")]
    AnchorNotFound(AnchorId),

    #[error("Anchor {0:?} is not attached to the render surface")]
    DetachedAnchor(AnchorId),

    #[error("Node {node:?} is not a {expected}")]
    WrongKind { node: NodeId, expected: &'static str },

    #[error("Node {item:?} is not an item of collection {collection:?}")]
    ItemNotFound { collection: NodeId, item: NodeId },

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EditorError {
    fn from(e: serde_json::Error) -> Self {
        EditorError::Serialization(e.to_string())
    }
}
