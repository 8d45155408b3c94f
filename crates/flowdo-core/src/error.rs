use crate::id::{EdgeId, GroupId, NodeId};
use thiserror::Error;

/// Rejected structural edits on a [`FlowGraph`](crate::graph::FlowGraph).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("a node cannot be connected to itself ({0})")]
    SelfLoop(NodeId),

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("unknown group {0}")]
    UnknownGroup(GroupId),

    #[error("node id {0} is already in use")]
    DuplicateNode(NodeId),

    #[error("edge id {0} is already in use")]
    DuplicateEdge(EdgeId),

    #[error("group id {0} is already in use")]
    DuplicateGroup(GroupId),
}

/// Failure to decode a persisted snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
