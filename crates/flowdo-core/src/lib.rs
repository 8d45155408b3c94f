pub mod defaults;
pub mod error;
pub mod graph;
pub mod id;
pub mod model;
pub mod snapshot;
pub mod viewport;

pub use error::{GraphError, SnapshotError};
pub use graph::FlowGraph;
pub use id::{AttachmentId, EdgeId, GroupId, NodeId};
pub use model::*;
pub use snapshot::{Snapshot, default_graph, export_json, load_or_default};
pub use viewport::Viewport;
