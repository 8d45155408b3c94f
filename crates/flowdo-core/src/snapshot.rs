//! Whole-canvas snapshots: the unit of persistence and export.
//!
//! The JSON shape is `{ nodes, edges, groups, viewport? }`. The local
//! autosave omits the viewport; the keyed-store variant and the export file
//! include it. Decoding is lenient about missing arrays and strict about
//! structure: wires to unknown nodes, self-loops, duplicate ids and
//! undersized cards are repaired on import, with a warning each.
//!
//! Snapshots written by earlier builds keep the card type at the top level
//! and the payload in a flat `data` object (`label`, `front`, `back`,
//! `isFlipped`, `quizOptions`, `correctAnswer`, `userSelectedAnswer`,
//! `attachments`). [`Snapshot::from_json`] reads both layouts.

use crate::error::SnapshotError;
use crate::graph::FlowGraph;
use crate::id::NodeId;
use crate::model::{Attachment, Edge, Group, Node, NodeBody, NodeKind, clamp_size};
use crate::viewport::Viewport;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
}

impl Snapshot {
    /// Capture the graph (and optionally the viewport) as a snapshot.
    pub fn capture(graph: &FlowGraph, viewport: Option<Viewport>) -> Self {
        Self {
            nodes: graph.nodes().cloned().collect(),
            edges: graph.edges().collect(),
            groups: graph.groups().to_vec(),
            viewport,
        }
    }

    /// Decode either layout. The error reported is the current layout's.
    pub fn from_json(raw: &str) -> Result<Self, SnapshotError> {
        match serde_json::from_str::<Snapshot>(raw) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => match serde_json::from_str::<LegacySnapshot>(raw) {
                Ok(legacy) => {
                    log::info!("snapshot in the flat-payload layout, converting");
                    Ok(legacy.into())
                }
                Err(_) => Err(e.into()),
            },
        }
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_pretty_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rebuild a graph from this snapshot, repairing anything that would
    /// break the graph invariants. A missing viewport becomes the default.
    pub fn into_graph(self) -> (FlowGraph, Viewport) {
        let mut graph = FlowGraph::new();

        for mut node in self.nodes {
            let (w, h) = clamp_size(node.width, node.height);
            if (w, h) != (node.width, node.height) {
                log::warn!(
                    "snapshot node {} below minimum size ({}x{}), clamped",
                    node.id,
                    node.width,
                    node.height
                );
                node.width = w;
                node.height = h;
            }
            if let Err(e) = graph.add_node(node) {
                log::warn!("snapshot node skipped: {e}");
            }
        }

        for edge in self.edges {
            if let Err(e) = graph.connect_with_id(edge.id, edge.source, edge.target) {
                log::warn!("snapshot wire {} skipped: {e}", edge.id);
            }
        }

        for group in self.groups {
            if let Err(e) = graph.add_group(group) {
                log::warn!("snapshot group skipped: {e}");
            }
        }

        let viewport = self.viewport.unwrap_or_default().sanitized();
        (graph, viewport)
    }
}

// ─── Flat-payload layout ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct LegacySnapshot {
    #[serde(default)]
    nodes: Vec<LegacyNode>,
    #[serde(default)]
    edges: Vec<Edge>,
    #[serde(default)]
    groups: Vec<Group>,
    #[serde(default)]
    viewport: Option<Viewport>,
}

#[derive(Deserialize)]
struct LegacyNode {
    id: NodeId,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    title: String,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    data: LegacyData,
}

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LegacyData {
    label: String,
    front: String,
    back: String,
    is_flipped: bool,
    quiz_options: Vec<String>,
    correct_answer: String,
    user_selected_answer: Option<String>,
    attachments: Vec<serde_json::Value>,
}

impl From<LegacySnapshot> for Snapshot {
    fn from(legacy: LegacySnapshot) -> Self {
        Self {
            nodes: legacy.nodes.into_iter().map(Node::from).collect(),
            edges: legacy.edges,
            groups: legacy.groups,
            viewport: legacy.viewport,
        }
    }
}

impl From<LegacyNode> for Node {
    fn from(legacy: LegacyNode) -> Self {
        let kind = NodeKind::parse(&legacy.kind).unwrap_or_else(|| {
            log::warn!("node {} has unknown type {:?}, kept as a note", legacy.id, legacy.kind);
            NodeKind::Note
        });
        let data = legacy.data;
        let body = match kind {
            NodeKind::Flashcard => NodeBody::Flashcard {
                front: data.front,
                back: data.back,
                flipped: data.is_flipped,
            },
            NodeKind::Quiz => NodeBody::Quiz {
                question: data.label,
                options: SmallVec::from_vec(data.quiz_options),
                answer: data.correct_answer,
                selected: data.user_selected_answer,
            },
            _ => NodeBody::text(kind, data.label),
        };
        let attachments = data
            .attachments
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<Attachment>(raw) {
                Ok(a) => Some(a),
                Err(e) => {
                    log::warn!("node {} attachment skipped: {e}", legacy.id);
                    None
                }
            })
            .collect();
        Node {
            id: legacy.id,
            title: legacy.title,
            x: legacy.x,
            y: legacy.y,
            width: legacy.width,
            height: legacy.height,
            completed: legacy.completed,
            attachments,
            data: body,
        }
    }
}

/// The canvas a first-time user sees: one welcome card, no wires, no groups.
pub fn default_graph() -> FlowGraph {
    let welcome = Node::new(NodeKind::Lecture, 100.0, 100.0)
        .with_id(NodeId::intern("1"))
        .with_title("Welcome to FlowDo")
        .with_size(320.0, 180.0)
        .with_body(NodeBody::Lecture {
            label: "This is an infinite canvas for your thoughts.\n\n\
                    - Drag to move\n\
                    - Right-click to add nodes\n\
                    - Connect nodes by dragging from the dots"
                .to_string(),
        });
    let mut graph = FlowGraph::new();
    // A fresh graph has no ids, so this cannot collide.
    let _ = graph.add_node(welcome);
    graph
}

/// Restore a canvas from stored snapshot text.
///
/// `None` means nothing was ever saved. Unparseable text is logged and
/// treated the same way; both yield the default canvas.
pub fn load_or_default(raw: Option<&str>) -> (FlowGraph, Viewport) {
    match raw.map(Snapshot::from_json) {
        Some(Ok(snapshot)) => {
            log::info!(
                "restored snapshot: {} nodes, {} wires, {} groups",
                snapshot.nodes.len(),
                snapshot.edges.len(),
                snapshot.groups.len()
            );
            snapshot.into_graph()
        }
        Some(Err(e)) => {
            log::error!("Load failed, starting from the default canvas: {e}");
            (default_graph(), Viewport::default())
        }
        None => (default_graph(), Viewport::default()),
    }
}

/// Pretty JSON `{ nodes, edges, groups, viewport }` for the export file.
pub fn export_json(graph: &FlowGraph, viewport: Viewport) -> Result<String, SnapshotError> {
    Snapshot::capture(graph, Some(viewport)).to_pretty_json()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_graph_has_single_welcome_node() {
        let g = default_graph();
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.edge_count(), 0);
        assert!(g.groups().is_empty());
        let node = g.node(NodeId::intern("1")).unwrap();
        assert_eq!(node.title, "Welcome to FlowDo");
        assert_eq!(node.kind(), NodeKind::Lecture);
    }

    #[test]
    fn missing_arrays_decode_as_empty() {
        let snap = Snapshot::from_json(r#"{"nodes":[]}"#).unwrap();
        assert!(snap.edges.is_empty());
        assert!(snap.groups.is_empty());
        assert_eq!(snap.viewport, None);
    }

    #[test]
    fn dangling_and_self_loop_wires_are_dropped() {
        let raw = r#"{
            "nodes": [
                {"id":"a","title":"A","x":0,"y":0,"width":300,"height":200,"data":{"type":"note"}},
                {"id":"b","title":"B","x":400,"y":0,"width":300,"height":200,"data":{"type":"task","label":"do it"}}
            ],
            "edges": [
                {"id":"e1","source":"a","target":"b"},
                {"id":"e2","source":"a","target":"a"},
                {"id":"e3","source":"a","target":"zzz"}
            ]
        }"#;
        let (g, vp) = Snapshot::from_json(raw).unwrap().into_graph();
        assert_eq!(g.node_count(), 2);
        let ids: Vec<&str> = g.edges().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e1"]);
        assert_eq!(vp, Viewport::default());
    }

    #[test]
    fn undersized_nodes_are_clamped() {
        let raw = r#"{"nodes":[{"id":"s","title":"S","x":0,"y":0,"width":20,"height":20,"data":{"type":"idea"}}]}"#;
        let (g, _) = Snapshot::from_json(raw).unwrap().into_graph();
        let n = g.node(NodeId::intern("s")).unwrap();
        assert_eq!((n.width, n.height), (200.0, 100.0));
    }

    #[test]
    fn corrupt_text_falls_back_to_default() {
        let (g, vp) = load_or_default(Some("{\"nodes\": [oops"));
        assert_eq!(g, default_graph());
        assert_eq!(vp, Viewport::default());
    }

    #[test]
    fn capture_then_restore_preserves_graph() {
        let mut g = default_graph();
        let b = g
            .add_node(Node::new(NodeKind::Task, 500.0, 500.0))
            .unwrap();
        g.connect(NodeId::intern("1"), b).unwrap();
        let json = Snapshot::capture(&g, None).to_json().unwrap();
        let (restored, _) = load_or_default(Some(&json));
        assert_eq!(restored, g);
    }

    #[test]
    fn export_includes_viewport() {
        let json = export_json(&default_graph(), Viewport::new(5.0, 6.0, 2.0)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["viewport"]["zoom"], 2.0);
        assert!(value["nodes"].is_array());
    }

    #[test]
    fn flat_payload_layout_is_converted() {
        let raw = r#"{
            "nodes": [
                {"id":"1","type":"lecture","title":"Physics 101: Mechanics","x":100,"y":300,
                 "width":260,"height":160,"completed":false,
                 "data":{"label":"Chapter 1","attachments":[]}},
                {"id":"c","type":"flashcard","title":"Auto Card","x":0,"y":0,"width":300,"height":220,
                 "data":{"label":"","front":"F = ?","back":"ma","isFlipped":true,"attachments":[]}},
                {"id":"q","type":"quiz","title":"Quiz","x":0,"y":400,"width":300,"height":250,
                 "data":{"label":"2+2?","quizOptions":["3","4"],"correctAnswer":"4",
                         "userSelectedAnswer":"3","attachments":[{"bogus":true}]}},
                {"id":"h","type":"hologram","title":"Odd","x":0,"y":0,"width":300,"height":200,"data":{}}
            ],
            "edges": [{"id":"e1","source":"1","target":"c"}],
            "groups": []
        }"#;
        let (g, _) = Snapshot::from_json(raw).unwrap().into_graph();
        assert_eq!(g.node_count(), 4);
        assert_eq!(g.edge_count(), 1);

        let lecture = g.node(NodeId::intern("1")).unwrap();
        assert_eq!(lecture.title, "Physics 101: Mechanics");
        assert_eq!(lecture.data, NodeBody::Lecture { label: "Chapter 1".into() });

        assert_eq!(
            g.node(NodeId::intern("c")).unwrap().data,
            NodeBody::Flashcard { front: "F = ?".into(), back: "ma".into(), flipped: true }
        );

        let quiz = g.node(NodeId::intern("q")).unwrap();
        assert!(quiz.attachments.is_empty());
        match &quiz.data {
            NodeBody::Quiz { question, options, answer, selected } => {
                assert_eq!(question, "2+2?");
                assert_eq!(options.as_slice(), ["3".to_string(), "4".to_string()]);
                assert_eq!(answer, "4");
                assert_eq!(selected.as_deref(), Some("3"));
            }
            other => panic!("unexpected payload {other:?}"),
        }

        assert_eq!(g.node(NodeId::intern("h")).unwrap().kind(), NodeKind::Note);
    }

    #[test]
    fn flat_layout_survives_load_or_default() {
        let raw = r#"{"nodes":[{"id":"n","type":"task","title":"Read","x":0,"y":0,"width":300,"height":200,
                      "completed":true,"data":{"label":"ch. 2"}}]}"#;
        let (g, _) = load_or_default(Some(raw));
        assert_ne!(g, default_graph());
        let task = g.node(NodeId::intern("n")).unwrap();
        assert!(task.completed);
        assert_eq!(task.data.text_content(), "ch. 2");
    }

    #[test]
    fn unreadable_text_reports_current_layout_error() {
        assert!(matches!(Snapshot::from_json("[]"), Err(SnapshotError::Json(_))));
    }
}
