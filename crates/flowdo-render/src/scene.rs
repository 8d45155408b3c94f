//! Flow graph → ordered render list for the external canvas renderer.
//!
//! Paint order is groups, wires, the pending connection preview, then nodes
//! (back to front). The renderer applies `translate(viewport.x, viewport.y)
//! scale(viewport.zoom())` to everything in the list; all coordinates here are
//! world coordinates.

use crate::wire::{edge_curve, svg_path};
use flowdo_core::defaults::GRID_SIZE;
use flowdo_core::{FlowGraph, Node, NodeBody, NodeId, Point, Selection, Viewport};
use serde::Serialize;

/// A connection being dragged out of `source`'s output port.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingWire {
    pub source: NodeId,
    /// Floating endpoint in world coordinates.
    pub end: Point,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RenderItem<'a> {
    #[serde(rename_all = "camelCase")]
    Group {
        id: &'a str,
        title: &'a str,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: &'a str,
        selected: bool,
    },
    #[serde(rename_all = "camelCase")]
    Wire {
        id: &'a str,
        path: String,
        selected: bool,
    },
    /// Dashed straight preview line from the source port to the pointer.
    #[serde(rename_all = "camelCase")]
    PendingWire { x1: f32, y1: f32, x2: f32, y2: f32 },
    #[serde(rename_all = "camelCase")]
    Node {
        id: &'a str,
        node_type: &'static str,
        title: &'a str,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        completed: bool,
        accent: &'static str,
        selected: bool,
        attachments: usize,
        data: &'a NodeBody,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderList<'a> {
    pub viewport: Viewport,
    pub grid_size: f32,
    pub items: Vec<RenderItem<'a>>,
}

impl RenderList<'_> {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Build the paint list for one frame.
pub fn build_render_list<'a>(
    graph: &'a FlowGraph,
    viewport: Viewport,
    selection: Selection,
    pending: Option<PendingWire>,
) -> RenderList<'a> {
    let mut items = Vec::with_capacity(graph.groups().len() + graph.edge_count() + graph.node_count() + 1);

    for group in graph.groups() {
        items.push(RenderItem::Group {
            id: group.id.as_str(),
            title: &group.title,
            x: group.x,
            y: group.y,
            width: group.width,
            height: group.height,
            color: &group.color,
            selected: selection == Selection::Group(group.id),
        });
    }

    for edge in graph.edges() {
        let Some(curve) = edge_curve(graph, &edge) else {
            log::trace!("wire {} skipped: endpoint missing", edge.id);
            continue;
        };
        items.push(RenderItem::Wire {
            id: edge.id.as_str(),
            path: svg_path(&curve),
            selected: selection == Selection::Edge(edge.id),
        });
    }

    if let Some(p) = pending
        && let Some(source) = graph.node(p.source)
    {
        let start = source.output_port();
        items.push(RenderItem::PendingWire {
            x1: start.x,
            y1: start.y,
            x2: p.end.x,
            y2: p.end.y,
        });
    }

    for node in graph.nodes() {
        items.push(node_item(node, selection == Selection::Node(node.id)));
    }

    RenderList {
        viewport,
        grid_size: GRID_SIZE * viewport.zoom(),
        items,
    }
}

fn node_item(node: &Node, selected: bool) -> RenderItem<'_> {
    let kind = node.kind();
    RenderItem::Node {
        id: node.id.as_str(),
        node_type: kind.as_str(),
        title: &node.title,
        x: node.x,
        y: node.y,
        width: node.width,
        height: node.height,
        completed: node.completed,
        accent: kind.accent(),
        selected,
        attachments: node.attachments.len(),
        data: &node.data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowdo_core::{Bounds, Group, NodeKind, default_graph};

    #[test]
    fn paint_order_groups_wires_preview_nodes() {
        let mut g = default_graph();
        let welcome = NodeId::intern("1");
        let b = g.add_node(Node::new(NodeKind::Task, 600.0, 100.0)).unwrap();
        g.connect(welcome, b).unwrap();
        g.add_group(Group::new(
            "Week 1",
            Bounds { x: 0.0, y: 0.0, width: 1200.0, height: 600.0 },
        ))
        .unwrap();

        let list = build_render_list(
            &g,
            Viewport::default(),
            Selection::Node(b),
            Some(PendingWire { source: welcome, end: Point::new(50.0, 50.0) }),
        );
        let kinds: Vec<&str> = list
            .items
            .iter()
            .map(|i| match i {
                RenderItem::Group { .. } => "group",
                RenderItem::Wire { .. } => "wire",
                RenderItem::PendingWire { .. } => "pending",
                RenderItem::Node { .. } => "node",
            })
            .collect();
        assert_eq!(kinds, vec!["group", "wire", "pending", "node", "node"]);

        let selected: Vec<bool> = list
            .items
            .iter()
            .filter_map(|i| match i {
                RenderItem::Node { selected, .. } => Some(*selected),
                _ => None,
            })
            .collect();
        assert_eq!(selected, vec![false, true]);
    }

    #[test]
    fn wire_item_carries_edge_id_and_curve() {
        let mut g = FlowGraph::new();
        let a = g.add_node(Node::new(NodeKind::Note, 0.0, 0.0)).unwrap();
        let b = g.add_node(Node::new(NodeKind::Note, 700.0, 0.0)).unwrap();
        let e = g.connect(a, b).unwrap();

        let list = build_render_list(&g, Viewport::default(), Selection::Edge(e), None);
        let wire = list.items.iter().find_map(|i| match i {
            RenderItem::Wire { id, path, selected } => Some((*id, path.clone(), *selected)),
            _ => None,
        });
        assert_eq!(wire, Some((e.as_str(), "M 300 40 C 500 40, 500 40, 700 40".to_string(), true)));
    }

    #[test]
    fn json_shape_is_tagged() {
        let g = default_graph();
        let list = build_render_list(&g, Viewport::new(0.0, 0.0, 2.0), Selection::None, None);
        let value: serde_json::Value = serde_json::from_str(&list.to_json().unwrap()).unwrap();
        assert_eq!(value["gridSize"], 48.0);
        assert_eq!(value["items"][0]["kind"], "node");
        assert_eq!(value["items"][0]["nodeType"], "lecture");
        assert_eq!(value["items"][0]["data"]["type"], "lecture");
    }
}
