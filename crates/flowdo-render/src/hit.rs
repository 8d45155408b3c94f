//! Hit testing: world point → what is under it.
//!
//! Walks nodes front-to-back (last painted = topmost), then wires, then
//! groups. Within a node the small interactive parts win over the card
//! itself: ports first (they stick out past the card edge), then the
//! resize grip, then the header band.

use crate::wire::{WIRE_HIT_TOLERANCE, hit_test_wire};
use flowdo_core::defaults::{HEADER_HEIGHT, PORT_RADIUS, RESIZE_HANDLE_SIZE};
use flowdo_core::{EdgeId, FlowGraph, Group, GroupId, Node, NodeId, Point};

/// Which part of a node card was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodePart {
    /// Title bar, the draggable chrome.
    Header,
    /// Content area; owned by the card's own editors.
    Body,
    ResizeHandle,
    OutputPort,
    InputPort,
}

/// Which part of a group region was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupPart {
    Header,
    ResizeHandle,
    /// Empty interior; behaves like background.
    Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hit {
    Node { id: NodeId, part: NodePart },
    Wire(EdgeId),
    Group { id: GroupId, part: GroupPart },
    Background,
}

impl Hit {
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Hit::Node { id, .. } => Some(*id),
            _ => None,
        }
    }
}

/// Height of a group's title band.
pub const GROUP_HEADER_HEIGHT: f32 = 44.0;
/// Inset of the group resize grip from the bottom-right corner.
const GROUP_GRIP_INSET: f32 = 8.0;

/// Find what sits at world position `p`.
pub fn hit_test(graph: &FlowGraph, p: Point) -> Hit {
    for node in graph.nodes().rev() {
        if let Some(part) = node_part_at(node, p) {
            return Hit::Node { id: node.id, part };
        }
    }

    if let Some(edge) = hit_test_wire(graph, p, WIRE_HIT_TOLERANCE) {
        return Hit::Wire(edge.id);
    }

    for group in graph.groups().iter().rev() {
        if let Some(part) = group_part_at(group, p) {
            return Hit::Group { id: group.id, part };
        }
    }

    Hit::Background
}

/// Topmost node whose input port contains `p`.
pub fn input_port_at(graph: &FlowGraph, p: Point) -> Option<NodeId> {
    graph
        .nodes()
        .rev()
        .find(|n| within_port(n.input_port(), p))
        .map(|n| n.id)
}

fn within_port(port: Point, p: Point) -> bool {
    port.distance_sq(p) <= PORT_RADIUS * PORT_RADIUS
}

/// Classify `p` against a single node, or `None` if it misses.
pub fn node_part_at(node: &Node, p: Point) -> Option<NodePart> {
    if within_port(node.output_port(), p) {
        return Some(NodePart::OutputPort);
    }
    if within_port(node.input_port(), p) {
        return Some(NodePart::InputPort);
    }

    let b = node.bounds();
    if !b.contains(p) {
        return None;
    }
    if p.x >= b.right() - RESIZE_HANDLE_SIZE && p.y >= b.bottom() - RESIZE_HANDLE_SIZE {
        return Some(NodePart::ResizeHandle);
    }
    if p.y <= b.y + HEADER_HEIGHT {
        return Some(NodePart::Header);
    }
    Some(NodePart::Body)
}

fn group_part_at(group: &Group, p: Point) -> Option<GroupPart> {
    let b = group.bounds();
    if !b.contains(p) {
        return None;
    }
    let grip_x = b.right() - GROUP_GRIP_INSET - RESIZE_HANDLE_SIZE;
    let grip_y = b.bottom() - GROUP_GRIP_INSET - RESIZE_HANDLE_SIZE;
    if p.x >= grip_x && p.y >= grip_y {
        return Some(GroupPart::ResizeHandle);
    }
    if p.y <= b.y + GROUP_HEADER_HEIGHT {
        return Some(GroupPart::Header);
    }
    Some(GroupPart::Body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowdo_core::{Bounds, NodeKind};

    fn graph_with_two_nodes() -> (FlowGraph, NodeId, NodeId) {
        let mut g = FlowGraph::new();
        let a = g.add_node(Node::new(NodeKind::Note, 0.0, 0.0)).unwrap();
        // Overlaps `a` and is painted above it.
        let b = g.add_node(Node::new(NodeKind::Task, 100.0, 100.0)).unwrap();
        (g, a, b)
    }

    #[test]
    fn topmost_node_wins() {
        let (g, _, b) = graph_with_two_nodes();
        assert_eq!(
            hit_test(&g, Point::new(150.0, 110.0)),
            Hit::Node { id: b, part: NodePart::Header }
        );
    }

    #[test]
    fn parts_are_classified() {
        let (g, a, _) = graph_with_two_nodes();
        assert_eq!(
            hit_test(&g, Point::new(50.0, 10.0)),
            Hit::Node { id: a, part: NodePart::Header }
        );
        assert_eq!(
            hit_test(&g, Point::new(50.0, 80.0)),
            Hit::Node { id: a, part: NodePart::Body }
        );
        // Input port straddles the left edge.
        assert_eq!(
            hit_test(&g, Point::new(-8.0, 40.0)),
            Hit::Node { id: a, part: NodePart::InputPort }
        );
    }

    #[test]
    fn resize_handle_and_output_port() {
        let mut g = FlowGraph::new();
        let a = g.add_node(Node::new(NodeKind::Note, 0.0, 0.0)).unwrap();
        assert_eq!(
            hit_test(&g, Point::new(290.0, 190.0)),
            Hit::Node { id: a, part: NodePart::ResizeHandle }
        );
        assert_eq!(
            hit_test(&g, Point::new(306.0, 42.0)),
            Hit::Node { id: a, part: NodePart::OutputPort }
        );
    }

    #[test]
    fn groups_sit_below_nodes() {
        let (mut g, _, _) = graph_with_two_nodes();
        let gid = g
            .add_group(Group::new(
                "Week 1",
                Bounds { x: -100.0, y: -100.0, width: 2000.0, height: 1000.0 },
            ))
            .unwrap();
        assert_eq!(
            hit_test(&g, Point::new(1000.0, -90.0)),
            Hit::Group { id: gid, part: GroupPart::Header }
        );
        assert_eq!(
            hit_test(&g, Point::new(1000.0, 500.0)),
            Hit::Group { id: gid, part: GroupPart::Body }
        );
        assert_eq!(hit_test(&g, Point::new(5000.0, 5000.0)), Hit::Background);
    }

    #[test]
    fn input_port_lookup() {
        let (g, _, b) = graph_with_two_nodes();
        assert_eq!(input_port_at(&g, Point::new(100.0, 140.0)), Some(b));
        assert_eq!(input_port_at(&g, Point::new(400.0, 400.0)), None);
    }
}
