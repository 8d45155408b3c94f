//! The flow graph: nodes as graph vertices, wires as directed graph edges.
//!
//! Wires live in the `petgraph` adjacency structure, so removing a node
//! drops every wire touching it in the same step. Paint order (back to
//! front) and wire order are tracked explicitly because `StableDiGraph`
//! reuses vacant slots and its index order is not insertion order.

use crate::error::GraphError;
use crate::id::{EdgeId, GroupId, NodeId};
use crate::model::{Edge, Group, Node};
use petgraph::Direction;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct FlowGraph {
    graph: StableDiGraph<Node, EdgeId>,
    node_index: HashMap<NodeId, NodeIndex>,
    edge_index: HashMap<EdgeId, EdgeIndex>,
    /// Node paint order, back to front.
    order: Vec<NodeIndex>,
    /// Wire creation order.
    edge_order: Vec<EdgeId>,
    groups: Vec<Group>,
}

impl FlowGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Nodes ───────────────────────────────────────────────────────────

    /// Insert a node on top of the paint order.
    pub fn add_node(&mut self, node: Node) -> Result<NodeId, GraphError> {
        let id = node.id;
        if self.node_index.contains_key(&id) {
            return Err(GraphError::DuplicateNode(id));
        }
        let idx = self.graph.add_node(node);
        self.node_index.insert(id, idx);
        self.order.push(idx);
        Ok(id)
    }

    /// Remove a node together with every wire where it is source or target.
    /// Returns the node and the removed wires.
    pub fn remove_node(&mut self, id: NodeId) -> Option<(Node, Vec<Edge>)> {
        let removed_edges = self.edges_of(id);
        let idx = self.node_index.remove(&id)?;
        for edge in &removed_edges {
            self.edge_index.remove(&edge.id);
        }
        self.edge_order
            .retain(|e| !removed_edges.iter().any(|r| r.id == *e));
        self.order.retain(|i| *i != idx);
        let node = self.graph.remove_node(idx)?;
        Some((node, removed_edges))
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.node_index.get(&id).map(|idx| &self.graph[*idx])
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.node_index
            .get(&id)
            .copied()
            .map(|idx| &mut self.graph[idx])
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.node_index.contains_key(&id)
    }

    /// Nodes in paint order (back to front).
    pub fn nodes(&self) -> impl DoubleEndedIterator<Item = &Node> + '_ {
        self.order.iter().map(|idx| &self.graph[*idx])
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> + '_ {
        self.graph.node_weights_mut()
    }

    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    /// Raise a node to the top of the paint order.
    pub fn bring_to_front(&mut self, id: NodeId) -> bool {
        let Some(idx) = self.node_index.get(&id).copied() else {
            return false;
        };
        let Some(pos) = self.order.iter().position(|i| *i == idx) else {
            return false;
        };
        if pos + 1 == self.order.len() {
            return false;
        }
        self.order.remove(pos);
        self.order.push(idx);
        true
    }

    // ─── Edges ───────────────────────────────────────────────────────────

    /// Connect `source` → `target` with a freshly generated wire id.
    pub fn connect(&mut self, source: NodeId, target: NodeId) -> Result<EdgeId, GraphError> {
        self.connect_with_id(EdgeId::fresh(), source, target)
    }

    /// Connect with a caller-chosen id (used when restoring snapshots).
    pub fn connect_with_id(
        &mut self,
        id: EdgeId,
        source: NodeId,
        target: NodeId,
    ) -> Result<EdgeId, GraphError> {
        if source == target {
            return Err(GraphError::SelfLoop(source));
        }
        if self.edge_index.contains_key(&id) {
            return Err(GraphError::DuplicateEdge(id));
        }
        let s = *self
            .node_index
            .get(&source)
            .ok_or(GraphError::UnknownNode(source))?;
        let t = *self
            .node_index
            .get(&target)
            .ok_or(GraphError::UnknownNode(target))?;
        let eidx = self.graph.add_edge(s, t, id);
        self.edge_index.insert(id, eidx);
        self.edge_order.push(id);
        Ok(id)
    }

    pub fn disconnect(&mut self, id: EdgeId) -> Option<Edge> {
        let edge = self.edge(id)?;
        let eidx = self.edge_index.remove(&id)?;
        self.graph.remove_edge(eidx);
        self.edge_order.retain(|e| *e != id);
        Some(edge)
    }

    pub fn edge(&self, id: EdgeId) -> Option<Edge> {
        let eidx = *self.edge_index.get(&id)?;
        let (s, t) = self.graph.edge_endpoints(eidx)?;
        Some(Edge {
            id,
            source: self.graph[s].id,
            target: self.graph[t].id,
        })
    }

    /// Wires in creation order.
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.edge_order.iter().filter_map(|id| self.edge(*id))
    }

    pub fn edge_count(&self) -> usize {
        self.edge_order.len()
    }

    /// Every wire where `id` is source or target.
    pub fn edges_of(&self, id: NodeId) -> Vec<Edge> {
        let Some(idx) = self.node_index.get(&id).copied() else {
            return Vec::new();
        };
        let mut out: Vec<Edge> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .chain(self.graph.edges_directed(idx, Direction::Incoming))
            .map(|e| Edge {
                id: *e.weight(),
                source: self.graph[e.source()].id,
                target: self.graph[e.target()].id,
            })
            .collect();
        out.sort_by_key(|e| self.edge_order.iter().position(|o| *o == e.id));
        out
    }

    // ─── Groups ──────────────────────────────────────────────────────────

    pub fn add_group(&mut self, group: Group) -> Result<GroupId, GraphError> {
        if self.groups.iter().any(|g| g.id == group.id) {
            return Err(GraphError::DuplicateGroup(group.id));
        }
        let id = group.id;
        self.groups.push(group);
        Ok(id)
    }

    /// Remove a group. Nodes inside its rectangle are untouched.
    pub fn remove_group(&mut self, id: GroupId) -> Option<Group> {
        let pos = self.groups.iter().position(|g| g.id == id)?;
        Some(self.groups.remove(pos))
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn group_mut(&mut self, id: GroupId) -> Option<&mut Group> {
        self.groups.iter_mut().find(|g| g.id == id)
    }

    /// Groups in paint order (back to front).
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty() && self.groups.is_empty()
    }
}

impl PartialEq for FlowGraph {
    /// Structural equality: same nodes in the same paint order, same wires,
    /// same groups.
    fn eq(&self, other: &Self) -> bool {
        self.nodes().eq(other.nodes())
            && self.edges().eq(other.edges())
            && self.groups == other.groups
    }
}
