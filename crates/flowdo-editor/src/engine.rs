//! Mutation engine: the single owner of the flow graph and the viewport.
//!
//! Every change to the graph funnels through [`FlowEngine::apply`], which
//! validates the mutation, applies it and bumps a revision counter. The
//! autosave loop watches that counter, and the undo stack snapshots the
//! graph around it.

use flowdo_core::defaults::{MIN_NODE_HEIGHT, MIN_NODE_WIDTH, WORKING_TITLE};
use flowdo_core::{
    Attachment, AttachmentId, EdgeId, FlowGraph, GraphError, Group, GroupId, Node, NodeBody,
    NodeId, NodeKind, Point, Snapshot, Viewport, clamp_size, default_graph,
};
use std::collections::HashMap;

/// A single graph edit produced by the interaction layer or an editor command.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphMutation {
    AddNode {
        node: Box<Node>,
    },
    /// Removes the node and every wire touching it.
    RemoveNode {
        id: NodeId,
    },
    /// World-space delta.
    MoveNode {
        id: NodeId,
        dx: f32,
        dy: f32,
    },
    /// World-space delta; the result is clamped to the minimum card size.
    ResizeNode {
        id: NodeId,
        dw: f32,
        dh: f32,
    },
    SetTitle {
        id: NodeId,
        title: String,
    },
    /// Replace the main text field of a text-bearing node.
    SetText {
        id: NodeId,
        text: String,
    },
    /// Replace the whole payload. The payload must keep the node's kind.
    SetBody {
        id: NodeId,
        body: NodeBody,
    },
    SetCompleted {
        id: NodeId,
        completed: bool,
    },
    ToggleFlip {
        id: NodeId,
    },
    /// Record a quiz answer. Ignored once an answer has been chosen.
    AnswerQuiz {
        id: NodeId,
        option: String,
    },
    AddAttachment {
        id: NodeId,
        attachment: Attachment,
    },
    RemoveAttachment {
        id: NodeId,
        attachment: AttachmentId,
    },
    /// Clear the completed flag on every node.
    ResetProgress,
    Connect {
        id: EdgeId,
        source: NodeId,
        target: NodeId,
    },
    Disconnect {
        id: EdgeId,
    },
    AddGroup {
        group: Box<Group>,
    },
    RemoveGroup {
        id: GroupId,
    },
    MoveGroup {
        id: GroupId,
        dx: f32,
        dy: f32,
    },
    ResizeGroup {
        id: GroupId,
        dw: f32,
        dh: f32,
    },
    SetGroupTitle {
        id: GroupId,
        title: String,
    },
}

/// A user-facing message raised by a failed or degraded operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Authoritative canvas state.
pub struct FlowEngine {
    pub graph: FlowGraph,
    pub viewport: Viewport,
    /// Bumped on every graph change.
    revision: u64,
    notices: Vec<Notice>,
    /// Nodes with an AI action in flight.
    in_flight: HashMap<NodeId, InFlight>,
    next_ticket: u64,
}

#[derive(Debug, Clone)]
struct InFlight {
    /// Title the working indicator replaced.
    original_title: String,
    ticket: u64,
}

impl Default for FlowEngine {
    fn default() -> Self {
        Self::new(default_graph(), Viewport::default())
    }
}

impl FlowEngine {
    pub fn new(graph: FlowGraph, viewport: Viewport) -> Self {
        Self {
            graph,
            viewport,
            revision: 0,
            notices: Vec::new(),
            in_flight: HashMap::new(),
            next_ticket: 0,
        }
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let (graph, viewport) = snapshot.into_graph();
        Self::new(graph, viewport)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Capture the persisted state. The viewport rides along only when asked.
    pub fn snapshot(&self, with_viewport: bool) -> Snapshot {
        Snapshot::capture(&self.graph, with_viewport.then_some(self.viewport))
    }

    /// The graph with every working indicator swapped back to the title it
    /// replaced. Undo history stores this form.
    pub fn settled_graph(&self) -> FlowGraph {
        let mut graph = self.graph.clone();
        for (id, job) in &self.in_flight {
            if let Some(node) = graph.node_mut(*id) {
                node.title = job.original_title.clone();
            }
        }
        graph
    }

    /// Replace the whole graph (undo, redo). Nodes still waiting on an AI
    /// call keep showing the working indicator.
    pub fn replace_graph(&mut self, graph: FlowGraph) {
        self.graph = graph;
        self.in_flight.retain(|id, _| self.graph.contains_node(*id));
        for id in self.in_flight.keys() {
            if let Some(node) = self.graph.node_mut(*id) {
                node.title = WORKING_TITLE.to_string();
            }
        }
        self.touch();
    }

    /// Replace graph and viewport from an imported snapshot. Pending AI
    /// actions are abandoned.
    pub fn restore(&mut self, snapshot: Snapshot) {
        self.abandon_in_flight();
        let (graph, viewport) = snapshot.into_graph();
        self.viewport = viewport;
        self.replace_graph(graph);
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    // ─── Notices ─────────────────────────────────────────────────────────

    pub fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            NoticeLevel::Info => log::info!("{message}"),
            NoticeLevel::Error => log::error!("{message}"),
        }
        self.notices.push(Notice { level, message });
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // ─── AI bookkeeping ──────────────────────────────────────────────────

    /// Returns the ticket the matching completion must present.
    pub(crate) fn mark_in_flight(&mut self, id: NodeId, original_title: String) -> u64 {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.in_flight.insert(
            id,
            InFlight {
                original_title,
                ticket,
            },
        );
        ticket
    }

    /// The saved title, if `ticket` is still the live action on `id`.
    pub(crate) fn finish_in_flight(&mut self, id: NodeId, ticket: u64) -> Option<String> {
        match self.in_flight.get(&id) {
            Some(job) if job.ticket == ticket => {
                self.in_flight.remove(&id).map(|job| job.original_title)
            }
            _ => None,
        }
    }

    /// Forget every pending AI action and put the saved titles back. Their
    /// completions are then dropped.
    pub fn abandon_in_flight(&mut self) {
        if self.in_flight.is_empty() {
            return;
        }
        log::info!("abandoning {} pending AI action(s)", self.in_flight.len());
        for (id, job) in self.in_flight.drain() {
            if let Some(node) = self.graph.node_mut(id) {
                node.title = job.original_title;
            }
        }
        self.touch();
    }

    pub fn is_in_flight(&self, id: NodeId) -> bool {
        self.in_flight.contains_key(&id)
    }

    // ─── Convenience constructors ────────────────────────────────────────

    /// Create a node of `kind` with its top-left corner at `world`.
    pub fn add_node_at(&mut self, kind: NodeKind, world: Point) -> Result<NodeId, GraphError> {
        let node = Node::new(kind, world.x, world.y);
        let id = node.id;
        self.apply(GraphMutation::AddNode { node: Box::new(node) })?;
        Ok(id)
    }

    /// Connect two nodes under a fresh edge id.
    pub fn connect(&mut self, source: NodeId, target: NodeId) -> Result<EdgeId, GraphError> {
        let id = EdgeId::fresh();
        self.apply(GraphMutation::Connect { id, source, target })?;
        Ok(id)
    }

    // ─── Mutations ───────────────────────────────────────────────────────

    /// Apply one mutation. Returns `Ok(false)` when it was a no-op.
    pub fn apply(&mut self, mutation: GraphMutation) -> Result<bool, GraphError> {
        let changed = self.apply_inner(mutation)?;
        if changed {
            self.touch();
        }
        Ok(changed)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, GraphError> {
        self.graph.node_mut(id).ok_or(GraphError::UnknownNode(id))
    }

    fn group_mut(&mut self, id: GroupId) -> Result<&mut Group, GraphError> {
        self.graph.group_mut(id).ok_or(GraphError::UnknownGroup(id))
    }

    fn apply_inner(&mut self, mutation: GraphMutation) -> Result<bool, GraphError> {
        match mutation {
            GraphMutation::AddNode { node } => {
                self.graph.add_node(*node)?;
                Ok(true)
            }
            GraphMutation::RemoveNode { id } => {
                let (_, edges) = self
                    .graph
                    .remove_node(id)
                    .ok_or(GraphError::UnknownNode(id))?;
                log::debug!("removed node {id} and {} wire(s)", edges.len());
                Ok(true)
            }
            GraphMutation::MoveNode { id, dx, dy } => {
                let node = self.node_mut(id)?;
                node.x += dx;
                node.y += dy;
                Ok(dx != 0.0 || dy != 0.0)
            }
            GraphMutation::ResizeNode { id, dw, dh } => {
                let node = self.node_mut(id)?;
                let (w, h) = clamp_size(node.width + dw, node.height + dh);
                let changed = w != node.width || h != node.height;
                node.width = w;
                node.height = h;
                Ok(changed)
            }
            GraphMutation::SetTitle { id, title } => {
                let node = self.node_mut(id)?;
                Ok(replace(&mut node.title, title))
            }
            GraphMutation::SetText { id, text } => {
                let node = self.node_mut(id)?;
                if node.data.text_content() == text {
                    return Ok(false);
                }
                node.data.set_text_content(text);
                Ok(true)
            }
            GraphMutation::SetBody { id, body } => {
                let node = self.node_mut(id)?;
                if body.kind() != node.kind() {
                    log::warn!(
                        "payload kind {} rejected for {} node {id}",
                        body.kind().as_str(),
                        node.kind().as_str()
                    );
                    return Ok(false);
                }
                Ok(replace(&mut node.data, body))
            }
            GraphMutation::SetCompleted { id, completed } => {
                let node = self.node_mut(id)?;
                Ok(replace(&mut node.completed, completed))
            }
            GraphMutation::ToggleFlip { id } => match &mut self.node_mut(id)?.data {
                NodeBody::Flashcard { flipped, .. } => {
                    *flipped = !*flipped;
                    Ok(true)
                }
                _ => Ok(false),
            },
            GraphMutation::AnswerQuiz { id, option } => match &mut self.node_mut(id)?.data {
                NodeBody::Quiz { selected, .. } if selected.is_none() => {
                    *selected = Some(option);
                    Ok(true)
                }
                _ => Ok(false),
            },
            GraphMutation::AddAttachment { id, attachment } => {
                self.node_mut(id)?.attachments.push(attachment);
                Ok(true)
            }
            GraphMutation::RemoveAttachment { id, attachment } => {
                let list = &mut self.node_mut(id)?.attachments;
                let before = list.len();
                list.retain(|a| a.id != attachment);
                Ok(list.len() != before)
            }
            GraphMutation::ResetProgress => {
                let mut changed = false;
                for node in self.graph.nodes_mut() {
                    changed |= replace(&mut node.completed, false);
                }
                Ok(changed)
            }
            GraphMutation::Connect { id, source, target } => {
                self.graph.connect_with_id(id, source, target)?;
                Ok(true)
            }
            GraphMutation::Disconnect { id } => Ok(self.graph.disconnect(id).is_some()),
            GraphMutation::AddGroup { group } => {
                self.graph.add_group(*group)?;
                Ok(true)
            }
            GraphMutation::RemoveGroup { id } => {
                self.graph
                    .remove_group(id)
                    .ok_or(GraphError::UnknownGroup(id))?;
                Ok(true)
            }
            GraphMutation::MoveGroup { id, dx, dy } => {
                let group = self.group_mut(id)?;
                group.x += dx;
                group.y += dy;
                Ok(dx != 0.0 || dy != 0.0)
            }
            GraphMutation::ResizeGroup { id, dw, dh } => {
                let group = self.group_mut(id)?;
                let w = (group.width + dw).max(MIN_NODE_WIDTH);
                let h = (group.height + dh).max(MIN_NODE_HEIGHT);
                let changed = w != group.width || h != group.height;
                group.width = w;
                group.height = h;
                Ok(changed)
            }
            GraphMutation::SetGroupTitle { id, title } => {
                let group = self.group_mut(id)?;
                Ok(replace(&mut group.title, title))
            }
        }
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}
