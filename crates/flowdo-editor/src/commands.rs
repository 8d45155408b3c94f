//! Undo/Redo command stack.
//!
//! Every command stores the graph as it was before and after the edit, so
//! undo and redo are a wholesale graph swap. Drag gestures are batched: the
//! graph is captured when the gesture starts and again when it ends, and the
//! whole gesture becomes a single undo step. Snapshots are taken settled, so
//! a working indicator never ends up in history.

use crate::engine::{FlowEngine, GraphMutation};
use flowdo_core::{FlowGraph, GraphError};

#[derive(Debug, Clone)]
pub struct Command {
    before: FlowGraph,
    after: FlowGraph,
    pub description: String,
}

/// Manages undo/redo stacks with batch grouping for drag gestures.
pub struct CommandStack {
    undo_stack: Vec<Command>,
    redo_stack: Vec<Command>,
    max_depth: usize,
    /// Batch nesting depth (0 = not batching).
    batch_depth: usize,
    batch_before: Option<(FlowGraph, String)>,
}

impl Default for CommandStack {
    fn default() -> Self {
        Self::new(100)
    }
}

impl CommandStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::with_capacity(max_depth),
            redo_stack: Vec::new(),
            max_depth,
            batch_depth: 0,
            batch_before: None,
        }
    }

    pub fn is_batching(&self) -> bool {
        self.batch_depth > 0
    }

    /// Start a batch. Mutations until the matching `end_batch` apply live
    /// and are undone together.
    pub fn begin_batch(&mut self, engine: &FlowEngine, description: &str) {
        if self.batch_depth == 0 {
            self.batch_before = Some((engine.settled_graph(), description.to_string()));
        }
        self.batch_depth += 1;
    }

    /// Close a batch. The outermost close records one command if the graph
    /// actually changed.
    pub fn end_batch(&mut self, engine: &FlowEngine) {
        if self.batch_depth == 0 {
            return;
        }
        self.batch_depth -= 1;
        if self.batch_depth == 0
            && let Some((before, description)) = self.batch_before.take()
        {
            self.record(before, engine.settled_graph(), description);
        }
    }

    /// Apply a mutation and record it as an undo step.
    pub fn execute(
        &mut self,
        engine: &mut FlowEngine,
        mutation: GraphMutation,
        description: &str,
    ) -> Result<bool, GraphError> {
        if self.batch_depth > 0 {
            return engine.apply(mutation);
        }
        let before = engine.settled_graph();
        let changed = engine.apply(mutation)?;
        if changed {
            self.record(before, engine.settled_graph(), description.to_string());
        }
        Ok(changed)
    }

    /// Record an edit that was applied outside the stack.
    pub fn record(&mut self, before: FlowGraph, after: FlowGraph, description: String) {
        if before == after {
            return;
        }
        self.undo_stack.push(Command {
            before,
            after,
            description,
        });
        if self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
        }
        self.redo_stack.clear();
    }

    /// Undo the last command, returning its description.
    pub fn undo(&mut self, engine: &mut FlowEngine) -> Option<String> {
        let cmd = self.undo_stack.pop()?;
        engine.replace_graph(cmd.before.clone());
        let desc = cmd.description.clone();
        self.redo_stack.push(cmd);
        Some(desc)
    }

    /// Redo the last undone command, returning its description.
    pub fn redo(&mut self, engine: &mut FlowEngine) -> Option<String> {
        let cmd = self.redo_stack.pop()?;
        engine.replace_graph(cmd.after.clone());
        let desc = cmd.description.clone();
        self.undo_stack.push(cmd);
        Some(desc)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Forget all history (after an import or a clear).
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.batch_depth = 0;
        self.batch_before = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowdo_core::{NodeKind, Point, Viewport};
    use pretty_assertions::assert_eq;

    fn setup() -> (FlowEngine, flowdo_core::NodeId) {
        let mut engine = FlowEngine::new(FlowGraph::new(), Viewport::default());
        let id = engine.add_node_at(NodeKind::Note, Point::new(0.0, 0.0)).unwrap();
        (engine, id)
    }

    #[test]
    fn undo_redo_move() {
        let (mut engine, id) = setup();
        let mut stack = CommandStack::new(100);
        stack
            .execute(&mut engine, GraphMutation::MoveNode { id, dx: 10.0, dy: 20.0 }, "move")
            .unwrap();
        assert_eq!(engine.graph.node(id).unwrap().x, 10.0);

        assert_eq!(stack.undo(&mut engine).as_deref(), Some("move"));
        assert_eq!(engine.graph.node(id).unwrap().x, 0.0);

        assert_eq!(stack.redo(&mut engine).as_deref(), Some("move"));
        assert_eq!(engine.graph.node(id).unwrap().y, 20.0);
    }

    #[test]
    fn redo_clears_on_new_action() {
        let (mut engine, id) = setup();
        let mut stack = CommandStack::new(100);
        stack
            .execute(&mut engine, GraphMutation::MoveNode { id, dx: 5.0, dy: 0.0 }, "move")
            .unwrap();
        stack.undo(&mut engine);
        assert!(stack.can_redo());
        stack
            .execute(&mut engine, GraphMutation::MoveNode { id, dx: 1.0, dy: 0.0 }, "move")
            .unwrap();
        assert!(!stack.can_redo());
    }

    #[test]
    fn batch_is_one_step() {
        let (mut engine, id) = setup();
        let mut stack = CommandStack::new(100);
        stack.begin_batch(&engine, "drag");
        for _ in 0..5 {
            stack
                .execute(&mut engine, GraphMutation::MoveNode { id, dx: 2.0, dy: 0.0 }, "move")
                .unwrap();
        }
        stack.end_batch(&engine);
        assert_eq!(engine.graph.node(id).unwrap().x, 10.0);

        stack.undo(&mut engine);
        assert_eq!(engine.graph.node(id).unwrap().x, 0.0);
        assert!(!stack.can_undo());
    }

    #[test]
    fn empty_batch_records_nothing() {
        let (engine, _) = setup();
        let mut stack = CommandStack::new(100);
        stack.begin_batch(&engine, "pan");
        stack.end_batch(&engine);
        assert!(!stack.can_undo());
    }

    #[test]
    fn max_depth_trims_oldest() {
        let (mut engine, id) = setup();
        let mut stack = CommandStack::new(3);
        for i in 0..5 {
            stack
                .execute(
                    &mut engine,
                    GraphMutation::MoveNode { id, dx: (i + 1) as f32, dy: 0.0 },
                    "move",
                )
                .unwrap();
        }
        let mut undone = 0;
        while stack.undo(&mut engine).is_some() {
            undone += 1;
        }
        assert_eq!(undone, 3);
        // 1 + 2 remain applied.
        assert_eq!(engine.graph.node(id).unwrap().x, 3.0);
    }

    #[test]
    fn remove_restores_wires() {
        let (mut engine, a) = setup();
        let b = engine.add_node_at(NodeKind::Task, Point::new(500.0, 0.0)).unwrap();
        engine.connect(a, b).unwrap();
        let mut stack = CommandStack::new(100);
        stack
            .execute(&mut engine, GraphMutation::RemoveNode { id: b }, "delete node")
            .unwrap();
        assert_eq!(engine.graph.edge_count(), 0);
        stack.undo(&mut engine);
        assert_eq!(engine.graph.edge_count(), 1);
        assert!(engine.graph.contains_node(b));
    }
}
