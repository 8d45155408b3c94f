//! The canvas session: engine, interaction controller and undo history
//! wired together behind one event entry point.

use crate::ai::{self, AiError, AiOutcome, MindMapDraft};
use crate::commands::CommandStack;
use crate::engine::{FlowEngine, GraphMutation, NoticeLevel};
use crate::input::InputEvent;
use crate::interaction::InteractionController;
use crate::shortcuts::{ShortcutAction, ShortcutMap};
use flowdo_core::defaults::ZOOM_STEP;
use flowdo_core::{
    Attachment, AttachmentId, Bounds, FlowGraph, GraphError, Group, GroupId, Node, NodeId, NodeKind,
    Point, Selection, Snapshot, SnapshotError, Viewport, export_json,
};
use flowdo_render::{RenderList, build_render_list};

pub struct CanvasEditor {
    pub engine: FlowEngine,
    pub interaction: InteractionController,
    pub commands: CommandStack,
    /// Canvas element's top-left corner in client coordinates.
    pub origin: Point,
    /// Canvas element size in screen pixels.
    pub size: (f32, f32),
}

impl Default for CanvasEditor {
    fn default() -> Self {
        Self::new(FlowEngine::default())
    }
}

impl CanvasEditor {
    pub fn new(engine: FlowEngine) -> Self {
        Self {
            engine,
            interaction: InteractionController::new(),
            commands: CommandStack::default(),
            origin: Point::ZERO,
            size: (1280.0, 800.0),
        }
    }

    pub fn from_parts(graph: FlowGraph, viewport: Viewport) -> Self {
        Self::new(FlowEngine::new(graph, viewport))
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.engine.graph
    }

    pub fn viewport(&self) -> Viewport {
        self.engine.viewport
    }

    pub fn selection(&self) -> Selection {
        self.interaction.selection()
    }

    pub fn resize_canvas(&mut self, origin: Point, width: f32, height: f32) {
        self.origin = origin;
        self.size = (width, height);
    }

    /// Build the paint list for the current frame.
    pub fn render_list(&self) -> RenderList<'_> {
        build_render_list(
            &self.engine.graph,
            self.engine.viewport,
            self.interaction.selection(),
            self.interaction.pending_wire(),
        )
    }

    // ─── Input ───────────────────────────────────────────────────────────

    /// Route one input event. Returns true if the canvas needs a redraw.
    pub fn handle_event(&mut self, event: &InputEvent) -> bool {
        if let InputEvent::Key { key, modifiers } = event {
            return match ShortcutMap::resolve(key, *modifiers) {
                Some(action) => {
                    self.run_shortcut(action);
                    true
                }
                None => false,
            };
        }

        let was_idle = self.interaction.gesture().is_idle();
        let view_before = self.engine.viewport;
        let selection_before = self.interaction.selection();
        let menu_before = self.interaction.menu();

        let mutations =
            self.interaction
                .handle(event, &self.engine.graph, &mut self.engine.viewport, self.origin);

        let gesture = self.interaction.gesture();
        if was_idle && gesture.edits_graph() {
            self.commands.begin_batch(&self.engine, self.interaction.gesture_name());
        }

        let mut changed = false;
        for m in mutations {
            let description = describe(&m);
            match self.commands.execute(&mut self.engine, m, description) {
                Ok(c) => changed |= c,
                Err(e) => log::warn!("{description} rejected: {e}"),
            }
        }

        if gesture.is_idle() && self.commands.is_batching() {
            self.commands.end_batch(&self.engine);
        }

        changed
            || !was_idle
            || !gesture.is_idle()
            || view_before != self.engine.viewport
            || selection_before != self.interaction.selection()
            || menu_before != self.interaction.menu()
    }

    fn run_shortcut(&mut self, action: ShortcutAction) {
        let center = Point::new(self.size.0 / 2.0, self.size.1 / 2.0) + self.origin;
        match action {
            ShortcutAction::Undo => {
                self.undo();
            }
            ShortcutAction::Redo => {
                self.redo();
            }
            ShortcutAction::Delete => {
                self.delete_selection();
            }
            ShortcutAction::ZoomIn => self.engine.viewport.zoom_around(ZOOM_STEP, center, self.origin),
            ShortcutAction::ZoomOut => {
                self.engine.viewport.zoom_around(1.0 / ZOOM_STEP, center, self.origin)
            }
            ShortcutAction::ResetView => self.engine.viewport.reset(),
            ShortcutAction::Deselect => {
                self.interaction.clear_selection();
                self.interaction.close_menu();
                self.interaction.cancel();
            }
        }
    }

    // ─── Editing commands ────────────────────────────────────────────────

    fn execute(&mut self, mutation: GraphMutation) -> Result<bool, GraphError> {
        let description = describe(&mutation);
        let result = self.commands.execute(&mut self.engine, mutation, description);
        self.interaction.prune_selection(&self.engine.graph);
        result
    }

    /// Create a node of `kind` where the creation menu was opened, and close
    /// the menu. Returns `None` if the menu was not open.
    pub fn create_from_menu(&mut self, kind: NodeKind) -> Option<NodeId> {
        let menu = self.interaction.close_menu()?;
        match self.add_node(kind, menu.world) {
            Ok(id) => Some(id),
            Err(e) => {
                log::warn!("node creation failed: {e}");
                None
            }
        }
    }

    /// Open the creation menu anchored at the centre of the canvas.
    pub fn open_menu_at_center(&mut self) {
        let (w, h) = self.size;
        self.interaction
            .open_menu_at_center(&self.engine.viewport, w, h);
    }

    pub fn add_node(&mut self, kind: NodeKind, world: Point) -> Result<NodeId, GraphError> {
        let node = Node::new(kind, world.x, world.y);
        let id = node.id;
        self.execute(GraphMutation::AddNode { node: Box::new(node) })?;
        self.interaction.select(Selection::Node(id));
        Ok(id)
    }

    pub fn delete_node(&mut self, id: NodeId) -> Result<bool, GraphError> {
        self.execute(GraphMutation::RemoveNode { id })
    }

    /// Delete whatever is selected. Returns false if nothing was.
    pub fn delete_selection(&mut self) -> bool {
        let mutation = match self.interaction.selection() {
            Selection::None => return false,
            Selection::Node(id) => GraphMutation::RemoveNode { id },
            Selection::Edge(id) => GraphMutation::Disconnect { id },
            Selection::Group(id) => GraphMutation::RemoveGroup { id },
        };
        self.interaction.clear_selection();
        match self.execute(mutation) {
            Ok(changed) => changed,
            Err(e) => {
                log::warn!("delete failed: {e}");
                false
            }
        }
    }

    pub fn connect(&mut self, source: NodeId, target: NodeId) -> Result<bool, GraphError> {
        self.execute(GraphMutation::Connect {
            id: flowdo_core::EdgeId::fresh(),
            source,
            target,
        })
    }

    pub fn set_title(&mut self, id: NodeId, title: impl Into<String>) -> Result<bool, GraphError> {
        self.execute(GraphMutation::SetTitle { id, title: title.into() })
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) -> Result<bool, GraphError> {
        self.execute(GraphMutation::SetText { id, text: text.into() })
    }

    pub fn set_body(&mut self, id: NodeId, body: flowdo_core::NodeBody) -> Result<bool, GraphError> {
        self.execute(GraphMutation::SetBody { id, body })
    }

    pub fn toggle_completed(&mut self, id: NodeId) -> Result<bool, GraphError> {
        let completed = !self
            .engine
            .graph
            .node(id)
            .ok_or(GraphError::UnknownNode(id))?
            .completed;
        self.execute(GraphMutation::SetCompleted { id, completed })
    }

    pub fn toggle_flip(&mut self, id: NodeId) -> Result<bool, GraphError> {
        self.execute(GraphMutation::ToggleFlip { id })
    }

    pub fn answer_quiz(&mut self, id: NodeId, option: impl Into<String>) -> Result<bool, GraphError> {
        self.execute(GraphMutation::AnswerQuiz { id, option: option.into() })
    }

    pub fn add_attachment(&mut self, id: NodeId, attachment: Attachment) -> Result<bool, GraphError> {
        self.execute(GraphMutation::AddAttachment { id, attachment })
    }

    pub fn remove_attachment(&mut self, id: NodeId, attachment: AttachmentId) -> Result<bool, GraphError> {
        self.execute(GraphMutation::RemoveAttachment { id, attachment })
    }

    pub fn reset_progress(&mut self) -> bool {
        self.execute(GraphMutation::ResetProgress).unwrap_or(false)
    }

    pub fn add_group(&mut self, title: impl Into<String>, bounds: Bounds) -> Result<GroupId, GraphError> {
        let group = Group::new(title, bounds);
        let id = group.id;
        self.execute(GraphMutation::AddGroup { group: Box::new(group) })?;
        Ok(id)
    }

    pub fn set_group_title(&mut self, id: GroupId, title: impl Into<String>) -> Result<bool, GraphError> {
        self.execute(GraphMutation::SetGroupTitle { id, title: title.into() })
    }

    pub fn undo(&mut self) -> Option<String> {
        let desc = self.commands.undo(&mut self.engine);
        self.interaction.prune_selection(&self.engine.graph);
        desc
    }

    pub fn redo(&mut self) -> Option<String> {
        let desc = self.commands.redo(&mut self.engine);
        self.interaction.prune_selection(&self.engine.graph);
        desc
    }

    pub fn reset_view(&mut self) {
        self.engine.viewport.reset();
    }

    // ─── Study plan ──────────────────────────────────────────────────────

    /// Lay a generated concept map out around the centre of the canvas as a
    /// single undo step.
    pub fn place_study_plan(&mut self, draft: MindMapDraft) -> Result<AiOutcome, AiError> {
        let (w, h) = self.size;
        let center = self.engine.viewport.screen_center_world(w, h);
        let before = self.engine.settled_graph();
        let outcome = ai::place_mind_map(&mut self.engine, draft, center);
        self.commands
            .record(before, self.engine.settled_graph(), "study plan".to_string());
        outcome
    }

    // ─── Import / export ─────────────────────────────────────────────────

    /// Pretty JSON of the whole canvas, viewport included.
    pub fn export_json(&self) -> Result<String, SnapshotError> {
        export_json(&self.engine.graph, self.engine.viewport)
    }

    /// Replace the canvas with an imported snapshot. Bad data is repaired
    /// where possible; undo history is discarded.
    pub fn import_json(&mut self, raw: &str) -> Result<(), SnapshotError> {
        let snapshot = Snapshot::from_json(raw)?;
        self.engine.restore(snapshot);
        self.commands.clear();
        self.interaction.clear_selection();
        self.interaction.cancel();
        self.engine.notify(NoticeLevel::Info, "Canvas imported");
        Ok(())
    }

    /// Wipe the canvas back to the welcome node. Pending AI actions are
    /// abandoned.
    pub fn clear(&mut self) {
        self.engine.abandon_in_flight();
        self.engine.replace_graph(flowdo_core::default_graph());
        self.engine.viewport.reset();
        self.commands.clear();
        self.interaction.clear_selection();
        self.interaction.cancel();
    }
}

fn describe(m: &GraphMutation) -> &'static str {
    match m {
        GraphMutation::AddNode { .. } => "add node",
        GraphMutation::RemoveNode { .. } => "delete node",
        GraphMutation::MoveNode { .. } => "move node",
        GraphMutation::ResizeNode { .. } => "resize node",
        GraphMutation::SetTitle { .. } => "rename node",
        GraphMutation::SetText { .. } | GraphMutation::SetBody { .. } => "edit node",
        GraphMutation::SetCompleted { .. } => "toggle completed",
        GraphMutation::ToggleFlip { .. } => "flip card",
        GraphMutation::AnswerQuiz { .. } => "answer quiz",
        GraphMutation::AddAttachment { .. } => "attach file",
        GraphMutation::RemoveAttachment { .. } => "remove attachment",
        GraphMutation::ResetProgress => "reset progress",
        GraphMutation::Connect { .. } => "connect",
        GraphMutation::Disconnect { .. } => "delete wire",
        GraphMutation::AddGroup { .. } => "add group",
        GraphMutation::RemoveGroup { .. } => "delete group",
        GraphMutation::MoveGroup { .. } => "move group",
        GraphMutation::ResizeGroup { .. } => "resize group",
        GraphMutation::SetGroupTitle { .. } => "rename group",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Modifiers, PointerButton};
    use flowdo_core::defaults::WORKING_TITLE;
    use pretty_assertions::assert_eq;

    fn key(k: &str, ctrl: bool, shift: bool) -> InputEvent {
        InputEvent::Key {
            key: k.to_string(),
            modifiers: Modifiers {
                ctrl,
                shift,
                ..Modifiers::NONE
            },
        }
    }

    #[test]
    fn undo_after_ai_completion_restores_real_title() {
        let mut ed = CanvasEditor::default();
        let welcome = NodeId::intern("1");
        let pending = ai::begin(&mut ed.engine, welcome, ai::AiAction::Enhance).unwrap();

        ed.set_text(welcome, "edited meanwhile").unwrap();
        ai::complete(&mut ed.engine, pending, Ok(ai::AiResponse::Text("done".into()))).unwrap();
        assert_eq!(ed.graph().node(welcome).unwrap().title, "Welcome to FlowDo");

        ed.undo();
        let node = ed.graph().node(welcome).unwrap();
        assert_eq!(node.title, "Welcome to FlowDo");
        assert_ne!(node.data.text_content(), "edited meanwhile");
    }

    #[test]
    fn undo_while_pending_keeps_working_indicator() {
        let mut ed = CanvasEditor::default();
        let welcome = NodeId::intern("1");
        let pending = ai::begin(&mut ed.engine, welcome, ai::AiAction::Enhance).unwrap();
        ed.add_node(NodeKind::Task, Point::new(600.0, 0.0)).unwrap();

        ed.undo();
        assert_eq!(ed.graph().node(welcome).unwrap().title, WORKING_TITLE);
        ed.redo();
        assert_eq!(ed.graph().node(welcome).unwrap().title, WORKING_TITLE);

        ai::complete(&mut ed.engine, pending, Ok(ai::AiResponse::Text("done".into()))).unwrap();
        assert_eq!(ed.graph().node(welcome).unwrap().title, "Welcome to FlowDo");
    }

    #[test]
    fn clear_drops_pending_ai_result() {
        let mut ed = CanvasEditor::default();
        let welcome = NodeId::intern("1");
        let pending = ai::begin(&mut ed.engine, welcome, ai::AiAction::Enhance).unwrap();

        ed.clear();
        assert!(!ed.engine.is_in_flight(welcome));
        let out =
            ai::complete(&mut ed.engine, pending, Ok(ai::AiResponse::Text("stale".into()))).unwrap();
        assert!(out.dropped);
        let node = ed.graph().node(welcome).unwrap();
        assert_eq!(node.title, "Welcome to FlowDo");
        assert_ne!(node.data.text_content(), "stale");
    }

    #[test]
    fn import_drops_pending_ai_result() {
        let mut ed = CanvasEditor::default();
        let welcome = NodeId::intern("1");
        let exported = ed.export_json().unwrap();
        let pending = ai::begin(&mut ed.engine, welcome, ai::AiAction::Flashcards).unwrap();

        ed.import_json(&exported).unwrap();
        assert_eq!(ed.graph().node(welcome).unwrap().title, "Welcome to FlowDo");
        let cards = vec![ai::FlashcardDraft { front: "Q".into(), back: "A".into() }];
        let out = ai::complete(&mut ed.engine, pending, Ok(ai::AiResponse::Flashcards(cards))).unwrap();
        assert!(out.dropped);
        assert_eq!(ed.graph().node_count(), 1);
    }

    #[test]
    fn study_plan_centres_on_canvas_and_undoes_at_once() {
        let mut ed = CanvasEditor::default();
        ed.resize_canvas(Point::ZERO, 1000.0, 800.0);
        let draft = ai::MindMapDraft {
            nodes: vec![
                ai::MindMapNodeDraft {
                    id: "1".into(),
                    label: "Optics".into(),
                    kind: "lecture".into(),
                    summary: "Light".into(),
                },
                ai::MindMapNodeDraft {
                    id: "2".into(),
                    label: "Lenses".into(),
                    kind: "concept".into(),
                    summary: "Refraction".into(),
                },
            ],
            edges: vec![ai::MindMapEdgeDraft {
                source: "1".into(),
                target: "2".into(),
                label: None,
            }],
        };
        let out = ed.place_study_plan(draft).unwrap();
        assert_eq!(ed.graph().node_count(), 3);
        let hub = ed.graph().node(out.created_nodes[0]).unwrap();
        assert_eq!((hub.x + hub.width / 2.0, hub.y + hub.height / 2.0), (500.0, 400.0));

        assert_eq!(ed.undo().as_deref(), Some("study plan"));
        assert_eq!(ed.graph().node_count(), 1);
        assert_eq!(ed.graph().edge_count(), 0);
    }

    #[test]
    fn drag_is_one_undo_step() {
        let mut ed = CanvasEditor::default();
        let welcome = NodeId::intern("1");
        // Header of the welcome node at (100, 100).
        ed.handle_event(&InputEvent::PointerDown { x: 150.0, y: 110.0, button: PointerButton::Primary });
        for i in 1..=4 {
            ed.handle_event(&InputEvent::PointerMove { x: 150.0 + 10.0 * i as f32, y: 110.0 });
        }
        ed.handle_event(&InputEvent::PointerUp { x: 190.0, y: 110.0 });
        assert_eq!(ed.graph().node(welcome).unwrap().x, 140.0);

        ed.handle_event(&key("z", true, false));
        assert_eq!(ed.graph().node(welcome).unwrap().x, 100.0);
        ed.handle_event(&key("z", true, true));
        assert_eq!(ed.graph().node(welcome).unwrap().x, 140.0);
    }

    #[test]
    fn delete_key_removes_selected_node_and_wires() {
        let mut ed = CanvasEditor::default();
        let welcome = NodeId::intern("1");
        let other = ed.add_node(NodeKind::Task, Point::new(600.0, 100.0)).unwrap();
        ed.connect(welcome, other).unwrap();
        ed.interaction.select(Selection::Node(welcome));
        assert!(ed.handle_event(&key("Delete", false, false)));
        assert!(!ed.graph().contains_node(welcome));
        assert_eq!(ed.graph().edge_count(), 0);
        assert_eq!(ed.selection(), Selection::None);
    }

    #[test]
    fn escape_closes_menu() {
        let mut ed = CanvasEditor::default();
        ed.open_menu_at_center();
        assert!(ed.interaction.menu().is_some());
        ed.handle_event(&key("Escape", false, false));
        assert!(ed.interaction.menu().is_none());
        assert_eq!(ed.create_from_menu(NodeKind::Idea), None);
    }

    #[test]
    fn zoom_shortcuts_stay_in_range() {
        let mut ed = CanvasEditor::default();
        for _ in 0..20 {
            ed.handle_event(&key("=", true, false));
        }
        assert_eq!(ed.viewport().zoom(), 3.0);
        ed.handle_event(&key("0", true, false));
        assert_eq!(ed.viewport(), Viewport::default());
    }

    #[test]
    fn import_replaces_canvas_and_history() {
        let mut ed = CanvasEditor::default();
        ed.add_node(NodeKind::Idea, Point::new(0.0, 0.0)).unwrap();
        assert!(ed.commands.can_undo());
        let raw = r#"{"nodes":[{"id":"a","type":"note","title":"A","x":0,"y":0,"width":300,"height":200,"data":{"type":"note","label":"hi"}}],"edges":[],"groups":[]}"#;
        ed.import_json(raw).unwrap();
        assert_eq!(ed.graph().node_count(), 1);
        assert!(ed.graph().contains_node(NodeId::intern("a")));
        assert!(!ed.commands.can_undo());
    }
}
