//! Pointer interaction state machine.
//!
//! One controller owns every piece of transient UI state: the active
//! gesture, the selection, the creation menu and the in-progress connector.
//! It turns input events into [`GraphMutation`]s for the engine and pans or
//! zooms the viewport it is handed. At most one gesture is active at a
//! time; presses that arrive while a gesture runs are ignored.

use crate::engine::GraphMutation;
use crate::input::{InputEvent, PointerButton};
use flowdo_core::{EdgeId, FlowGraph, GroupId, NodeId, Point, Selection, Viewport};
use flowdo_render::{GroupPart, Hit, NodePart, PendingWire, hit_test, input_port_at};

/// The active pointer gesture. Positions are the last seen screen point.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum Gesture {
    #[default]
    Idle,
    Panning {
        last: Point,
    },
    DraggingNode {
        id: NodeId,
        last: Point,
    },
    ResizingNode {
        id: NodeId,
        last: Point,
    },
    /// Dragging a wire out of `source`'s output port. `end` is in world space.
    Connecting {
        source: NodeId,
        end: Point,
    },
    DraggingGroup {
        id: GroupId,
        last: Point,
    },
    ResizingGroup {
        id: GroupId,
        last: Point,
    },
}

impl Gesture {
    pub fn is_idle(&self) -> bool {
        matches!(self, Gesture::Idle)
    }

    /// Whether the gesture moves or resizes graph content.
    pub fn edits_graph(&self) -> bool {
        matches!(
            self,
            Gesture::DraggingNode { .. }
                | Gesture::ResizingNode { .. }
                | Gesture::DraggingGroup { .. }
                | Gesture::ResizingGroup { .. }
        )
    }

    fn describe(&self) -> &'static str {
        match self {
            Gesture::Idle => "idle",
            Gesture::Panning { .. } => "pan",
            Gesture::DraggingNode { .. } => "move node",
            Gesture::ResizingNode { .. } => "resize node",
            Gesture::Connecting { .. } => "connect",
            Gesture::DraggingGroup { .. } => "move group",
            Gesture::ResizingGroup { .. } => "resize group",
        }
    }
}

/// The node-creation menu, anchored where it was opened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreationMenu {
    pub screen: Point,
    /// New nodes are placed here.
    pub world: Point,
}

#[derive(Debug, Default)]
pub struct InteractionController {
    gesture: Gesture,
    selection: Selection,
    menu: Option<CreationMenu>,
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gesture(&self) -> Gesture {
        self.gesture
    }

    pub fn gesture_name(&self) -> &'static str {
        self.gesture.describe()
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn select(&mut self, selection: Selection) {
        self.selection = selection;
    }

    pub fn clear_selection(&mut self) {
        self.selection = Selection::None;
    }

    /// Drop selection entries that no longer exist in `graph`.
    pub fn prune_selection(&mut self, graph: &FlowGraph) {
        let alive = match self.selection {
            Selection::None => true,
            Selection::Node(id) => graph.contains_node(id),
            Selection::Edge(id) => graph.edge(id).is_some(),
            Selection::Group(id) => graph.group(id).is_some(),
        };
        if !alive {
            self.selection = Selection::None;
        }
        if let Gesture::Connecting { source, .. } = self.gesture
            && !graph.contains_node(source)
        {
            self.gesture = Gesture::Idle;
        }
    }

    pub fn menu(&self) -> Option<CreationMenu> {
        self.menu
    }

    pub fn open_menu(&mut self, screen: Point, view: &Viewport, origin: Point) {
        self.menu = Some(CreationMenu {
            screen,
            world: view.screen_to_world(screen, origin),
        });
    }

    /// Open the menu anchored at the world point under the canvas centre
    /// (the dock "add" button).
    pub fn open_menu_at_center(&mut self, view: &Viewport, width: f32, height: f32) {
        self.menu = Some(CreationMenu {
            screen: Point::new(width / 2.0, height / 2.0),
            world: view.screen_center_world(width, height),
        });
    }

    pub fn close_menu(&mut self) -> Option<CreationMenu> {
        self.menu.take()
    }

    /// The connector preview, if a wire is being dragged.
    pub fn pending_wire(&self) -> Option<PendingWire> {
        match self.gesture {
            Gesture::Connecting { source, end } => Some(PendingWire { source, end }),
            _ => None,
        }
    }

    /// Abort the current gesture without emitting anything.
    pub fn cancel(&mut self) {
        self.gesture = Gesture::Idle;
    }

    /// Handle one input event. Pointer coordinates are screen space; `origin`
    /// is the canvas element's top-left corner on screen.
    pub fn handle(
        &mut self,
        event: &InputEvent,
        graph: &FlowGraph,
        view: &mut Viewport,
        origin: Point,
    ) -> Vec<GraphMutation> {
        match *event {
            InputEvent::PointerDown { x, y, button } => {
                self.pointer_down(Point::new(x, y), button, graph, view, origin);
                Vec::new()
            }
            InputEvent::PointerMove { x, y } => self.pointer_move(Point::new(x, y), view, origin),
            InputEvent::PointerUp { x, y } => self.pointer_up(Point::new(x, y), graph, view, origin),
            InputEvent::Wheel { dx, dy, modifiers } => {
                view.apply_wheel(dx, dy, modifiers.command());
                Vec::new()
            }
            InputEvent::Key { .. } => Vec::new(),
        }
    }

    fn pointer_down(
        &mut self,
        screen: Point,
        button: PointerButton,
        graph: &FlowGraph,
        view: &Viewport,
        origin: Point,
    ) {
        if !self.gesture.is_idle() {
            log::debug!("press ignored during {}", self.gesture.describe());
            return;
        }

        match button {
            PointerButton::Secondary => {
                self.open_menu(screen, view, origin);
                return;
            }
            PointerButton::Middle => {
                self.menu = None;
                self.gesture = Gesture::Panning { last: screen };
                return;
            }
            PointerButton::Primary => {}
        }

        self.menu = None;
        let world = view.screen_to_world(screen, origin);
        self.gesture = match hit_test(graph, world) {
            Hit::Background
            | Hit::Group {
                part: GroupPart::Body,
                ..
            } => {
                self.selection = Selection::None;
                Gesture::Panning { last: screen }
            }
            Hit::Wire(id) => {
                self.select_edge(id);
                Gesture::Idle
            }
            Hit::Node { id, part } => {
                self.selection = Selection::Node(id);
                match part {
                    NodePart::Header => Gesture::DraggingNode { id, last: screen },
                    NodePart::ResizeHandle => Gesture::ResizingNode { id, last: screen },
                    NodePart::OutputPort => Gesture::Connecting { source: id, end: world },
                    // Content editors own presses inside the card.
                    NodePart::Body | NodePart::InputPort => Gesture::Idle,
                }
            }
            Hit::Group { id, part } => {
                self.selection = Selection::Group(id);
                match part {
                    GroupPart::Header => Gesture::DraggingGroup { id, last: screen },
                    GroupPart::ResizeHandle => Gesture::ResizingGroup { id, last: screen },
                    GroupPart::Body => Gesture::Idle,
                }
            }
        };
    }

    fn select_edge(&mut self, id: EdgeId) {
        self.selection = Selection::Edge(id);
    }

    fn pointer_move(&mut self, screen: Point, view: &mut Viewport, origin: Point) -> Vec<GraphMutation> {
        match &mut self.gesture {
            Gesture::Idle => Vec::new(),
            Gesture::Panning { last } => {
                let d = screen - *last;
                *last = screen;
                view.pan_by(d.x, d.y);
                Vec::new()
            }
            Gesture::DraggingNode { id, last } => {
                let d = world_delta(view, screen, last);
                vec![GraphMutation::MoveNode { id: *id, dx: d.x, dy: d.y }]
            }
            Gesture::ResizingNode { id, last } => {
                let d = world_delta(view, screen, last);
                vec![GraphMutation::ResizeNode { id: *id, dw: d.x, dh: d.y }]
            }
            Gesture::Connecting { end, .. } => {
                *end = view.screen_to_world(screen, origin);
                Vec::new()
            }
            Gesture::DraggingGroup { id, last } => {
                let d = world_delta(view, screen, last);
                vec![GraphMutation::MoveGroup { id: *id, dx: d.x, dy: d.y }]
            }
            Gesture::ResizingGroup { id, last } => {
                let d = world_delta(view, screen, last);
                vec![GraphMutation::ResizeGroup { id: *id, dw: d.x, dh: d.y }]
            }
        }
    }

    fn pointer_up(
        &mut self,
        screen: Point,
        graph: &FlowGraph,
        view: &Viewport,
        origin: Point,
    ) -> Vec<GraphMutation> {
        let gesture = std::mem::take(&mut self.gesture);
        let Gesture::Connecting { source, .. } = gesture else {
            return Vec::new();
        };

        let world = view.screen_to_world(screen, origin);
        match input_port_at(graph, world) {
            Some(target) if target != source => vec![GraphMutation::Connect {
                id: EdgeId::fresh(),
                source,
                target,
            }],
            _ => {
                log::debug!("connection from {source} dropped");
                Vec::new()
            }
        }
    }
}

/// Screen movement since `last`, converted to world units; advances `last`.
fn world_delta(view: &Viewport, screen: Point, last: &mut Point) -> Point {
    let d = screen - *last;
    *last = screen;
    view.screen_delta_to_world(d.x, d.y)
}
