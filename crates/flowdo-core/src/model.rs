//! Core data model for FlowDo canvases.
//!
//! A canvas holds typed note cards (`Node`), directed wires between them
//! (`Edge`), and purely visual labelled regions (`Group`). Every node carries
//! a payload whose shape is fixed by its type (a flashcard always has a
//! front and back, a quiz always has options), so the type system rules out
//! half-formed cards.

use crate::defaults::*;
use crate::id::{AttachmentId, EdgeId, GroupId, NodeId};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::ops::{Add, Div, Mul, Sub};

// ─── Geometry ────────────────────────────────────────────────────────────

/// A 2D point or vector. Used for both screen and world coordinates; which
/// one is meant is always stated by the function taking it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_sq(self, other: Point) -> f32 {
        let d = self - other;
        d.x * d.x + d.y * d.y
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Point {
    type Output = Point;
    fn mul(self, rhs: f32) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f32> for Point {
    type Output = Point;
    fn div(self, rhs: f32) -> Point {
        Point::new(self.x / rhs, self.y / rhs)
    }
}

/// Axis-aligned rectangle in world coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Check if this bounds intersects with another (AABB overlap).
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }
}

/// Clamp a proposed size to the canvas minimum.
pub fn clamp_size(width: f32, height: f32) -> (f32, f32) {
    (width.max(MIN_NODE_WIDTH), height.max(MIN_NODE_HEIGHT))
}

// ─── Node types & payloads ───────────────────────────────────────────────

/// The closed set of card types a user can place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Lecture,
    Concept,
    Flashcard,
    Task,
    Quiz,
    Note,
    Question,
    Summary,
    Idea,
    Resource,
}

impl NodeKind {
    pub const ALL: [NodeKind; 10] = [
        NodeKind::Lecture,
        NodeKind::Concept,
        NodeKind::Flashcard,
        NodeKind::Task,
        NodeKind::Quiz,
        NodeKind::Note,
        NodeKind::Question,
        NodeKind::Summary,
        NodeKind::Idea,
        NodeKind::Resource,
    ];

    /// Kinds offered by the canvas creation menu, in menu order.
    pub const MENU: [NodeKind; 4] = [
        NodeKind::Lecture,
        NodeKind::Concept,
        NodeKind::Flashcard,
        NodeKind::Task,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Lecture => "lecture",
            NodeKind::Concept => "concept",
            NodeKind::Flashcard => "flashcard",
            NodeKind::Task => "task",
            NodeKind::Quiz => "quiz",
            NodeKind::Note => "note",
            NodeKind::Question => "question",
            NodeKind::Summary => "summary",
            NodeKind::Idea => "idea",
            NodeKind::Resource => "resource",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        NodeKind::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Human-readable menu label.
    pub fn label(self) -> &'static str {
        match self {
            NodeKind::Lecture => "Lecture Note",
            NodeKind::Concept => "Concept",
            NodeKind::Flashcard => "Flashcard",
            NodeKind::Task => "Task",
            NodeKind::Quiz => "Quiz",
            NodeKind::Note => "Note",
            NodeKind::Question => "Question",
            NodeKind::Summary => "Summary",
            NodeKind::Idea => "Idea",
            NodeKind::Resource => "Resource",
        }
    }

    /// Accent color used for the card border and header dot.
    pub fn accent(self) -> &'static str {
        match self {
            NodeKind::Lecture => "#8b5cf6",
            NodeKind::Concept => "#06b6d4",
            NodeKind::Flashcard => "#10b981",
            NodeKind::Task => "#3b82f6",
            NodeKind::Quiz => "#f43f5e",
            NodeKind::Note => "#6b7280",
            NodeKind::Question => "#be123c",
            NodeKind::Summary => "#d97706",
            NodeKind::Idea => "#8b5cf6",
            NodeKind::Resource => "#4b5563",
        }
    }

    /// Size a freshly created card of this kind starts with.
    pub fn default_size(self) -> (f32, f32) {
        match self {
            NodeKind::Flashcard => (DEFAULT_NODE_WIDTH, FLASHCARD_HEIGHT),
            NodeKind::Quiz => (QUIZ_WIDTH, QUIZ_HEIGHT),
            _ => (DEFAULT_NODE_WIDTH, DEFAULT_NODE_HEIGHT),
        }
    }

    pub fn default_title(self) -> &'static str {
        match self {
            NodeKind::Flashcard => "Flashcard",
            _ => "Untitled",
        }
    }
}

/// Type-dependent card payload. The variant *is* the node's type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeBody {
    Lecture {
        #[serde(default)]
        label: String,
    },
    Concept {
        #[serde(default)]
        label: String,
    },
    Task {
        #[serde(default)]
        label: String,
    },
    Note {
        #[serde(default)]
        label: String,
    },
    Question {
        #[serde(default)]
        label: String,
    },
    Summary {
        #[serde(default)]
        label: String,
    },
    Idea {
        #[serde(default)]
        label: String,
    },
    Resource {
        #[serde(default)]
        label: String,
    },
    Flashcard {
        #[serde(default)]
        front: String,
        #[serde(default)]
        back: String,
        #[serde(default)]
        flipped: bool,
    },
    Quiz {
        #[serde(default)]
        question: String,
        #[serde(default)]
        options: SmallVec<[String; 4]>,
        #[serde(default)]
        answer: String,
        /// The option the user picked. Set once, never changed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selected: Option<String>,
    },
}

impl NodeBody {
    /// An empty payload for `kind`.
    pub fn empty(kind: NodeKind) -> Self {
        Self::text(kind, String::new())
    }

    /// A payload for `kind` seeded with free text. Flashcards put the text on
    /// the front, quizzes use it as the question.
    pub fn text(kind: NodeKind, label: String) -> Self {
        match kind {
            NodeKind::Lecture => NodeBody::Lecture { label },
            NodeKind::Concept => NodeBody::Concept { label },
            NodeKind::Task => NodeBody::Task { label },
            NodeKind::Note => NodeBody::Note { label },
            NodeKind::Question => NodeBody::Question { label },
            NodeKind::Summary => NodeBody::Summary { label },
            NodeKind::Idea => NodeBody::Idea { label },
            NodeKind::Resource => NodeBody::Resource { label },
            NodeKind::Flashcard => NodeBody::Flashcard {
                front: label,
                back: String::new(),
                flipped: false,
            },
            NodeKind::Quiz => NodeBody::Quiz {
                question: label,
                options: SmallVec::new(),
                answer: String::new(),
                selected: None,
            },
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodeBody::Lecture { .. } => NodeKind::Lecture,
            NodeBody::Concept { .. } => NodeKind::Concept,
            NodeBody::Task { .. } => NodeKind::Task,
            NodeBody::Note { .. } => NodeKind::Note,
            NodeBody::Question { .. } => NodeKind::Question,
            NodeBody::Summary { .. } => NodeKind::Summary,
            NodeBody::Idea { .. } => NodeKind::Idea,
            NodeBody::Resource { .. } => NodeKind::Resource,
            NodeBody::Flashcard { .. } => NodeKind::Flashcard,
            NodeBody::Quiz { .. } => NodeKind::Quiz,
        }
    }

    /// The card's main free text: the label for note kinds, the front for
    /// flashcards, the question for quizzes.
    pub fn text_content(&self) -> &str {
        match self {
            NodeBody::Lecture { label }
            | NodeBody::Concept { label }
            | NodeBody::Task { label }
            | NodeBody::Note { label }
            | NodeBody::Question { label }
            | NodeBody::Summary { label }
            | NodeBody::Idea { label }
            | NodeBody::Resource { label } => label,
            NodeBody::Flashcard { front, .. } => front,
            NodeBody::Quiz { question, .. } => question,
        }
    }

    /// Replace the main free text (see [`NodeBody::text_content`]).
    pub fn set_text_content(&mut self, text: String) {
        match self {
            NodeBody::Lecture { label }
            | NodeBody::Concept { label }
            | NodeBody::Task { label }
            | NodeBody::Note { label }
            | NodeBody::Question { label }
            | NodeBody::Summary { label }
            | NodeBody::Idea { label }
            | NodeBody::Resource { label } => *label = text,
            NodeBody::Flashcard { front, .. } => *front = text,
            NodeBody::Quiz { question, .. } => *question = text,
        }
    }
}

// ─── Attachments ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    File,
}

/// A file or image owned by exactly one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    /// Data URL or extracted text.
    pub content: String,
}

impl Attachment {
    pub fn new(name: impl Into<String>, kind: AttachmentKind, content: impl Into<String>) -> Self {
        Self {
            id: AttachmentId::fresh(),
            name: name.into(),
            kind,
            content: content.into(),
        }
    }
}

// ─── Node ────────────────────────────────────────────────────────────────

/// A card on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub title: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    pub data: NodeBody,
}

impl Node {
    /// A fresh card of `kind` at world position `(x, y)` with the kind's
    /// default title and size.
    pub fn new(kind: NodeKind, x: f32, y: f32) -> Self {
        let (width, height) = kind.default_size();
        Self {
            id: NodeId::fresh(),
            title: kind.default_title().to_string(),
            x,
            y,
            width,
            height,
            completed: false,
            attachments: Vec::new(),
            data: NodeBody::empty(kind),
        }
    }

    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = id;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        (self.width, self.height) = clamp_size(width, height);
        self
    }

    pub fn with_body(mut self, data: NodeBody) -> Self {
        self.data = data;
        self
    }

    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }

    /// World position of the output (right-hand) connection port.
    pub fn output_port(&self) -> Point {
        Point::new(self.x + self.width, self.y + PORT_OFFSET_Y)
    }

    /// World position of the input (left-hand) connection port.
    pub fn input_port(&self) -> Point {
        Point::new(self.x, self.y + PORT_OFFSET_Y)
    }
}

// ─── Edge & Group ────────────────────────────────────────────────────────

/// A directed wire from one node's output port to another's input port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
}

/// Default group tint, matching the group header color.
pub const DEFAULT_GROUP_COLOR: &str = "rgba(255, 255, 255, 0.1)";

/// A labelled rectangular region. Groups do not own nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub title: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub color: String,
}

impl Group {
    pub fn new(title: impl Into<String>, bounds: Bounds) -> Self {
        let (width, height) = clamp_size(bounds.width, bounds.height);
        Self {
            id: GroupId::fresh(),
            title: title.into(),
            x: bounds.x,
            y: bounds.y,
            width,
            height,
            color: DEFAULT_GROUP_COLOR.to_string(),
        }
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

// ─── Selection ───────────────────────────────────────────────────────────

/// What the user currently has selected. At most one thing at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    None,
    Node(NodeId),
    Edge(EdgeId),
    Group(GroupId),
}

impl Selection {
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Selection::Node(id) => Some(*id),
            _ => None,
        }
    }
}
