//! AI actions on a node: enhance its text, spin off flashcards, or spin off
//! a quiz question.
//!
//! An action is split in two so the call itself can run anywhere (an async
//! runtime natively, a JS promise in the browser):
//!
//! 1. [`begin`] records the node's title, swaps in the working indicator and
//!    returns the request to send.
//! 2. [`complete`] applies the response exactly once. It restores the title,
//!    and drops the result if the node was deleted or the canvas replaced
//!    meanwhile.
//!
//! [`run_ai_action`] glues both halves around an [`AiClient`]. A study plan
//! ([`generate_study_plan`]) lays a whole concept map out on the canvas.

use crate::engine::{FlowEngine, GraphMutation, NoticeLevel};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flowdo_core::defaults::{
    DEFAULT_NODE_WIDTH, FLASHCARD_HEIGHT, FLASHCARD_STACK_SPACING, GENERATED_GAP, MIND_MAP_RADIUS,
    QUIZ_HEIGHT, QUIZ_WIDTH, WORKING_TITLE,
};
use flowdo_core::{EdgeId, GraphError, Node, NodeBody, NodeId, NodeKind, Point};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

pub const ENHANCE_SYSTEM_INSTRUCTION: &str = "You are an expert tutor.";
pub const CHAT_ERROR_REPLY: &str = "Error connecting to Gemini.";
const FLASHCARD_TITLE: &str = "Auto Card";
const QUIZ_TITLE: &str = "Quiz";

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Gemini API key is not set. Set GEMINI_API_KEY or API_KEY.")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Node {0} is not on the canvas")]
    UnknownNode(NodeId),

    #[error("Node {0} already has an AI action in flight")]
    Busy(NodeId),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl AiError {
    /// Configuration problems the user has to fix before retrying.
    pub fn is_configuration(&self) -> bool {
        matches!(self, AiError::MissingApiKey)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardDraft {
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizDraft {
    pub question: String,
    pub options: Vec<String>,
    /// Text of the correct option.
    pub answer: String,
}

/// A concept map for a topic, as the service returns it. Node ids are the
/// service's own and only link `edges` to `nodes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MindMapDraft {
    #[serde(default)]
    pub nodes: Vec<MindMapNodeDraft>,
    #[serde(default)]
    pub edges: Vec<MindMapEdgeDraft>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MindMapNodeDraft {
    pub id: String,
    pub label: String,
    /// `lecture` for the central topic; `concept`, `fact`, `example`...
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MindMapEdgeDraft {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// The hosted text-generation service.
#[async_trait]
pub trait AiClient: Send + Sync {
    async fn generate_text(
        &self,
        prompt: &str,
        system_instruction: Option<&str>,
    ) -> Result<String, AiError>;

    async fn generate_flashcards(&self, context: &str) -> Result<Vec<FlashcardDraft>, AiError>;

    async fn generate_quiz(&self, context: &str) -> Result<Vec<QuizDraft>, AiError>;

    async fn generate_mind_map(&self, topic: &str) -> Result<MindMapDraft, AiError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiAction {
    Enhance,
    Flashcards,
    Quiz,
}

impl AiAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "enhance" => Some(AiAction::Enhance),
            "flashcards" => Some(AiAction::Flashcards),
            "quiz" => Some(AiAction::Quiz),
            _ => None,
        }
    }
}

/// What to send to the service for one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AiRequest {
    #[serde(rename_all = "camelCase")]
    Text {
        prompt: String,
        system_instruction: Option<String>,
    },
    Flashcards { context: String },
    Quiz { context: String },
    MindMap { topic: String },
}

impl AiRequest {
    pub async fn send(&self, client: &dyn AiClient) -> Result<AiResponse, AiError> {
        match self {
            AiRequest::Text {
                prompt,
                system_instruction,
            } => client
                .generate_text(prompt, system_instruction.as_deref())
                .await
                .map(AiResponse::Text),
            AiRequest::Flashcards { context } => client
                .generate_flashcards(context)
                .await
                .map(AiResponse::Flashcards),
            AiRequest::Quiz { context } => client.generate_quiz(context).await.map(AiResponse::Quiz),
            AiRequest::MindMap { topic } => client
                .generate_mind_map(topic)
                .await
                .map(AiResponse::MindMap),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiResponse {
    Text(String),
    Flashcards(Vec<FlashcardDraft>),
    Quiz(Vec<QuizDraft>),
    MindMap(MindMapDraft),
}

impl AiResponse {
    /// Decode the raw text the service returned for `action`.
    pub fn decode(action: AiAction, raw: &str) -> Result<Self, AiError> {
        match action {
            AiAction::Enhance => Ok(AiResponse::Text(raw.to_string())),
            AiAction::Flashcards => parse_list(raw).map(AiResponse::Flashcards),
            AiAction::Quiz => parse_list(raw).map(AiResponse::Quiz),
        }
    }
}

/// Strip a surrounding markdown code fence, if the model added one.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.strip_suffix("```").unwrap_or(rest);
    // Drop the info string ("json") on the opening fence line.
    match body.find('\n') {
        Some(i) => body[i + 1..].trim(),
        None => body.trim(),
    }
}

/// Decode a concept map reply. Blank output means an empty map.
pub fn parse_mind_map(raw: &str) -> Result<MindMapDraft, AiError> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Ok(MindMapDraft::default());
    }
    serde_json::from_str(body).map_err(|e| AiError::InvalidResponse(e.to_string()))
}

/// Decode a structured reply. Blank output means an empty list.
pub fn parse_list<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>, AiError> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(body).map_err(|e| AiError::InvalidResponse(e.to_string()))
}

/// An action between [`begin`] and [`complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAiAction {
    pub node: NodeId,
    pub action: AiAction,
    pub request: AiRequest,
    /// Identifies this action among later ones on the same node.
    pub ticket: u64,
}

/// What a completed action added to the canvas.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AiOutcome {
    pub enhanced: bool,
    pub created_nodes: Vec<NodeId>,
    pub created_edges: Vec<EdgeId>,
    /// The node was deleted, or the canvas replaced, while the call was in
    /// flight.
    pub dropped: bool,
}

pub fn enhance_prompt(label: &str) -> String {
    format!("Improve and expand this note academically:\n{label}")
}

pub fn flashcards_prompt(context: &str) -> String {
    format!("Generate 3 flashcards based on this content: \"{context}\"")
}

pub fn quiz_prompt(context: &str) -> String {
    format!("Generate a multiple choice quiz question based on: \"{context}\"")
}

pub fn mind_map_prompt(topic: &str) -> String {
    format!(
        "Create a comprehensive concept map for the topic: \"{topic}\".\n\
         Identify the main central concept, 5-7 key sub-concepts, and connections between them.\n\
         Return a JSON object with 'nodes' and 'edges'.\n\
         For nodes, use types like 'concept', 'lecture' (for main topic), 'fact', or 'example'.\n\
         Include a brief 'summary' for each node."
    )
}

/// Start `action` on `node`: remember its title and show the working
/// indicator in its place.
pub fn begin(
    engine: &mut FlowEngine,
    node: NodeId,
    action: AiAction,
) -> Result<PendingAiAction, AiError> {
    if engine.is_in_flight(node) {
        return Err(AiError::Busy(node));
    }
    let source = engine.graph.node(node).ok_or(AiError::UnknownNode(node))?;
    let original_title = source.title.clone();
    let context = source.data.text_content().to_string();

    let request = match action {
        AiAction::Enhance => AiRequest::Text {
            prompt: enhance_prompt(&context),
            system_instruction: Some(ENHANCE_SYSTEM_INSTRUCTION.to_string()),
        },
        AiAction::Flashcards => AiRequest::Flashcards { context },
        AiAction::Quiz => AiRequest::Quiz { context },
    };

    engine.apply(GraphMutation::SetTitle {
        id: node,
        title: WORKING_TITLE.to_string(),
    })?;
    let ticket = engine.mark_in_flight(node, original_title);
    log::debug!("{action:?} started on {node}");

    Ok(PendingAiAction {
        node,
        action,
        request,
        ticket,
    })
}

/// Apply the response for a pending action.
///
/// Flashcard and quiz failures degrade to an empty result. Enhance failures
/// are returned to the caller and recorded as an error notice.
pub fn complete(
    engine: &mut FlowEngine,
    pending: PendingAiAction,
    result: Result<AiResponse, AiError>,
) -> Result<AiOutcome, AiError> {
    let PendingAiAction {
        node,
        action,
        ticket,
        ..
    } = pending;
    let dropped = Ok(AiOutcome {
        dropped: true,
        ..AiOutcome::default()
    });

    let Some(title) = engine.finish_in_flight(node, ticket) else {
        log::warn!("{action:?} result for {node} dropped: the action was abandoned");
        return dropped;
    };
    if !engine.graph.contains_node(node) {
        log::warn!("{action:?} result for deleted node {node} dropped");
        return dropped;
    }
    engine.apply(GraphMutation::SetTitle { id: node, title })?;

    let response = match (action, result) {
        (AiAction::Enhance, Err(e)) => {
            engine.notify(NoticeLevel::Error, format!("AI Error: {e}"));
            return Err(e);
        }
        (_, Err(e)) => {
            log::warn!("{action:?} on {node} failed, treating as empty: {e}");
            if e.is_configuration() {
                engine.notify(NoticeLevel::Error, format!("AI Error: {e}"));
            }
            return Ok(AiOutcome::default());
        }
        (_, Ok(response)) => response,
    };

    let outcome = match (action, response) {
        (AiAction::Enhance, AiResponse::Text(text)) => {
            engine.apply(GraphMutation::SetText { id: node, text })?;
            AiOutcome {
                enhanced: true,
                ..AiOutcome::default()
            }
        }
        (AiAction::Flashcards, AiResponse::Flashcards(cards)) => {
            let nodes = flashcard_nodes(engine, node, cards);
            attach_generated(engine, node, nodes)?
        }
        (AiAction::Quiz, AiResponse::Quiz(questions)) => {
            let nodes = quiz_node(engine, node, questions).into_iter().collect();
            attach_generated(engine, node, nodes)?
        }
        (action, response) => {
            let e = AiError::InvalidResponse(format!("{action:?} got {response:?}"));
            if action == AiAction::Enhance {
                engine.notify(NoticeLevel::Error, format!("AI Error: {e}"));
                return Err(e);
            }
            log::warn!("{e}");
            return Ok(AiOutcome::default());
        }
    };
    log::info!(
        "{action:?} on {node} completed: {} node(s) added",
        outcome.created_nodes.len()
    );
    Ok(outcome)
}

/// Run `action` end to end against `client`.
pub async fn run_ai_action(
    engine: &mut FlowEngine,
    client: &dyn AiClient,
    node: NodeId,
    action: AiAction,
) -> Result<AiOutcome, AiError> {
    let pending = begin(engine, node, action)?;
    let result = pending.request.send(client).await;
    complete(engine, pending, result)
}

fn flashcard_nodes(engine: &FlowEngine, source: NodeId, cards: Vec<FlashcardDraft>) -> Vec<Node> {
    let Some(src) = engine.graph.node(source) else {
        return Vec::new();
    };
    let x = src.x + src.width + GENERATED_GAP;
    cards
        .into_iter()
        .enumerate()
        .map(|(i, card)| {
            Node::new(NodeKind::Flashcard, x, src.y + i as f32 * FLASHCARD_STACK_SPACING)
                .with_title(FLASHCARD_TITLE)
                .with_size(DEFAULT_NODE_WIDTH, FLASHCARD_HEIGHT)
                .with_body(NodeBody::Flashcard {
                    front: card.front,
                    back: card.back,
                    flipped: false,
                })
        })
        .collect()
}

/// Only the first question becomes a node.
fn quiz_node(engine: &FlowEngine, source: NodeId, questions: Vec<QuizDraft>) -> Option<Node> {
    let src = engine.graph.node(source)?;
    let q = questions.into_iter().next()?;
    Some(
        Node::new(NodeKind::Quiz, src.x, src.y + src.height + GENERATED_GAP)
            .with_title(QUIZ_TITLE)
            .with_size(QUIZ_WIDTH, QUIZ_HEIGHT)
            .with_body(NodeBody::Quiz {
                question: q.question,
                options: SmallVec::from_vec(q.options),
                answer: q.answer,
                selected: None,
            }),
    )
}

/// Add generated nodes, each wired from `source`.
fn attach_generated(
    engine: &mut FlowEngine,
    source: NodeId,
    nodes: Vec<Node>,
) -> Result<AiOutcome, AiError> {
    let mut outcome = AiOutcome::default();
    for node in nodes {
        let id = node.id;
        engine.apply(GraphMutation::AddNode { node: Box::new(node) })?;
        outcome.created_nodes.push(id);
        outcome.created_edges.push(engine.connect(source, id)?);
    }
    Ok(outcome)
}

// ─── Study plan ──────────────────────────────────────────────────────────

/// Card type for a concept map node. Anything that is not a plain text
/// card becomes a concept.
fn mind_map_kind(kind: &str) -> NodeKind {
    match kind.trim().to_ascii_lowercase().as_str() {
        "fact" => NodeKind::Note,
        "example" => NodeKind::Idea,
        other => match NodeKind::parse(other) {
            Some(k) if !matches!(k, NodeKind::Flashcard | NodeKind::Quiz) => k,
            _ => NodeKind::Concept,
        },
    }
}

/// Lay a concept map out around `center` (world space): the central topic
/// there, every other node evenly on a ring around it. Wires referring to
/// unknown ids, self-loops and repeats are skipped.
pub fn place_mind_map(
    engine: &mut FlowEngine,
    draft: MindMapDraft,
    center: Point,
) -> Result<AiOutcome, AiError> {
    let mut outcome = AiOutcome::default();
    if draft.nodes.is_empty() {
        return Ok(outcome);
    }
    let hub = draft
        .nodes
        .iter()
        .position(|n| n.kind.eq_ignore_ascii_case("lecture"))
        .unwrap_or(0);
    let spokes = draft.nodes.len() - 1;

    let mut ids: HashMap<String, NodeId> = HashMap::new();
    let mut spoke = 0usize;
    for (i, draft_node) in draft.nodes.into_iter().enumerate() {
        let kind = mind_map_kind(&draft_node.kind);
        let (w, h) = kind.default_size();
        let slot = if i == hub {
            center
        } else {
            let angle = std::f32::consts::TAU * spoke as f32 / spokes as f32
                - std::f32::consts::FRAC_PI_2;
            spoke += 1;
            Point::new(
                center.x + MIND_MAP_RADIUS * angle.cos(),
                center.y + MIND_MAP_RADIUS * angle.sin(),
            )
        };
        let node = Node::new(kind, slot.x - w / 2.0, slot.y - h / 2.0)
            .with_title(draft_node.label)
            .with_body(NodeBody::text(kind, draft_node.summary));
        let id = node.id;
        engine.apply(GraphMutation::AddNode { node: Box::new(node) })?;
        outcome.created_nodes.push(id);
        if ids.insert(draft_node.id.clone(), id).is_some() {
            log::warn!("concept map repeats node id {:?}", draft_node.id);
        }
    }

    let mut seen = HashSet::new();
    for edge in draft.edges {
        let (Some(&source), Some(&target)) = (ids.get(&edge.source), ids.get(&edge.target)) else {
            log::warn!("concept map wire {} -> {} skipped", edge.source, edge.target);
            continue;
        };
        if source == target || !seen.insert((source, target)) {
            continue;
        }
        outcome.created_edges.push(engine.connect(source, target)?);
    }
    log::info!(
        "study plan placed: {} node(s), {} wire(s)",
        outcome.created_nodes.len(),
        outcome.created_edges.len()
    );
    Ok(outcome)
}

/// Ask `client` for a concept map of `topic` and lay it out around
/// `center`. A blank topic does nothing. Failures are recorded as a notice
/// and returned.
pub async fn generate_study_plan(
    engine: &mut FlowEngine,
    client: &dyn AiClient,
    topic: &str,
    center: Point,
) -> Result<AiOutcome, AiError> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Ok(AiOutcome::default());
    }
    match client.generate_mind_map(topic).await {
        Ok(draft) => place_mind_map(engine, draft, center),
        Err(e) => {
            engine.notify(NoticeLevel::Error, format!("AI Error: {e}"));
            Err(e)
        }
    }
}

// ─── Study chat ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// System instruction for the study chat, mentioning the selected node.
pub fn chat_system_instruction(selected: Option<&Node>) -> String {
    let mut context = String::from("User is in a study canvas.");
    if let Some(n) = selected {
        context.push_str(&format!(
            " user selected note titled \"{}\" with content: {}",
            n.title,
            n.data.text_content()
        ));
    }
    format!("You are a helpful study assistant. Context: {context}")
}

/// Conversation history of the study chat panel.
#[derive(Debug, Default)]
pub struct StudyChat {
    messages: Vec<ChatMessage>,
}

impl StudyChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    fn push(&mut self, role: ChatRole, text: String) -> &ChatMessage {
        self.messages.push(ChatMessage {
            role,
            text,
            timestamp: Utc::now(),
        });
        &self.messages[self.messages.len() - 1]
    }

    /// Ask a question. Blank questions are ignored. Failures become the
    /// canned error reply instead of an error.
    pub async fn ask(
        &mut self,
        client: &dyn AiClient,
        question: &str,
        selected: Option<&Node>,
    ) -> Option<&ChatMessage> {
        if question.trim().is_empty() {
            return None;
        }
        self.push(ChatRole::User, question.to_string());
        let system = chat_system_instruction(selected);
        let reply = match client.generate_text(question, Some(&system)).await {
            Ok(text) => text,
            Err(e) => {
                log::warn!("chat request failed: {e}");
                CHAT_ERROR_REPLY.to_string()
            }
        };
        Some(self.push(ChatRole::Model, reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowdo_core::{FlowGraph, Point, Viewport};
    use pretty_assertions::assert_eq;

    fn engine_with_note(text: &str) -> (FlowEngine, NodeId) {
        let mut engine = FlowEngine::new(FlowGraph::new(), Viewport::default());
        let id = engine.add_node_at(NodeKind::Note, Point::new(10.0, 20.0)).unwrap();
        engine
            .apply(GraphMutation::SetText { id, text: text.into() })
            .unwrap();
        engine
            .apply(GraphMutation::SetTitle { id, title: "Cells".into() })
            .unwrap();
        (engine, id)
    }

    #[test]
    fn begin_shows_working_title() {
        let (mut engine, id) = engine_with_note("mitochondria");
        let pending = begin(&mut engine, id, AiAction::Enhance).unwrap();
        assert_eq!(engine.graph.node(id).unwrap().title, WORKING_TITLE);
        assert_eq!(
            pending.request,
            AiRequest::Text {
                prompt: "Improve and expand this note academically:\nmitochondria".into(),
                system_instruction: Some(ENHANCE_SYSTEM_INSTRUCTION.into()),
            }
        );
    }

    #[test]
    fn second_begin_on_same_node_is_busy() {
        let (mut engine, id) = engine_with_note("x");
        begin(&mut engine, id, AiAction::Quiz).unwrap();
        assert!(matches!(begin(&mut engine, id, AiAction::Enhance), Err(AiError::Busy(_))));
    }

    #[test]
    fn enhance_replaces_text_and_restores_title() {
        let (mut engine, id) = engine_with_note("draft");
        let pending = begin(&mut engine, id, AiAction::Enhance).unwrap();
        let out = complete(&mut engine, pending, Ok(AiResponse::Text("expanded".into()))).unwrap();
        assert!(out.enhanced);
        let node = engine.graph.node(id).unwrap();
        assert_eq!(node.title, "Cells");
        assert_eq!(node.data.text_content(), "expanded");
    }

    #[test]
    fn quiz_uses_first_question_only() {
        let (mut engine, id) = engine_with_note("photosynthesis");
        let pending = begin(&mut engine, id, AiAction::Quiz).unwrap();
        let q = |s: &str| QuizDraft {
            question: s.into(),
            options: vec!["a".into(), "b".into()],
            answer: "a".into(),
        };
        let out = complete(&mut engine, pending, Ok(AiResponse::Quiz(vec![q("one"), q("two")]))).unwrap();
        assert_eq!(out.created_nodes.len(), 1);
        let quiz = engine.graph.node(out.created_nodes[0]).unwrap();
        assert_eq!((quiz.x, quiz.y), (10.0, 20.0 + 200.0 + 50.0));
        assert_eq!((quiz.width, quiz.height), (QUIZ_WIDTH, QUIZ_HEIGHT));
        assert_eq!(quiz.title, "Quiz");
        assert_eq!(quiz.data.text_content(), "one");
    }

    #[test]
    fn empty_quiz_creates_nothing() {
        let (mut engine, id) = engine_with_note("x");
        let before = engine.graph.node_count();
        let pending = begin(&mut engine, id, AiAction::Quiz).unwrap();
        let out = complete(&mut engine, pending, Ok(AiResponse::Quiz(Vec::new()))).unwrap();
        assert_eq!(out, AiOutcome::default());
        assert_eq!(engine.graph.node_count(), before);
        assert_eq!(engine.graph.node(id).unwrap().title, "Cells");
    }

    #[test]
    fn flashcard_failure_degrades_to_empty() {
        let (mut engine, id) = engine_with_note("x");
        let pending = begin(&mut engine, id, AiAction::Flashcards).unwrap();
        let out = complete(&mut engine, pending, Err(AiError::Http("timeout".into()))).unwrap();
        assert!(out.created_nodes.is_empty());
        assert!(engine.notices().is_empty());
        assert_eq!(engine.graph.node(id).unwrap().title, "Cells");
    }

    #[test]
    fn missing_key_is_reported_even_when_degraded() {
        let (mut engine, id) = engine_with_note("x");
        let pending = begin(&mut engine, id, AiAction::Flashcards).unwrap();
        complete(&mut engine, pending, Err(AiError::MissingApiKey)).unwrap();
        assert_eq!(engine.notices().len(), 1);
        assert!(engine.notices()[0].message.starts_with("AI Error: "));
    }

    #[test]
    fn deleted_node_drops_result() {
        let (mut engine, id) = engine_with_note("x");
        let pending = begin(&mut engine, id, AiAction::Flashcards).unwrap();
        engine.apply(GraphMutation::RemoveNode { id }).unwrap();
        let cards = vec![FlashcardDraft { front: "Q".into(), back: "A".into() }];
        let out = complete(&mut engine, pending, Ok(AiResponse::Flashcards(cards))).unwrap();
        assert!(out.dropped);
        assert_eq!(engine.graph.node_count(), 0);
        assert!(!engine.is_in_flight(id));
    }

    #[test]
    fn abandoned_action_is_dropped_even_if_node_survives() {
        let (mut engine, id) = engine_with_note("x");
        let pending = begin(&mut engine, id, AiAction::Flashcards).unwrap();
        engine.abandon_in_flight();
        assert_eq!(engine.graph.node(id).unwrap().title, "Cells");
        let cards = vec![FlashcardDraft { front: "Q".into(), back: "A".into() }];
        let out = complete(&mut engine, pending, Ok(AiResponse::Flashcards(cards))).unwrap();
        assert!(out.dropped);
        assert_eq!(engine.graph.node_count(), 1);
    }

    #[test]
    fn stale_completion_does_not_finish_newer_action() {
        let (mut engine, id) = engine_with_note("x");
        let first = begin(&mut engine, id, AiAction::Quiz).unwrap();
        engine.abandon_in_flight();
        let second = begin(&mut engine, id, AiAction::Enhance).unwrap();
        assert_ne!(first.ticket, second.ticket);
        assert_eq!(engine.settled_graph().node(id).unwrap().title, "Cells");

        let out = complete(&mut engine, first, Ok(AiResponse::Quiz(Vec::new()))).unwrap();
        assert!(out.dropped);
        assert!(engine.is_in_flight(id));

        complete(&mut engine, second, Ok(AiResponse::Text("better".into()))).unwrap();
        assert!(!engine.is_in_flight(id));
        assert_eq!(engine.graph.node(id).unwrap().title, "Cells");
        assert_eq!(engine.graph.node(id).unwrap().data.text_content(), "better");
    }

    #[test]
    fn settled_graph_hides_working_title() {
        let (mut engine, id) = engine_with_note("x");
        begin(&mut engine, id, AiAction::Enhance).unwrap();
        assert_eq!(engine.settled_graph().node(id).unwrap().title, "Cells");
        assert_eq!(engine.graph.node(id).unwrap().title, WORKING_TITLE);
    }

    fn draft_node(id: &str, kind: &str) -> MindMapNodeDraft {
        MindMapNodeDraft {
            id: id.into(),
            label: id.to_uppercase(),
            kind: kind.into(),
            summary: format!("about {id}"),
        }
    }

    fn draft_edge(source: &str, target: &str) -> MindMapEdgeDraft {
        MindMapEdgeDraft {
            source: source.into(),
            target: target.into(),
            label: None,
        }
    }

    #[test]
    fn mind_map_rings_sub_concepts_around_topic() {
        let mut engine = FlowEngine::new(FlowGraph::new(), Viewport::default());
        let draft = MindMapDraft {
            nodes: vec![
                draft_node("a", "concept"),
                draft_node("t", "lecture"),
                draft_node("b", "fact"),
                draft_node("c", "example"),
                draft_node("d", "quiz"),
            ],
            edges: vec![
                draft_edge("t", "a"),
                draft_edge("t", "b"),
                draft_edge("t", "b"),
                draft_edge("c", "c"),
                draft_edge("t", "ghost"),
            ],
        };
        let out = place_mind_map(&mut engine, draft, Point::new(0.0, 0.0)).unwrap();
        assert_eq!(out.created_nodes.len(), 5);
        assert_eq!(out.created_edges.len(), 2);

        let topic = engine.graph.node(out.created_nodes[1]).unwrap();
        assert_eq!(topic.kind(), NodeKind::Lecture);
        assert_eq!(topic.title, "T");
        assert_eq!((topic.x, topic.y), (-150.0, -100.0));
        assert_eq!(topic.data.text_content(), "about t");

        // First spoke sits straight above the topic.
        let first = engine.graph.node(out.created_nodes[0]).unwrap();
        assert!((first.x + 150.0).abs() < 1e-3);
        assert!((first.y + 100.0 + MIND_MAP_RADIUS).abs() < 1e-3);

        let kinds: Vec<NodeKind> = out
            .created_nodes
            .iter()
            .map(|id| engine.graph.node(*id).unwrap().kind())
            .collect();
        assert_eq!(
            kinds,
            vec![NodeKind::Concept, NodeKind::Lecture, NodeKind::Note, NodeKind::Idea, NodeKind::Concept]
        );
    }

    #[test]
    fn empty_mind_map_places_nothing() {
        let mut engine = FlowEngine::new(FlowGraph::new(), Viewport::default());
        let out = place_mind_map(&mut engine, MindMapDraft::default(), Point::ZERO).unwrap();
        assert_eq!(out, AiOutcome::default());
        assert!(engine.graph.is_empty());
    }

    #[test]
    fn mind_map_reply_decodes() {
        let raw = "```json\n{\"nodes\":[{\"id\":\"1\",\"label\":\"Optics\",\"type\":\"lecture\",\"summary\":\"light\"}],\"edges\":[]}\n```";
        let draft = parse_mind_map(raw).unwrap();
        assert_eq!(draft.nodes[0].kind, "lecture");
        assert_eq!(parse_mind_map(" ").unwrap(), MindMapDraft::default());
        assert!(parse_mind_map("[1,2]").is_err());
    }

    #[test]
    fn chat_instruction_mentions_selection() {
        let node = Node::new(NodeKind::Concept, 0.0, 0.0)
            .with_title("Entropy")
            .with_body(NodeBody::text(NodeKind::Concept, "disorder".into()));
        assert_eq!(
            chat_system_instruction(Some(&node)),
            "You are a helpful study assistant. Context: User is in a study canvas. \
             user selected note titled \"Entropy\" with content: disorder"
        );
        assert_eq!(
            chat_system_instruction(None),
            "You are a helpful study assistant. Context: User is in a study canvas."
        );
    }
}
