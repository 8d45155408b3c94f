//! WASM bridge for FlowDo: exposes the canvas editor to the browser UI.
//!
//! Built with `wasm-pack build --target web`. The page owns the DOM and the
//! network; this crate owns the canvas state. Every method returns plain
//! values or JSON strings so the JS side never touches Rust types.

mod storage;

use flowdo_core::defaults::{EXPORT_FILE_NAME, SETTINGS_KEY, SNAPSHOT_KEY, STATE_RECORD_KEY};
use flowdo_core::{Attachment, AttachmentId, AttachmentKind, NodeId, NodeKind, Point, Selection};
use flowdo_editor::ai::{self, AiAction, AiError, AiOutcome, AiRequest, AiResponse, PendingAiAction};
use flowdo_editor::engine::NoticeLevel;
use flowdo_editor::input::{InputEvent, Modifiers, PointerButton};
use flowdo_editor::persist::{self, Autosave, SnapshotStore};
use flowdo_editor::shortcuts::ShortcutMap;
use flowdo_editor::{CanvasEditor, FlowEngine};
use serde_json::{Value, json};
use std::collections::HashMap;
use wasm_bindgen::prelude::*;

pub use storage::{ConsoleLogger, LocalStorageStore, init_console_logger};

/// The canvas controller the page talks to.
///
/// Holds the editor session, the autosave debounce and the store it writes
/// to, plus AI actions and a study plan waiting on a `fetch` in JS.
#[wasm_bindgen]
pub struct FlowCanvas {
    editor: CanvasEditor,
    autosave: Autosave,
    store: Box<dyn SnapshotStore>,
    settings: Box<dyn SnapshotStore>,
    pending_ai: HashMap<NodeId, PendingAiAction>,
    pending_plan: Option<String>,
}

#[wasm_bindgen]
impl FlowCanvas {
    /// Create the controller and restore the last autosaved canvas.
    #[wasm_bindgen(constructor)]
    pub fn new(width: f32, height: f32) -> Self {
        console_error_panic_hook_setup();
        #[cfg(target_arch = "wasm32")]
        init_console_logger(log::LevelFilter::Info);

        Self::with_store(browser_store(SNAPSHOT_KEY), width, height)
    }

    /// Like the constructor, but persists under the keyed record and keeps
    /// the viewport along with the graph.
    pub fn with_saved_view(width: f32, height: f32) -> FlowCanvas {
        console_error_panic_hook_setup();
        #[cfg(target_arch = "wasm32")]
        init_console_logger(log::LevelFilter::Info);

        let mut canvas = Self::with_store(browser_store(STATE_RECORD_KEY), width, height);
        canvas.autosave = Autosave::default().with_viewport(true);
        canvas.autosave.sync_to(&canvas.editor.engine);
        canvas
    }

    /// Canvas element moved or resized. `left`/`top` are its client offset.
    pub fn resize(&mut self, left: f32, top: f32, width: f32, height: f32) {
        self.editor
            .resize_canvas(Point::new(left, top), width, height);
    }

    // ─── Pointer & keyboard ──────────────────────────────────────────────

    /// Pointer pressed. `button` is the DOM `MouseEvent.button` value.
    /// Returns true if the canvas needs a redraw.
    pub fn handle_pointer_down(&mut self, x: f32, y: f32, button: i16) -> bool {
        self.editor.handle_event(&InputEvent::PointerDown {
            x,
            y,
            button: PointerButton::from_dom(button),
        })
    }

    pub fn handle_pointer_move(&mut self, x: f32, y: f32) -> bool {
        self.editor.handle_event(&InputEvent::PointerMove { x, y })
    }

    pub fn handle_pointer_up(&mut self, x: f32, y: f32) -> bool {
        self.editor.handle_event(&InputEvent::PointerUp { x, y })
    }

    /// Wheel scrolled. Ctrl/Cmd held means zoom, otherwise pan.
    pub fn handle_wheel(&mut self, dx: f32, dy: f32, ctrl: bool, meta: bool) -> bool {
        self.editor.handle_event(&InputEvent::Wheel {
            dx,
            dy,
            modifiers: Modifiers {
                ctrl,
                meta,
                ..Modifiers::NONE
            },
        })
    }

    /// Key pressed. Returns `{"handled":bool,"action":name|null}` so JS
    /// knows whether to `preventDefault`.
    pub fn handle_key(&mut self, key: &str, ctrl: bool, shift: bool, alt: bool, meta: bool) -> String {
        let modifiers = Modifiers {
            shift,
            ctrl,
            alt,
            meta,
        };
        let action = ShortcutMap::resolve(key, modifiers);
        let handled = self.editor.handle_event(&InputEvent::Key {
            key: key.to_string(),
            modifiers,
        });
        json!({
            "handled": handled,
            "action": action.map(|a| format!("{a:?}")),
        })
        .to_string()
    }

    // ─── Scene ───────────────────────────────────────────────────────────

    /// The paint list for the current frame.
    pub fn render_json(&self) -> String {
        self.editor.render_list().to_json().unwrap_or_else(|e| {
            log::error!("render list encode failed: {e}");
            "{}".to_string()
        })
    }

    /// `{"x":..,"y":..}` in screen space, or `null` when the menu is closed.
    pub fn menu_json(&self) -> String {
        match self.editor.interaction.menu() {
            Some(menu) => json!({ "x": menu.screen.x, "y": menu.screen.y }).to_string(),
            None => "null".to_string(),
        }
    }

    pub fn open_menu_at_center(&mut self) {
        self.editor.open_menu_at_center();
    }

    pub fn close_menu(&mut self) -> bool {
        self.editor.interaction.close_menu().is_some()
    }

    /// Create a node of `kind` at the menu position. Returns the new id, or
    /// an empty string if the menu was closed or the kind is unknown.
    pub fn create_from_menu(&mut self, kind: &str) -> String {
        let Some(kind) = NodeKind::parse(kind) else {
            log::warn!("unknown node kind {kind:?}");
            return String::new();
        };
        self.editor
            .create_from_menu(kind)
            .map(|id| id.as_str().to_string())
            .unwrap_or_default()
    }

    pub fn get_selected_id(&self) -> String {
        match self.editor.selection() {
            Selection::Node(id) => id.as_str().to_string(),
            Selection::Edge(id) => id.as_str().to_string(),
            Selection::Group(id) => id.as_str().to_string(),
            Selection::None => String::new(),
        }
    }

    /// Select a node by id. Returns false if there is no such node.
    pub fn select_by_id(&mut self, node_id: &str) -> bool {
        let id = NodeId::intern(node_id);
        if !self.editor.graph().contains_node(id) {
            return false;
        }
        self.editor.interaction.select(Selection::Node(id));
        true
    }

    pub fn delete_selected(&mut self) -> bool {
        self.editor.delete_selection()
    }

    pub fn undo(&mut self) -> bool {
        self.editor.undo().is_some()
    }

    pub fn redo(&mut self) -> bool {
        self.editor.redo().is_some()
    }

    pub fn can_undo(&self) -> bool {
        self.editor.commands.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.editor.commands.can_redo()
    }

    pub fn reset_view(&mut self) {
        self.editor.reset_view();
    }

    pub fn zoom(&self) -> f32 {
        self.editor.viewport().zoom()
    }

    // ─── Card edits ──────────────────────────────────────────────────────

    pub fn set_title(&mut self, node_id: &str, title: &str) -> bool {
        let id = NodeId::intern(node_id);
        report(self.editor.set_title(id, title), "set_title")
    }

    /// Replace the node's main text (label, content, front, question...).
    pub fn set_text(&mut self, node_id: &str, text: &str) -> bool {
        let id = NodeId::intern(node_id);
        report(self.editor.set_text(id, text), "set_text")
    }

    /// Replace the whole payload from JSON. The `type` must match the node.
    pub fn set_body_json(&mut self, node_id: &str, body: &str) -> bool {
        let id = NodeId::intern(node_id);
        match serde_json::from_str(body) {
            Ok(body) => report(self.editor.set_body(id, body), "set_body"),
            Err(e) => {
                log::warn!("set_body: bad payload: {e}");
                false
            }
        }
    }

    pub fn toggle_completed(&mut self, node_id: &str) -> bool {
        let id = NodeId::intern(node_id);
        report(self.editor.toggle_completed(id), "toggle_completed")
    }

    pub fn toggle_flip(&mut self, node_id: &str) -> bool {
        let id = NodeId::intern(node_id);
        report(self.editor.toggle_flip(id), "toggle_flip")
    }

    pub fn answer_quiz(&mut self, node_id: &str, option: &str) -> bool {
        let id = NodeId::intern(node_id);
        report(self.editor.answer_quiz(id, option), "answer_quiz")
    }

    /// Attach a file read by the page. `kind` is `"image"` or `"file"`;
    /// `content` is a data URL or extracted text. Returns the attachment id,
    /// or an empty string on failure.
    pub fn add_attachment(&mut self, node_id: &str, name: &str, kind: &str, content: &str) -> String {
        let kind = match kind {
            "image" => AttachmentKind::Image,
            _ => AttachmentKind::File,
        };
        let attachment = Attachment::new(name, kind, content);
        let attachment_id = attachment.id;
        let id = NodeId::intern(node_id);
        if report(self.editor.add_attachment(id, attachment), "add_attachment") {
            attachment_id.as_str().to_string()
        } else {
            String::new()
        }
    }

    pub fn remove_attachment(&mut self, node_id: &str, attachment_id: &str) -> bool {
        let id = NodeId::intern(node_id);
        let attachment = AttachmentId::intern(attachment_id);
        report(self.editor.remove_attachment(id, attachment), "remove_attachment")
    }

    /// Uncheck every task.
    pub fn reset_progress(&mut self) -> bool {
        self.editor.reset_progress()
    }

    // ─── Persistence ─────────────────────────────────────────────────────

    /// Suggested download name for [`export_json`](Self::export_json).
    pub fn export_file_name() -> String {
        EXPORT_FILE_NAME.to_string()
    }

    pub fn export_json(&self) -> String {
        self.editor.export_json().unwrap_or_else(|e| {
            log::error!("export failed: {e}");
            String::new()
        })
    }

    /// Replace the canvas from an exported file.
    /// Returns `{"ok":true}` or `{"ok":false,"error":"..."}`.
    pub fn import_json(&mut self, raw: &str) -> String {
        match self.editor.import_json(raw) {
            Ok(()) => {
                self.forget_pending();
                json!({ "ok": true }).to_string()
            }
            Err(e) => {
                let message = format!("Import failed: {e}");
                self.editor.engine.notify(NoticeLevel::Error, message.clone());
                json!({ "ok": false, "error": message }).to_string()
            }
        }
    }

    /// Wipe the canvas and the saved copy.
    pub fn clear(&mut self) -> bool {
        self.editor.clear();
        self.forget_pending();
        self.autosave.sync_to(&self.editor.engine);
        match self.store.clear() {
            Ok(()) => true,
            Err(e) => {
                log::warn!("clearing saved canvas failed: {e}");
                false
            }
        }
    }

    /// Drive the autosave debounce. Call from `requestAnimationFrame` with
    /// `performance.now()`. Returns true if a save happened.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        match self
            .autosave
            .tick(&self.editor.engine, self.store.as_mut(), now_ms)
        {
            Ok(saved) => saved,
            Err(e) => {
                log::warn!("autosave failed: {e}");
                false
            }
        }
    }

    /// Save immediately, e.g. from `beforeunload`.
    pub fn flush(&mut self) -> bool {
        self.autosave
            .flush(&self.editor.engine, self.store.as_mut())
            .map_err(|e| log::warn!("save failed: {e}"))
            .is_ok()
    }

    // ─── AI actions ──────────────────────────────────────────────────────

    /// Start `action` (`"enhance"`, `"flashcards"` or `"quiz"`) on a node.
    /// Returns `{"ok":true,"request":{...}}` describing the call JS must make,
    /// or `{"ok":false,"error":"..."}`.
    pub fn begin_ai(&mut self, node_id: &str, action: &str) -> String {
        let Some(action) = AiAction::parse(action) else {
            return error_json(format!("unknown AI action {action:?}"));
        };
        let id = NodeId::intern(node_id);
        match ai::begin(&mut self.editor.engine, id, action) {
            Ok(pending) => {
                let request = serde_json::to_value(&pending.request).unwrap_or(Value::Null);
                self.pending_ai.insert(id, pending);
                json!({ "ok": true, "request": request }).to_string()
            }
            Err(e) => error_json(e.to_string()),
        }
    }

    /// Finish a pending action with the raw text the service returned.
    pub fn complete_ai(&mut self, node_id: &str, raw: &str) -> String {
        let id = NodeId::intern(node_id);
        let Some(action) = self.pending_ai.get(&id).map(|p| p.action) else {
            return error_json(format!("no AI action pending on {node_id}"));
        };
        self.finish_ai(id, AiResponse::decode(action, raw))
    }

    /// Finish a pending action whose call failed.
    pub fn fail_ai(&mut self, node_id: &str, message: &str) -> String {
        let id = NodeId::intern(node_id);
        let error = if message.is_empty() {
            AiError::MissingApiKey
        } else {
            AiError::Http(message.to_string())
        };
        self.finish_ai(id, Err(error))
    }

    pub fn is_ai_pending(&self, node_id: &str) -> bool {
        self.pending_ai.contains_key(&NodeId::intern(node_id))
    }

    /// Start a study plan for `topic`. Returns the mind-map request JS must
    /// send, as [`begin_ai`](Self::begin_ai) does. A blank topic is refused.
    pub fn begin_study_plan(&mut self, topic: &str) -> String {
        let topic = topic.trim();
        if topic.is_empty() {
            return error_json("topic is empty");
        }
        if self.pending_plan.is_some() {
            return error_json("a study plan is already being generated");
        }
        self.pending_plan = Some(topic.to_string());
        let request = AiRequest::MindMap {
            topic: topic.to_string(),
        };
        let request = serde_json::to_value(&request).unwrap_or(Value::Null);
        json!({ "ok": true, "request": request }).to_string()
    }

    /// Lay out the concept map JS received for the pending study plan
    /// around the centre of the canvas.
    pub fn complete_study_plan(&mut self, raw: &str) -> String {
        let Some(topic) = self.pending_plan.take() else {
            return error_json("no study plan pending");
        };
        let placed = ai::parse_mind_map(raw).and_then(|draft| self.editor.place_study_plan(draft));
        match placed {
            Ok(outcome) => {
                log::info!("study plan for {topic:?} placed");
                outcome_json(&outcome)
            }
            Err(e) => {
                self.editor
                    .engine
                    .notify(NoticeLevel::Error, format!("AI Error: {e}"));
                error_json(e.to_string())
            }
        }
    }

    /// The pending study plan's call failed.
    pub fn fail_study_plan(&mut self, message: &str) -> String {
        if self.pending_plan.take().is_none() {
            return error_json("no study plan pending");
        }
        let error = if message.is_empty() {
            AiError::MissingApiKey
        } else {
            AiError::Http(message.to_string())
        };
        self.editor
            .engine
            .notify(NoticeLevel::Error, format!("AI Error: {error}"));
        error_json(error.to_string())
    }

    pub fn is_study_plan_pending(&self) -> bool {
        self.pending_plan.is_some()
    }

    /// The key saved by the settings screen, or an empty string. JS uses it
    /// when the build carries no key of its own.
    pub fn saved_api_key(&self) -> String {
        persist::saved_api_key(self.settings.as_ref()).unwrap_or_default()
    }

    /// Remember `key` for later sessions. An empty key forgets it.
    pub fn save_api_key(&mut self, key: &str) -> bool {
        let key = key.trim();
        let result = if key.is_empty() {
            self.settings.clear()
        } else {
            self.settings.save(key)
        };
        result
            .map_err(|e| log::warn!("saving settings failed: {e}"))
            .is_ok()
    }

    /// System instruction for the study chat, given the selected node.
    pub fn chat_system_instruction(&self) -> String {
        let selected = self
            .editor
            .selection()
            .node()
            .and_then(|id| self.editor.graph().node(id));
        ai::chat_system_instruction(selected)
    }

    /// Drain user-facing notices as `[{"level":"error","message":"..."}]`.
    pub fn take_notices_json(&mut self) -> String {
        let notices: Vec<Value> = self
            .editor
            .engine
            .take_notices()
            .into_iter()
            .map(|n| {
                let level = match n.level {
                    NoticeLevel::Info => "info",
                    NoticeLevel::Error => "error",
                };
                json!({ "level": level, "message": n.message })
            })
            .collect();
        Value::Array(notices).to_string()
    }
}

impl FlowCanvas {
    /// Build a controller over any snapshot store.
    pub fn with_store(store: Box<dyn SnapshotStore>, width: f32, height: f32) -> Self {
        let (graph, viewport) = persist::restore(store.as_ref());
        let mut editor = CanvasEditor::new(FlowEngine::new(graph, viewport));
        editor.resize_canvas(Point::ZERO, width, height);
        let mut autosave = Autosave::default();
        autosave.sync_to(&editor.engine);
        Self {
            editor,
            autosave,
            store,
            settings: browser_store(SETTINGS_KEY),
            pending_ai: HashMap::new(),
            pending_plan: None,
        }
    }

    pub fn editor(&self) -> &CanvasEditor {
        &self.editor
    }

    fn finish_ai(&mut self, id: NodeId, result: Result<AiResponse, AiError>) -> String {
        let Some(pending) = self.pending_ai.remove(&id) else {
            return error_json(format!("no AI action pending on {}", id.as_str()));
        };
        match ai::complete(&mut self.editor.engine, pending, result) {
            Ok(outcome) => outcome_json(&outcome),
            Err(e) => error_json(e.to_string()),
        }
    }

    /// Calls still out in JS can no longer land on this canvas.
    fn forget_pending(&mut self) {
        self.pending_ai.clear();
        self.pending_plan = None;
    }
}

fn outcome_json(outcome: &AiOutcome) -> String {
    json!({
        "ok": true,
        "enhanced": outcome.enhanced,
        "dropped": outcome.dropped,
        "created": outcome
            .created_nodes
            .iter()
            .map(|n| n.as_str())
            .collect::<Vec<_>>(),
    })
    .to_string()
}

fn error_json(message: impl Into<String>) -> String {
    json!({ "ok": false, "error": message.into() }).to_string()
}

/// Log a rejected edit and flatten it to a redraw flag.
fn report<E: std::fmt::Display>(result: Result<bool, E>, what: &str) -> bool {
    result.unwrap_or_else(|e| {
        log::warn!("{what} rejected: {e}");
        false
    })
}

#[cfg(target_arch = "wasm32")]
fn browser_store(key: &str) -> Box<dyn SnapshotStore> {
    Box::new(LocalStorageStore::new(key))
}

#[cfg(not(target_arch = "wasm32"))]
fn browser_store(key: &str) -> Box<dyn SnapshotStore> {
    log::debug!("no localStorage off wasm; {key} kept in memory");
    Box::new(flowdo_editor::MemoryStore::new())
}

/// Set up better panic messages in the browser console.
fn console_error_panic_hook_setup() {
    #[cfg(target_arch = "wasm32")]
    {
        static SET_HOOK: std::sync::Once = std::sync::Once::new();
        SET_HOOK.call_once(|| {
            std::panic::set_hook(Box::new(|info| {
                web_sys::console::error_1(&format!("FlowDo panic: {info}").into());
            }));
        });
    }
}
