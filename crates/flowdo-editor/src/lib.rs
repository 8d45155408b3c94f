pub mod ai;
pub mod commands;
pub mod editor;
pub mod engine;
pub mod flows;
pub mod input;
pub mod interaction;
pub mod persist;
pub mod shortcuts;

pub use ai::{AiAction, AiClient, AiError, AiOutcome, AiRequest, AiResponse, PendingAiAction, run_ai_action};
pub use commands::CommandStack;
pub use editor::CanvasEditor;
pub use engine::{FlowEngine, GraphMutation, Notice, NoticeLevel};
pub use flows::{FlowRepository, FlowStoreError, MemoryFlowRepository, SavedFlow};
pub use input::{InputEvent, Modifiers, PointerButton};
pub use interaction::{CreationMenu, Gesture, InteractionController};
pub use persist::{Autosave, MemoryStore, SnapshotStore, StoreError};
pub use shortcuts::{ShortcutAction, ShortcutMap};
