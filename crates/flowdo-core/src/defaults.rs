//! Canvas-wide constants: sizes, spacing, zoom range, storage keys.

/// Smallest width a node (or group) may be resized to.
pub const MIN_NODE_WIDTH: f32 = 200.0;
/// Smallest height a node (or group) may be resized to.
pub const MIN_NODE_HEIGHT: f32 = 100.0;

pub const DEFAULT_NODE_WIDTH: f32 = 300.0;
pub const DEFAULT_NODE_HEIGHT: f32 = 200.0;
pub const FLASHCARD_HEIGHT: f32 = 220.0;
pub const QUIZ_WIDTH: f32 = 300.0;
pub const QUIZ_HEIGHT: f32 = 250.0;

/// Horizontal gap between a source node and the cards generated from it.
pub const GENERATED_GAP: f32 = 50.0;
/// Vertical pitch between stacked generated flashcards.
pub const FLASHCARD_STACK_SPACING: f32 = 240.0;

/// Vertical offset of both connection ports from the node's top edge.
pub const PORT_OFFSET_Y: f32 = 40.0;
/// Radius of the clickable area around a port.
pub const PORT_RADIUS: f32 = 12.0;
/// Height of the draggable header band.
pub const HEADER_HEIGHT: f32 = 36.0;
/// Side of the square resize grip in the bottom-right corner.
pub const RESIZE_HANDLE_SIZE: f32 = 24.0;

pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 3.0;
/// Zoom change per wheel delta unit.
pub const ZOOM_SENSITIVITY: f32 = 0.001;
/// Multiplicative step used by keyboard zoom.
pub const ZOOM_STEP: f32 = 1.2;

pub const GRID_SIZE: f32 = 24.0;

/// Local storage key of the `{nodes, edges, groups}` snapshot.
pub const SNAPSHOT_KEY: &str = "FlowDoDB_V2";
/// Record key used by the keyed object-store variant.
pub const STATE_RECORD_KEY: &str = "current_flow";
/// File name offered when exporting.
pub const EXPORT_FILE_NAME: &str = "flowdo-data.json";

/// Title shown on a node while an AI call is in flight.
pub const WORKING_TITLE: &str = "Thinking...";

/// Distance from the central topic to each sub-concept of a generated
/// study plan.
pub const MIND_MAP_RADIUS: f32 = 450.0;

/// Local storage key of the settings panel (saved API key).
pub const SETTINGS_KEY: &str = "flowdo_settings";
