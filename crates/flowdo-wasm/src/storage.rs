//! Browser-side persistence and logging.

use flowdo_editor::persist::{SnapshotStore, StoreError};
use wasm_bindgen::JsValue;
use web_sys::Storage;

/// A snapshot kept under one `localStorage` key.
pub struct LocalStorageStore {
    key: String,
}

impl LocalStorageStore {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    fn storage(&self) -> Result<Storage, StoreError> {
        let window =
            web_sys::window().ok_or_else(|| StoreError::Unavailable("no window".to_string()))?;
        window
            .local_storage()
            .map_err(js_error)?
            .ok_or_else(|| StoreError::Unavailable("localStorage disabled".to_string()))
    }
}

fn js_error(e: JsValue) -> StoreError {
    StoreError::Unavailable(
        e.as_string()
            .or_else(|| js_sys::JSON::stringify(&e).ok().and_then(|s| s.as_string()))
            .unwrap_or_else(|| "unknown JS error".to_string()),
    )
}

impl SnapshotStore for LocalStorageStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        self.storage()?.get_item(&self.key).map_err(js_error)
    }

    fn save(&mut self, json: &str) -> Result<(), StoreError> {
        // Quota errors surface here.
        self.storage()?.set_item(&self.key, json).map_err(js_error)
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.storage()?.remove_item(&self.key).map_err(js_error)
    }
}

/// Routes the `log` facade to the browser console.
pub struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let msg = JsValue::from(format!("[{}] {}", record.target(), record.args()));
        match record.level() {
            log::Level::Error => web_sys::console::error_1(&msg),
            log::Level::Warn => web_sys::console::warn_1(&msg),
            log::Level::Info => web_sys::console::info_1(&msg),
            log::Level::Debug | log::Level::Trace => web_sys::console::debug_1(&msg),
        }
    }

    fn flush(&self) {}
}

/// Install the console logger once. Later calls are no-ops.
pub fn init_console_logger(level: log::LevelFilter) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}
