//! Local persistence: snapshot stores and the debounced autosave loop.
//!
//! Timing is driven by caller-supplied millisecond timestamps so the same
//! code runs under a browser animation loop and in native tests.

use crate::engine::FlowEngine;
use flowdo_core::{FlowGraph, SnapshotError, Viewport, load_or_default};
use thiserror::Error;

/// Quiet period before a burst of edits is written out.
pub const AUTOSAVE_QUIET_MS: f64 = 1000.0;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Encode(#[from] SnapshotError),
}

/// Somewhere a single serialized snapshot can live.
pub trait SnapshotStore {
    /// The stored snapshot, or `None` if nothing was saved yet.
    fn load(&self) -> Result<Option<String>, StoreError>;

    fn save(&mut self, json: &str) -> Result<(), StoreError>;

    fn clear(&mut self) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    data: Option<String>,
    /// Number of successful saves.
    pub saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(json: impl Into<String>) -> Self {
        Self {
            data: Some(json.into()),
            saves: 0,
        }
    }

    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(self.data.clone())
    }

    fn save(&mut self, json: &str) -> Result<(), StoreError> {
        self.data = Some(json.to_string());
        self.saves += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.data = None;
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStore;

#[cfg(not(target_arch = "wasm32"))]
mod file {
    use super::{SnapshotStore, StoreError};
    use std::io::ErrorKind;
    use std::path::PathBuf;

    /// A snapshot kept in a single JSON file.
    #[derive(Debug, Clone)]
    pub struct FileStore {
        path: PathBuf,
    }

    impl FileStore {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self { path: path.into() }
        }

        pub fn path(&self) -> &std::path::Path {
            &self.path
        }
    }

    impl SnapshotStore for FileStore {
        fn load(&self) -> Result<Option<String>, StoreError> {
            match std::fs::read_to_string(&self.path) {
                Ok(s) => Ok(Some(s)),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            }
        }

        fn save(&mut self, json: &str) -> Result<(), StoreError> {
            if let Some(dir) = self.path.parent()
                && !dir.as_os_str().is_empty()
            {
                std::fs::create_dir_all(dir)?;
            }
            let tmp = self.path.with_extension("json.tmp");
            std::fs::write(&tmp, json)?;
            std::fs::rename(&tmp, &self.path)?;
            Ok(())
        }

        fn clear(&mut self) -> Result<(), StoreError> {
            match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        }
    }
}

/// Load the saved canvas, falling back to the default graph when nothing
/// is stored or the stored data cannot be read.
pub fn restore(store: &dyn SnapshotStore) -> (FlowGraph, Viewport) {
    let raw = match store.load() {
        Ok(raw) => raw,
        Err(e) => {
            log::error!("snapshot load failed: {e}");
            None
        }
    };
    if raw.is_some() {
        log::info!("restoring saved canvas");
    }
    load_or_default(raw.as_deref())
}

/// Trailing-edge debouncer: fires once `quiet_ms` has passed since the last
/// `touch`.
#[derive(Debug, Clone)]
pub struct Debouncer {
    quiet_ms: f64,
    deadline: Option<f64>,
}

impl Debouncer {
    pub fn new(quiet_ms: f64) -> Self {
        Self {
            quiet_ms,
            deadline: None,
        }
    }

    pub fn touch(&mut self, now_ms: f64) {
        self.deadline = Some(now_ms + self.quiet_ms);
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// True exactly once per quiet period that has elapsed.
    pub fn poll(&mut self, now_ms: f64) -> bool {
        match self.deadline {
            Some(deadline) if now_ms >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

/// Saves the graph a quiet period after it stops changing.
///
/// Watches the engine's revision counter, so viewport-only changes never
/// trigger a save.
#[derive(Debug, Clone)]
pub struct Autosave {
    debounce: Debouncer,
    seen_revision: u64,
    with_viewport: bool,
}

impl Default for Autosave {
    fn default() -> Self {
        Self::new(AUTOSAVE_QUIET_MS)
    }
}

impl Autosave {
    pub fn new(quiet_ms: f64) -> Self {
        Self {
            debounce: Debouncer::new(quiet_ms),
            seen_revision: 0,
            with_viewport: false,
        }
    }

    /// Include the viewport in saved snapshots (keyed-record layout).
    pub fn with_viewport(mut self, yes: bool) -> Self {
        self.with_viewport = yes;
        self
    }

    /// Start from the engine's current revision without scheduling a save.
    pub fn sync_to(&mut self, engine: &FlowEngine) {
        self.seen_revision = engine.revision();
        self.debounce.cancel();
    }

    pub fn is_pending(&self) -> bool {
        self.debounce.is_pending()
    }

    /// Note a graph change, restarting the quiet period.
    pub fn observe(&mut self, engine: &FlowEngine, now_ms: f64) {
        if engine.revision() != self.seen_revision {
            self.seen_revision = engine.revision();
            self.debounce.touch(now_ms);
        }
    }

    /// Call on every frame or timer tick. Returns `Ok(true)` when a save
    /// happened. A failed save is retried after another quiet period.
    pub fn tick(
        &mut self,
        engine: &FlowEngine,
        store: &mut dyn SnapshotStore,
        now_ms: f64,
    ) -> Result<bool, StoreError> {
        self.observe(engine, now_ms);
        if !self.debounce.poll(now_ms) {
            return Ok(false);
        }
        match self.write(engine, store) {
            Ok(()) => Ok(true),
            Err(e) => {
                log::error!("autosave failed: {e}");
                self.debounce.touch(now_ms);
                Err(e)
            }
        }
    }

    /// Save immediately, cancelling any pending save.
    pub fn flush(&mut self, engine: &FlowEngine, store: &mut dyn SnapshotStore) -> Result<(), StoreError> {
        self.seen_revision = engine.revision();
        self.debounce.cancel();
        self.write(engine, store)
    }

    fn write(&self, engine: &FlowEngine, store: &mut dyn SnapshotStore) -> Result<(), StoreError> {
        let json = engine.snapshot(self.with_viewport).to_json()?;
        store.save(&json)?;
        log::info!(
            "canvas saved ({} nodes, {} edges)",
            engine.graph.node_count(),
            engine.graph.edge_count()
        );
        Ok(())
    }
}

/// The API key kept by the settings screen. The stored value is either the
/// bare key or a JSON object carrying `apiKey`.
pub fn saved_api_key(store: &dyn SnapshotStore) -> Option<String> {
    let raw = match store.load() {
        Ok(raw) => raw?,
        Err(e) => {
            log::warn!("settings load failed: {e}");
            return None;
        }
    };
    let raw = raw.trim();
    let key = match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(settings)) => settings
            .get("apiKey")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .unwrap_or_default()
            .to_string(),
        Ok(serde_json::Value::String(key)) => key.trim().to_string(),
        _ => raw.to_string(),
    };
    (!key.is_empty()).then_some(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::GraphMutation;
    use flowdo_core::{NodeId, Point};

    #[test]
    fn debouncer_fires_after_quiet_period() {
        let mut d = Debouncer::new(1000.0);
        d.touch(0.0);
        assert!(!d.poll(999.0));
        d.touch(500.0);
        assert!(!d.poll(1200.0));
        assert!(d.poll(1500.0));
        assert!(!d.poll(3000.0));
    }

    #[test]
    fn viewport_changes_do_not_save() {
        let mut engine = FlowEngine::default();
        let mut store = MemoryStore::new();
        let mut autosave = Autosave::default();
        autosave.sync_to(&engine);
        engine.viewport.pan_by(100.0, 0.0);
        assert!(!autosave.tick(&engine, &mut store, 0.0).unwrap());
        assert!(!autosave.tick(&engine, &mut store, 5000.0).unwrap());
        assert_eq!(store.saves, 0);
    }

    #[test]
    fn saved_layout_omits_viewport_by_default() {
        let mut engine = FlowEngine::default();
        let mut store = MemoryStore::new();
        let mut autosave = Autosave::default();
        engine
            .apply(GraphMutation::MoveNode { id: NodeId::intern("1"), dx: 1.0, dy: 0.0 })
            .unwrap();
        autosave.tick(&engine, &mut store, 0.0).unwrap();
        assert!(autosave.tick(&engine, &mut store, 1000.0).unwrap());
        let value: serde_json::Value = serde_json::from_str(store.data().unwrap()).unwrap();
        assert!(value.get("viewport").is_none());
        assert_eq!(value["nodes"][0]["x"], 101.0);
    }

    #[test]
    fn keyed_layout_carries_viewport() {
        let mut engine = FlowEngine::default();
        let mut store = MemoryStore::new();
        let mut autosave = Autosave::default().with_viewport(true);
        engine.viewport.set_zoom(2.0);
        engine.add_node_at(flowdo_core::NodeKind::Idea, Point::new(0.0, 0.0)).unwrap();
        autosave.flush(&engine, &mut store).unwrap();
        let value: serde_json::Value = serde_json::from_str(store.data().unwrap()).unwrap();
        assert_eq!(value["viewport"]["zoom"], 2.0);
        assert!(!autosave.is_pending());
    }

    #[test]
    fn restore_from_empty_store_gives_welcome_node() {
        let (graph, viewport) = restore(&MemoryStore::new());
        assert_eq!(graph.node_count(), 1);
        assert_eq!(viewport, Viewport::default());
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = std::env::temp_dir().join(format!("flowdo-store-{}", NodeId::fresh()));
        let mut store = FileStore::new(dir.join("canvas.json"));
        assert_eq!(store.load().unwrap(), None);
        store.save("{\"nodes\":[]}").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("{\"nodes\":[]}"));
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn saved_api_key_accepts_bare_or_json() {
        assert_eq!(saved_api_key(&MemoryStore::new()), None);
        assert_eq!(
            saved_api_key(&MemoryStore::with_data("  AIzaBare ".to_string())).as_deref(),
            Some("AIzaBare")
        );
        assert_eq!(
            saved_api_key(&MemoryStore::with_data(r#"{"apiKey":"AIzaJson","theme":"dark"}"#.to_string()))
                .as_deref(),
            Some("AIzaJson")
        );
        assert_eq!(saved_api_key(&MemoryStore::with_data(r#"{"apiKey":""}"#.to_string())), None);
        assert_eq!(saved_api_key(&MemoryStore::with_data("   ".to_string())), None);
    }
}
