//! Auto-save for scene persistence.
//!
//! A scene is dirty when its scene version differs from the one last saved;
//! remote updates count the same as local edits.

use crate::scene::Scene;
use crate::storage::{SceneDocument, Storage, StorageResult};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default auto-save interval in seconds.
pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: u64 = 30;

/// Key for the "last opened" document.
pub const LAST_DOCUMENT_KEY: &str = "__last_document__";

pub struct AutoSaveManager<S: Storage> {
    storage: Arc<S>,
    interval: Duration,
    last_save: Option<Instant>,
    /// Scene version at the last save or load.
    saved_version: Option<u64>,
    document: SceneDocument,
}

impl<S: Storage> AutoSaveManager<S> {
    /// Create a manager for a new, unsaved document.
    pub fn new(storage: Arc<S>, document: SceneDocument) -> Self {
        Self {
            storage,
            interval: Duration::from_secs(DEFAULT_AUTOSAVE_INTERVAL_SECS),
            last_save: None,
            saved_version: None,
            document,
        }
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The document being saved to.
    pub fn document(&self) -> &SceneDocument {
        &self.document
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.document.name = name.into();
        self.saved_version = None;
    }

    pub fn is_dirty(&self, scene: &Scene) -> bool {
        self.saved_version != Some(scene.scene_version())
    }

    /// Whether the scene changed and the interval has elapsed.
    pub fn should_save(&self, scene: &Scene) -> bool {
        self.should_save_at(scene, Instant::now())
    }

    pub fn should_save_at(&self, scene: &Scene, now: Instant) -> bool {
        if !self.is_dirty(scene) {
            return false;
        }
        match self.last_save {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        }
    }

    /// Save if needed. Returns true if a save was performed.
    pub async fn maybe_save(&mut self, scene: &Scene) -> StorageResult<bool> {
        if !self.should_save(scene) {
            return Ok(false);
        }
        self.save(scene).await?;
        Ok(true)
    }

    /// Save now, also under [`LAST_DOCUMENT_KEY`] for restore on startup.
    pub async fn save(&mut self, scene: &Scene) -> StorageResult<()> {
        self.document.capture(scene);
        self.storage.save(&self.document.id, &self.document).await?;
        self.storage.save(LAST_DOCUMENT_KEY, &self.document).await?;

        self.last_save = Some(Instant::now());
        self.saved_version = Some(scene.scene_version());
        log::info!("saved scene {} ({} elements)", self.document.id, self.document.elements.len());
        Ok(())
    }

    /// Load a document by id and make it the current one.
    pub async fn load(&mut self, id: &str) -> StorageResult<SceneDocument> {
        let doc = self.storage.load(id).await?;
        self.adopt(doc.clone());
        Ok(doc)
    }

    /// Try to load the last saved document.
    pub async fn load_last(&mut self) -> Option<SceneDocument> {
        match self.storage.load(LAST_DOCUMENT_KEY).await {
            Ok(doc) => {
                self.adopt(doc.clone());
                Some(doc)
            }
            Err(err) => {
                log::debug!("no last document to restore: {err}");
                None
            }
        }
    }

    fn adopt(&mut self, doc: SceneDocument) {
        self.saved_version = Some(crate::version::scene_version(&doc.elements));
        self.last_save = Some(Instant::now());
        self.document = doc;
    }

    pub async fn delete(&self, id: &str) -> StorageResult<()> {
        self.storage.delete(id).await
    }

    /// List saved document ids, without the last-document key.
    pub async fn list_documents(&self) -> StorageResult<Vec<String>> {
        let mut docs = self.storage.list().await?;
        docs.retain(|id| id != LAST_DOCUMENT_KEY);
        Ok(docs)
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }
}
