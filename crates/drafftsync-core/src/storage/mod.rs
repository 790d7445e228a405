//! Storage abstraction for persistence.
//!
//! Backends store [`SceneDocument`]s, the ordered element list with every
//! versioning field kept verbatim so reconciliation still works after a
//! reload.

mod autosave;
mod file;
mod memory;

pub use autosave::{AutoSaveManager, DEFAULT_AUTOSAVE_INTERVAL_SECS, LAST_DOCUMENT_KEY};
pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::config::SceneConfig;
use crate::element::Element;
use crate::scene::Scene;
use crate::store::StoreError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use uuid::Uuid;

/// Version of the persisted document layout.
pub const SCENE_FORMAT_VERSION: u32 = 1;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// A persisted scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDocument {
    #[serde(default = "format_version")]
    pub format_version: u32,
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Z-order, tombstones included.
    #[serde(default)]
    pub elements: Vec<Element>,
}

fn format_version() -> u32 {
    SCENE_FORMAT_VERSION
}

impl SceneDocument {
    /// An empty document with a fresh id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            format_version: SCENE_FORMAT_VERSION,
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            elements: Vec::new(),
        }
    }

    /// Snapshot a scene's elements into this document.
    pub fn capture(&mut self, scene: &Scene) {
        self.elements = scene.elements().to_vec();
    }

    /// Build a scene from the stored elements.
    pub fn to_scene(&self, config: SceneConfig) -> Result<Scene, StoreError> {
        Scene::from_elements(self.elements.clone(), config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Trait for document storage backends.
pub trait Storage: Send + Sync {
    /// Save a document.
    fn save(&self, id: &str, document: &SceneDocument) -> BoxFuture<'_, StorageResult<()>>;

    /// Load a document.
    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<SceneDocument>>;

    /// Delete a document.
    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// List all document IDs.
    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>>;

    /// Check if a document exists.
    fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>>;
}
