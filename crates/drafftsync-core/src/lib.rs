//! DrafftSync Core Library
//!
//! Local-first scene state for collaborative whiteboards: versioned elements,
//! deterministic reconciliation of remote updates, and undo history that
//! only ever reverts the local user's own edits.

pub mod collaboration;
pub mod config;
pub mod element;
pub mod history;
pub mod order;
pub mod reconcile;
pub mod scene;
pub mod shapes;
pub mod storage;
pub mod store;
pub mod sync;
pub mod version;

pub use collaboration::CollaborationManager;
pub use config::{CollaborationConfig, SceneConfig};
pub use element::{Element, ElementId};
pub use history::{CaptureDirective, ElementPatch, History, HistoryEntry, PatchError};
pub use reconcile::{ReconcileOptions, ReconcileStats, Reconciliation, reconcile, reconcile_with};
pub use scene::{ChangeOrigin, LocalChange, Scene, SceneChange, SubscriptionId};
pub use shapes::{ElementKind, ShapeStyle};
pub use storage::{SceneDocument, Storage, StorageError, StorageResult};
pub use store::{ElementStore, StoreError};
pub use sync::{SyncError, SyncMessage};
pub use version::VersionClock;
