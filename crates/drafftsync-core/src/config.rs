//! Scene and collaboration configuration.
//!
//! Both structs deserialize from partial JSON; missing fields take the
//! defaults below.

use crate::history::DEFAULT_MAX_DEPTH;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default interval between full scene broadcasts, in milliseconds.
pub const DEFAULT_FULL_SYNC_INTERVAL_MS: u64 = 20_000;

/// Per-scene settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SceneConfig {
    /// Entries kept on each of the undo and redo stacks.
    pub max_history_depth: usize,
    /// Seed for the version nonce generator. `None` seeds from the OS.
    pub rng_seed: Option<u64>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            max_history_depth: DEFAULT_MAX_DEPTH,
            rng_seed: None,
        }
    }
}

impl SceneConfig {
    /// Deterministic nonces, for tests and replays.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng_seed: Some(seed),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Broadcast settings for [`CollaborationManager`](crate::collaboration::CollaborationManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CollaborationConfig {
    /// How often the whole scene is re-sent so late joiners and lossy peers
    /// converge.
    pub full_sync_interval_ms: u64,
}

impl Default for CollaborationConfig {
    fn default() -> Self {
        Self {
            full_sync_interval_ms: DEFAULT_FULL_SYNC_INTERVAL_MS,
        }
    }
}

impl CollaborationConfig {
    pub fn full_sync_interval(&self) -> Duration {
        Duration::from_millis(self.full_sync_interval_ms)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
