//! Image payload. Pixel data lives outside the scene, keyed by `fileId`.

use serde::{Deserialize, Serialize};

/// Upload state of the referenced file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImageStatus {
    #[default]
    Pending,
    Saved,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    /// Reference into the external file store. May not be loaded yet.
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub status: ImageStatus,
    /// Uniform scale applied to the decoded image, `[sx, sy]`.
    #[serde(default = "default_scale")]
    pub scale: [f64; 2],
}

fn default_scale() -> [f64; 2] {
    [1.0, 1.0]
}

impl ImagePayload {
    pub fn new(file_id: impl Into<String>) -> Self {
        Self {
            file_id: Some(file_id.into()),
            status: ImageStatus::Pending,
            scale: default_scale(),
        }
    }
}
