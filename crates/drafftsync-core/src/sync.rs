//! Wire envelope for element broadcasts.
//!
//! Messages are JSON objects tagged by `type`:
//!
//! ```json
//! { "type": "scene_init", "elements": [ ... ] }
//! { "type": "scene_update", "elements": [ ... ] }
//! ```
//!
//! Decoding is lenient per element: an element that cannot be decoded is
//! logged and dropped, the rest of the message is still applied.

use crate::element::Element;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid sync message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown sync message type: {0:?}")]
    UnknownMessage(String),

    #[error("{0} message has no elements array")]
    MissingElements(String),
}

/// A scene broadcast between peers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncMessage {
    /// The sender's whole scene, tombstones included.
    SceneInit { elements: Vec<Element> },
    /// Only elements whose version advanced since the last broadcast.
    SceneUpdate { elements: Vec<Element> },
}

impl SyncMessage {
    pub fn elements(&self) -> &[Element] {
        match self {
            SyncMessage::SceneInit { elements } | SyncMessage::SceneUpdate { elements } => elements,
        }
    }

    pub fn into_elements(self) -> Vec<Element> {
        match self {
            SyncMessage::SceneInit { elements } | SyncMessage::SceneUpdate { elements } => elements,
        }
    }

    pub fn encode(&self) -> Result<String, SyncError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(json: &str) -> Result<Self, SyncError> {
        let mut value: Value = serde_json::from_str(json)?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if kind != "scene_init" && kind != "scene_update" {
            return Err(SyncError::UnknownMessage(kind));
        }
        let elements = match value.get_mut("elements").map(Value::take) {
            Some(Value::Array(items)) => decode_elements(items),
            _ => return Err(SyncError::MissingElements(kind)),
        };
        if kind == "scene_init" {
            Ok(SyncMessage::SceneInit { elements })
        } else {
            Ok(SyncMessage::SceneUpdate { elements })
        }
    }
}

fn decode_elements(items: Vec<Value>) -> Vec<Element> {
    let total = items.len();
    let elements: Vec<Element> = items
        .into_iter()
        .filter_map(|item| {
            if item.get("type").is_none() {
                log::warn!("dropping remote element without type: {}", item.get("id").unwrap_or(&Value::Null));
                return None;
            }
            match serde_json::from_value(item) {
                Ok(element) => Some(element),
                Err(err) => {
                    log::warn!("dropping undecodable remote element: {err}");
                    None
                }
            }
        })
        .collect();
    if elements.len() != total {
        log::debug!("decoded {} of {} remote elements", elements.len(), total);
    }
    elements
}
