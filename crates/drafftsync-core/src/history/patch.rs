//! Field-level element patches.
//!
//! A patch maps serialized (camelCase) field names to JSON values. Working on
//! the serialized form keeps patches independent of the element kind: the
//! same code diffs a rectangle's `roundness` and an arrow's `points`.
//!
//! A `null` value unsets the field, which then decodes to its default. This
//! is how a patch that switches `type` drops the fields of the old kind.

use crate::element::{Element, ElementId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Envelope keys owned by the version clock and the store.
const UNPATCHED_KEYS: [&str; 4] = ["id", "version", "versionNonce", "updated"];

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("failed to serialize element {id}: {source}")]
    Serialize { id: ElementId, source: serde_json::Error },

    #[error("patch does not produce a valid element {id}: {source}")]
    Deserialize { id: ElementId, source: serde_json::Error },

    #[error("patch cannot create element {0}: no type")]
    Incomplete(ElementId),
}

/// Changed fields of one element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementPatch(Map<String, Value>);

fn fields(element: &Element) -> Result<Map<String, Value>, PatchError> {
    match serde_json::to_value(element) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Ok(Map::new()),
        Err(source) => Err(PatchError::Serialize {
            id: element.id.clone(),
            source,
        }),
    }
}

impl ElementPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// `{ "isDeleted": true }`
    pub fn tombstone() -> Self {
        let mut patch = Self::new();
        patch.insert("isDeleted", Value::Bool(true));
        patch
    }

    /// Every patchable field of `element`.
    pub fn full(element: &Element) -> Result<Self, PatchError> {
        let mut map = fields(element)?;
        for key in UNPATCHED_KEYS {
            map.remove(key);
        }
        Ok(Self(map))
    }

    /// Minimal forward and inverse patches taking `prev` to `next`.
    ///
    /// Returns `None` when the two differ only in versioning fields.
    pub fn diff(prev: &Element, next: &Element) -> Result<Option<(Self, Self)>, PatchError> {
        let before = fields(prev)?;
        let after = fields(next)?;
        let mut forward = Map::new();
        let mut inverse = Map::new();

        for key in before.keys().chain(after.keys()) {
            if UNPATCHED_KEYS.contains(&key.as_str()) || forward.contains_key(key) {
                continue;
            }
            let old = before.get(key).unwrap_or(&Value::Null);
            let new = after.get(key).unwrap_or(&Value::Null);
            if old != new {
                forward.insert(key.clone(), new.clone());
                inverse.insert(key.clone(), old.clone());
            }
        }

        if forward.is_empty() {
            Ok(None)
        } else {
            Ok(Some((Self(forward), Self(inverse))))
        }
    }

    /// Current values of `keys` on `element`; absent fields capture as `null`.
    pub fn capture<'a>(element: &Element, keys: impl IntoIterator<Item = &'a String>) -> Result<Self, PatchError> {
        let map = fields(element)?;
        Ok(Self(
            keys.into_iter()
                .map(|key| (key.clone(), map.get(key).cloned().unwrap_or(Value::Null)))
                .collect(),
        ))
    }

    /// `element` with this patch applied. Versioning fields are untouched.
    pub fn apply(&self, element: &Element) -> Result<Element, PatchError> {
        let mut map = fields(element)?;
        for (key, value) in &self.0 {
            if value.is_null() {
                map.remove(key);
            } else {
                map.insert(key.clone(), value.clone());
            }
        }
        serde_json::from_value(Value::Object(map)).map_err(|source| PatchError::Deserialize {
            id: element.id.clone(),
            source,
        })
    }

    /// Create an element from a full patch, for targets missing from the store.
    ///
    /// The result has version 0; the caller stamps it.
    pub fn build(&self, id: &ElementId) -> Result<Element, PatchError> {
        if !self.is_full() {
            return Err(PatchError::Incomplete(id.clone()));
        }
        let mut map: Map<String, Value> = self
            .0
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        map.insert("id".to_string(), Value::String(id.as_str().to_string()));
        serde_json::from_value(Value::Object(map)).map_err(|source| PatchError::Deserialize {
            id: id.clone(),
            source,
        })
    }

    /// Copy every field of `other` over this patch.
    pub fn overlay(&mut self, other: &ElementPatch) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Whether the patch carries a kind tag and can therefore build an element.
    pub fn is_full(&self) -> bool {
        self.0.contains_key("type")
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
