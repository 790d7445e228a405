//! The versioned element envelope shared by every drawable kind.
//!
//! An [`Element`] is the unit of reconciliation. The envelope fields
//! (`id`, `version`, `versionNonce`, `updated`, `isDeleted`) and the z-order
//! `index` are the only ones the reconciler reads; geometry, style and the kind-specific payload
//! are copied around without being inspected.
//!
//! The serialized layout uses camelCase keys and is shared by persistence,
//! the sync envelope and history patches:
//!
//! ```text
//! { "id": "…", "version": 3, "versionNonce": 181297, "updated": 1700000000000,
//!   "isDeleted": false, "index": "V", "groupIds": [], "frameId": null, "boundElements": [],
//!   "locked": false, "link": null, "x": 0.0, "y": 0.0, "width": 10.0,
//!   "height": 10.0, "angle": 0.0, "strokeColor": {…}, …, "type": "rectangle",
//!   "roundness": null }
//! ```

use crate::shapes::{ElementKind, ShapeStyle};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque, stable element identifier. Never reused, even after deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ElementId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A drawable element: versioned envelope plus opaque payload.
///
/// Missing envelope fields decode to defaults so that malformed remote data
/// can still take part in reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    #[serde(default)]
    pub id: ElementId,
    /// Incremented on every mutation by any peer.
    #[serde(default)]
    pub version: u32,
    /// Random tie-breaker regenerated on every mutation.
    #[serde(default)]
    pub version_nonce: u32,
    /// Local millisecond timestamp of the last mutation. Advisory only.
    #[serde(default)]
    pub updated: u64,
    /// Tombstone flag. Deleted elements stay in the store.
    #[serde(default)]
    pub is_deleted: bool,
    /// Z-order key, see [`crate::order`]. Assigned when the element enters a
    /// scene and changed by every reorder.
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default)]
    pub group_ids: Vec<String>,
    #[serde(default)]
    pub frame_id: Option<ElementId>,
    #[serde(default)]
    pub bound_elements: Vec<ElementId>,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    /// Rotation in radians around the element center.
    #[serde(default)]
    pub angle: f64,
    #[serde(flatten)]
    pub style: ShapeStyle,
    #[serde(flatten)]
    pub kind: ElementKind,
}

impl Element {
    /// Create a new live element at version 1.
    ///
    /// The nonce and timestamp are filled in when the element enters a scene
    /// through a local change.
    pub fn new(kind: ElementKind, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            id: ElementId::new(),
            version: 1,
            version_nonce: 0,
            updated: 0,
            is_deleted: false,
            index: None,
            group_ids: Vec::new(),
            frame_id: None,
            bound_elements: Vec::new(),
            locked: false,
            link: None,
            x,
            y,
            width,
            height,
            angle: 0.0,
            style: ShapeStyle::default(),
            kind,
        }
    }

    /// Same as [`Element::new`] with a caller-chosen id.
    pub fn with_id(id: impl Into<ElementId>, kind: ElementKind, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            ..Self::new(kind, x, y, width, height)
        }
    }

    /// Whether the element should be rendered.
    pub fn is_visible(&self) -> bool {
        !self.is_deleted
    }

    /// The `(version, versionNonce)` pair used for conflict resolution.
    pub fn stamp(&self) -> (u32, u32) {
        (self.version, self.version_nonce)
    }

    /// Compare everything except the versioning fields.
    pub fn content_eq(&self, other: &Element) -> bool {
        self.id == other.id
            && self.is_deleted == other.is_deleted
            && self.index == other.index
            && self.group_ids == other.group_ids
            && self.frame_id == other.frame_id
            && self.bound_elements == other.bound_elements
            && self.locked == other.locked
            && self.link == other.link
            && self.x == other.x
            && self.y == other.y
            && self.width == other.width
            && self.height == other.height
            && self.angle == other.angle
            && self.style == other.style
            && self.kind == other.kind
    }

    /// Axis-aligned bounds in scene coordinates, ignoring rotation.
    pub fn bounds(&self) -> Rect {
        let origin = Point::new(self.x, self.y);
        match self.kind.points() {
            Some(points) if !points.is_empty() => {
                let first = origin + points[0].to_vec2();
                points.iter().skip(1).fold(Rect::from_points(first, first), |rect, p| {
                    rect.union_pt(origin + p.to_vec2())
                })
            }
            _ => Rect::from_points(origin, Point::new(self.x + self.width, self.y + self.height)),
        }
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }
}
