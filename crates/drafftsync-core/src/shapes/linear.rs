//! Point-based payloads: lines, arrows and freehand strokes.

use crate::element::ElementId;
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Path style for lines and arrows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PathStyle {
    /// Straight segments.
    #[default]
    Direct,
    /// Smooth curve through the points.
    Flowing,
    /// Right-angle connectors.
    Elbow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Arrowhead {
    Arrow,
    Triangle,
    Bar,
    Dot,
}

/// Payload for `line` and `arrow` elements.
///
/// Points are relative to the element's `x`/`y`. Bindings reference other
/// elements by id and may dangle while those elements are in flight.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearPayload {
    #[serde(default)]
    pub points: Vec<Point>,
    #[serde(default)]
    pub path_style: PathStyle,
    #[serde(default)]
    pub start_arrowhead: Option<Arrowhead>,
    #[serde(default)]
    pub end_arrowhead: Option<Arrowhead>,
    #[serde(default)]
    pub start_binding: Option<ElementId>,
    #[serde(default)]
    pub end_binding: Option<ElementId>,
}

impl LinearPayload {
    pub fn from_points(points: Vec<Point>) -> Self {
        Self {
            points,
            ..Self::default()
        }
    }

    /// An arrow payload with the default end arrowhead.
    pub fn arrow(points: Vec<Point>) -> Self {
        Self {
            points,
            end_arrowhead: Some(Arrowhead::Arrow),
            ..Self::default()
        }
    }
}

/// Payload for freehand strokes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreedrawPayload {
    #[serde(default)]
    pub points: Vec<Point>,
    /// Per-point pressure, empty when the input device has none.
    #[serde(default)]
    pub pressures: Vec<f32>,
    #[serde(default)]
    pub simulate_pressure: bool,
}

impl FreedrawPayload {
    pub fn from_points(points: Vec<Point>) -> Self {
        Self {
            points,
            pressures: Vec::new(),
            simulate_pressure: true,
        }
    }

    /// Append a point while the stroke is being drawn.
    pub fn push(&mut self, point: Point, pressure: Option<f32>) {
        self.points.push(point);
        if let Some(p) = pressure {
            self.pressures.push(p);
            self.simulate_pressure = false;
        }
    }
}
