//! Kind-specific element payloads and shared style.
//!
//! The reconciler never looks inside these types. They exist so that each
//! drawable kind has a closed, typed set of fields while still serializing
//! flat next to the element envelope (tagged by `"type"`).

mod frame;
mod image;
mod linear;
mod text;

pub use frame::FramePayload;
pub use image::{ImagePayload, ImageStatus};
pub use linear::{Arrowhead, FreedrawPayload, LinearPayload, PathStyle};
pub use text::{FontFamily, TextAlign, TextPayload};

use kurbo::Point;
use peniko::Color;
use serde::{Deserialize, Serialize};

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`. Anything else is `None`.
    pub fn from_hex(color: &str) -> Option<Self> {
        let hex = color.strip_prefix('#')?.trim();
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(hex.get(range)?, 16).ok();
        match hex.len() {
            3 => Some(Self::new(
                channel(0..1)? * 17,
                channel(1..2)? * 17,
                channel(2..3)? * 17,
                255,
            )),
            6 => Some(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?, 255)),
            8 => Some(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?, channel(6..8)?)),
            _ => None,
        }
    }
}

impl Default for SerializableColor {
    fn default() -> Self {
        Self::black()
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Sloppiness level for the hand-drawn effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Sloppiness {
    /// Clean, precise lines.
    Architect,
    #[default]
    Artist,
    Cartoonist,
}

impl Sloppiness {
    pub fn roughness(&self) -> f64 {
        match self {
            Sloppiness::Architect => 0.0,
            Sloppiness::Artist => 1.0,
            Sloppiness::Cartoonist => 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FillStyle {
    #[default]
    Hachure,
    CrossHatch,
    Solid,
    Zigzag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StrokeStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

/// Style shared by every element kind.
///
/// Every field defaults individually so partially specified remote elements
/// decode the same way on every peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeStyle {
    #[serde(default)]
    pub stroke_color: SerializableColor,
    /// `None` means no fill.
    #[serde(default)]
    pub background_color: Option<SerializableColor>,
    #[serde(default)]
    pub fill_style: FillStyle,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,
    #[serde(default)]
    pub stroke_style: StrokeStyle,
    #[serde(default)]
    pub roughness: Sloppiness,
    /// 0.0 (transparent) to 1.0 (opaque).
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    /// Seed for the hand-drawn effect, stable across edits.
    #[serde(default)]
    pub seed: u32,
}

fn default_stroke_width() -> f64 {
    2.0
}

fn default_opacity() -> f64 {
    1.0
}

impl ShapeStyle {
    pub fn stroke(&self) -> Color {
        self.stroke_color.into()
    }

    pub fn fill(&self) -> Option<Color> {
        self.background_color.map(Into::into)
    }

    pub fn set_stroke(&mut self, color: Color) {
        self.stroke_color = color.into();
    }

    pub fn set_fill(&mut self, color: Option<Color>) {
        self.background_color = color.map(Into::into);
    }
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            stroke_color: SerializableColor::black(),
            background_color: None,
            fill_style: FillStyle::default(),
            stroke_width: default_stroke_width(),
            stroke_style: StrokeStyle::default(),
            roughness: Sloppiness::default(),
            opacity: default_opacity(),
            seed: 0,
        }
    }
}

/// Corner rounding for box-like kinds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Corners {
    /// Corner radius, `None` for sharp corners.
    #[serde(default)]
    pub roundness: Option<f64>,
}

/// The closed set of drawable kinds, tagged by `"type"`.
///
/// Unrecognised tags decode to [`ElementKind::Unknown`] so that an element
/// created by a newer peer still reconciles by its envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ElementKind {
    Rectangle(Corners),
    Diamond(Corners),
    Ellipse,
    Line(LinearPayload),
    Arrow(LinearPayload),
    Freedraw(FreedrawPayload),
    Text(TextPayload),
    Image(ImagePayload),
    Frame(FramePayload),
    #[serde(other)]
    Unknown,
}

impl ElementKind {
    /// The serialized tag of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::Rectangle(_) => "rectangle",
            ElementKind::Diamond(_) => "diamond",
            ElementKind::Ellipse => "ellipse",
            ElementKind::Line(_) => "line",
            ElementKind::Arrow(_) => "arrow",
            ElementKind::Freedraw(_) => "freedraw",
            ElementKind::Text(_) => "text",
            ElementKind::Image(_) => "image",
            ElementKind::Frame(_) => "frame",
            ElementKind::Unknown => "unknown",
        }
    }

    /// Points relative to the element origin, for point-based kinds.
    pub fn points(&self) -> Option<&[Point]> {
        match self {
            ElementKind::Line(p) | ElementKind::Arrow(p) => Some(&p.points),
            ElementKind::Freedraw(p) => Some(&p.points),
            _ => None,
        }
    }

    pub fn is_linear(&self) -> bool {
        matches!(self, ElementKind::Line(_) | ElementKind::Arrow(_))
    }
}
