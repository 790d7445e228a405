//! Text payload.

use crate::element::ElementId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FontFamily {
    /// Hand-drawn style font.
    #[default]
    GelPen,
    NotoSans,
    Monospace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Payload for `text` elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextPayload {
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default)]
    pub font_family: FontFamily,
    #[serde(default)]
    pub text_align: TextAlign,
    /// Shape this text is bound inside, if any.
    #[serde(default)]
    pub container_id: Option<ElementId>,
}

fn default_font_size() -> f64 {
    20.0
}

impl TextPayload {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_size: default_font_size(),
            font_family: FontFamily::default(),
            text_align: TextAlign::default(),
            container_id: None,
        }
    }

    pub fn line_count(&self) -> usize {
        self.text.lines().count().max(1)
    }
}
