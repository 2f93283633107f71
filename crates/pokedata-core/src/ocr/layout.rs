//! Card region layouts in normalized coordinates.
//!
//! Layouts describe where fields sit on a standard card face. Coordinates are
//! fractions of the image size, so one layout fits any scan resolution.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PokedataError, Result};

/// A box in normalized coordinates (0.0 - 1.0 on both axes).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl NormBox {
    /// Top band used for the remote header crop.
    pub const HEADER_BAND: NormBox = NormBox::new_const(0.0, 0.0, 1.0, 0.25);
    /// Bottom band used for the remote footer crop.
    pub const FOOTER_BAND: NormBox = NormBox::new_const(0.0, 0.75, 1.0, 1.0);
    /// Header strip read to tell trainer cards from creature cards.
    pub const HEADER_STRIP: NormBox = NormBox::new_const(0.05, 0.02, 0.95, 0.14);

    const fn new_const(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Create a box from corners, clamped into the unit square.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        let clamp = |v: f32| v.clamp(0.0, 1.0);
        Self {
            x0: clamp(x0.min(x1)),
            y0: clamp(y0.min(y1)),
            x1: clamp(x0.max(x1)),
            y1: clamp(y0.max(y1)),
        }
    }

    /// Create a box from origin and size.
    pub fn from_xywh(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self::new(x, y, x + w, y + h)
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Check if a normalized point lies inside the box.
    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }

    /// Convert to a pixel rectangle `(x, y, width, height)`.
    ///
    /// Returns `None` if the box covers no whole pixel.
    pub fn to_pixels(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let px = |v: f32, size: u32| ((v * size as f32).round() as u32).min(size);
        let (x0, x1) = (px(self.x0, width), px(self.x1, width));
        let (y0, y1) = (px(self.y0, height), px(self.y1, height));
        let (w, h) = (x1.saturating_sub(x0), y1.saturating_sub(y0));
        if w == 0 || h == 0 {
            return None;
        }
        Some((x0, y0, w, h))
    }
}

/// A labelled region of a card face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub label: String,
    pub bbox: NormBox,
}

impl Region {
    fn new(label: &str, x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            label: label.to_string(),
            bbox: NormBox::new(x0, y0, x1, y1),
        }
    }
}

/// Which layout family a card face uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutId {
    /// Creature cards: name and HP in the header, attacks in the body.
    Creature,
    /// Trainer-style cards: banner on top, title below it.
    Trainer,
    /// Loaded from an annotation file.
    Annotated,
}

impl LayoutId {
    /// Interpret a caller-supplied hint.
    pub fn from_hint(hint: &str) -> Option<Self> {
        match hint.trim().to_ascii_lowercase().as_str() {
            "creature" | "pokemon" | "pokémon" => Some(Self::Creature),
            "trainer" | "non-creature" | "supporter" | "item" | "stadium" | "tool" | "energy" => {
                Some(Self::Trainer)
            }
            "annotated" => Some(Self::Annotated),
            _ => None,
        }
    }
}

/// A set of labelled regions for one card layout.
#[derive(Debug, Clone, PartialEq)]
pub struct CardLayout {
    pub id: LayoutId,
    pub regions: Vec<Region>,
}

impl CardLayout {
    /// Standard creature card layout.
    pub fn creature() -> Self {
        Self {
            id: LayoutId::Creature,
            regions: vec![
                Region::new("title", 0.05, 0.03, 0.95, 0.12),
                Region::new("hp", 0.78, 0.03, 0.95, 0.12),
                Region::new("type_line", 0.05, 0.12, 0.95, 0.18),
                Region::new("body", 0.05, 0.45, 0.95, 0.80),
                Region::new("bottom_mechanics", 0.05, 0.80, 0.95, 0.90),
                Region::new("bottom_meta", 0.05, 0.90, 0.95, 0.97),
                Region::new("weakness", 0.10, 0.81, 0.28, 0.89),
                Region::new("resistance", 0.30, 0.81, 0.48, 0.89),
                Region::new("retreat", 0.52, 0.81, 0.78, 0.89),
                Region::new("illustrator", 0.05, 0.91, 0.40, 0.96),
                Region::new("collector", 0.60, 0.91, 0.95, 0.96),
            ],
        }
    }

    /// Trainer, stadium, tool and energy card layout.
    pub fn trainer() -> Self {
        Self {
            id: LayoutId::Trainer,
            regions: vec![
                Region::new("title", 0.05, 0.10, 0.95, 0.20),
                Region::new("body", 0.05, 0.20, 0.95, 0.80),
                Region::new("bottom_meta", 0.05, 0.90, 0.95, 0.97),
                Region::new("illustrator", 0.05, 0.91, 0.40, 0.96),
                Region::new("collector", 0.60, 0.91, 0.95, 0.96),
            ],
        }
    }

    /// Built-in layout for an id; annotated layouts have no built-in.
    pub fn builtin(id: LayoutId) -> Option<Self> {
        match id {
            LayoutId::Creature => Some(Self::creature()),
            LayoutId::Trainer => Some(Self::trainer()),
            LayoutId::Annotated => None,
        }
    }

    /// Look up a region by label.
    pub fn region(&self, label: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.label == label)
    }
}

#[derive(Debug, Deserialize)]
struct AnnotatedBox {
    x: f32,
    y: f32,
    w: f32,
    h: f32,
}

/// Region layout derived from hand annotations.
///
/// The file maps labels to normalized boxes:
/// `{"hp": {"x": 0.78, "y": 0.03, "w": 0.17, "h": 0.09}, ...}`.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutModel {
    layout: CardLayout,
}

impl LayoutModel {
    /// Load a layout model from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse a layout model from JSON text.
    pub fn from_json(content: &str) -> Result<Self> {
        let boxes: BTreeMap<String, AnnotatedBox> = serde_json::from_str(content)
            .map_err(|e| PokedataError::Config(format!("invalid layout model: {}", e)))?;
        if boxes.is_empty() {
            return Err(PokedataError::Config("layout model has no regions".into()));
        }

        let regions = boxes
            .into_iter()
            .map(|(label, b)| Region {
                label,
                bbox: NormBox::from_xywh(b.x, b.y, b.w, b.h),
            })
            .collect::<Vec<_>>();
        debug!("Loaded layout model with {} regions", regions.len());

        Ok(Self {
            layout: CardLayout {
                id: LayoutId::Annotated,
                regions,
            },
        })
    }

    pub fn layout(&self) -> &CardLayout {
        &self.layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_norm_box_clamps_and_orders() {
        let b = NormBox::new(0.9, -0.2, 0.1, 1.3);
        assert_eq!(b, NormBox::new(0.1, 0.0, 0.9, 1.0));
        assert!(b.contains_point(0.5, 0.5));
        assert!(!b.contains_point(0.05, 0.5));
    }

    #[test]
    fn test_to_pixels() {
        let hp = CardLayout::creature().region("hp").unwrap().bbox;
        assert_eq!(hp.to_pixels(600, 840), Some((468, 25, 102, 76)));
        assert_eq!(NormBox::FOOTER_BAND.to_pixels(100, 100), Some((0, 75, 100, 25)));
    }

    #[test]
    fn test_layout_hint() {
        assert_eq!(LayoutId::from_hint("Pokemon"), Some(LayoutId::Creature));
        assert_eq!(LayoutId::from_hint(" trainer "), Some(LayoutId::Trainer));
        assert_eq!(LayoutId::from_hint("sideways"), None);
    }

    #[test]
    fn test_builtin_layouts() {
        assert!(CardLayout::creature().region("weakness").is_some());
        assert!(CardLayout::trainer().region("weakness").is_none());
        assert!(CardLayout::builtin(LayoutId::Annotated).is_none());
    }

    #[test]
    fn test_layout_model_from_json() {
        let model = LayoutModel::from_json(
            r#"{"hp": {"x": 0.78, "y": 0.03, "w": 0.17, "h": 0.09},
                "card_number": {"x": 0.6, "y": 0.91, "w": 0.35, "h": 0.05}}"#,
        )
        .unwrap();
        let layout = model.layout();
        assert_eq!(layout.id, LayoutId::Annotated);
        assert_eq!(layout.regions.len(), 2);
        assert_eq!(layout.regions[0].label, "card_number");
    }

    #[test]
    fn test_layout_model_rejects_empty() {
        assert!(LayoutModel::from_json("{}").is_err());
        assert!(LayoutModel::from_json("[1, 2]").is_err());
    }
}
