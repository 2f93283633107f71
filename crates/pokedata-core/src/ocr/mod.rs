//! Local text recognition: engine seam, card layouts, and crop preprocessing.

mod layout;
mod preprocessing;
#[cfg(feature = "native")]
mod pure_engine;

pub use layout::{CardLayout, LayoutId, LayoutModel, NormBox, Region};
pub use preprocessing::{crop_normalized, enhance_for_ocr, pad_white};
#[cfg(feature = "native")]
pub use pure_engine::PureOcrEngine;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::OcrError;

/// How recognized boxes are assembled into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMode {
    /// Dense block of text: one line per visual row.
    UniformBlock,
    /// A single text line: every box joined with spaces.
    SingleLine,
}

/// Anything that can turn pixels into text.
pub trait TextRecognizer: Send + Sync {
    /// Engine name for logs.
    fn name(&self) -> &str;

    /// Recognize all text in the image.
    fn recognize(&self, image: &DynamicImage, mode: PageMode) -> Result<OcrResult, OcrError>;
}

/// A detected text box with its coordinates and content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBox {
    /// Bounding box coordinates (x1, y1, x2, y2, x3, y3, x4, y4) for quadrilateral.
    pub bbox: [f32; 8],

    /// Recognized text content.
    pub text: String,

    /// Recognition confidence score (0.0 - 1.0).
    pub score: f32,
}

impl TextBox {
    /// Get the center point of the bounding box.
    pub fn center(&self) -> (f32, f32) {
        let x = (self.bbox[0] + self.bbox[2] + self.bbox[4] + self.bbox[6]) / 4.0;
        let y = (self.bbox[1] + self.bbox[3] + self.bbox[5] + self.bbox[7]) / 4.0;
        (x, y)
    }

    /// Get the axis-aligned bounding rectangle.
    pub fn rect(&self) -> (f32, f32, f32, f32) {
        let xs = [self.bbox[0], self.bbox[2], self.bbox[4], self.bbox[6]];
        let ys = [self.bbox[1], self.bbox[3], self.bbox[5], self.bbox[7]];

        let min_x = xs.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_x = xs.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let min_y = ys.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_y = ys.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

        (min_x, min_y, max_x, max_y)
    }

    pub fn height(&self) -> f32 {
        let (_, min_y, _, max_y) = self.rect();
        max_y - min_y
    }
}

/// Result of OCR processing on an image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrResult {
    /// Recognized text boxes in reading order.
    pub boxes: Vec<TextBox>,

    /// Full text assembled according to the page mode.
    pub text: String,

    /// Processing time in milliseconds.
    pub processing_time_ms: u64,

    /// Image dimensions (width, height).
    pub image_size: (u32, u32),
}

impl OcrResult {
    /// Create an empty result.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            image_size: (width, height),
            ..Self::default()
        }
    }

    /// Build a result from raw boxes: sort into reading order and assemble text.
    pub fn from_boxes(boxes: Vec<TextBox>, mode: PageMode, image_size: (u32, u32)) -> Self {
        let mut result = Self {
            boxes,
            image_size,
            ..Self::default()
        };
        result.assemble(mode);
        result
    }

    /// Sort boxes by reading order (top-to-bottom, left-to-right) and rebuild text.
    ///
    /// Boxes whose vertical centers are within half a median box height of
    /// the row's first box share a row.
    pub fn assemble(&mut self, mode: PageMode) {
        self.boxes.sort_by(|a, b| {
            a.center()
                .1
                .partial_cmp(&b.center().1)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let tolerance = median_height(&self.boxes) / 2.0;
        let mut rows: Vec<Vec<TextBox>> = Vec::new();
        for text_box in self.boxes.drain(..) {
            let cy = text_box.center().1;
            match rows.last_mut() {
                Some(row) if (row[0].center().1 - cy).abs() <= tolerance => row.push(text_box),
                _ => rows.push(vec![text_box]),
            }
        }

        let mut lines = Vec::with_capacity(rows.len());
        for mut row in rows {
            row.sort_by(|a, b| {
                a.rect()
                    .0
                    .partial_cmp(&b.rect().0)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            lines.push(
                row.iter()
                    .map(|b| b.text.trim())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join(" "),
            );
            self.boxes.extend(row);
        }

        let separator = match mode {
            PageMode::UniformBlock => "\n",
            PageMode::SingleLine => " ",
        };
        self.text = lines
            .into_iter()
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(separator);
    }
}

fn median_height(boxes: &[TextBox]) -> f32 {
    if boxes.is_empty() {
        return 0.0;
    }
    let mut heights: Vec<f32> = boxes.iter().map(TextBox::height).collect();
    heights.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    heights[heights.len() / 2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text_box(x: f32, y: f32, text: &str) -> TextBox {
        TextBox {
            bbox: [x, y, x + 40.0, y, x + 40.0, y + 10.0, x, y + 10.0],
            text: text.to_string(),
            score: 0.9,
        }
    }

    #[test]
    fn test_reading_order_block() {
        let boxes = vec![
            text_box(100.0, 52.0, "HP 180"),
            text_box(0.0, 50.0, "Charizard"),
            text_box(0.0, 200.0, "Illus. 5ban Graphics"),
        ];
        let result = OcrResult::from_boxes(boxes, PageMode::UniformBlock, (300, 400));
        assert_eq!(result.text, "Charizard HP 180\nIllus. 5ban Graphics");
        assert_eq!(result.boxes[0].text, "Charizard");
    }

    #[test]
    fn test_single_line_mode() {
        let boxes = vec![text_box(0.0, 0.0, "Stage"), text_box(0.0, 30.0, "2")];
        let result = OcrResult::from_boxes(boxes, PageMode::SingleLine, (100, 50));
        assert_eq!(result.text, "Stage 2");
    }

    #[test]
    fn test_empty_result() {
        let result = OcrResult::from_boxes(Vec::new(), PageMode::UniformBlock, (10, 10));
        assert!(result.text.is_empty());
        assert_eq!(OcrResult::empty(3, 4).image_size, (3, 4));
    }
}
