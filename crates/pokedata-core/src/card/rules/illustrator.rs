//! Illustrator credit extraction.

use super::patterns::{CARD_NUMBER, GALLERY_NUMBER, ILLUSTRATOR, LETTERS, PROMO_NUMBER, SET_CODE};
use super::{ExtractionMatch, FieldExtractor};

/// Illustrator extractor anchored on the "Illus." credit marker.
pub struct IllustratorExtractor;

impl IllustratorExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Read a crop that holds only the credit, where the marker may be lost.
    pub fn extract_bare(&self, text: &str) -> Option<String> {
        if let Some(found) = self.extract(text) {
            return Some(found.value);
        }
        let line = text.lines().map(str::trim).find(|l| LETTERS.is_match(l))?;
        clean_credit(line)
    }
}

impl Default for IllustratorExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for IllustratorExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        ILLUSTRATOR
            .captures_iter(text)
            .filter_map(|caps| {
                let full = caps.get(0)?;
                let name = clean_credit(caps.get(1)?.as_str())?;
                Some(
                    ExtractionMatch::new(name, 0.9, full.as_str())
                        .with_position(full.start(), full.end()),
                )
            })
            .collect()
    }
}

/// Cut trailing collector data off a credit and tidy it.
fn clean_credit(raw: &str) -> Option<String> {
    let cut = [&*SET_CODE, &*GALLERY_NUMBER, &*CARD_NUMBER, &*PROMO_NUMBER]
        .iter()
        .filter_map(|re| re.find(raw).map(|m| m.start()))
        .min()
        .unwrap_or(raw.len());

    let name = raw[..cut]
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let name = name.trim_end_matches(['.', '-', '\'', ' ']).to_string();

    LETTERS.is_match(&name).then_some(name)
}
