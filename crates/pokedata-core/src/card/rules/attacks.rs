//! Attack line extraction: a name followed by printed damage.

use crate::models::card::Attack;

use super::patterns::{ATTACK_LINE, HP_MARKER};
use super::{ExtractionMatch, FieldExtractor};

/// Leading words that mark a line as card furniture rather than an attack.
const NOT_ATTACK_NAMES: &[&str] = &[
    "ability", "basic", "evolves", "illus", "resistance", "retreat", "stage", "weakness",
];

/// Attack extractor.
pub struct AttackExtractor;

impl AttackExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AttackExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for AttackExtractor {
    type Output = ExtractionMatch<Attack>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results = Vec::new();

        for caps in ATTACK_LINE.captures_iter(text) {
            let (Some(full), Some(name), Some(damage)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            if HP_MARKER.is_match(full.as_str()) {
                continue;
            }
            let first_word = name
                .as_str()
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_lowercase();
            if NOT_ATTACK_NAMES.contains(&first_word.as_str()) {
                continue;
            }

            let attack = Attack {
                name: name.as_str().trim().to_string(),
                cost: Vec::new(),
                damage: damage.as_str().replace('x', "×"),
                text: String::new(),
            };
            results.push(
                ExtractionMatch::new(attack, 0.7, full.as_str())
                    .with_position(full.start(), full.end()),
            );
        }

        results
    }
}
