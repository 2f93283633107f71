//! Rule-based field extractors for card text.

pub mod attacks;
pub mod hp;
pub mod illustrator;
pub mod number;
pub mod patterns;
pub mod text;

pub use attacks::AttackExtractor;
pub use hp::{repair_digits, HpExtractor};
pub use illustrator::IllustratorExtractor;
pub use number::{extract_set_code, extract_set_code_bare, CardNumberExtractor};
pub use text::{
    energy_tokens, extract_ability, extract_evolves_from, extract_mechanic, extract_name,
    extract_print_year, extract_stage, has_trainer_banner, strip_banner, Mechanic,
};

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the field from text.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract all occurrences of the field.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// Extraction context with confidence scores.
///
/// The score only ranks candidates against each other; it never leaves
/// the local extractor.
#[derive(Debug, Clone)]
pub struct ExtractionMatch<T> {
    /// Extracted value.
    pub value: T,
    /// Candidate score (0.0 - 1.0).
    pub confidence: f32,
    /// Position in source text.
    pub position: Option<(usize, usize)>,
    /// Source text that was matched.
    pub source: String,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, confidence: f32, source: impl Into<String>) -> Self {
        Self {
            value,
            confidence,
            position: None,
            source: source.into(),
        }
    }

    pub fn with_position(mut self, start: usize, end: usize) -> Self {
        self.position = Some((start, end));
        self
    }
}

/// Pick the highest-scoring candidate, earliest in the text on ties.
pub(crate) fn best<T>(mut candidates: Vec<ExtractionMatch<T>>) -> Option<ExtractionMatch<T>> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.position.cmp(&b.position))
    });
    candidates.into_iter().next()
}
