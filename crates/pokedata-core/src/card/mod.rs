//! Local, rule-based card field extraction.

mod extractor;
pub mod rules;

pub use extractor::LocalExtractor;
pub use rules::{ExtractionMatch, FieldExtractor};
