//! Collector number and set code extraction.

use super::patterns::{CARD_NUMBER, GALLERY_NUMBER, PROMO_NUMBER, SET_CODE, SET_CODE_BARE};
use super::{best, ExtractionMatch, FieldExtractor};

/// Collector number extractor.
///
/// Recognizes `054/193`, trainer-gallery `TG05/TG30` and promo `SWSH123`.
/// Output is normalized without inner spaces.
pub struct CardNumberExtractor;

impl CardNumberExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CardNumberExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for CardNumberExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        best(self.extract_all(text))
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results = Vec::new();

        for caps in GALLERY_NUMBER.captures_iter(text) {
            let full = caps.get(0).map_or((0, 0), |m| (m.start(), m.end()));
            let value = format!("{}/{}", caps[1].to_uppercase(), caps[2].to_uppercase());
            results.push(
                ExtractionMatch::new(value, 0.95, &caps[0]).with_position(full.0, full.1),
            );
        }

        for caps in CARD_NUMBER.captures_iter(text) {
            let full = caps.get(0).map_or((0, 0), |m| (m.start(), m.end()));
            let value = format!("{}/{}", &caps[1], &caps[2]);
            results.push(
                ExtractionMatch::new(value, 0.9, &caps[0]).with_position(full.0, full.1),
            );
        }

        for caps in PROMO_NUMBER.captures_iter(text) {
            let full = caps.get(0).map_or((0, 0), |m| (m.start(), m.end()));
            let value = format!("{}{}", &caps[1], &caps[2]);
            results.push(
                ExtractionMatch::new(value, 0.8, &caps[0]).with_position(full.0, full.1),
            );
        }

        results
    }
}

/// Set code printed immediately before the collector number.
pub fn extract_set_code(text: &str) -> Option<String> {
    SET_CODE.captures(text).map(|caps| caps[1].to_string())
}

/// Set code from a crop that holds only the set box.
pub fn extract_set_code_bare(text: &str) -> Option<String> {
    extract_set_code(text).or_else(|| {
        SET_CODE_BARE
            .find(&text.to_uppercase())
            .map(|m| m.as_str().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_standard_number() {
        let extractor = CardNumberExtractor::new();
        let found = extractor.extract("Illus. Mitsuhiro Arita\nPAL 054 / 193").unwrap();
        assert_eq!(found.value, "054/193");
    }

    #[test]
    fn test_gallery_number_preferred() {
        let extractor = CardNumberExtractor::new();
        let found = extractor.extract("tg05/tg30 and 12/30").unwrap();
        assert_eq!(found.value, "TG05/TG30");
    }

    #[test]
    fn test_promo_number() {
        let extractor = CardNumberExtractor::new();
        assert_eq!(extractor.extract("SWSH 123").unwrap().value, "SWSH123");
        assert!(extractor.extract("no number here").is_none());
    }

    #[test]
    fn test_set_code() {
        assert_eq!(extract_set_code("SVI 198/198").as_deref(), Some("SVI"));
        assert_eq!(extract_set_code("198/198"), None);
        assert_eq!(extract_set_code_bare("obf").as_deref(), Some("OBF"));
    }
}
