//! HP (vitality) extraction with OCR digit-confusion repair.

use super::patterns::{BARE_NUMBER, HP_LABELED, HP_TRAILING};
use super::{best, ExtractionMatch, FieldExtractor};

/// Repair common OCR letter/digit confusions in a numeric token.
///
/// `O/o→0`, `I/l/|→1`, `S→5`, `B→8`. Returns `None` unless the result is
/// all digits and the token already contained at least one real digit.
pub fn repair_digits(token: &str) -> Option<String> {
    if !token.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    token
        .chars()
        .map(|c| match c {
            'O' | 'o' => Some('0'),
            'I' | 'l' | '|' => Some('1'),
            'S' => Some('5'),
            'B' => Some('8'),
            d if d.is_ascii_digit() => Some(d),
            _ => None,
        })
        .collect()
}

/// HP field extractor.
pub struct HpExtractor;

impl HpExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Read a crop that holds only the HP box, where the marker may be lost.
    pub fn extract_bare(&self, text: &str) -> Option<ExtractionMatch<i64>> {
        if let Some(found) = self.extract(text) {
            return Some(found);
        }
        BARE_NUMBER.find_iter(text).find_map(|m| {
            let value = parse_hp(m.as_str())?;
            Some(ExtractionMatch::new(value, 0.6, m.as_str()).with_position(m.start(), m.end()))
        })
    }
}

impl Default for HpExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for HpExtractor {
    type Output = ExtractionMatch<i64>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        best(self.extract_all(text))
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results = Vec::new();

        for (pattern, score) in [(&*HP_LABELED, 0.9), (&*HP_TRAILING, 0.8)] {
            for caps in pattern.captures_iter(text) {
                let (Some(full), Some(token)) = (caps.get(0), caps.get(1)) else {
                    continue;
                };
                if let Some(value) = parse_hp(token.as_str()) {
                    results.push(
                        ExtractionMatch::new(value, score, full.as_str())
                            .with_position(full.start(), full.end()),
                    );
                }
            }
        }

        results
    }
}

fn parse_hp(token: &str) -> Option<i64> {
    repair_digits(token)?
        .parse::<i64>()
        .ok()
        .filter(|n| (1..=999).contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_repair_digits() {
        assert_eq!(repair_digits("18O").as_deref(), Some("180"));
        assert_eq!(repair_digits("l2O").as_deref(), Some("120"));
        assert_eq!(repair_digits("SB"), None);
        assert_eq!(repair_digits("7x"), None);
    }

    #[test]
    fn test_labeled_hp() {
        let extractor = HpExtractor::new();
        let found = extractor.extract("Charizard HP 180\nStage 2").unwrap();
        assert_eq!(found.value, 180);
    }

    #[test]
    fn test_confused_hp() {
        let extractor = HpExtractor::new();
        assert_eq!(extractor.extract("Charizard HP18O").unwrap().value, 180);
        assert_eq!(extractor.extract("Pikachu 6O HP").unwrap().value, 60);
    }

    #[test]
    fn test_no_hp() {
        let extractor = HpExtractor::new();
        assert!(extractor.extract("Professor's Research").is_none());
        assert!(extractor.extract("HP").is_none());
    }

    #[test]
    fn test_bare_crop() {
        let extractor = HpExtractor::new();
        assert_eq!(extractor.extract_bare(" 7O ").unwrap().value, 70);
        assert_eq!(extractor.extract_bare("HP 70").unwrap().value, 70);
    }
}
