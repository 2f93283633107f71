//! Common regex patterns for card text extraction.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // HP: "HP 180", "HP18O" (OCR confusions are repaired after matching)
    pub static ref HP_LABELED: Regex = Regex::new(
        r"(?i)\bHP\s*([0-9OoIlSB|]{1,3})\b"
    ).unwrap();

    pub static ref HP_TRAILING: Regex = Regex::new(
        r"(?i)\b([0-9OoIlSB|]{2,3})\s*HP\b"
    ).unwrap();

    pub static ref HP_MARKER: Regex = Regex::new(r"(?i)\bHP\b").unwrap();

    pub static ref BARE_NUMBER: Regex = Regex::new(r"[0-9OoIlSB|]{1,3}").unwrap();

    // Collector numbers
    pub static ref CARD_NUMBER: Regex = Regex::new(
        r"\b(\d{1,3})\s*/\s*(\d{1,3})\b"
    ).unwrap();

    pub static ref GALLERY_NUMBER: Regex = Regex::new(
        r"(?i)\b((?:TG|GG)\d{2})\s*/\s*((?:TG|GG)\d{2})\b"
    ).unwrap();

    pub static ref PROMO_NUMBER: Regex = Regex::new(
        r"\b(SWSH|SVP|SM|XY|BW)\s?(\d{2,3})\b"
    ).unwrap();

    // Set code printed just before the collector number: "PAL 054/193"
    pub static ref SET_CODE: Regex = Regex::new(
        r"\b([A-Z]{2,4})\s*\d{1,3}\s*/\s*\d{1,3}\b"
    ).unwrap();

    pub static ref SET_CODE_BARE: Regex = Regex::new(r"\b[A-Z]{2,4}\b").unwrap();

    // Illustrator credit
    pub static ref ILLUSTRATOR: Regex = Regex::new(
        r"(?i)\bIllus(?:trator\b|\.|\b)\s*:?\s*([A-Za-z0-9][A-Za-z0-9'\-. ]*)"
    ).unwrap();

    // Copyright year: "©2023 Pokémon"
    pub static ref PRINT_YEAR: Regex = Regex::new(
        r"(?i)(?:©|\(c\))\s*((?:19|20)\d{2})"
    ).unwrap();

    // Evolution
    pub static ref EVOLVES_FROM: Regex = Regex::new(
        r"(?i)\bEvolves\s+from\s+([A-Za-z0-9'\-. ]+)"
    ).unwrap();

    pub static ref STAGE: Regex = Regex::new(
        r"(?i)\b(Basic|Stage\s*[12]|Restored|Mega\s+Evolution|BREAK|LEGEND|VMAX|VSTAR)\b"
    ).unwrap();

    // Ability header and attack lines
    pub static ref ABILITY_LINE: Regex = Regex::new(
        r"(?i)\bAbility\b[:\s]*([A-Za-z0-9'\- ]+)"
    ).unwrap();

    pub static ref ATTACK_LINE: Regex = Regex::new(
        r"(?m)^[^A-Za-z\n]*([A-Z][A-Za-z'\-]+(?: [A-Za-z'\-]+){0,3})[ \t]+([1-9]\d{0,2}[+×x\-]?|[+×])[ \t]*$"
    ).unwrap();

    // Bottom mechanics
    pub static ref WEAKNESS: Regex = Regex::new(r"(?i)\bweakness\b").unwrap();
    pub static ref RESISTANCE: Regex = Regex::new(r"(?i)\bresistance\b").unwrap();
    pub static ref RETREAT: Regex = Regex::new(r"(?i)\bretreat(?:\s+cost)?\b").unwrap();

    // Trainer banners
    pub static ref TRAINER_BANNER: Regex = Regex::new(
        r"(?i)\b(TRAINER|SUPPORTER|ITEM|STADIUM)\b"
    ).unwrap();

    pub static ref BANNER_PREFIX: Regex = Regex::new(
        r"(?i)^\s*(?:(?:trainer|supporter|item|stadium|pok[eé]mon\s+tool|tool)\b[\s:\-]*)+"
    ).unwrap();

    pub static ref LETTERS: Regex = Regex::new(r"[A-Za-z]").unwrap();

    // Card classification
    pub static ref ENERGY_WORD: Regex = Regex::new(r"(?i)\benergy\b").unwrap();

    pub static ref TOOL_NAME: Regex = Regex::new(
        r"(?i)\b(?:technical\s+machine|pok[eé]mon\s+tool|tool|choice\s+(?:belt|band|helmet)|float\s+stone|rocky\s+helmet|exp\.?\s+share|muscle\s+band)\b"
    ).unwrap();

    // "TM: Evolution" style names; case-sensitive to spare words like "tm" in prose
    pub static ref TM_NAME: Regex = Regex::new(r"\bTM\b").unwrap();

    pub static ref NON_CREATURE_KEYWORD: Regex = Regex::new(
        r"(?i)\b(?:supporter|stadium|pok[eé]mon\s+tool|tool|item|trainer)\b"
    ).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_number_patterns() {
        assert!(CARD_NUMBER.is_match("PAL 054/193"));
        assert!(CARD_NUMBER.is_match("4 / 102"));
        assert!(GALLERY_NUMBER.is_match("TG05/TG30"));
        assert!(!CARD_NUMBER.is_match("TG05/TG30"));
        assert!(PROMO_NUMBER.is_match("SWSH 123"));
    }

    #[test]
    fn test_set_code_capture() {
        let caps = SET_CODE.captures("Illus. Mitsuhiro Arita  PAL 054/193").unwrap();
        assert_eq!(&caps[1], "PAL");
    }

    #[test]
    fn test_attack_line() {
        let caps = ATTACK_LINE.captures("Fire Spin 250").unwrap();
        assert_eq!(&caps[1], "Fire Spin");
        assert_eq!(&caps[2], "250");
        assert!(ATTACK_LINE.is_match("** Slash 30+"));
        assert!(!ATTACK_LINE.is_match("Discard 2 Energy from this Pokémon."));
        assert_eq!(&ATTACK_LINE.captures("Mind Shock ×").unwrap()[2], "×");
        assert_eq!(&ATTACK_LINE.captures("Hyper Beam 120-").unwrap()[2], "120-");
        assert!(!ATTACK_LINE.is_match("Knock Out x"));
    }

    #[test]
    fn test_classification_patterns() {
        assert!(ENERGY_WORD.is_match("Basic Fire Energy"));
        assert!(!ENERGY_WORD.is_match("Energetic Pikachu"));
        assert!(TOOL_NAME.is_match("Technical Machine: Evolution"));
        assert!(TOOL_NAME.is_match("Float Stone"));
        assert!(TM_NAME.is_match("TM Turbo Energy"));
        assert!(!TM_NAME.is_match("Atmos"));
        assert!(NON_CREATURE_KEYWORD.is_match("Supporter\nDraw 7 cards."));
    }

    #[test]
    fn test_banner_prefix() {
        assert_eq!(BANNER_PREFIX.replace("TRAINER Supporter Professor's Research", ""), "Professor's Research");
    }
}
