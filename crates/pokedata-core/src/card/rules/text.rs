//! Line-oriented heuristics: name, evolution, ability, and bottom mechanics.

use regex::Regex;

use crate::schema::Vocabulary;

use super::patterns::{
    ABILITY_LINE, ATTACK_LINE, BANNER_PREFIX, CARD_NUMBER, EVOLVES_FROM, HP_MARKER, LETTERS,
    PRINT_YEAR, RESISTANCE, RETREAT, STAGE, TRAINER_BANNER, WEAKNESS,
};

const MAX_NAME_CHARS: usize = 30;
const MAX_ABILITY_CHARS: usize = 400;

/// Remove a leading trainer banner ("TRAINER", "Supporter", "Pokémon Tool").
pub fn strip_banner(text: &str) -> String {
    BANNER_PREFIX.replace(text.trim(), "").trim().to_string()
}

/// Guess the card name.
///
/// Prefers text before the HP marker on its own line, then the nearest
/// short alphabetic line above it, then the first such line among the
/// first four.
pub fn extract_name(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    if let Some(idx) = lines.iter().position(|l| HP_MARKER.is_match(l)) {
        let line = lines[idx];
        let prefix = HP_MARKER.find(line).map_or(line, |m| &line[..m.start()]);
        if let Some(name) = name_candidate(prefix) {
            return Some(name);
        }
        if let Some(name) = lines[..idx].iter().rev().find_map(|l| name_candidate(l)) {
            return Some(name);
        }
    }

    lines.iter().take(4).find_map(|l| name_candidate(l))
}

/// Clean a title line and accept it if it looks like a name.
pub(crate) fn name_candidate(line: &str) -> Option<String> {
    let mut name = strip_banner(line);
    if let Some(m) = STAGE.find(&name) {
        if m.start() == 0 {
            name = name[m.end()..].to_string();
        }
    }
    let name = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| !c.is_alphanumeric() && c != '\'' && c != ')')
        .to_string();

    let len = name.chars().count();
    if (1..=MAX_NAME_CHARS).contains(&len) && LETTERS.is_match(&name) {
        Some(name)
    } else {
        None
    }
}

/// Predecessor named in "Evolves from X".
pub fn extract_evolves_from(text: &str) -> Option<String> {
    let caps = EVOLVES_FROM.captures(text)?;
    let name = caps[1].trim().trim_end_matches('.').trim().to_string();
    LETTERS.is_match(&name).then_some(name)
}

/// Evolution stage from the top of the card, as a canonical token.
pub fn extract_stage(text: &str) -> Option<&'static str> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(3)
        .filter(|l| !l.to_lowercase().contains("energy"))
        .find_map(|l| STAGE.find(l))
        .and_then(|m| Vocabulary::Stage.canonicalize(m.as_str()))
}

/// Ability name and the effect text block that follows it.
pub fn extract_ability(text: &str) -> Option<(String, String)> {
    let caps = ABILITY_LINE.captures(text)?;
    let name = caps[1].trim().to_string();
    if !LETTERS.is_match(&name) {
        return None;
    }

    let start = caps.get(0).map_or(text.len(), |m| m.end());
    let chunk = take_chars(&text[start..], MAX_ABILITY_CHARS);
    let stops: [&Regex; 5] = [&ATTACK_LINE, &WEAKNESS, &RESISTANCE, &RETREAT, &CARD_NUMBER];
    let end = stops
        .iter()
        .filter_map(|re| re.find(chunk).map(|m| m.start()))
        .min()
        .unwrap_or(chunk.len());
    let body = chunk[..end].split_whitespace().collect::<Vec<_>>().join(" ");

    Some((name, body))
}

/// Bottom-of-card mechanics line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mechanic {
    Weakness,
    Resistance,
    Retreat,
}

impl Mechanic {
    fn pattern(&self) -> &'static Regex {
        match self {
            Mechanic::Weakness => &WEAKNESS,
            Mechanic::Resistance => &RESISTANCE,
            Mechanic::Retreat => &RETREAT,
        }
    }
}

/// Text following a mechanic keyword, up to the next keyword on its line.
///
/// Weakness, resistance and retreat often share one printed row.
pub fn extract_mechanic(text: &str, mechanic: Mechanic) -> Option<String> {
    let found = mechanic.pattern().find(text)?;
    let rest = &text[found.end()..];
    let line = rest.lines().next().unwrap_or_default();

    let end = [&*WEAKNESS, &*RESISTANCE, &*RETREAT]
        .iter()
        .filter_map(|re| re.find(line).map(|m| m.start()))
        .min()
        .unwrap_or(line.len());
    let value = line[..end]
        .trim()
        .trim_start_matches([':', '-'])
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    (!value.is_empty()).then_some(value)
}

/// Canonical energy type names mentioned in the text, in order.
pub fn energy_tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter_map(|word| Vocabulary::EnergyType.canonicalize(word))
        .map(str::to_string)
        .collect()
}

/// True if the text carries a trainer banner keyword.
pub fn has_trainer_banner(text: &str) -> bool {
    TRAINER_BANNER.is_match(text)
}

/// Copyright year ("©2023").
pub fn extract_print_year(text: &str) -> Option<i64> {
    PRINT_YEAR.captures(text)?[1].parse().ok()
}

fn take_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
