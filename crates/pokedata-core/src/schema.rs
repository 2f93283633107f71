//! Declarative field schema for Pokémon TCG cards.
//!
//! Every extractable field appears here exactly once, with its semantic
//! type, whether it is required, its weight in the quality score, the card
//! classes it is meaningful for, and (for enumerated fields) the closed
//! vocabulary of canonical tokens.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::card::FieldValue;

/// Every field the engine knows about, in record order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Stage,
    EvolvesFrom,
    Hp,
    Types,
    AbilityName,
    AbilityText,
    Attacks,
    Weakness,
    Resistance,
    Retreat,
    SetName,
    SetCode,
    CardNumber,
    Illustrator,
    Rarity,
    PrintYear,
    SetboxLetters,
}

impl Field {
    pub const ALL: [Field; 18] = [
        Field::Name,
        Field::Stage,
        Field::EvolvesFrom,
        Field::Hp,
        Field::Types,
        Field::AbilityName,
        Field::AbilityText,
        Field::Attacks,
        Field::Weakness,
        Field::Resistance,
        Field::Retreat,
        Field::SetName,
        Field::SetCode,
        Field::CardNumber,
        Field::Illustrator,
        Field::Rarity,
        Field::PrintYear,
        Field::SetboxLetters,
    ];

    /// Record key (snake_case).
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Stage => "stage",
            Field::EvolvesFrom => "evolves_from",
            Field::Hp => "hp",
            Field::Types => "types",
            Field::AbilityName => "ability_name",
            Field::AbilityText => "ability_text",
            Field::Attacks => "attacks",
            Field::Weakness => "weakness",
            Field::Resistance => "resistance",
            Field::Retreat => "retreat",
            Field::SetName => "set_name",
            Field::SetCode => "set_code",
            Field::CardNumber => "card_number",
            Field::Illustrator => "illustrator",
            Field::Rarity => "rarity",
            Field::PrintYear => "print_year",
            Field::SetboxLetters => "setbox_letters",
        }
    }

    /// Key the remote service is asked to use (camelCase).
    pub fn wire_key(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Stage => "stage",
            Field::EvolvesFrom => "evolvesFrom",
            Field::Hp => "hp",
            Field::Types => "types",
            Field::AbilityName => "abilityName",
            Field::AbilityText => "abilityText",
            Field::Attacks => "attacks",
            Field::Weakness => "weakness",
            Field::Resistance => "resistance",
            Field::Retreat => "retreatCost",
            Field::SetName => "setName",
            Field::SetCode => "setCode",
            Field::CardNumber => "number",
            Field::Illustrator => "illustrator",
            Field::Rarity => "rarity",
            Field::PrintYear => "printYear",
            Field::SetboxLetters => "setboxLetters",
        }
    }

    /// Resolve a wire key or record key to a field.
    pub fn from_key(key: &str) -> Option<Field> {
        Field::ALL
            .iter()
            .copied()
            .find(|f| f.wire_key() == key || f.as_str() == key)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed vocabularies for enumerated fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vocabulary {
    EnergyType,
    Stage,
}

const ENERGY_TYPES: &[&str] = &[
    "Colorless",
    "Darkness",
    "Dragon",
    "Fairy",
    "Fighting",
    "Fire",
    "Grass",
    "Lightning",
    "Metal",
    "Psychic",
    "Water",
];

const STAGES: &[&str] = &[
    "Basic",
    "Stage 1",
    "Stage 2",
    "Restored",
    "Mega Evolution",
    "BREAK",
    "LEGEND",
    "VMAX",
    "VSTAR",
];

impl Vocabulary {
    pub fn tokens(&self) -> &'static [&'static str] {
        match self {
            Vocabulary::EnergyType => ENERGY_TYPES,
            Vocabulary::Stage => STAGES,
        }
    }

    /// Case- and spacing-insensitive lookup of the canonical token.
    pub fn canonicalize(&self, raw: &str) -> Option<&'static str> {
        let key = compact(raw);
        if key.is_empty() {
            return None;
        }
        self.tokens().iter().copied().find(|t| compact(t) == key)
    }
}

fn compact(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Semantic type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer { min: i64, max: i64 },
    Token(Vocabulary),
    TokenList(Vocabulary),
    /// List of nested attack objects.
    Attacks,
}

impl FieldKind {
    /// Value a null is repaired into, and what an unattempted default looks like.
    pub fn default_value(&self) -> FieldValue {
        match self {
            FieldKind::Text => FieldValue::Text(String::new()),
            FieldKind::Integer { .. } | FieldKind::Token(_) => FieldValue::Empty,
            FieldKind::TokenList(_) => FieldValue::Tokens(Vec::new()),
            FieldKind::Attacks => FieldValue::Attacks(Vec::new()),
        }
    }

    /// Short description used in the request schema declaration.
    pub fn describe(&self) -> String {
        match self {
            FieldKind::Text => "string or null".to_string(),
            FieldKind::Integer { min, max } => format!("integer {min}-{max} or null"),
            FieldKind::Token(v) => format!("one of {} or null", quoted(v.tokens())),
            FieldKind::TokenList(v) => format!("array of {}", quoted(v.tokens())),
            FieldKind::Attacks => format!(
                "array of {{\"name\": string, \"cost\": array of {}, \"damage\": string, \"text\": string}}",
                quoted(Vocabulary::EnergyType.tokens())
            ),
        }
    }
}

fn quoted(tokens: &[&str]) -> String {
    tokens
        .iter()
        .map(|t| format!("\"{t}\""))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Card classes a field is meaningful for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassScope {
    Any,
    CreatureOnly,
}

/// One schema entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub field: Field,
    pub kind: FieldKind,
    pub required: bool,
    /// Importance weight in [0, 1] for the quality score.
    pub weight: f64,
    pub scope: ClassScope,
}

impl FieldSpec {
    const fn new(field: Field, kind: FieldKind, required: bool, weight: f64, scope: ClassScope) -> Self {
        Self {
            field,
            kind,
            required,
            weight,
            scope,
        }
    }
}

const HP_RANGE: FieldKind = FieldKind::Integer { min: 1, max: 999 };
const YEAR_RANGE: FieldKind = FieldKind::Integer { min: 1996, max: 2100 };

const CARD_FIELDS: [FieldSpec; 18] = {
    use ClassScope::{Any, CreatureOnly};
    use FieldKind::{Attacks, Text, Token, TokenList};
    [
        FieldSpec::new(Field::Name, Text, true, 0.18, Any),
        FieldSpec::new(Field::Stage, Token(Vocabulary::Stage), false, 0.04, CreatureOnly),
        FieldSpec::new(Field::EvolvesFrom, Text, false, 0.04, CreatureOnly),
        FieldSpec::new(Field::Hp, HP_RANGE, false, 0.12, CreatureOnly),
        FieldSpec::new(Field::Types, TokenList(Vocabulary::EnergyType), false, 0.05, Any),
        FieldSpec::new(Field::AbilityName, Text, false, 0.03, CreatureOnly),
        FieldSpec::new(Field::AbilityText, Text, false, 0.02, CreatureOnly),
        FieldSpec::new(Field::Attacks, Attacks, false, 0.10, CreatureOnly),
        FieldSpec::new(Field::Weakness, Text, false, 0.03, CreatureOnly),
        FieldSpec::new(Field::Resistance, Text, false, 0.02, CreatureOnly),
        FieldSpec::new(Field::Retreat, TokenList(Vocabulary::EnergyType), false, 0.02, CreatureOnly),
        FieldSpec::new(Field::SetName, Text, false, 0.05, Any),
        FieldSpec::new(Field::SetCode, Text, false, 0.03, Any),
        FieldSpec::new(Field::CardNumber, Text, true, 0.14, Any),
        FieldSpec::new(Field::Illustrator, Text, true, 0.06, Any),
        FieldSpec::new(Field::Rarity, Text, false, 0.03, Any),
        FieldSpec::new(Field::PrintYear, YEAR_RANGE, false, 0.02, Any),
        FieldSpec::new(Field::SetboxLetters, Text, false, 0.02, Any),
    ]
};

/// Ordered field schema.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    specs: Vec<FieldSpec>,
}

impl FieldSchema {
    /// The built-in card schema.
    pub fn card() -> Self {
        Self {
            specs: CARD_FIELDS.to_vec(),
        }
    }

    /// Build a schema from explicit entries, rejecting duplicates,
    /// orphans and out-of-range weights.
    pub fn from_specs(specs: Vec<FieldSpec>) -> Result<Self, String> {
        let schema = Self { specs };
        schema.check()?;
        Ok(schema)
    }

    fn check(&self) -> Result<(), String> {
        for field in Field::ALL {
            let count = self.specs.iter().filter(|s| s.field == field).count();
            if count != 1 {
                return Err(format!("field {field} declared {count} times"));
            }
        }
        if let Some(bad) = self.specs.iter().find(|s| !(0.0..=1.0).contains(&s.weight)) {
            return Err(format!("weight {} for {} outside [0, 1]", bad.weight, bad.field));
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.specs.iter()
    }

    pub fn spec(&self, field: Field) -> &FieldSpec {
        // Construction guarantees every field is present.
        self.specs
            .iter()
            .find(|s| s.field == field)
            .unwrap_or(&CARD_FIELDS[field as usize])
    }

    pub fn required(&self) -> impl Iterator<Item = Field> + '_ {
        self.specs.iter().filter(|s| s.required).map(|s| s.field)
    }

    pub fn total_weight(&self) -> f64 {
        self.specs.iter().map(|s| s.weight).sum()
    }

    /// Type a raw OCR string as this field's kind.
    ///
    /// Returns `FieldValue::Empty` when the text cannot be read as the
    /// declared type, so local extraction stays "attempted, found nothing".
    pub fn coerce_text(&self, field: Field, raw: &str) -> FieldValue {
        let raw = raw.trim();
        if raw.is_empty() {
            return self.spec(field).kind.default_value();
        }
        match self.spec(field).kind {
            FieldKind::Text => FieldValue::Text(raw.to_string()),
            FieldKind::Integer { min, max } => raw
                .parse::<i64>()
                .ok()
                .filter(|n| (min..=max).contains(n))
                .map(FieldValue::Integer)
                .unwrap_or(FieldValue::Empty),
            FieldKind::Token(vocab) => FieldValue::Token(
                vocab
                    .canonicalize(raw)
                    .map(str::to_string)
                    .unwrap_or_else(|| raw.to_string()),
            ),
            FieldKind::TokenList(vocab) => FieldValue::Tokens(
                raw.split(['/', ',', '|'])
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(|t| vocab.canonicalize(t).map(str::to_string).unwrap_or_else(|| t.to_string()))
                    .collect(),
            ),
            FieldKind::Attacks => FieldValue::Empty,
        }
    }
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self::card()
    }
}

/// Class of schema violation found in a remote payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// Null where a value was expected (repairable).
    Null,
    /// Wrong JSON type with a declared conversion (repairable).
    CoercibleType,
    /// Key not in the schema (repairable by dropping).
    UnknownKey,
    /// Wrong JSON type with no conversion rule.
    WrongType,
    /// Integer outside the declared range.
    OutOfRange,
    /// Nested attack entry without the mandatory shape.
    MalformedEntry,
}

impl ViolationKind {
    pub fn code(&self) -> &'static str {
        match self {
            ViolationKind::Null => "null",
            ViolationKind::CoercibleType => "coercible_type",
            ViolationKind::UnknownKey => "unknown_key",
            ViolationKind::WrongType => "wrong_type",
            ViolationKind::OutOfRange => "out_of_range",
            ViolationKind::MalformedEntry => "malformed_entry",
        }
    }

    /// Whether automatic repair handles this class.
    pub fn is_repairable(&self) -> bool {
        matches!(
            self,
            ViolationKind::Null | ViolationKind::CoercibleType | ViolationKind::UnknownKey
        )
    }
}

/// A schema violation left unrepaired; surfaced only as a warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub field: Field,
    pub kind: ViolationKind,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_card_schema_is_complete() {
        let schema = FieldSchema::card();
        assert!(schema.check().is_ok());
        assert_eq!(schema.iter().count(), Field::ALL.len());
        for (index, spec) in schema.iter().enumerate() {
            assert_eq!(spec.field, Field::ALL[index]);
        }
        assert!((schema.total_weight() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let mut specs = CARD_FIELDS.to_vec();
        specs.push(CARD_FIELDS[0]);
        assert!(FieldSchema::from_specs(specs).is_err());

        let orphaned = CARD_FIELDS[1..].to_vec();
        assert!(FieldSchema::from_specs(orphaned).is_err());
    }

    #[test]
    fn test_required_fields() {
        let required: Vec<Field> = FieldSchema::card().required().collect();
        assert_eq!(required, vec![Field::Name, Field::CardNumber, Field::Illustrator]);
    }

    #[test]
    fn test_keys_round_trip() {
        for field in Field::ALL {
            assert_eq!(Field::from_key(field.wire_key()), Some(field));
            assert_eq!(Field::from_key(field.as_str()), Some(field));
        }
        assert_eq!(Field::from_key("flavorText"), None);
    }

    #[test]
    fn test_vocabulary_canonicalize() {
        assert_eq!(Vocabulary::EnergyType.canonicalize("fire"), Some("Fire"));
        assert_eq!(Vocabulary::EnergyType.canonicalize(" LIGHTNING "), Some("Lightning"));
        assert_eq!(Vocabulary::Stage.canonicalize("stage1"), Some("Stage 1"));
        assert_eq!(Vocabulary::Stage.canonicalize("break"), Some("BREAK"));
        assert_eq!(Vocabulary::EnergyType.canonicalize("Plasma"), None);
        assert_eq!(Vocabulary::Stage.canonicalize(""), None);
    }

    #[test]
    fn test_coerce_text() {
        let schema = FieldSchema::card();
        assert_eq!(schema.coerce_text(Field::Hp, "70"), FieldValue::Integer(70));
        assert_eq!(schema.coerce_text(Field::Hp, "1200"), FieldValue::Empty);
        assert_eq!(schema.coerce_text(Field::Hp, "7O"), FieldValue::Empty);
        assert_eq!(
            schema.coerce_text(Field::Retreat, "colorless / Colorless"),
            FieldValue::Tokens(vec!["Colorless".into(), "Colorless".into()])
        );
        assert_eq!(
            schema.coerce_text(Field::Stage, "stage 2"),
            FieldValue::Token("Stage 2".into())
        );
        assert_eq!(schema.coerce_text(Field::Name, ""), FieldValue::Text(String::new()));
    }
}
