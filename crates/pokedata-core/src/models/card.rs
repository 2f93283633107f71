//! Card data models: extracted values, extraction results, and the reconciled record.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::schema::{Field, SchemaViolation};

/// One attack line on a creature card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attack {
    /// Attack name as printed.
    pub name: String,

    /// Energy cost, canonical energy tokens.
    #[serde(default)]
    pub cost: Vec<String>,

    /// Damage as printed ("120+", "30×", or empty).
    #[serde(default)]
    pub damage: String,

    /// Effect text.
    #[serde(default)]
    pub text: String,
}

impl Attack {
    /// Render as `name :: cost :: damage :: text`, skipping empty parts.
    pub fn summary(&self) -> String {
        let cost = self.cost.join("/");
        [self.name.as_str(), cost.as_str(), self.damage.as_str(), self.text.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" :: ")
    }
}

/// A single field value, typed by the field schema.
///
/// `Empty` means "attempted, found nothing"; a field that was never
/// attempted is simply absent from its [`ExtractionResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Empty,
    Integer(i64),
    Text(String),
    Token(String),
    Tokens(Vec<String>),
    Attacks(Vec<Attack>),
}

impl FieldValue {
    /// True for `Empty`, blank strings and empty lists.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Integer(_) => false,
            FieldValue::Text(s) | FieldValue::Token(s) => s.trim().is_empty(),
            FieldValue::Tokens(items) => items.is_empty(),
            FieldValue::Attacks(items) => items.is_empty(),
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) | FieldValue::Token(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_attacks(&self) -> &[Attack] {
        match self {
            FieldValue::Attacks(items) => items,
            _ => &[],
        }
    }

    /// Flat, human-readable rendering used for CSV and text output.
    pub fn to_plain(&self) -> String {
        match self {
            FieldValue::Empty => String::new(),
            FieldValue::Integer(n) => n.to_string(),
            FieldValue::Text(s) | FieldValue::Token(s) => s.clone(),
            FieldValue::Tokens(items) => items.join(" / "),
            FieldValue::Attacks(items) => items
                .iter()
                .map(Attack::summary)
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }
}

/// Which extractor produced a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Remote,
    Local,
}

/// Where a reconciled field's final value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Remote,
    Local,
    Default,
}

/// A field value together with its origin and confidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldReading {
    pub value: FieldValue,
    pub source: Source,
    /// Only defined for remote readings whose confidence the service reported.
    pub confidence: Option<f32>,
}

impl FieldReading {
    pub fn remote(value: FieldValue, confidence: Option<f32>) -> Self {
        Self {
            value,
            source: Source::Remote,
            confidence,
        }
    }

    pub fn local(value: FieldValue) -> Self {
        Self {
            value,
            source: Source::Local,
            confidence: None,
        }
    }
}

/// Output of either extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionResult {
    /// Attempted fields. Absent keys were never attempted.
    pub fields: BTreeMap<Field, FieldReading>,
    /// Recoverable problems met while extracting.
    pub warnings: Vec<Warning>,
    /// Recognized text the fields were read from (local extraction only).
    #[serde(skip_serializing_if = "String::is_empty")]
    pub raw_text: String,
}

impl ExtractionResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: Field, reading: FieldReading) {
        self.fields.insert(field, reading);
    }

    pub fn get(&self, field: Field) -> Option<&FieldReading> {
        self.fields.get(&field)
    }

    pub fn value(&self, field: Field) -> Option<&FieldValue> {
        self.fields.get(&field).map(|r| &r.value)
    }

    /// Present with a non-empty value.
    pub fn has_value(&self, field: Field) -> bool {
        self.value(field).is_some_and(|v| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Structural card class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CardClass {
    Creature,
    NonCreature,
    Energy,
    Unknown,
}

impl CardClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardClass::Creature => "creature",
            CardClass::NonCreature => "non-creature",
            CardClass::Energy => "energy",
            CardClass::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CardClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured warning codes carried on records and extraction results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Remote extraction did not contribute; the reason is a short code.
    RemoteUnavailable(&'static str),
    FallbackUsed(Field),
    FallbackSuggested(Field),
    MissingRequired(Field),
    ClassificationConflict(Field),
    /// `unknown` classification; the card needs human review.
    ClassificationUnknown,
    SchemaViolation(SchemaViolation),
    UnknownToken { field: Field, value: String },
    LocalOcrUnavailable,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::RemoteUnavailable(reason) => write!(f, "remote_unavailable:{reason}"),
            Warning::FallbackUsed(field) => write!(f, "fallback_used:{field}"),
            Warning::FallbackSuggested(field) => write!(f, "fallback_suggested:{field}"),
            Warning::MissingRequired(field) => write!(f, "missing_required:{field}"),
            Warning::ClassificationConflict(field) => {
                write!(f, "classification_conflict:{field}")
            }
            Warning::ClassificationUnknown => f.write_str("classification_unknown"),
            Warning::SchemaViolation(v) => {
                write!(f, "schema_violation:{}:{}", v.field, v.kind.code())
            }
            Warning::UnknownToken { field, value } => write!(f, "unknown_token:{field}:{value}"),
            Warning::LocalOcrUnavailable => f.write_str("local_ocr_unavailable"),
        }
    }
}

impl Serialize for Warning {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Final, immutable output for one card image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledRecord {
    fields: BTreeMap<Field, FieldValue>,
    classification: CardClass,
    provenance: BTreeMap<Field, Provenance>,
    confidence: BTreeMap<Field, Option<f32>>,
    quality_score: f64,
    warnings: Vec<Warning>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    suggestions: BTreeMap<Field, FieldValue>,
}

impl ReconciledRecord {
    pub(crate) fn new(
        fields: BTreeMap<Field, FieldValue>,
        classification: CardClass,
        provenance: BTreeMap<Field, Provenance>,
        confidence: BTreeMap<Field, Option<f32>>,
        quality_score: f64,
        warnings: Vec<Warning>,
        suggestions: BTreeMap<Field, FieldValue>,
    ) -> Self {
        Self {
            fields,
            classification,
            provenance,
            confidence,
            quality_score,
            warnings,
            suggestions,
        }
    }

    pub fn fields(&self) -> &BTreeMap<Field, FieldValue> {
        &self.fields
    }

    pub fn value(&self, field: Field) -> &FieldValue {
        self.fields.get(&field).unwrap_or(&FieldValue::Empty)
    }

    pub fn provenance(&self, field: Field) -> Provenance {
        self.provenance
            .get(&field)
            .copied()
            .unwrap_or(Provenance::Default)
    }

    pub fn confidence(&self, field: Field) -> Option<f32> {
        self.confidence.get(&field).copied().flatten()
    }

    pub fn classification(&self) -> CardClass {
        self.classification
    }

    pub fn quality_score(&self) -> f64 {
        self.quality_score
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Warning codes as strings, in emission order.
    pub fn warning_codes(&self) -> Vec<String> {
        self.warnings.iter().map(ToString::to_string).collect()
    }

    pub fn has_warning(&self, code: &str) -> bool {
        self.warnings.iter().any(|w| w.to_string() == code)
    }

    /// Local values recorded but not applied under the `suggest` policy.
    pub fn suggestions(&self) -> &BTreeMap<Field, FieldValue> {
        &self.suggestions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_values() {
        assert!(FieldValue::Empty.is_empty());
        assert!(FieldValue::Text("  ".into()).is_empty());
        assert!(FieldValue::Tokens(vec![]).is_empty());
        assert!(!FieldValue::Integer(0).is_empty());
        assert!(!FieldValue::Token("Fire".into()).is_empty());
    }

    #[test]
    fn test_value_serializes_untagged() {
        let json = serde_json::to_string(&vec![
            FieldValue::Empty,
            FieldValue::Integer(180),
            FieldValue::Text("Charizard".into()),
            FieldValue::Tokens(vec!["Fire".into()]),
        ])
        .unwrap();
        assert_eq!(json, r#"[null,180,"Charizard",["Fire"]]"#);
    }

    #[test]
    fn test_attack_plain_rendering() {
        let value = FieldValue::Attacks(vec![
            Attack {
                name: "Flare Blitz".into(),
                cost: vec!["Fire".into(), "Fire".into()],
                damage: "120+".into(),
                text: String::new(),
            },
            Attack {
                name: "Scratch".into(),
                damage: "20".into(),
                ..Attack::default()
            },
        ]);
        assert_eq!(value.to_plain(), "Flare Blitz :: Fire/Fire :: 120+ | Scratch :: 20");
    }

    #[test]
    fn test_warning_codes() {
        assert_eq!(Warning::FallbackUsed(Field::Hp).to_string(), "fallback_used:hp");
        assert_eq!(
            Warning::MissingRequired(Field::CardNumber).to_string(),
            "missing_required:card_number"
        );
        assert_eq!(
            Warning::RemoteUnavailable("timeout").to_string(),
            "remote_unavailable:timeout"
        );
        assert_eq!(
            serde_json::to_string(&Warning::ClassificationUnknown).unwrap(),
            r#""classification_unknown""#
        );
    }
}
