//! Payload isolation, schema validation, and automatic repair.
//!
//! Every field is routed through exactly one [`FieldOutcome`]; nothing
//! leaves this module without having been checked against the schema.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::MalformedResponseError;
use crate::models::card::{Attack, FieldValue};
use crate::schema::{Field, FieldKind, FieldSchema, SchemaViolation, Vocabulary, ViolationKind};

use super::CONFIDENCE_KEY;

/// Result of checking one field against its declared kind.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome {
    /// Structurally valid as sent.
    Valid(FieldValue),
    /// Fixed by one of the known repair rules.
    Repaired {
        value: FieldValue,
        kind: ViolationKind,
    },
    /// No repair rule applies; the field is dropped.
    Unrepairable(ViolationKind),
}

/// A validated remote payload, ready for merging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedPayload {
    pub fields: BTreeMap<Field, FieldValue>,
    /// Repaired confidence per field.
    pub confidence: BTreeMap<Field, f32>,
    /// Violations fixed automatically.
    pub repaired: Vec<SchemaViolation>,
    /// Violations left unrepaired (their fields were dropped).
    pub unrepaired: Vec<SchemaViolation>,
    /// Enumerated values kept as sent because they matched no vocabulary token.
    pub unknown_tokens: Vec<(Field, String)>,
    /// Keys outside the schema, dropped.
    pub dropped_keys: Vec<String>,
}

/// Strip code fences and surrounding prose, then parse the JSON object.
pub fn isolate_json(text: &str) -> Result<Map<String, Value>, MalformedResponseError> {
    let trimmed = text.trim();
    let unfenced: String = if trimmed.starts_with("```") {
        trimmed
            .lines()
            .filter(|line| !line.trim_start().starts_with("```"))
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        trimmed.to_string()
    };

    match serde_json::from_str::<Value>(unfenced.trim()) {
        Ok(Value::Object(map)) => return Ok(map),
        Ok(other) => return Err(MalformedResponseError::NotAnObject(json_type(&other).to_string())),
        Err(_) => {}
    }

    // First complete object embedded in prose; later braces are ignored.
    let mut first_error = None;
    for (start, _) in unfenced.match_indices('{') {
        let mut stream = serde_json::Deserializer::from_str(&unfenced[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Object(map))) => return Ok(map),
            Some(Err(e)) if first_error.is_none() => first_error = Some(e.to_string()),
            _ => {}
        }
    }

    Err(MalformedResponseError::NoJsonObject(
        first_error.unwrap_or_else(|| preview(text)),
    ))
}

/// Validate every key of the object against the schema, repairing what can be repaired.
pub fn validate_payload(schema: &FieldSchema, object: &Map<String, Value>) -> ValidatedPayload {
    let mut payload = ValidatedPayload::default();

    for (key, value) in object {
        if key == CONFIDENCE_KEY {
            continue;
        }
        let Some(field) = Field::from_key(key) else {
            debug!(key = %key, "Dropping key outside the schema");
            payload.dropped_keys.push(key.clone());
            continue;
        };

        let mut unknown = Vec::new();
        match validate_field(schema.spec(field).kind, value, &mut unknown) {
            FieldOutcome::Valid(v) => {
                payload.fields.insert(field, v);
            }
            FieldOutcome::Repaired { value, kind } => {
                payload.repaired.push(SchemaViolation { field, kind });
                payload.fields.insert(field, value);
            }
            FieldOutcome::Unrepairable(kind) => {
                payload.unrepaired.push(SchemaViolation { field, kind });
                continue;
            }
        }
        payload
            .unknown_tokens
            .extend(unknown.into_iter().map(|token| (field, token)));
    }

    payload.confidence = repair_confidence(object.get(CONFIDENCE_KEY));
    payload
}

/// Check one value against a field kind.
///
/// Unknown enumerated tokens are pushed to `unknown` and kept as sent.
pub fn validate_field(kind: FieldKind, value: &Value, unknown: &mut Vec<String>) -> FieldOutcome {
    if is_blank(value) {
        return FieldOutcome::Repaired {
            value: kind.default_value(),
            kind: ViolationKind::Null,
        };
    }

    match kind {
        FieldKind::Text => match value {
            Value::String(s) => FieldOutcome::Valid(FieldValue::Text(s.clone())),
            Value::Number(n) => coerced(FieldValue::Text(n.to_string())),
            Value::Bool(b) => coerced(FieldValue::Text(b.to_string())),
            Value::Array(items) => match join_text_items(items) {
                Some(text) => coerced(FieldValue::Text(text)),
                None => FieldOutcome::Unrepairable(ViolationKind::WrongType),
            },
            _ => FieldOutcome::Unrepairable(ViolationKind::WrongType),
        },

        FieldKind::Integer { min, max } => {
            let (number, repaired) = match value {
                Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                    (Some(i), _) => (i, false),
                    (None, Some(f)) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                        (f as i64, true)
                    }
                    _ => return FieldOutcome::Unrepairable(ViolationKind::WrongType),
                },
                Value::String(s) => match s.trim().parse::<i64>() {
                    Ok(i) => (i, true),
                    Err(_) => return FieldOutcome::Unrepairable(ViolationKind::WrongType),
                },
                _ => return FieldOutcome::Unrepairable(ViolationKind::WrongType),
            };
            if !(min..=max).contains(&number) {
                return FieldOutcome::Unrepairable(ViolationKind::OutOfRange);
            }
            if repaired {
                coerced(FieldValue::Integer(number))
            } else {
                FieldOutcome::Valid(FieldValue::Integer(number))
            }
        }

        FieldKind::Token(vocab) => match scalar_text(value) {
            Some((raw, repaired)) => {
                let token = canonical(vocab, raw.trim(), unknown);
                if repaired {
                    coerced(FieldValue::Token(token))
                } else {
                    FieldOutcome::Valid(FieldValue::Token(token))
                }
            }
            None => FieldOutcome::Unrepairable(ViolationKind::WrongType),
        },

        FieldKind::TokenList(vocab) => match value {
            Value::Array(items) => {
                let mut tokens = Vec::with_capacity(items.len());
                let mut repaired = false;
                for item in items {
                    match scalar_text(item) {
                        Some((raw, was_coerced)) => {
                            repaired |= was_coerced;
                            tokens.push(canonical(vocab, raw.trim(), unknown));
                        }
                        None if item.is_null() => repaired = true,
                        None => return FieldOutcome::Unrepairable(ViolationKind::WrongType),
                    }
                }
                if repaired {
                    coerced(FieldValue::Tokens(tokens))
                } else {
                    FieldOutcome::Valid(FieldValue::Tokens(tokens))
                }
            }
            Value::String(s) => coerced(FieldValue::Tokens(
                s.split(['/', ',', '|'])
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(|t| canonical(vocab, t, unknown))
                    .collect(),
            )),
            _ => FieldOutcome::Unrepairable(ViolationKind::WrongType),
        },

        FieldKind::Attacks => {
            let (entries, mut repaired) = match value {
                Value::Array(items) => (items.iter().collect::<Vec<_>>(), false),
                Value::Object(_) => (vec![value], true),
                _ => return FieldOutcome::Unrepairable(ViolationKind::WrongType),
            };
            let mut attacks = Vec::with_capacity(entries.len());
            for entry in entries {
                match parse_attack(entry, unknown) {
                    Some((attack, was_coerced)) => {
                        repaired |= was_coerced;
                        attacks.push(attack);
                    }
                    None => return FieldOutcome::Unrepairable(ViolationKind::MalformedEntry),
                }
            }
            if repaired {
                coerced(FieldValue::Attacks(attacks))
            } else {
                FieldOutcome::Valid(FieldValue::Attacks(attacks))
            }
        }
    }
}

/// Repair the per-field confidence sub-object.
///
/// Numbers clamp to [0, 1]; nested objects average their numeric members;
/// anything else becomes 0.0. A non-object is discarded.
pub fn repair_confidence(value: Option<&Value>) -> BTreeMap<Field, f32> {
    let Some(Value::Object(map)) = value else {
        return BTreeMap::new();
    };

    map.iter()
        .filter_map(|(key, v)| {
            let field = Field::from_key(key)?;
            let score = match v {
                Value::Number(n) => n.as_f64().unwrap_or(0.0),
                Value::Object(nested) => {
                    let numbers: Vec<f64> = nested.values().filter_map(Value::as_f64).collect();
                    if numbers.is_empty() {
                        0.0
                    } else {
                        numbers.iter().sum::<f64>() / numbers.len() as f64
                    }
                }
                _ => 0.0,
            };
            Some((field, score.clamp(0.0, 1.0) as f32))
        })
        .collect()
}

fn coerced(value: FieldValue) -> FieldOutcome {
    FieldOutcome::Repaired {
        value,
        kind: ViolationKind::CoercibleType,
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// String form of a scalar; the flag marks a type conversion.
fn scalar_text(value: &Value) -> Option<(String, bool)> {
    match value {
        Value::String(s) => Some((s.clone(), false)),
        Value::Number(n) => Some((n.to_string(), true)),
        _ => None,
    }
}

fn canonical(vocab: Vocabulary, raw: &str, unknown: &mut Vec<String>) -> String {
    match vocab.canonicalize(raw) {
        Some(token) => token.to_string(),
        None => {
            unknown.push(raw.to_string());
            raw.to_string()
        }
    }
}

/// Join a list of strings or `{type, value}` objects into display text.
fn join_text_items(items: &[Value]) -> Option<String> {
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(s) => parts.push(s.trim().to_string()),
            Value::Number(n) => parts.push(n.to_string()),
            Value::Object(obj) => {
                let piece = ["type", "value"]
                    .iter()
                    .filter_map(|k| obj.get(*k).and_then(|v| scalar_text(v)).map(|(s, _)| s))
                    .collect::<Vec<_>>()
                    .join(" ");
                if piece.trim().is_empty() {
                    return None;
                }
                parts.push(piece.trim().to_string());
            }
            Value::Null => {}
            _ => return None,
        }
    }
    Some(parts.join(" | "))
}

/// Parse one attack entry; `None` when it lacks a name or has the wrong shape.
fn parse_attack(entry: &Value, unknown: &mut Vec<String>) -> Option<(Attack, bool)> {
    let Value::Object(obj) = entry else {
        return None;
    };
    let name = obj.get("name")?.as_str()?.trim().to_string();
    if name.is_empty() {
        return None;
    }

    let mut repaired = false;
    let cost = match obj.get("cost") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => {
            let mut cost = Vec::with_capacity(items.len());
            for item in items {
                let symbol = item.as_str()?;
                cost.push(canonical(Vocabulary::EnergyType, symbol.trim(), unknown));
            }
            cost
        }
        Some(Value::String(s)) => {
            repaired = true;
            s.split(['/', ',', '|'])
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(|t| canonical(Vocabulary::EnergyType, t, unknown))
                .collect()
        }
        Some(_) => return None,
    };

    let mut text_of = |key: &str| -> Option<String> {
        match obj.get(key) {
            None | Some(Value::Null) => Some(String::new()),
            Some(Value::String(s)) => Some(s.trim().to_string()),
            Some(Value::Number(n)) => {
                repaired = true;
                Some(n.to_string())
            }
            Some(_) => None,
        }
    };
    let damage = text_of("damage")?;
    let text = text_of("text")?;

    Some((
        Attack {
            name,
            cost,
            damage,
            text,
        },
        repaired,
    ))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn preview(text: &str) -> String {
    text.chars().take(80).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test payload must be an object"),
        }
    }

    #[test]
    fn test_isolate_fenced_json() {
        let map = isolate_json("```json\n{\"name\": \"Charizard\"}\n```").unwrap();
        assert_eq!(map.get("name"), Some(&json!("Charizard")));
    }

    #[test]
    fn test_isolate_json_in_prose() {
        let map = isolate_json("Sure! Here is the card:\n{\"hp\": 180}\nLet me know.").unwrap();
        assert_eq!(map.get("hp"), Some(&json!(180)));
    }

    #[test]
    fn test_isolate_json_followed_by_braced_prose() {
        let map = isolate_json(
            "Here you go: {\"name\": \"Mew\"} (values in {braces} are guesses)",
        )
        .unwrap();
        assert_eq!(map.get("name"), Some(&json!("Mew")));
    }

    #[test]
    fn test_isolate_skips_braces_before_object() {
        let map = isolate_json("Fields {see below}: {\"hp\": 60}").unwrap();
        assert_eq!(map.get("hp"), Some(&json!(60)));
    }

    #[test]
    fn test_isolate_failures() {
        assert!(matches!(
            isolate_json("I cannot read this card."),
            Err(MalformedResponseError::NoJsonObject(_))
        ));
        assert!(matches!(
            isolate_json("[1, 2, 3]"),
            Err(MalformedResponseError::NotAnObject(_))
        ));
        assert!(matches!(
            isolate_json("{\"name\": \"Char"),
            Err(MalformedResponseError::NoJsonObject(_))
        ));
    }

    #[test]
    fn test_valid_payload() {
        let payload = validate_payload(
            &FieldSchema::card(),
            &object(json!({
                "name": "Charizard",
                "hp": 180,
                "stage": "Stage 2",
                "types": ["Fire"],
                "_confidence": {"hp": 0.95, "name": 0.99}
            })),
        );
        assert_eq!(payload.fields[&Field::Hp], FieldValue::Integer(180));
        assert_eq!(payload.fields[&Field::Stage], FieldValue::Token("Stage 2".into()));
        assert_eq!(payload.confidence[&Field::Hp], 0.95);
        assert!(payload.repaired.is_empty());
        assert!(payload.unrepaired.is_empty());
    }

    #[test]
    fn test_repairs() {
        let payload = validate_payload(
            &FieldSchema::card(),
            &object(json!({
                "hp": "70",
                "name": null,
                "number": 4,
                "retreatCost": "Colorless",
                "flavorText": "A fiery beast."
            })),
        );
        assert_eq!(payload.fields[&Field::Hp], FieldValue::Integer(70));
        assert_eq!(payload.fields[&Field::Name], FieldValue::Text(String::new()));
        assert_eq!(payload.fields[&Field::CardNumber], FieldValue::Text("4".into()));
        assert_eq!(
            payload.fields[&Field::Retreat],
            FieldValue::Tokens(vec!["Colorless".into()])
        );
        assert_eq!(payload.dropped_keys, vec!["flavorText".to_string()]);
        assert_eq!(payload.repaired.len(), 4);
        assert!(payload.unrepaired.is_empty());
    }

    #[test]
    fn test_null_hp_repairs_to_empty() {
        let payload = validate_payload(&FieldSchema::card(), &object(json!({"hp": null})));
        assert_eq!(payload.fields[&Field::Hp], FieldValue::Empty);
        assert_eq!(
            payload.repaired,
            vec![SchemaViolation { field: Field::Hp, kind: ViolationKind::Null }]
        );
    }

    #[test]
    fn test_unrepairable_fields_are_dropped() {
        let payload = validate_payload(
            &FieldSchema::card(),
            &object(json!({
                "name": "Pikachu",
                "hp": 4000,
                "illustrator": {"first": "Atsuko"},
                "attacks": [{"cost": ["Lightning"], "damage": "30"}]
            })),
        );
        assert_eq!(payload.fields.len(), 1);
        let kinds: Vec<(Field, ViolationKind)> =
            payload.unrepaired.iter().map(|v| (v.field, v.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (Field::Attacks, ViolationKind::MalformedEntry),
                (Field::Hp, ViolationKind::OutOfRange),
                (Field::Illustrator, ViolationKind::WrongType),
            ]
        );
    }

    #[test]
    fn test_unknown_tokens_are_kept_and_flagged() {
        let payload = validate_payload(
            &FieldSchema::card(),
            &object(json!({"types": ["fire", "Plasma"], "stage": "stage1"})),
        );
        assert_eq!(
            payload.fields[&Field::Types],
            FieldValue::Tokens(vec!["Fire".into(), "Plasma".into()])
        );
        assert_eq!(payload.fields[&Field::Stage], FieldValue::Token("Stage 1".into()));
        assert_eq!(payload.unknown_tokens, vec![(Field::Types, "Plasma".to_string())]);
    }

    #[test]
    fn test_attacks() {
        let payload = validate_payload(
            &FieldSchema::card(),
            &object(json!({"attacks": [
                {"name": "Flare Blitz", "cost": ["fire", "Fire"], "damage": 120, "text": null}
            ]})),
        );
        assert_eq!(
            payload.fields[&Field::Attacks],
            FieldValue::Attacks(vec![Attack {
                name: "Flare Blitz".into(),
                cost: vec!["Fire".into(), "Fire".into()],
                damage: "120".into(),
                text: String::new(),
            }])
        );
        assert_eq!(payload.repaired[0].kind, ViolationKind::CoercibleType);
    }

    #[test]
    fn test_weakness_list_joined() {
        let payload = validate_payload(
            &FieldSchema::card(),
            &object(json!({"weakness": [{"type": "Water", "value": "×2"}]})),
        );
        assert_eq!(payload.fields[&Field::Weakness], FieldValue::Text("Water ×2".into()));
    }

    #[test]
    fn test_confidence_repair() {
        let confidence = repair_confidence(Some(&json!({
            "hp": 1.7,
            "name": {"first": 0.8, "second": 0.6},
            "number": "high",
            "bogus": 0.9
        })));
        assert_eq!(confidence[&Field::Hp], 1.0);
        assert!((confidence[&Field::Name] - 0.7).abs() < 1e-6);
        assert_eq!(confidence[&Field::CardNumber], 0.0);
        assert_eq!(confidence.len(), 3);
        assert!(repair_confidence(Some(&json!([0.5]))).is_empty());
        assert!(repair_confidence(None).is_empty());
    }
}
