//! Structural card classification.
//!
//! Rules run in a fixed order and the first match wins:
//!
//! 1. energy keyword in the name and no HP → [`CardClass::Energy`]
//! 2. HP or at least one attack → [`CardClass::Creature`], unless the name
//!    is a tool/technical-machine name
//! 3. supporter/stadium/tool/item/trainer keyword → [`CardClass::NonCreature`]
//! 4. otherwise → [`CardClass::Unknown`]
//!
//! Keyword evidence is only consulted after positive evidence has failed.

use std::collections::BTreeMap;

use tracing::debug;

use crate::card::rules::patterns::{ENERGY_WORD, NON_CREATURE_KEYWORD, TM_NAME, TOOL_NAME};
use crate::models::card::{CardClass, FieldValue};
use crate::schema::Field;

/// Classifies a card from merged field values and recognized text.
#[derive(Debug, Clone, Copy, Default)]
pub struct CardClassifier;

impl CardClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify one card.
    ///
    /// `text` is any recognized card text; it is only searched for
    /// category keywords.
    pub fn classify(&self, fields: &BTreeMap<Field, FieldValue>, text: &str) -> CardClass {
        let name = fields.get(&Field::Name).and_then(FieldValue::as_str).unwrap_or("");
        let has_hp = fields
            .get(&Field::Hp)
            .and_then(FieldValue::as_integer)
            .is_some_and(|hp| (1..=999).contains(&hp));
        let has_attacks = fields
            .get(&Field::Attacks)
            .is_some_and(|v| !v.as_attacks().is_empty());
        let tool_name = is_tool_name(name);

        let class = if ENERGY_WORD.is_match(name) && !has_hp {
            CardClass::Energy
        } else if (has_hp || has_attacks) && !tool_name {
            CardClass::Creature
        } else if tool_name || NON_CREATURE_KEYWORD.is_match(text) {
            CardClass::NonCreature
        } else {
            CardClass::Unknown
        };

        debug!(
            class = %class,
            has_hp,
            has_attacks,
            tool_name,
            "Classified card"
        );
        class
    }
}

fn is_tool_name(name: &str) -> bool {
    TOOL_NAME.is_match(name) || TM_NAME.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::card::Attack;
    use pretty_assertions::assert_eq;

    fn fields(entries: &[(Field, FieldValue)]) -> BTreeMap<Field, FieldValue> {
        entries.iter().cloned().collect()
    }

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    fn one_attack() -> FieldValue {
        FieldValue::Attacks(vec![Attack {
            name: "Tackle".into(),
            damage: "10".into(),
            ..Attack::default()
        }])
    }

    #[test]
    fn test_energy() {
        let classifier = CardClassifier::new();
        let f = fields(&[(Field::Name, text("Basic Fire Energy"))]);
        assert_eq!(classifier.classify(&f, "Basic Fire Energy"), CardClass::Energy);
    }

    #[test]
    fn test_energy_keyword_with_hp_is_creature() {
        let f = fields(&[
            (Field::Name, text("Energy Lab Golem")),
            (Field::Hp, FieldValue::Integer(120)),
        ]);
        assert_eq!(CardClassifier::new().classify(&f, ""), CardClass::Creature);
    }

    #[test]
    fn test_hp_beats_keyword() {
        let f = fields(&[
            (Field::Name, text("Pikachu")),
            (Field::Hp, FieldValue::Integer(60)),
        ]);
        let class = CardClassifier::new().classify(&f, "Trainer Supporter Stadium Item");
        assert_eq!(class, CardClass::Creature);
    }

    #[test]
    fn test_attacks_alone_are_creature() {
        let f = fields(&[(Field::Name, text("Rattata")), (Field::Attacks, one_attack())]);
        assert_eq!(CardClassifier::new().classify(&f, ""), CardClass::Creature);
    }

    #[test]
    fn test_tool_name_is_never_creature() {
        let f = fields(&[
            (Field::Name, text("Technical Machine: Evolution")),
            (Field::Attacks, one_attack()),
        ]);
        assert_eq!(CardClassifier::new().classify(&f, ""), CardClass::NonCreature);
    }

    #[test]
    fn test_keyword_non_creature() {
        let f = fields(&[(Field::Name, text("Professor's Research"))]);
        assert_eq!(
            CardClassifier::new().classify(&f, "Supporter\nDiscard your hand and draw 7 cards."),
            CardClass::NonCreature
        );
    }

    #[test]
    fn test_unknown() {
        let f = fields(&[(Field::Name, FieldValue::Text(String::new()))]);
        assert_eq!(CardClassifier::new().classify(&f, "blurry"), CardClass::Unknown);
        assert_eq!(CardClassifier::new().classify(&BTreeMap::new(), ""), CardClass::Unknown);
    }
}
