//! Field-level merge of remote and local extraction results.
//!
//! Everything here is pure: the same inputs always give the same record.

use std::collections::BTreeMap;

use tracing::{debug, info};
use unicode_normalization::UnicodeNormalization;

use crate::classify::CardClassifier;
use crate::error::RemoteError;
use crate::models::card::{
    Attack, CardClass, ExtractionResult, FieldValue, Provenance, ReconciledRecord, Warning,
};
use crate::models::config::{FallbackPolicy, ReconcileOptions};
use crate::schema::{ClassScope, Field, FieldSchema, FieldSpec};

use super::PipelineStage;

/// Remote confidence at or above which a remote field scores full marks.
pub const HIGH_CONFIDENCE: f32 = 0.9;

/// Quality credit for weak remote or local values.
pub const PARTIAL_CREDIT: f64 = 0.5;

/// Outcome of the remote stage for one card.
#[derive(Debug)]
pub enum RemoteAttempt {
    Success(ExtractionResult),
    Failed(RemoteError),
    /// Administratively switched off; treated as an immediate failure.
    Disabled,
}

impl RemoteAttempt {
    pub fn result(&self) -> Option<&ExtractionResult> {
        match self {
            RemoteAttempt::Success(result) => Some(result),
            RemoteAttempt::Failed(_) | RemoteAttempt::Disabled => None,
        }
    }

    /// Reason code for the `remote_unavailable` warning.
    pub fn unavailable_reason(&self) -> Option<&'static str> {
        match self {
            RemoteAttempt::Success(_) => None,
            RemoteAttempt::Failed(e) => Some(e.reason_code()),
            RemoteAttempt::Disabled => Some("disabled"),
        }
    }
}

/// Final decision for one field.
#[derive(Debug, Clone, PartialEq)]
struct Decision {
    value: FieldValue,
    provenance: Provenance,
    /// Confidence as reported by the service; never invented.
    confidence: Option<f32>,
    /// Score used for thresholds and quality credit.
    score: f32,
}

/// Merges the two extraction results into a reconciled record.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    schema: FieldSchema,
    classifier: CardClassifier,
}

impl Reconciler {
    pub fn new(schema: FieldSchema) -> Self {
        Self {
            schema,
            classifier: CardClassifier::new(),
        }
    }

    /// Classify, merge and normalize. Expects both extractors to have run.
    pub fn reconcile(
        &self,
        remote: &RemoteAttempt,
        local: &ExtractionResult,
        options: &ReconcileOptions,
    ) -> ReconciledRecord {
        let remote_result = remote.result();
        let mut warnings = Vec::new();

        if let Some(reason) = remote.unavailable_reason() {
            warnings.push(Warning::RemoteUnavailable(reason));
        }
        if let Some(result) = remote_result {
            warnings.extend(result.warnings.iter().cloned());
        }
        warnings.extend(local.warnings.iter().cloned());

        let mut fields = BTreeMap::new();
        let mut provenance = BTreeMap::new();
        let mut confidence = BTreeMap::new();
        let mut scores = BTreeMap::new();
        let mut suggestions = BTreeMap::new();

        for spec in self.schema.iter() {
            let decision =
                self.decide(spec, remote_result, local, options, &mut warnings, &mut suggestions);
            fields.insert(spec.field, decision.value);
            provenance.insert(spec.field, decision.provenance);
            confidence.insert(spec.field, decision.confidence);
            scores.insert(spec.field, decision.score);
        }

        let class = self.classifier.classify(&fields, &local.raw_text);
        let mut stage = PipelineStage::LocalAttempted.advance();
        debug!(%stage, class = %class, "Card classified");

        match class {
            CardClass::NonCreature | CardClass::Energy => {
                for spec in self.schema.iter() {
                    let present = fields.get(&spec.field).is_some_and(|v| !v.is_empty());
                    if spec.scope == ClassScope::CreatureOnly && present {
                        warnings.push(Warning::ClassificationConflict(spec.field));
                    }
                }
            }
            CardClass::Unknown => warnings.push(Warning::ClassificationUnknown),
            CardClass::Creature => {}
        }

        let quality = self.quality_score(&provenance, &scores);
        stage = stage.advance();
        debug!(%stage, quality, "Fields merged");

        for value in fields.values_mut().chain(suggestions.values_mut()) {
            normalize_value(value);
        }
        stage = stage.advance();

        info!(
            %stage,
            class = %class,
            quality,
            warnings = warnings.len(),
            "Card reconciled"
        );

        ReconciledRecord::new(fields, class, provenance, confidence, quality, warnings, suggestions)
    }

    fn decide(
        &self,
        spec: &FieldSpec,
        remote: Option<&ExtractionResult>,
        local: &ExtractionResult,
        options: &ReconcileOptions,
        warnings: &mut Vec<Warning>,
        suggestions: &mut BTreeMap<Field, FieldValue>,
    ) -> Decision {
        let field = spec.field;
        let remote = remote
            .and_then(|r| r.get(field))
            .filter(|reading| !reading.value.is_empty())
            .map(|reading| {
                let score = reading.confidence.unwrap_or(options.unknown_confidence);
                (reading.value.clone(), reading.confidence, score)
            });

        if let Some((value, reported, score)) = &remote {
            if *score >= options.remote_confidence_threshold {
                return Decision {
                    value: value.clone(),
                    provenance: Provenance::Remote,
                    confidence: *reported,
                    score: *score,
                };
            }
        }

        if let Some(local_value) = local.value(field).filter(|v| !v.is_empty()) {
            match options.fallback_policy {
                FallbackPolicy::Substitute => {
                    debug!(%field, "Falling back to local value");
                    warnings.push(Warning::FallbackUsed(field));
                    return Decision {
                        value: local_value.clone(),
                        provenance: Provenance::Local,
                        confidence: None,
                        score: 0.0,
                    };
                }
                FallbackPolicy::Suggest => {
                    debug!(%field, "Recording local value as a suggestion");
                    warnings.push(Warning::FallbackSuggested(field));
                    suggestions.insert(field, local_value.clone());
                }
            }
        }

        // Low-confidence remote value with no local substitute is still the only evidence.
        if let Some((value, reported, score)) = remote {
            return Decision {
                value,
                provenance: Provenance::Remote,
                confidence: reported,
                score,
            };
        }

        if spec.required {
            warnings.push(Warning::MissingRequired(field));
        }
        Decision {
            value: spec.kind.default_value(),
            provenance: Provenance::Default,
            confidence: None,
            score: 0.0,
        }
    }

    /// Weighted share of field credit, in [0, 1]. Remote scores already
    /// carry the unknown-confidence default.
    pub fn quality_score(
        &self,
        provenance: &BTreeMap<Field, Provenance>,
        scores: &BTreeMap<Field, f32>,
    ) -> f64 {
        let total = self.schema.total_weight();
        if total <= 0.0 {
            return 0.0;
        }

        let earned: f64 = self
            .schema
            .iter()
            .map(|spec| {
                let credit = match provenance.get(&spec.field) {
                    Some(Provenance::Remote) => {
                        let score = scores.get(&spec.field).copied().unwrap_or(0.0);
                        if score >= HIGH_CONFIDENCE { 1.0 } else { PARTIAL_CREDIT }
                    }
                    Some(Provenance::Local) => PARTIAL_CREDIT,
                    Some(Provenance::Default) | None => 0.0,
                };
                spec.weight * credit
            })
            .sum();

        (earned / total).clamp(0.0, 1.0)
    }
}

/// NFC-normalize, trim and collapse whitespace in every string of a value.
pub fn normalize_value(value: &mut FieldValue) {
    match value {
        FieldValue::Empty | FieldValue::Integer(_) => {}
        FieldValue::Text(s) | FieldValue::Token(s) => *s = normalize_text(s),
        FieldValue::Tokens(items) => {
            for item in items.iter_mut() {
                *item = normalize_text(item);
            }
            items.retain(|item| !item.is_empty());
        }
        FieldValue::Attacks(attacks) => {
            for attack in attacks.iter_mut() {
                normalize_attack(attack);
            }
        }
    }
}

fn normalize_attack(attack: &mut Attack) {
    attack.name = normalize_text(&attack.name);
    attack.damage = normalize_text(&attack.damage);
    attack.text = normalize_text(&attack.text);
    for symbol in attack.cost.iter_mut() {
        *symbol = normalize_text(symbol);
    }
}

pub fn normalize_text(text: &str) -> String {
    text.nfc()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
