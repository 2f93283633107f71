//! Local rule extractor: OCR plus pattern matching, optionally region-scoped.

use image::DynamicImage;
use tracing::{debug, info, warn};

use crate::models::card::{ExtractionResult, FieldReading, FieldValue, Warning};
use crate::ocr::{
    crop_normalized, enhance_for_ocr, pad_white, CardLayout, LayoutId, LayoutModel, NormBox,
    PageMode, TextRecognizer,
};
use crate::schema::{Field, FieldSchema};

use super::rules::{
    energy_tokens, extract_ability, extract_evolves_from, extract_mechanic, extract_name,
    extract_print_year, extract_set_code, extract_set_code_bare, extract_stage,
    has_trainer_banner, AttackExtractor, CardNumberExtractor, FieldExtractor, HpExtractor,
    IllustratorExtractor, Mechanic,
};

/// Region labels read as dense blocks rather than single lines.
const BLOCK_REGIONS: &[&str] = &["body", "bottom_mechanics", "bottom_meta", "type_line"];

/// Best-effort field extraction from locally recognized text.
///
/// Never fails: a missing or broken recognizer yields an empty result
/// carrying [`Warning::LocalOcrUnavailable`].
pub struct LocalExtractor<R> {
    recognizer: Option<R>,
    schema: FieldSchema,
    layout_model: Option<LayoutModel>,
    hp: HpExtractor,
    number: CardNumberExtractor,
    illustrator: IllustratorExtractor,
    attacks: AttackExtractor,
}

impl<R: TextRecognizer> LocalExtractor<R> {
    /// Create an extractor; `None` means no OCR engine could be loaded.
    pub fn new(recognizer: Option<R>) -> Self {
        Self {
            recognizer,
            schema: FieldSchema::card(),
            layout_model: None,
            hp: HpExtractor::new(),
            number: CardNumberExtractor::new(),
            illustrator: IllustratorExtractor::new(),
            attacks: AttackExtractor::new(),
        }
    }

    /// Use annotated regions instead of the built-in layouts.
    pub fn with_layout_model(mut self, model: Option<LayoutModel>) -> Self {
        self.layout_model = model;
        self
    }

    pub fn is_available(&self) -> bool {
        self.recognizer.is_some()
    }

    /// Extract fields from a card image.
    pub fn extract(&self, image: &DynamicImage, layout_hint: Option<&str>) -> ExtractionResult {
        let Some(recognizer) = &self.recognizer else {
            warn!("Local OCR engine not available, skipping local extraction");
            return unavailable();
        };

        let full = match recognizer.recognize(image, PageMode::UniformBlock) {
            Ok(full) => full,
            Err(e) => {
                warn!(error = %e, engine = recognizer.name(), "Full-image recognition failed");
                return unavailable();
            }
        };
        debug!(
            "Recognized {} chars in {}ms",
            full.text.len(),
            full.processing_time_ms
        );

        let mut result = self.parse_text(&full.text);

        if let Some(layout) = self.select_layout(recognizer, image, layout_hint) {
            let mut overrides = 0;
            for (field, value) in self.read_regions(recognizer, image, &layout) {
                if value.is_empty() {
                    continue;
                }
                if result.value(field) != Some(&value) {
                    debug!(%field, "Crop-scoped value overrides full-image value");
                    overrides += 1;
                }
                result.insert(field, FieldReading::local(value));
            }
            info!(layout = ?layout.id, overrides, "Region pass complete");
        }

        result
    }

    /// Apply the text rules to already recognized text.
    pub fn parse_text(&self, text: &str) -> ExtractionResult {
        let mut result = ExtractionResult::empty();
        result.raw_text = text.to_string();

        self.put(&mut result, Field::Name, extract_name(text));
        self.put(&mut result, Field::Stage, extract_stage(text).map(str::to_string));
        self.put(&mut result, Field::EvolvesFrom, extract_evolves_from(text));
        self.put(
            &mut result,
            Field::Hp,
            self.hp.extract(text).map(|m| m.value.to_string()),
        );

        let (ability_name, ability_text) = extract_ability(text).unzip();
        self.put(&mut result, Field::AbilityName, ability_name);
        self.put(&mut result, Field::AbilityText, ability_text);

        let attacks = self
            .attacks
            .extract_all(text)
            .into_iter()
            .map(|m| m.value)
            .collect();
        result.insert(Field::Attacks, FieldReading::local(FieldValue::Attacks(attacks)));

        self.put(&mut result, Field::Weakness, extract_mechanic(text, Mechanic::Weakness));
        self.put(&mut result, Field::Resistance, extract_mechanic(text, Mechanic::Resistance));
        let retreat = extract_mechanic(text, Mechanic::Retreat)
            .map(|line| energy_tokens(&line))
            .unwrap_or_default();
        result.insert(Field::Retreat, FieldReading::local(FieldValue::Tokens(retreat)));

        self.put(&mut result, Field::CardNumber, self.number.extract(text).map(|m| m.value));
        self.put(&mut result, Field::SetCode, extract_set_code(text));
        self.put(
            &mut result,
            Field::Illustrator,
            self.illustrator.extract(text).map(|m| m.value),
        );
        self.put(
            &mut result,
            Field::PrintYear,
            extract_print_year(text).map(|y| y.to_string()),
        );

        result
    }

    fn put(&self, result: &mut ExtractionResult, field: Field, raw: Option<String>) {
        let value = match raw {
            Some(raw) => self.schema.coerce_text(field, &raw),
            None => self.schema.spec(field).kind.default_value(),
        };
        result.insert(field, FieldReading::local(value));
    }

    /// Layout to crop with: annotated model first, then the hint, then detection.
    fn select_layout(
        &self,
        recognizer: &R,
        image: &DynamicImage,
        layout_hint: Option<&str>,
    ) -> Option<CardLayout> {
        if let Some(model) = &self.layout_model {
            return Some(model.layout().clone());
        }

        let hinted = layout_hint.and_then(|hint| {
            let id = LayoutId::from_hint(hint);
            if id.is_none() {
                warn!(hint, "Unrecognized layout hint, detecting layout instead");
            }
            id.and_then(CardLayout::builtin)
        });

        hinted.or_else(|| self.detect_layout(recognizer, image))
    }

    /// Read the header strip and look for trainer banners.
    fn detect_layout(&self, recognizer: &R, image: &DynamicImage) -> Option<CardLayout> {
        let strip = crop_normalized(image, &NormBox::HEADER_STRIP)?;
        let strip = pad_white(&enhance_for_ocr(&strip), 5);
        match recognizer.recognize(&strip, PageMode::SingleLine) {
            Ok(header) if has_trainer_banner(&header.text) => {
                debug!(header = %header.text, "Detected trainer layout");
                Some(CardLayout::trainer())
            }
            Ok(_) => Some(CardLayout::creature()),
            Err(e) => {
                debug!(error = %e, "Header strip recognition failed, skipping region pass");
                None
            }
        }
    }

    fn read_regions(
        &self,
        recognizer: &R,
        image: &DynamicImage,
        layout: &CardLayout,
    ) -> Vec<(Field, FieldValue)> {
        let mut values = Vec::new();

        for region in &layout.regions {
            let Some(crop) = crop_normalized(image, &region.bbox) else {
                continue;
            };
            let mode = if BLOCK_REGIONS.contains(&region.label.as_str()) {
                PageMode::UniformBlock
            } else {
                PageMode::SingleLine
            };
            match recognizer.recognize(&enhance_for_ocr(&crop), mode) {
                Ok(ocr) if !ocr.text.trim().is_empty() => {
                    values.extend(self.read_region(&region.label, &ocr.text));
                }
                Ok(_) => {}
                Err(e) => debug!(region = %region.label, error = %e, "Region recognition failed"),
            }
        }

        values
    }

    /// Interpret the text of one labelled crop.
    fn read_region(&self, label: &str, text: &str) -> Vec<(Field, FieldValue)> {
        let coerce = |field: Field, raw: Option<String>| {
            raw.map(|raw| (field, self.schema.coerce_text(field, &raw)))
        };

        let found = match label {
            "title" | "name" => vec![coerce(Field::Name, extract_name(text))],
            "hp" => vec![coerce(
                Field::Hp,
                self.hp.extract_bare(text).map(|m| m.value.to_string()),
            )],
            "type_line" => vec![
                coerce(Field::Stage, extract_stage(text).map(str::to_string)),
                coerce(Field::EvolvesFrom, extract_evolves_from(text)),
            ],
            "weakness" => vec![coerce(
                Field::Weakness,
                extract_mechanic(text, Mechanic::Weakness).or_else(|| collapsed(text)),
            )],
            "resistance" => vec![coerce(
                Field::Resistance,
                extract_mechanic(text, Mechanic::Resistance).or_else(|| collapsed(text)),
            )],
            "body" => {
                let attacks: Vec<_> =
                    self.attacks.extract_all(text).into_iter().map(|m| m.value).collect();
                let (ability_name, ability_text) = extract_ability(text).unzip();
                vec![
                    (!attacks.is_empty()).then_some((Field::Attacks, FieldValue::Attacks(attacks))),
                    coerce(Field::AbilityName, ability_name),
                    coerce(Field::AbilityText, ability_text),
                ]
            }
            "retreat" => vec![retreat_tokens(text)],
            "bottom_mechanics" => vec![
                coerce(Field::Weakness, extract_mechanic(text, Mechanic::Weakness)),
                coerce(Field::Resistance, extract_mechanic(text, Mechanic::Resistance)),
                extract_mechanic(text, Mechanic::Retreat).and_then(|line| retreat_tokens(&line)),
            ],
            "illustrator" | "artist" => {
                vec![coerce(Field::Illustrator, self.illustrator.extract_bare(text))]
            }
            "collector" | "card_number" => vec![
                coerce(Field::CardNumber, self.number.extract(text).map(|m| m.value)),
                coerce(Field::SetCode, extract_set_code(text)),
            ],
            "bottom_meta" => vec![
                coerce(Field::CardNumber, self.number.extract(text).map(|m| m.value)),
                coerce(Field::SetCode, extract_set_code(text)),
                coerce(Field::Illustrator, self.illustrator.extract(text).map(|m| m.value)),
                coerce(Field::PrintYear, extract_print_year(text).map(|y| y.to_string())),
            ],
            "set_code" => vec![coerce(Field::SetCode, extract_set_code_bare(text))],
            "set_name" => vec![coerce(Field::SetName, collapsed(text))],
            _ => Vec::new(),
        };

        found.into_iter().flatten().collect()
    }
}

fn unavailable() -> ExtractionResult {
    let mut result = ExtractionResult::empty();
    result.warnings.push(Warning::LocalOcrUnavailable);
    result
}

fn collapsed(text: &str) -> Option<String> {
    let joined = text.split_whitespace().collect::<Vec<_>>().join(" ");
    joined
        .chars()
        .any(char::is_alphanumeric)
        .then_some(joined)
}

fn retreat_tokens(text: &str) -> Option<(Field, FieldValue)> {
    let tokens = energy_tokens(text);
    (!tokens.is_empty()).then_some((Field::Retreat, FieldValue::Tokens(tokens)))
}
