//! Request construction: schema declaration, vocabularies, and encoded images.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageFormat};

use crate::error::ServiceError;
use crate::ocr::{crop_normalized, NormBox};
use crate::schema::{FieldSchema, Vocabulary};

use super::CONFIDENCE_KEY;

const SYSTEM_INSTRUCTION: &str = "You are a data extraction assistant. Always respond with a single JSON object that matches the provided schema.";

/// One piece of user content.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    /// PNG as a `data:` URL.
    Image(String),
}

/// A provider-neutral vision request.
#[derive(Debug, Clone, PartialEq)]
pub struct VisionRequest {
    pub system: String,
    pub parts: Vec<ContentPart>,
    pub max_output_tokens: u32,
}

/// Builds requests that pin the service to the field schema.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    schema: FieldSchema,
    send_region_crops: bool,
    max_output_tokens: u32,
}

impl PromptBuilder {
    pub fn new(schema: FieldSchema) -> Self {
        Self {
            schema,
            send_region_crops: true,
            max_output_tokens: 800,
        }
    }

    pub fn with_region_crops(mut self, enabled: bool) -> Self {
        self.send_region_crops = enabled;
        self
    }

    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    /// Build the request for one card image.
    pub fn build(&self, image: &DynamicImage) -> Result<VisionRequest, ServiceError> {
        let mut parts = vec![
            ContentPart::Text(self.instructions()),
            ContentPart::Text(self.declaration()),
            ContentPart::Text("Primary card image:".to_string()),
            ContentPart::Image(png_data_url(image)?),
        ];

        if self.send_region_crops {
            let crops = [
                (
                    NormBox::HEADER_BAND,
                    "Header crop (name, stage/evolves from, HP, type banner):",
                ),
                (
                    NormBox::FOOTER_BAND,
                    "Footer crop (setbox letters, card number, illustrator, year):",
                ),
            ];
            for (band, caption) in crops {
                if let Some(crop) = crop_normalized(image, &band) {
                    parts.push(ContentPart::Text(caption.to_string()));
                    parts.push(ContentPart::Image(png_data_url(&crop)?));
                }
            }
        }

        Ok(VisionRequest {
            system: SYSTEM_INSTRUCTION.to_string(),
            parts,
            max_output_tokens: self.max_output_tokens,
        })
    }

    fn instructions(&self) -> String {
        format!(
            "You are a strict Pokémon card transcriber. Respond with JSON matching the provided schema. \
             Never guess; if text is unreadable set the value to null. \
             Convert icons to words using only these energy types: {}. \
             Stages are one of: {}. \
             Return confidence scores (0..1) in the {} object for each field.",
            Vocabulary::EnergyType.tokens().join(", "),
            Vocabulary::Stage.tokens().join(", "),
            CONFIDENCE_KEY,
        )
    }

    /// JSON-like skeleton naming every key and its allowed values.
    fn declaration(&self) -> String {
        let mut lines = vec!["Return JSON only, with exactly these keys:".to_string(), "{".to_string()];
        for spec in self.schema.iter() {
            lines.push(format!(
                "  \"{}\": {},",
                spec.field.wire_key(),
                spec.kind.describe()
            ));
        }
        lines.push(format!(
            "  \"{}\": {{\"<key>\": number 0-1, ...}}",
            CONFIDENCE_KEY
        ));
        lines.push("}".to_string());
        lines.join("\n")
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(FieldSchema::card())
    }
}

/// Encode an image as a PNG `data:` URL.
pub fn png_data_url(image: &DynamicImage) -> Result<String, ServiceError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| ServiceError::InvalidRequest(format!("PNG encoding failed: {e}")))?;
    Ok(format!(
        "data:image/png;base64,{}",
        BASE64_STANDARD.encode(buffer.into_inner())
    ))
}
