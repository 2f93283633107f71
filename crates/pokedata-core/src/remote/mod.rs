//! Remote vision extraction: request, validation, repair.

mod client;
mod debug_sink;
mod prompt;
pub mod validate;

pub use client::{envelope_text, response_text, OpenAiVisionClient};
pub use debug_sink::{DebugRecord, DebugSink, FileDebugSink, MemoryDebugSink, NullDebugSink};
pub use prompt::{png_data_url, ContentPart, PromptBuilder, VisionRequest};
pub use validate::{FieldOutcome, ValidatedPayload};

use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;
use tracing::{debug, info, warn};

use crate::error::{MalformedResponseError, RemoteError};
use crate::models::card::{ExtractionResult, FieldReading, Warning};
use crate::schema::FieldSchema;

use validate::{isolate_json, validate_payload};

/// Key of the per-field confidence sub-object in remote payloads.
pub const CONFIDENCE_KEY: &str = "_confidence";

/// A vision-capable extraction service.
#[async_trait]
pub trait VisionService: Send + Sync {
    /// Service or model name for logs.
    fn name(&self) -> &str;

    /// Send one request and return the model's raw text answer.
    async fn complete(&self, request: &VisionRequest) -> Result<String, RemoteError>;
}

/// Asks a vision service for card fields and validates the answer.
///
/// No retries: any failure is returned for the caller to fall back on.
pub struct RemoteExtractor<V> {
    service: V,
    prompt: PromptBuilder,
    schema: FieldSchema,
    debug_sink: Arc<dyn DebugSink>,
}

impl<V: VisionService> RemoteExtractor<V> {
    pub fn new(service: V) -> Self {
        Self {
            service,
            prompt: PromptBuilder::default(),
            schema: FieldSchema::card(),
            debug_sink: Arc::new(NullDebugSink),
        }
    }

    pub fn with_prompt(mut self, prompt: PromptBuilder) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_debug_sink(mut self, sink: Arc<dyn DebugSink>) -> Self {
        self.debug_sink = sink;
        self
    }

    pub fn service(&self) -> &V {
        &self.service
    }

    /// Extract fields from one card image.
    pub async fn extract(&self, image: &DynamicImage) -> Result<ExtractionResult, RemoteError> {
        let request = self.prompt.build(image)?;
        debug!(
            "Sending {} content parts to {}",
            request.parts.len(),
            self.service.name()
        );
        let text = match self.service.complete(&request).await {
            Ok(text) => text,
            Err(RemoteError::Malformed(e)) => {
                warn!(error = %e, "Remote response envelope is unusable");
                if let Some(body) = e.raw_body() {
                    self.debug_sink.persist("malformed_response", body);
                }
                return Err(e.into());
            }
            Err(e) => return Err(e),
        };
        self.parse_response(&text)
    }

    /// Turn the service's raw text into a validated extraction result.
    pub fn parse_response(&self, text: &str) -> Result<ExtractionResult, RemoteError> {
        let object = match isolate_json(text) {
            Ok(object) => object,
            Err(e) => {
                warn!(error = %e, "Remote response is not a JSON object");
                self.debug_sink.persist("malformed_response", text);
                return Err(e.into());
            }
        };

        let payload = validate_payload(&self.schema, &object);
        debug!(
            fields = payload.fields.len(),
            repaired = payload.repaired.len(),
            dropped = payload.dropped_keys.len(),
            "Validated remote payload"
        );

        if payload.fields.is_empty() {
            warn!(
                violations = payload.unrepaired.len(),
                "No usable field in remote payload"
            );
            self.debug_sink.persist("malformed_response", text);
            return Err(MalformedResponseError::Unusable {
                violations: payload.unrepaired.len(),
            }
            .into());
        }

        if !payload.unrepaired.is_empty() {
            warn!(
                violations = payload.unrepaired.len(),
                "Remote payload has unrepairable fields"
            );
            self.debug_sink.persist("schema_violation", text);
        }

        let mut result = ExtractionResult::empty();
        for (field, value) in payload.fields {
            let confidence = payload.confidence.get(&field).copied();
            result.insert(field, FieldReading::remote(value, confidence));
        }
        result
            .warnings
            .extend(payload.unrepaired.into_iter().map(Warning::SchemaViolation));
        result.warnings.extend(
            payload
                .unknown_tokens
                .into_iter()
                .map(|(field, value)| Warning::UnknownToken { field, value }),
        );

        info!(
            fields = result.len(),
            warnings = result.warnings.len(),
            "Remote extraction complete"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::models::card::{FieldValue, Source};
    use crate::schema::{Field, SchemaViolation, ViolationKind};
    use pretty_assertions::assert_eq;

    struct CannedService(Result<&'static str, u16>);

    #[async_trait]
    impl VisionService for CannedService {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, _request: &VisionRequest) -> Result<String, RemoteError> {
            match self.0 {
                Ok(text) => Ok(text.to_string()),
                Err(status) => Err(ServiceError::Status {
                    status,
                    body: String::new(),
                }
                .into()),
            }
        }
    }

    fn card() -> DynamicImage {
        DynamicImage::new_rgb8(60, 84)
    }

    #[tokio::test]
    async fn test_extract_with_confidence() {
        let extractor = RemoteExtractor::new(CannedService(Ok(
            r#"{"name": "Charizard", "hp": 180, "_confidence": {"hp": 0.95}}"#,
        )));
        let result = extractor.extract(&card()).await.unwrap();

        let hp = result.get(Field::Hp).unwrap();
        assert_eq!(hp.value, FieldValue::Integer(180));
        assert_eq!(hp.source, Source::Remote);
        assert_eq!(hp.confidence, Some(0.95));
        assert_eq!(result.get(Field::Name).unwrap().confidence, None);
        assert!(result.get(Field::Illustrator).is_none());
    }

    #[tokio::test]
    async fn test_service_error_passes_through() {
        let extractor = RemoteExtractor::new(CannedService(Err(503)));
        let err = extractor.extract(&card()).await.unwrap_err();
        assert_eq!(err.reason_code(), "service_error");
    }

    #[tokio::test]
    async fn test_malformed_response_is_persisted() {
        let sink = Arc::new(MemoryDebugSink::new());
        let extractor = RemoteExtractor::new(CannedService(Ok("The card shows a Charizard.")))
            .with_debug_sink(sink.clone());
        let err = extractor.extract(&card()).await.unwrap_err();

        assert_eq!(err.reason_code(), "malformed_response");
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload, "The card shows a Charizard.");
    }

    #[test]
    fn test_partial_violation_keeps_other_fields() {
        let sink = Arc::new(MemoryDebugSink::new());
        let extractor = RemoteExtractor::new(CannedService(Ok("")))
            .with_debug_sink(sink.clone());
        let result = extractor
            .parse_response(r#"{"name": "Pikachu", "hp": -5, "types": ["Electric"]}"#)
            .unwrap();

        assert_eq!(result.value(Field::Name), Some(&FieldValue::Text("Pikachu".into())));
        assert!(result.get(Field::Hp).is_none());
        assert_eq!(
            result.warnings,
            vec![
                Warning::SchemaViolation(SchemaViolation {
                    field: Field::Hp,
                    kind: ViolationKind::OutOfRange,
                }),
                Warning::UnknownToken {
                    field: Field::Types,
                    value: "Electric".into(),
                },
            ]
        );
        assert_eq!(sink.records()[0].reason, "schema_violation");
    }

    #[test]
    fn test_nothing_usable_is_malformed() {
        let extractor = RemoteExtractor::new(CannedService(Ok("")));
        let err = extractor
            .parse_response(r#"{"hp": "lots", "mood": "happy"}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            RemoteError::Malformed(MalformedResponseError::Unusable { violations: 1 })
        ));
    }
}
