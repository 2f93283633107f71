//! The single entry point: extract and reconcile one card image.

use image::DynamicImage;
use tracing::{debug, info, warn};

use crate::card::LocalExtractor;
use crate::error::{Result, ServiceError, UndecodableImageError};
use crate::models::card::ReconciledRecord;
use crate::models::config::ReconcileOptions;
use crate::ocr::TextRecognizer;
use crate::remote::{RemoteExtractor, VisionService};

use super::merge::{Reconciler, RemoteAttempt};
use super::PipelineStage;

/// Runs remote extraction, local extraction, classification and merge for
/// one card at a time.
///
/// Holds no per-card state, so one engine can serve any number of cards.
pub struct CardEngine<V, R> {
    remote: Option<RemoteExtractor<V>>,
    local: LocalExtractor<R>,
    reconciler: Reconciler,
}

impl<V: VisionService, R: TextRecognizer> CardEngine<V, R> {
    /// `remote` is `None` when no vision service could be configured.
    pub fn new(remote: Option<RemoteExtractor<V>>, local: LocalExtractor<R>) -> Self {
        Self {
            remote,
            local,
            reconciler: Reconciler::default(),
        }
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn has_local(&self) -> bool {
        self.local.is_available()
    }

    /// Extract and reconcile one decoded card image.
    ///
    /// Only a zero-sized image is an error; every extractor failure ends up
    /// as a warning on the record.
    pub async fn extract_and_reconcile(
        &self,
        image: &DynamicImage,
        options: &ReconcileOptions,
    ) -> Result<ReconciledRecord> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(UndecodableImageError::Empty { width, height }.into());
        }

        let mut stage = PipelineStage::Pending;

        let remote = self.attempt_remote(image, options).await;
        stage = stage.advance();
        debug!(%stage, success = remote.result().is_some(), "Remote stage done");

        let local = self.local.extract(image, options.layout_hint.as_deref());
        stage = stage.advance();
        debug!(
            %stage,
            attempted = local.len(),
            found = local.fields.values().filter(|r| !r.value.is_empty()).count(),
            "Local stage done"
        );

        Ok(self.reconciler.reconcile(&remote, &local, options))
    }

    /// Decode image bytes, then [`Self::extract_and_reconcile`].
    pub async fn extract_and_reconcile_bytes(
        &self,
        bytes: &[u8],
        options: &ReconcileOptions,
    ) -> Result<ReconciledRecord> {
        let image = image::load_from_memory(bytes).map_err(UndecodableImageError::Decode)?;
        self.extract_and_reconcile(&image, options).await
    }

    /// The remote stage. Never fails: failures become [`RemoteAttempt::Failed`].
    pub async fn attempt_remote(
        &self,
        image: &DynamicImage,
        options: &ReconcileOptions,
    ) -> RemoteAttempt {
        if !options.remote_enabled {
            info!("Remote extraction disabled, running local-only");
            return RemoteAttempt::Disabled;
        }
        let Some(remote) = &self.remote else {
            warn!("Remote extraction enabled but no vision service is configured");
            return RemoteAttempt::Failed(
                ServiceError::NotConfigured("no vision service".to_string()).into(),
            );
        };

        match tokio::time::timeout(options.remote_timeout, remote.extract(image)).await {
            Ok(Ok(result)) => RemoteAttempt::Success(result),
            Ok(Err(e)) => {
                warn!(error = %e, reason = e.reason_code(), "Remote extraction failed, continuing local-only");
                RemoteAttempt::Failed(e)
            }
            Err(_) => {
                warn!(
                    timeout_ms = options.remote_timeout.as_millis() as u64,
                    "Remote extraction timed out, continuing local-only"
                );
                RemoteAttempt::Failed(ServiceError::Timeout(options.remote_timeout).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{OcrError, PokedataError, RemoteError};
    use crate::models::card::{FieldValue, Provenance};
    use crate::ocr::{OcrResult, PageMode};
    use crate::remote::VisionRequest;
    use crate::schema::Field;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const CARD: (u32, u32) = (200, 280);

    struct ScriptedService {
        answer: &'static str,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl ScriptedService {
        fn answering(answer: &'static str) -> Self {
            Self {
                answer,
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn stalled() -> Self {
            Self {
                delay: Some(Duration::from_secs(10)),
                ..Self::answering("{}")
            }
        }
    }

    #[async_trait]
    impl VisionService for ScriptedService {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _request: &VisionRequest) -> std::result::Result<String, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.answer.to_string())
        }
    }

    /// Reads `text` off the full card only; every crop comes back blank.
    struct FullCardRecognizer {
        text: &'static str,
    }

    impl TextRecognizer for FullCardRecognizer {
        fn name(&self) -> &str {
            "full-card"
        }

        fn recognize(
            &self,
            image: &DynamicImage,
            _mode: PageMode,
        ) -> std::result::Result<OcrResult, OcrError> {
            let mut result = OcrResult::empty(image.width(), image.height());
            if (image.width(), image.height()) == CARD {
                result.text = self.text.to_string();
            }
            Ok(result)
        }
    }

    fn engine(
        service: ScriptedService,
        local_text: &'static str,
    ) -> CardEngine<ScriptedService, FullCardRecognizer> {
        CardEngine::new(
            Some(RemoteExtractor::new(service)),
            LocalExtractor::new(Some(FullCardRecognizer { text: local_text })),
        )
    }

    fn card() -> DynamicImage {
        DynamicImage::new_rgb8(CARD.0, CARD.1)
    }

    #[tokio::test]
    async fn test_confident_remote_beats_ocr_confusion() {
        let engine = engine(
            ScriptedService::answering(
                r#"{"name": "Charizard", "hp": 180, "_confidence": {"hp": 0.95}}"#,
            ),
            "Charizard HP 18O",
        );
        let record = engine
            .extract_and_reconcile(&card(), &ReconcileOptions::default())
            .await
            .unwrap();

        assert_eq!(record.value(Field::Hp), &FieldValue::Integer(180));
        assert_eq!(record.provenance(Field::Hp), Provenance::Remote);
        assert!(!record.has_warning("fallback_used:hp"));
    }

    #[tokio::test]
    async fn test_null_remote_falls_back_to_local() {
        let engine = engine(
            ScriptedService::answering(r#"{"hp": null, "_confidence": {"hp": 0.0}}"#),
            "Pikachu HP 70",
        );
        let record = engine
            .extract_and_reconcile(&card(), &ReconcileOptions::default())
            .await
            .unwrap();

        assert_eq!(record.value(Field::Hp), &FieldValue::Integer(70));
        assert_eq!(record.provenance(Field::Hp), Provenance::Local);
        assert!(record.has_warning("fallback_used:hp"));
    }

    #[tokio::test]
    async fn test_timeout_with_blank_local() {
        let engine = engine(ScriptedService::stalled(), "");
        let options = ReconcileOptions::default().with_timeout(Duration::from_millis(20));
        let record = engine.extract_and_reconcile(&card(), &options).await.unwrap();

        assert!(record.has_warning("remote_unavailable:timeout"));
        for field in Field::ALL {
            assert_eq!(record.provenance(field), Provenance::Default, "{field}");
        }
        for code in [
            "missing_required:name",
            "missing_required:card_number",
            "missing_required:illustrator",
        ] {
            assert!(record.has_warning(code), "{code}");
        }
        assert_eq!(record.quality_score(), 0.0);
    }

    #[tokio::test]
    async fn test_malformed_remote_uses_local_only() {
        let engine = engine(
            ScriptedService::answering("Sorry, I can't help with that."),
            "Pikachu HP 60\n025/198",
        );
        let record = engine
            .extract_and_reconcile(&card(), &ReconcileOptions::default())
            .await
            .unwrap();

        assert!(record.has_warning("remote_unavailable:malformed_response"));
        assert!(
            record
                .fields()
                .keys()
                .all(|f| record.provenance(*f) != Provenance::Remote)
        );
        assert_eq!(record.value(Field::CardNumber), &FieldValue::Text("025/198".into()));
    }

    #[tokio::test]
    async fn test_disabled_remote_is_never_called() {
        let engine = engine(ScriptedService::answering(r#"{"name": "Mew"}"#), "Mew HP 60");
        let options = ReconcileOptions::default().with_remote_enabled(false);
        let record = engine.extract_and_reconcile(&card(), &options).await.unwrap();

        assert_eq!(engine.remote.as_ref().unwrap().service().calls.load(Ordering::SeqCst), 0);
        assert!(record.has_warning("remote_unavailable:disabled"));
        assert_eq!(record.value(Field::Name), &FieldValue::Text("Mew".into()));
    }

    #[tokio::test]
    async fn test_unconfigured_remote() {
        let engine: CardEngine<ScriptedService, FullCardRecognizer> = CardEngine::new(
            None,
            LocalExtractor::new(Some(FullCardRecognizer { text: "" })),
        );
        assert!(!engine.has_remote());
        assert!(engine.has_local());
        let record = engine
            .extract_and_reconcile(&card(), &ReconcileOptions::default())
            .await
            .unwrap();
        assert!(record.has_warning("remote_unavailable:service_error"));
    }

    #[tokio::test]
    async fn test_identical_inputs_give_identical_records() {
        let engine = engine(
            ScriptedService::answering(
                r#"{"name": "Gengar", "hp": 130, "types": ["psychic"], "_confidence": {"name": 0.97, "hp": 0.6}}"#,
            ),
            "Gengar HP 13O\nShadow Ball 90\nIllus. Ryuta Fuse\nFST 157/264",
        );
        let options = ReconcileOptions::default();
        let first = engine.extract_and_reconcile(&card(), &options).await.unwrap();
        let second = engine.extract_and_reconcile(&card(), &options).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_undecodable_input() {
        let engine = engine(ScriptedService::answering("{}"), "");
        let err = engine
            .extract_and_reconcile_bytes(b"not an image", &ReconcileOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PokedataError::UndecodableImage(UndecodableImageError::Decode(_))
        ));

        let err = engine
            .extract_and_reconcile(&DynamicImage::new_rgb8(0, 0), &ReconcileOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PokedataError::UndecodableImage(UndecodableImageError::Empty { .. })
        ));
    }
}
