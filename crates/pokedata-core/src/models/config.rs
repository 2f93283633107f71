//! Configuration structures for the extraction pipeline.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Main configuration for the pokedata pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PokedataConfig {
    /// Remote vision extraction configuration.
    pub remote: RemoteConfig,

    /// Local OCR configuration.
    pub ocr: OcrConfig,

    /// Region layout configuration.
    pub layout: LayoutConfig,

    /// Merge policy configuration.
    pub reconcile: ReconcileConfig,

    /// Debug payload persistence.
    pub debug: DebugConfig,
}

/// Remote vision service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Call the remote extractor at all.
    pub enabled: bool,

    /// Minimum confidence (0.0 - 1.0) for a remote value to win outright.
    pub confidence_threshold: f32,

    /// Confidence assumed when the service omits a field's score.
    pub unknown_confidence: f32,

    /// Timeout for a single remote call, in seconds.
    pub timeout_secs: u64,

    /// API base URL (no trailing slash).
    pub api_base: String,

    /// Vision model name.
    pub model: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Output token cap for one response.
    pub max_output_tokens: u32,

    /// Send header/footer crops alongside the full image.
    pub send_region_crops: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            confidence_threshold: 0.7,
            unknown_confidence: 0.5,
            timeout_secs: 30,
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "POKEDATA_OPENAI_API_KEY".to_string(),
            max_output_tokens: 800,
            send_region_crops: true,
        }
    }
}

/// Local OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Run local recognition.
    pub enabled: bool,

    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,

    /// Keep `[UNK]` markers in recognized text.
    pub keep_unk: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "latin_rec.onnx".to_string(),
            dictionary: "latin_dict.txt".to_string(),
            keep_unk: false,
        }
    }
}

/// Region layout configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Annotation-derived layout model (`{label: {x, y, w, h}}`).
    pub model_path: Option<PathBuf>,
}

/// What to do with a local value when the remote one is weak.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Replace the field with the local value.
    #[default]
    Substitute,
    /// Record the local value as a suggestion for human confirmation.
    Suggest,
}

/// Merge policy configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub fallback_policy: FallbackPolicy,
}

/// Debug payload persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Write unrecoverable remote payloads to disk.
    pub persist_payloads: bool,

    /// Directory for persisted payloads.
    pub payload_dir: PathBuf,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            persist_payloads: true,
            payload_dir: PathBuf::from("logs/remote_debug"),
        }
    }
}

/// Per-invocation options for the reconciliation entry point.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOptions {
    /// Skip the remote attempt entirely when false.
    pub remote_enabled: bool,
    /// Gates remote-vs-local preference (0.0 - 1.0).
    pub remote_confidence_threshold: f32,
    /// Confidence assumed for remote values without a reported score.
    pub unknown_confidence: f32,
    /// Upper bound on the remote call.
    pub remote_timeout: Duration,
    /// Pre-classification hint for region cropping.
    pub layout_hint: Option<String>,
    pub fallback_policy: FallbackPolicy,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        PokedataConfig::default().reconcile_options(None)
    }
}

impl ReconcileOptions {
    pub fn with_remote_enabled(mut self, enabled: bool) -> Self {
        self.remote_enabled = enabled;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.remote_confidence_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_layout_hint(mut self, hint: impl Into<String>) -> Self {
        self.layout_hint = Some(hint.into());
        self
    }

    pub fn with_fallback_policy(mut self, policy: FallbackPolicy) -> Self {
        self.fallback_policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }
}

impl PokedataConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }

    /// Engine options for one invocation.
    pub fn reconcile_options(&self, layout_hint: Option<String>) -> ReconcileOptions {
        ReconcileOptions {
            remote_enabled: self.remote.enabled,
            remote_confidence_threshold: self.remote.confidence_threshold.clamp(0.0, 1.0),
            unknown_confidence: self.remote.unknown_confidence.clamp(0.0, 1.0),
            remote_timeout: Duration::from_secs(self.remote.timeout_secs),
            layout_hint,
            fallback_policy: self.reconcile.fallback_policy,
        }
    }
}
