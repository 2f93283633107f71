//! Error types for the pokedata-core library.

use std::time::Duration;

use thiserror::Error;

/// Main error type for the pokedata library.
///
/// Only input-level failures reach callers of the reconciliation engine;
/// everything recoverable is absorbed into warning codes on the record.
#[derive(Error, Debug)]
pub enum PokedataError {
    /// The card image could not be decoded.
    #[error(transparent)]
    UndecodableImage(#[from] UndecodableImageError),

    /// OCR processing error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Remote extraction error.
    #[error("remote extraction error: {0}")]
    Remote(#[from] RemoteError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Fatal input error: no extractor can work on this image.
#[derive(Error, Debug)]
pub enum UndecodableImageError {
    /// The bytes are not a supported image format.
    #[error("undecodable image: {0}")]
    Decode(#[from] image::ImageError),

    /// The image decoded but has no pixels.
    #[error("undecodable image: zero-sized ({width}x{height})")]
    Empty { width: u32, height: u32 },
}

/// Errors related to local OCR processing.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Failed to load OCR models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// No recognition engine is configured.
    #[error("no OCR engine available")]
    Unavailable,

    /// Text recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// Invalid image format or dimensions.
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

/// Transient, remote-side failures. Never fatal to the pipeline.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Transport failure (DNS, TLS, connection reset).
    #[error("network error: {0}")]
    Network(String),

    /// The service rejected our credentials.
    #[error("authentication failed (HTTP {status})")]
    Auth { status: u16 },

    /// The service asked us to slow down.
    #[error("rate limited by service")]
    RateLimited,

    /// Any other non-success HTTP status.
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The call did not complete within the configured budget.
    #[error("remote call timed out after {0:?}")]
    Timeout(Duration),

    /// The client is missing required configuration (e.g. API key).
    #[error("remote service not configured: {0}")]
    NotConfigured(String),

    /// The request could not be built (e.g. image encoding failed).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::Network(err.to_string())
    }
}

/// The service answered, but the body could not be turned into card fields.
#[derive(Error, Debug)]
pub enum MalformedResponseError {
    /// A success response whose body is not a JSON envelope.
    #[error("service response is not JSON: {error}")]
    NotJson { error: String, body: String },

    /// The response envelope carried no text output.
    #[error("no text output in service response")]
    NoOutputText { body: String },

    /// No JSON object could be isolated from the response text.
    #[error("no JSON object found in response: {0}")]
    NoJsonObject(String),

    /// The isolated JSON is valid but is not an object.
    #[error("expected a JSON object, got {0}")]
    NotAnObject(String),

    /// Every schema field failed validation.
    #[error("no usable field survived validation ({violations} violations)")]
    Unusable { violations: usize },
}

/// Either way the remote extractor can fail for one card.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Malformed(#[from] MalformedResponseError),
}

impl MalformedResponseError {
    /// Raw service body, for failures raised before the model text was isolated.
    pub fn raw_body(&self) -> Option<&str> {
        match self {
            MalformedResponseError::NotJson { body, .. }
            | MalformedResponseError::NoOutputText { body } => Some(body),
            _ => None,
        }
    }
}

impl RemoteError {
    /// Short reason code used in `remote_unavailable:<reason>` warnings.
    pub fn reason_code(&self) -> &'static str {
        match self {
            RemoteError::Service(ServiceError::Timeout(_)) => "timeout",
            RemoteError::Service(_) => "service_error",
            RemoteError::Malformed(_) => "malformed_response",
        }
    }
}

/// Result type for the pokedata library.
pub type Result<T> = std::result::Result<T, PokedataError>;
