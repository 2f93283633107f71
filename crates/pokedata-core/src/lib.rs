//! Core library for Pokémon TCG card field extraction.
//!
//! This crate provides:
//! - A declarative field schema with closed vocabularies
//! - Remote vision extraction with payload validation and repair
//! - Local OCR extraction using PaddleOCR models and card region layouts
//! - Card type classification
//! - Confidence-based reconciliation of both extractors into one record

pub mod card;
pub mod classify;
pub mod error;
pub mod models;
pub mod ocr;
pub mod reconcile;
pub mod remote;
pub mod schema;

pub use card::LocalExtractor;
pub use classify::CardClassifier;
pub use error::{
    MalformedResponseError, OcrError, PokedataError, RemoteError, Result, ServiceError,
    UndecodableImageError,
};
pub use models::card::{
    Attack, CardClass, ExtractionResult, FieldReading, FieldValue, Provenance, ReconciledRecord,
    Source, Warning,
};
pub use models::config::{FallbackPolicy, PokedataConfig, ReconcileOptions};
pub use ocr::{LayoutModel, OcrResult, PageMode, TextBox, TextRecognizer};
#[cfg(feature = "native")]
pub use ocr::PureOcrEngine;
pub use reconcile::{CardEngine, PipelineStage, Reconciler, RemoteAttempt};
pub use remote::{
    DebugSink, FileDebugSink, NullDebugSink, OpenAiVisionClient, PromptBuilder, RemoteExtractor,
    VisionService,
};
pub use schema::{Field, FieldSchema, SchemaViolation, ViolationKind};
