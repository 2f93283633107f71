//! Hybrid extraction and reconciliation.

mod engine;
mod merge;

pub use engine::CardEngine;
pub use merge::{
    normalize_text, normalize_value, Reconciler, RemoteAttempt, HIGH_CONFIDENCE, PARTIAL_CREDIT,
};

use std::fmt;

/// Per-card pipeline stage.
///
/// Stages only move forward; the remote stage may be passed through
/// without a call when remote extraction is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelineStage {
    Pending,
    RemoteAttempted,
    LocalAttempted,
    Classified,
    Merged,
    Normalized,
}

impl PipelineStage {
    /// The following stage; `Normalized` is terminal.
    pub fn advance(self) -> Self {
        match self {
            PipelineStage::Pending => PipelineStage::RemoteAttempted,
            PipelineStage::RemoteAttempted => PipelineStage::LocalAttempted,
            PipelineStage::LocalAttempted => PipelineStage::Classified,
            PipelineStage::Classified => PipelineStage::Merged,
            PipelineStage::Merged | PipelineStage::Normalized => PipelineStage::Normalized,
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self == PipelineStage::Normalized
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Pending => "pending",
            PipelineStage::RemoteAttempted => "remote_attempted",
            PipelineStage::LocalAttempted => "local_attempted",
            PipelineStage::Classified => "classified",
            PipelineStage::Merged => "merged",
            PipelineStage::Normalized => "normalized",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
