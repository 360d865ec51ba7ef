//! Wire types for the server's analysis and progress API.
//!
//! All payloads are JSON. Progress records are keyed by an opaque
//! [`ProgressKey`]; analyses by [`AnalysisId`].

pub mod defaults;
pub mod http_types;
pub mod paths;

// Re-export HTTP API types
pub use http_types::{
    ActionResponse, ActionStatus, AnalysesEnvelope, AnalysisEnvelope, AnalysisId, AnalysisIdError,
    AnalysisRecord, AnalysisStatus, ProgressKey, ProgressKeyResponse, ProgressSnapshot,
    ProgressStatus,
};
