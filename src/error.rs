//! Engine error types
//!
//! Only construction-time resource failures propagate to the caller.
//! Timing anomalies are clamped and input oddities are absorbed, so neither
//! has a variant here.

use thiserror::Error;

/// Failures while attaching the engine to its host
#[derive(Error, Debug)]
pub enum EngineError {
    /// The canvas element the engine renders into does not exist
    #[error("Canvas #{0} not found")]
    CanvasNotFound(String),

    /// The canvas exists but a render context could not be obtained
    #[error("Render context unavailable: {0}")]
    ContextUnavailable(String),

    /// The render backend is not supported on this host
    #[error("Render backend unsupported: {0}")]
    BackendUnsupported(String),
}

impl EngineError {
    /// Whether the caller can fall back (e.g. to a software renderer)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EngineError::BackendUnsupported(_))
    }
}

/// Failures reported by a recorder collaborator
#[derive(Error, Debug)]
pub enum RecorderError {
    /// The segment sink rejected a write
    #[error("Segment sink failed: {0}")]
    Sink(String),

    /// A segment could not be encoded
    #[error("Segment serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failures while reading engine configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid engine config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type for engine construction
pub type Result<T> = std::result::Result<T, EngineError>;
