//! Error types shared by the codecs, the resolver and the jobs

use thiserror::Error;

/// Errors raised while transcoding content or resolving its references
#[derive(Error, Debug)]
pub enum TranscodeError {
    /// The wire envelope could not be parsed; the whole document is rejected
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// A declared reference could not be resolved; only that reference is skipped
    #[error("Missing reference target: {0}")]
    MissingReferenceTarget(String),

    /// Switching or restoring the blog context failed; fatal for the resolution pass
    #[error("Inconsistent location state: {0}")]
    InconsistentLocationState(String),

    /// The translation backend or another remote collaborator failed
    #[error("External service error: {0}")]
    ExternalServiceError(String),

    /// Invalid filter pattern, locale or setting
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TranscodeError {
    /// Errors after which the surrounding queue may move on to the next item
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TranscodeError::MissingReferenceTarget(_) | TranscodeError::ExternalServiceError(_)
        )
    }
}

/// Result type for transcoding operations
pub type TranscodeResult<T> = Result<T, TranscodeError>;
