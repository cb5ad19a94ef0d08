use crate::storage::StorageError;

/// Result type for pipeline operations
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Failure taxonomy for the generation pipeline
///
/// Every failure a caller can observe maps to one of these kinds with a
/// stable textual description. Raw transport errors never cross this
/// boundary.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("transcript acquisition failed: {0}")]
    AcquisitionExhausted(String),

    #[error("chapter generation failed: {0}")]
    GenerationExhausted(String),

    #[error("credit ledger unavailable: {0}")]
    LedgerUnavailable(#[source] StorageError),

    #[error("insufficient credits")]
    InsufficientCredits,

    #[error("result cache unavailable: {0}")]
    CacheUnavailable(#[source] StorageError),

    #[error("missing or invalid credentials")]
    Unauthorized,

    #[error("job belongs to another account")]
    Forbidden,

    #[error("unknown job: {0}")]
    JobNotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// True for outcomes that are declined requests rather than faults
    pub fn is_declined(&self) -> bool {
        matches!(self, PipelineError::InsufficientCredits)
    }
}
