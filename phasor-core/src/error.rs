use thiserror::Error;

/// All errors produced by phasor-core.
#[derive(Debug, Error)]
pub enum PhasorError {
    #[error("reference capture has no samples")]
    EmptyReference,

    #[error("no target captures supplied")]
    NoTargets,

    /// Terminal signal for a cancelled search or batch. Not a failure:
    /// callers distinguish it from both success and `success = false`
    /// results by matching on this variant.
    #[error("analysis cancelled")]
    Cancelled,

    #[error("an analysis batch is already running")]
    AnalysisInProgress,
}

pub type Result<T> = std::result::Result<T, PhasorError>;
