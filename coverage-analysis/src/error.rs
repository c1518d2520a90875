use std::time::Duration;
use thiserror::Error;

/// Errors surfaced to the caller of the analysis pipeline.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The policy input failed validation; no stages were run.
    #[error("invalid policy input: {0}")]
    InvalidInput(String),

    /// A stage read a state field that an earlier stage should have populated.
    #[error("state field '{0}' has not been populated")]
    MissingState(&'static str),

    /// A stage tried to overwrite a state field that was already populated.
    #[error("state field '{0}' was already populated")]
    StateAlreadySet(&'static str),

    /// A stage failed after exhausting its attempts; the pipeline is in the
    /// failed state and no further stages were run.
    #[error("stage '{stage}' failed: {message}")]
    StageFailed {
        stage: &'static str,
        message: String,
    },

    /// The overall request deadline elapsed before the pipeline completed.
    #[error("analysis timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors from external collaborators (risk data source, narrative LLM).
///
/// These are always absorbed by the owning stage with documented defaults and
/// never abort the pipeline.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("collaborator call timed out")]
    Timeout,
}
