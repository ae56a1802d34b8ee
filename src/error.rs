use thiserror::Error;

/// Failure taxonomy for the run pipeline.
///
/// `Discovery` and `Profile` are fatal to a run; `Tailoring` and `Submission`
/// are fatal to a single candidate and are recorded, never re-raised past the
/// candidate loop; `Busy` is fatal only to the `start` call that received it.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("profile error: {0}")]
    Profile(String),

    #[error("discovery failed: {0}")]
    Discovery(String),

    #[error("tailoring failed: {0}")]
    Tailoring(String),

    #[error("application failed: {0}")]
    Submission(String),

    #[error("telemetry flush failed: {0}")]
    Telemetry(String),

    #[error("a run is already in progress")]
    Busy,

    #[error("unexpected error: {0}")]
    Unexpected(String),
}
