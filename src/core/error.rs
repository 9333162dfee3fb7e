use thiserror::Error;

/// Failure taxonomy for one publish cycle.
///
/// Soft failures (credential refresh, context fetch) never surface
/// here; they degrade the cycle and are logged where they happen.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CycleError {
    /// Missing or malformed agent fields. No external calls are made.
    #[error("invalid agent configuration: {0}")]
    Config(String),

    /// The generation provider errored. Aborts before any publish attempt.
    #[error("generation failed: {0}")]
    Generation(String),

    /// The publish call errored. Generated text is kept for diagnostics.
    #[error("publish failed: {0}")]
    Publish(String),
}
