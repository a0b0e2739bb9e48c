//! Tick error types.

/// Errors that abort a tick.
///
/// Stages completed before the failure keep their effects; nothing is rolled
/// back.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// An operation's transform returned an error.
    #[error("operation '{operation}' failed in stage {stage} of tick {tick}: {source}")]
    Operation {
        /// The tick that failed.
        tick: u64,
        /// Position of the failing stage in the schedule.
        stage: usize,
        /// The failing operation's id.
        operation: String,
        /// The transform's error.
        #[source]
        source: anyhow::Error,
    },
}

impl TickError {
    /// The id of the operation that failed.
    #[must_use]
    pub fn operation(&self) -> &str {
        match self {
            Self::Operation { operation, .. } => operation,
        }
    }

    /// The stage the failure happened in.
    #[must_use]
    pub fn stage(&self) -> usize {
        match self {
            Self::Operation { stage, .. } => *stage,
        }
    }

    /// The underlying transform error.
    #[must_use]
    pub fn cause(&self) -> &anyhow::Error {
        match self {
            Self::Operation { source, .. } => source,
        }
    }
}
