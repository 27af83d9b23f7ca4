use thiserror::Error;

/// Errors reported by the worker pool and its workers.
///
/// All of them are lifecycle or setup problems reported synchronously to the
/// caller. Rollout failures inside an engine never surface here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimError {
    /// A configuration change was attempted while simulations are running.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("a worker pool needs at least one worker")]
    EmptyPool,

    #[error("the pool has not been configured with a position")]
    NotConfigured,

    #[error("batch size must be positive")]
    InvalidBatchSize,

    /// A worker's engine produced a candidate list that differs from the
    /// first live worker's.
    #[error("worker {worker} has {found} candidates where the first live worker has {expected}, or a different order")]
    CandidateMismatch {
        worker: usize,
        expected: usize,
        found: usize,
    },

    #[error("worker {0} panicked during simulation")]
    WorkerPanicked(usize),

    #[error("every worker has lost its engine to a panic")]
    AllWorkersLost,
}

impl SimError {
    pub(crate) fn running(what: &str) -> Self {
        SimError::Configuration(format!("cannot {} while the simulation is running; stop it first", what))
    }
}
