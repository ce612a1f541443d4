/// Errors surfaced by the synchronization core. Everything here is fatal to
/// the run: computations are deterministic given the input state, so
/// nothing is ever retried.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("non-finite {component} at level {level}, zone {cell:?}")]
    NonFiniteState {
        level: usize,
        component: String,
        cell: (i64, i64),
    },

    #[error("inadmissible state at level {level}, zone {cell:?}: {reason}")]
    InadmissibleState {
        level: usize,
        cell: (i64, i64),
        reason: String,
    },

    #[error("negative mass density: {0}")]
    NegativeMassDensity(f64),

    #[error("negative gas pressure: {0}")]
    NegativeGasPressure(f64),

    #[error("checkpoint: {0}")]
    Checkpoint(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
