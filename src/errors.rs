use thiserror::Error;

/// Errors returned by the trainer.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("data error: {0}")]
    Data(String),

    #[error("computation error: {0}")]
    Computation(String),

    #[error("tracking error: {0}")]
    Tracking(String),
}
