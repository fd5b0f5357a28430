//! Error types
use crate::logging::RunLogError;
use crate::torch::critic::AdvantageError;
use tch::TchError;
use thiserror::Error;

/// Invalid training or agent configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be positive, got {value}")]
    NotPositive { name: &'static str, value: f64 },
    #[error("{name} must be in [{min}, {max}], got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{0} must be nonzero")]
    Zero(&'static str),
}

/// Error that aborts a training run.
#[derive(Error, Debug)]
pub enum TrainError {
    #[error("invalid configuration")]
    Config(#[from] ConfigError),
    #[error("run log error")]
    RunLog(#[from] RunLogError),
    #[error("advantage estimation failed")]
    Advantage(#[from] AdvantageError),
    #[error("torch error")]
    Torch(#[from] TchError),
    #[error("repetition {index} panicked")]
    RepetitionPanicked { index: usize },
}
