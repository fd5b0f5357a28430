//! Simulating agent-environment interaction and training
mod eval;
pub mod rollout;
mod train;

pub use eval::evaluate;
pub use rollout::{collect, Batch, Termination, Trajectory};
pub use train::{run_repetitions, train, AeirlAgent, IterationStats, TrainSummary};
