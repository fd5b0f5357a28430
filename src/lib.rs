//! Adversarial imitation learning with trust region policy optimization.
//!
//! An agent imitates expert trajectories using an auto-encoder discriminator as its
//! per-step signal, a generalized advantage estimator, a trust-region value step,
//! and a TRPO policy step.
#![warn(clippy::cast_lossless)]
#![warn(clippy::cast_possible_truncation)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::redundant_closure_for_method_calls)]
#![warn(clippy::use_self)]
pub mod agents;
pub mod config;
pub mod envs;
mod error;
pub mod logging;
pub mod simulation;
pub mod spaces;
pub mod torch;
pub mod utils;

pub use agents::{Actor, ActorMode, ExpertBuffer, FnExpert};
pub use config::{AgentConfig, LineSearchConfig, TrainConfig};
pub use envs::{EnvStep, EnvStructure, Environment};
pub use error::{ConfigError, TrainError};
pub use logging::RunLog;
pub use simulation::{evaluate, run_repetitions, train, AeirlAgent, TrainSummary};
pub use spaces::{Action, ActionSpace};

/// Pseudo-random number generator owned by a single training run.
pub type Prng = rand_chacha::ChaCha8Rng;
