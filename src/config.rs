//! Training configuration
use crate::error::ConfigError;
use crate::torch::{DiscriminatorConfig, MlpConfig};
use serde::{Deserialize, Serialize};

/// Training loop configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Number of outer iterations.
    pub num_iters: u64,
    /// Minimum number of environment steps collected per iteration.
    pub num_steps_per_iter: usize,
    /// Force-terminate episodes after this many steps.
    pub horizon: Option<usize>,
    /// Discriminator regularization weight. Reserved; not used by the training loop.
    pub lambda: f64,
    /// Discount factor of the imitation cost.
    pub gae_gamma: f64,
    /// Trace-decay factor of the generalized advantage estimator.
    pub gae_lambda: f64,
    /// Trust region radius of the value step.
    pub epsilon: f64,
    /// Trust region radius (mean KL divergence) of the policy step.
    pub max_kl: f64,
    /// Damping added to the Fisher-vector products of the policy step.
    pub cg_damping: f64,
    /// Standardize advantages across each batch.
    pub normalize_advantage: bool,
    /// Number of evaluation episodes.
    pub nb_eval: usize,
    /// Maximum number of steps per evaluation episode.
    pub nb_step_eval: usize,
    /// Evaluate every `eval_freq` iterations (and always after the first).
    pub eval_freq: u64,
    /// Standard deviation of the Gaussian noise added to expert demonstrations.
    pub expert_noise: f64,
    /// Seed of the run's random number generator.
    pub seed: u64,
    /// Maximum number of conjugate gradient iterations.
    pub cg_iters: u64,
    /// Squared residual norm below which conjugate gradient stops.
    pub cg_residual_tol: f64,
    /// Backtracking line search of the policy step.
    pub line_search: LineSearchConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            num_iters: 500,
            num_steps_per_iter: 2000,
            horizon: None,
            lambda: 1e-3,
            gae_gamma: 0.99,
            gae_lambda: 0.99,
            epsilon: 0.01,
            max_kl: 0.01,
            cg_damping: 0.1,
            normalize_advantage: true,
            nb_eval: 10,
            nb_step_eval: 10_000,
            eval_freq: 10,
            expert_noise: 0.0,
            seed: 0,
            cg_iters: 10,
            cg_residual_tol: 1e-10,
            line_search: LineSearchConfig::default(),
        }
    }
}

impl TrainConfig {
    /// Check that all values are in their valid ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_steps_per_iter == 0 {
            return Err(ConfigError::Zero("num_steps_per_iter"));
        }
        if self.horizon == Some(0) {
            return Err(ConfigError::Zero("horizon"));
        }
        if self.eval_freq == 0 {
            return Err(ConfigError::Zero("eval_freq"));
        }
        if self.nb_eval == 0 {
            return Err(ConfigError::Zero("nb_eval"));
        }
        if self.nb_step_eval == 0 {
            return Err(ConfigError::Zero("nb_step_eval"));
        }
        unit_interval("gae_gamma", self.gae_gamma)?;
        unit_interval("gae_lambda", self.gae_lambda)?;
        positive("epsilon", self.epsilon)?;
        positive("max_kl", self.max_kl)?;
        non_negative("cg_damping", self.cg_damping)?;
        non_negative("expert_noise", self.expert_noise)?;
        non_negative("cg_residual_tol", self.cg_residual_tol)?;
        self.line_search.validate()
    }

    /// Whether evaluation runs after iteration `i` (zero-based).
    pub const fn is_eval_iteration(&self, i: u64) -> bool {
        i == 0 || (i + 1) % self.eval_freq == 0
    }
}

/// Backtracking line search configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineSearchConfig {
    /// Number of step sizes tried before giving up.
    pub max_backtracks: u64,
    /// Step size multiplier between successive tries.
    pub backtrack_ratio: f64,
    /// Minimum ratio of actual to expected (first-order) improvement. Zero disables the check.
    pub accept_ratio: f64,
}

impl Default for LineSearchConfig {
    fn default() -> Self {
        Self {
            max_backtracks: 10,
            backtrack_ratio: 0.5,
            accept_ratio: 0.0,
        }
    }
}

impl LineSearchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_backtracks == 0 {
            return Err(ConfigError::Zero("max_backtracks"));
        }
        if !(self.backtrack_ratio > 0.0 && self.backtrack_ratio < 1.0) {
            return Err(ConfigError::OutOfRange {
                name: "backtrack_ratio",
                value: self.backtrack_ratio,
                min: 0.0,
                max: 1.0,
            });
        }
        non_negative("accept_ratio", self.accept_ratio)
    }
}

/// Network configuration of an agent.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub policy: MlpConfig,
    pub value: MlpConfig,
    pub discriminator: DiscriminatorConfig,
}

impl AgentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("discriminator.learning_rate", self.discriminator.learning_rate)?;
        if self.discriminator.latent_dim == 0 {
            return Err(ConfigError::Zero("discriminator.latent_dim"));
        }
        Ok(())
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { name, value })
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            min: 0.0,
            max: f64::INFINITY,
        })
    }
}

fn unit_interval(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            min: 0.0,
            max: 1.0,
        })
    }
}
