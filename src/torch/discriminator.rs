//! Auto-encoder discriminator
//!
//! The discriminator reconstructs concatenated (observation, action features) vectors.
//! Its raw output `f` is the per-pair mean squared reconstruction error and the per-step
//! imitation signal is the score `1 / (1 + f)`.
//! Training pushes expert pairs toward a small reconstruction error (score near 1)
//! and policy pairs toward a large one (score near 0).
use super::modules::{Activation, Mlp, MlpConfig, Module};
use crate::envs::EnvStructure;
use crate::Prng;
use serde::{Deserialize, Serialize};
use tch::{nn::VarStore, COptimizer, Device, Kind, TchError, Tensor};

/// Scores are clamped into `[SCORE_EPS, 1 - SCORE_EPS]`.
pub const SCORE_EPS: f64 = 1e-6;

/// Configuration of the [`Discriminator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscriminatorConfig {
    /// Hidden layer sizes of the encoder; the decoder mirrors them.
    pub hidden_sizes: Vec<usize>,
    /// Size of the latent code.
    pub latent_dim: usize,
    /// Activation function between layers.
    pub activation: Activation,
    /// Adam learning rate
    pub learning_rate: f64,
    /// Adam coefficient for the running average of the gradient
    pub beta1: f64,
    /// Adam coefficient for the running average of the square of the gradient
    pub beta2: f64,
    /// Weight decay (L2 penalty)
    pub weight_decay: f64,
}

impl Default for DiscriminatorConfig {
    fn default() -> Self {
        Self {
            hidden_sizes: vec![50],
            latent_dim: 10,
            activation: Activation::Tanh,
            learning_rate: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            weight_decay: 0.0,
        }
    }
}

/// Auto-encoder discriminator ψ over (observation, action) pairs.
pub struct Discriminator {
    encoder: Mlp,
    decoder: Mlp,
    params: Vec<Tensor>,
    optimizer: COptimizer,
}

impl Discriminator {
    pub fn new(
        structure: &EnvStructure,
        config: &DiscriminatorConfig,
        rng: &mut Prng,
    ) -> Result<Self, TchError> {
        let input_dim = structure.observation_dim + structure.action_space.num_features();
        let vs = VarStore::new(Device::Cpu);
        let root = vs.root();

        let encoder_config = MlpConfig {
            hidden_sizes: config.hidden_sizes.clone(),
            activation: config.activation,
            output_activation: config.activation,
            ..MlpConfig::default()
        };
        let decoder_config = MlpConfig {
            hidden_sizes: config.hidden_sizes.iter().rev().copied().collect(),
            activation: config.activation,
            output_activation: Activation::Identity,
            ..MlpConfig::default()
        };
        let (encoder, mut params) = Mlp::new(
            &(&root / "encoder"),
            input_dim,
            config.latent_dim,
            &encoder_config,
            rng,
        );
        let (decoder, decoder_params) = Mlp::new(
            &(&root / "decoder"),
            config.latent_dim,
            input_dim,
            &decoder_config,
            rng,
        );
        params.extend(decoder_params);

        let mut optimizer = COptimizer::adam(
            config.learning_rate,
            config.beta1,
            config.beta2,
            config.weight_decay,
        )?;
        for param in &params {
            optimizer.add_parameters(param, 0)?;
        }

        Ok(Self {
            encoder,
            decoder,
            params,
            optimizer,
        })
    }

    /// Per-pair mean squared reconstruction error, shape `[N]`.
    ///
    /// # Args
    /// * `observations` - `f32` tensor of shape `[N, observation_dim]`.
    /// * `action_features` - `f32` tensor of shape `[N, num_features]`.
    pub fn raw_output(&self, observations: &Tensor, action_features: &Tensor) -> Tensor {
        let input = Tensor::cat(&[observations, action_features], -1);
        let reconstruction = self.decoder.forward(&self.encoder.forward(&input));
        (reconstruction - &input)
            .square()
            .mean_dim(&[-1], false, Kind::Float)
    }

    /// Per-pair score `1 / (1 + f)` in `[SCORE_EPS, 1 - SCORE_EPS]`, shape `[N]`.
    pub fn score(&self, observations: &Tensor, action_features: &Tensor) -> Tensor {
        score_from_raw(&self.raw_output(observations, action_features))
    }

    /// One Adam step on `mean(score(policy)) - mean(score(expert))`.
    ///
    /// Returns the loss before the step.
    pub fn update(
        &mut self,
        expert_observations: &Tensor,
        expert_action_features: &Tensor,
        policy_observations: &Tensor,
        policy_action_features: &Tensor,
    ) -> Result<f64, TchError> {
        let policy_scores = self.score(policy_observations, policy_action_features);
        let expert_scores = self.score(expert_observations, expert_action_features);
        let loss = policy_scores.f_mean(Kind::Float)? - expert_scores.f_mean(Kind::Float)?;

        self.optimizer.zero_grad()?;
        loss.backward();
        self.optimizer.step()?;
        loss.f_double_value(&[])
    }
}

impl Module for Discriminator {
    fn trainable_variables(&self) -> &[Tensor] {
        &self.params
    }
}

/// Convert raw discriminator outputs into scores `1 / (1 + max(f, 0))` clamped away from 0 and 1.
pub fn score_from_raw(raw: &Tensor) -> Tensor {
    (raw.clamp_min(0.0) + 1.0)
        .reciprocal()
        .clamp(SCORE_EPS, 1.0 - SCORE_EPS)
}
