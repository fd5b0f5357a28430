//! Policy network
use super::distributions::{ActionDistribution, BatchDistribution, Categorical, DiagGaussian};
use super::modules::{Mlp, MlpConfig, Module};
use super::observation_tensor;
use crate::agents::{Actor, ActorMode};
use crate::envs::EnvStructure;
use crate::spaces::{Action, ActionSpace};
use crate::Prng;
use tch::{nn::VarStore, Device, Tensor};

/// Stochastic policy network π_θ.
///
/// For discrete action spaces the network outputs logits of a categorical distribution.
/// For continuous action spaces it outputs the mean of a diagonal Gaussian
/// whose log standard deviation is a separate state-independent parameter.
pub struct PolicyNetwork {
    mlp: Mlp,
    log_std: Option<Tensor>,
    params: Vec<Tensor>,
    observation_dim: usize,
    action_space: ActionSpace,
}

impl PolicyNetwork {
    #[allow(clippy::cast_possible_wrap)]
    pub fn new(structure: &EnvStructure, config: &MlpConfig, rng: &mut Prng) -> Self {
        let vs = VarStore::new(Device::Cpu);
        let root = vs.root();
        let (mlp, mut params) = Mlp::new(
            &(&root / "policy"),
            structure.observation_dim,
            structure.action_space.num_distribution_params(),
            config,
            rng,
        );
        let log_std = match structure.action_space {
            ActionSpace::Discrete { .. } => None,
            ActionSpace::Continuous { dim } => {
                let log_std = root.zeros("log_std", &[dim as i64]);
                params.push(log_std.shallow_clone());
                Some(log_std)
            }
        };
        Self {
            mlp,
            log_std,
            params,
            observation_dim: structure.observation_dim,
            action_space: structure.action_space,
        }
    }

    /// Action distributions for a batch of observations of shape `[N, observation_dim]`.
    pub fn distribution(&self, observations: &Tensor) -> ActionDistribution {
        let output = self.mlp.forward(observations);
        match &self.log_std {
            None => ActionDistribution::Discrete(Categorical::new(&output)),
            Some(log_std) => ActionDistribution::Continuous(DiagGaussian::new(output, log_std)),
        }
    }

    pub const fn action_space(&self) -> ActionSpace {
        self.action_space
    }

    pub const fn observation_dim(&self) -> usize {
        self.observation_dim
    }
}

impl Module for PolicyNetwork {
    fn trainable_variables(&self) -> &[Tensor] {
        &self.params
    }
}

impl Actor for PolicyNetwork {
    fn act(&mut self, observation: &[f64], mode: ActorMode, rng: &mut Prng) -> Action {
        let _no_grad = tch::no_grad_guard();
        let input = observation_tensor([observation], self.observation_dim);
        let distribution = self.distribution(&input);
        let mut actions = match mode {
            ActorMode::Training => distribution.sample(rng),
            ActorMode::Release => distribution.mode(),
        };
        actions
            .pop()
            .expect("one action per observation by construction")
    }
}
