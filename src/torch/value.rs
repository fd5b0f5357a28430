//! State value network
use super::modules::{Mlp, MlpConfig, Module};
use crate::Prng;
use tch::{nn::VarStore, Device, Tensor};

/// State value function V_φ.
pub struct ValueNetwork {
    mlp: Mlp,
    params: Vec<Tensor>,
}

impl ValueNetwork {
    pub fn new(observation_dim: usize, config: &MlpConfig, rng: &mut Prng) -> Self {
        let vs = VarStore::new(Device::Cpu);
        let (mlp, params) = Mlp::new(&(&vs.root() / "value"), observation_dim, 1, config, rng);
        Self { mlp, params }
    }

    /// Values of a batch of observations `[N, observation_dim]`, shape `[N]`.
    pub fn forward(&self, observations: &Tensor) -> Tensor {
        self.mlp.forward(observations).squeeze_dim(-1)
    }
}

impl Module for ValueNetwork {
    fn trainable_variables(&self) -> &[Tensor] {
        &self.params
    }
}
