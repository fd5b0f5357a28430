//! Reinforcement learning environments
mod point_mass;
mod two_state;

pub use point_mass::PointMass;
pub use two_state::TwoStateEnv;

use crate::spaces::{Action, ActionSpace};

/// The external structure of a reinforcement learning environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvStructure {
    /// Length of the observation vectors.
    pub observation_dim: usize,
    /// The space of all possible actions.
    ///
    /// Every element in this space must be a valid action.
    pub action_space: ActionSpace,
}

/// Result of a single environment step.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvStep {
    /// Observation of the resulting state.
    pub observation: Vec<f64>,
    /// The reward value for this transition.
    pub reward: f64,
    /// Whether the episode ended on this step.
    pub done: bool,
}

/// A reinforcement learning environment with internal state.
///
/// The environment owns its random state; [`Environment::seed`] makes the following
/// episodes reproducible.
pub trait Environment {
    /// Observation and action structure.
    fn structure(&self) -> EnvStructure;

    /// Reseed the internal random state.
    fn seed(&mut self, seed: u64);

    /// Start a new episode, returning the initial observation.
    fn reset(&mut self) -> Vec<f64>;

    /// Take a step in the environment.
    ///
    /// May panic if called before [`Environment::reset`] or after a step with `done = true`.
    fn step(&mut self, action: &Action) -> EnvStep;
}

impl<E: Environment + ?Sized> Environment for Box<E> {
    fn structure(&self) -> EnvStructure {
        E::structure(self)
    }
    fn seed(&mut self, seed: u64) {
        E::seed(self, seed)
    }
    fn reset(&mut self) -> Vec<f64> {
        E::reset(self)
    }
    fn step(&mut self, action: &Action) -> EnvStep {
        E::step(self, action)
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// Run an environment with a fixed action and check that invariants are satisfied.
    pub fn check_episodes<E: Environment>(env: &mut E, action: &Action, num_episodes: usize) {
        let structure = env.structure();
        assert!(structure.action_space.contains(action));
        for _ in 0..num_episodes {
            let observation = env.reset();
            assert_eq!(observation.len(), structure.observation_dim);
            let mut steps = 0;
            loop {
                let step = env.step(action);
                assert_eq!(step.observation.len(), structure.observation_dim);
                assert!(step.reward.is_finite());
                steps += 1;
                assert!(steps < 100_000, "episode did not terminate");
                if step.done {
                    break;
                }
            }
        }
    }
}
