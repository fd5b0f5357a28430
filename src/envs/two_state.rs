//! Two-state environment
use super::{EnvStep, EnvStructure, Environment};
use crate::spaces::{Action, ActionSpace};
use crate::Prng;
use rand::{Rng, SeedableRng};

/// Two-state, two-action environment with a known optimal deterministic policy.
///
/// * Observations are one-hot encodings of the current state.
/// * Action `a` moves the agent to state `a`.
/// * Leaving the current state (taking action `1 - state`) gives 1 reward; staying gives 0.
/// * Every episode lasts exactly `episode_len` steps and starts in a uniformly random state.
///
/// The optimal policy always switches state and earns `episode_len` per episode.
#[derive(Debug, Clone)]
pub struct TwoStateEnv {
    pub episode_len: usize,
    state: Option<usize>,
    steps: usize,
    rng: Prng,
}

impl TwoStateEnv {
    pub fn new(episode_len: usize, seed: u64) -> Self {
        Self {
            episode_len,
            state: None,
            steps: 0,
            rng: Prng::seed_from_u64(seed),
        }
    }

    /// The optimal action given an observation.
    pub fn optimal_action(observation: &[f64]) -> Action {
        if observation[0] > observation[1] {
            Action::Discrete(1)
        } else {
            Action::Discrete(0)
        }
    }

    fn observe(state: usize) -> Vec<f64> {
        let mut observation = vec![0.0; 2];
        observation[state] = 1.0;
        observation
    }
}

impl Default for TwoStateEnv {
    fn default() -> Self {
        Self::new(10, 0)
    }
}

impl Environment for TwoStateEnv {
    fn structure(&self) -> EnvStructure {
        EnvStructure {
            observation_dim: 2,
            action_space: ActionSpace::Discrete { num_actions: 2 },
        }
    }

    fn seed(&mut self, seed: u64) {
        self.rng = Prng::seed_from_u64(seed);
    }

    fn reset(&mut self) -> Vec<f64> {
        let state = self.rng.gen_range(0..2);
        self.state = Some(state);
        self.steps = 0;
        Self::observe(state)
    }

    fn step(&mut self, action: &Action) -> EnvStep {
        let state = self.state.expect("step called before reset");
        let next_state = match action {
            Action::Discrete(a) if *a < 2 => *a,
            other => panic!("invalid action {:?}", other),
        };
        let reward = if next_state == state { 0.0 } else { 1.0 };
        self.steps += 1;
        let done = self.steps >= self.episode_len;
        self.state = if done { None } else { Some(next_state) };
        EnvStep {
            observation: Self::observe(next_state),
            reward,
            done,
        }
    }
}
