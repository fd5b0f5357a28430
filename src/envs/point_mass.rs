//! One-dimensional point mass environment
use super::{EnvStep, EnvStructure, Environment};
use crate::spaces::{Action, ActionSpace};
use crate::Prng;
use rand::{Rng, SeedableRng};

/// A point on a line pushed toward a fixed target.
///
/// The observation is `[position, target - position]`. The action is a scalar velocity,
/// clipped to `[-max_speed, max_speed]`. The reward is the negative absolute distance to the
/// target after the move. Episodes last `episode_len` steps and start at a uniform random
/// position in `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct PointMass {
    pub target: f64,
    pub max_speed: f64,
    pub episode_len: usize,
    position: Option<f64>,
    steps: usize,
    rng: Prng,
}

impl PointMass {
    pub fn new(target: f64, episode_len: usize, seed: u64) -> Self {
        Self {
            target,
            max_speed: 0.25,
            episode_len,
            position: None,
            steps: 0,
            rng: Prng::seed_from_u64(seed),
        }
    }

    /// A proportional controller that moves straight to the target.
    pub fn expert_action(&self, observation: &[f64]) -> Action {
        Action::Continuous(vec![observation[1].clamp(-self.max_speed, self.max_speed)])
    }

    fn observe(&self, position: f64) -> Vec<f64> {
        vec![position, self.target - position]
    }
}

impl Default for PointMass {
    fn default() -> Self {
        Self::new(0.5, 20, 0)
    }
}

impl Environment for PointMass {
    fn structure(&self) -> EnvStructure {
        EnvStructure {
            observation_dim: 2,
            action_space: ActionSpace::Continuous { dim: 1 },
        }
    }

    fn seed(&mut self, seed: u64) {
        self.rng = Prng::seed_from_u64(seed);
    }

    fn reset(&mut self) -> Vec<f64> {
        let position = self.rng.gen_range(-1.0..=1.0);
        self.position = Some(position);
        self.steps = 0;
        self.observe(position)
    }

    fn step(&mut self, action: &Action) -> EnvStep {
        let position = self.position.expect("step called before reset");
        let velocity = match action {
            Action::Continuous(v) if v.len() == 1 => v[0],
            other => panic!("invalid action {:?}", other),
        };
        let velocity = if velocity.is_finite() {
            velocity.clamp(-self.max_speed, self.max_speed)
        } else {
            0.0
        };
        let next_position = position + velocity;
        self.steps += 1;
        let done = self.steps >= self.episode_len;
        self.position = if done { None } else { Some(next_position) };
        EnvStep {
            observation: self.observe(next_position),
            reward: -(self.target - next_position).abs(),
            done,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing;
    use super::*;

    #[test]
    fn run_default() {
        let mut env = PointMass::default();
        testing::check_episodes(&mut env, &Action::Continuous(vec![0.1]), 5);
    }

    #[test]
    fn expert_reaches_target() {
        let mut env = PointMass::new(0.5, 20, 1);
        let mut observation = env.reset();
        let mut last_reward = f64::NEG_INFINITY;
        loop {
            let action = env.expert_action(&observation);
            let step = env.step(&action);
            last_reward = step.reward;
            observation = step.observation;
            if step.done {
                break;
            }
        }
        assert!(last_reward.abs() < 1e-9);
    }
}
