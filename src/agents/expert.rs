//! Expert policies and demonstration data
use super::{Actor, ActorMode};
use crate::envs::Environment;
use crate::error::ConfigError;
use crate::simulation::rollout;
use crate::spaces::{Action, ActionSpace};
use crate::torch::observation_tensor;
use crate::Prng;
use rand_distr::{Distribution, Normal};
use std::fmt;
use tch::Tensor;

/// An expert policy defined by a function from observations to actions.
///
/// Expert actions are deterministic; the actor mode and random state are ignored.
pub struct FnExpert<F>(pub F);

impl<F> fmt::Debug for FnExpert<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("FnExpert")
    }
}

impl<F> Actor for FnExpert<F>
where
    F: FnMut(&[f64]) -> Action,
{
    fn act(&mut self, observation: &[f64], _: ActorMode, _: &mut Prng) -> Action {
        (self.0)(observation)
    }
}

/// Fixed set of expert (observation, action) pairs collected before training.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpertBuffer {
    observations: Vec<Vec<f64>>,
    actions: Vec<Action>,
    action_space: ActionSpace,
    observation_dim: usize,
    reward_mean: Option<f64>,
}

impl ExpertBuffer {
    /// Collect at least `num_steps` expert steps from `env`.
    ///
    /// Gaussian noise with standard deviation `noise` is added to the stored observations,
    /// and to the stored actions when the action space is continuous.
    /// The environment itself always receives the expert's noise-free action.
    /// The expert reward mean is computed over the noise-free episodes.
    ///
    /// Returns an error if `noise` is negative or not finite.
    pub fn collect<E, A>(
        env: &mut E,
        expert: &mut A,
        num_steps: usize,
        horizon: Option<usize>,
        noise: f64,
        rng: &mut Prng,
    ) -> Result<Self, ConfigError>
    where
        E: Environment + ?Sized,
        A: Actor + ?Sized,
    {
        let invalid_noise = || ConfigError::OutOfRange {
            name: "expert_noise",
            value: noise,
            min: 0.0,
            max: f64::INFINITY,
        };
        if !(noise >= 0.0 && noise.is_finite()) {
            return Err(invalid_noise());
        }

        let structure = env.structure();
        let batch = rollout::collect(env, expert, ActorMode::Release, num_steps, horizon, rng);
        let reward_mean = batch.completed_reward_mean();

        let mut observations: Vec<Vec<f64>> = batch.observations().cloned().collect();
        let mut actions: Vec<Action> = batch.actions().cloned().collect();
        if noise > 0.0 {
            let normal = Normal::new(0.0, noise).map_err(|_| invalid_noise())?;
            for observation in &mut observations {
                for x in observation.iter_mut() {
                    *x += normal.sample(rng);
                }
            }
            for action in &mut actions {
                if let Action::Continuous(values) = action {
                    for x in values.iter_mut() {
                        *x += normal.sample(rng);
                    }
                }
            }
        }

        Ok(Self {
            observations,
            actions,
            action_space: structure.action_space,
            observation_dim: structure.observation_dim,
            reward_mean,
        })
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn observations(&self) -> &[Vec<f64>] {
        &self.observations
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Mean total reward of the expert's completed episodes.
    pub const fn reward_mean(&self) -> Option<f64> {
        self.reward_mean
    }

    /// Observations as an `f32` tensor of shape `[N, observation_dim]`.
    pub fn observation_tensor(&self) -> Tensor {
        observation_tensor(&self.observations, self.observation_dim)
    }

    /// Action features as an `f32` tensor of shape `[N, num_features]`.
    pub fn action_features(&self) -> Tensor {
        self.action_space.batch_features(&self.actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envs::{PointMass, TwoStateEnv};
    use rand::SeedableRng;
    use rstest::rstest;

    fn two_state_expert() -> FnExpert<impl FnMut(&[f64]) -> Action> {
        FnExpert(TwoStateEnv::optimal_action)
    }

    #[test]
    fn collects_budget() {
        let mut env = TwoStateEnv::new(5, 0);
        let mut rng = Prng::seed_from_u64(0);
        let buffer =
            ExpertBuffer::collect(&mut env, &mut two_state_expert(), 12, None, 0.0, &mut rng)
                .unwrap();
        // Whole episodes of 5 steps
        assert_eq!(buffer.len(), 15);
        assert_eq!(buffer.observations().len(), 15);
        assert_eq!(buffer.reward_mean(), Some(5.0));
        assert_eq!(buffer.observation_tensor().size(), vec![15, 2]);
        assert_eq!(buffer.action_features().size(), vec![15, 2]);
    }

    #[test]
    fn noise_changes_observations_not_discrete_actions() {
        let mut rng = Prng::seed_from_u64(0);
        let clean = ExpertBuffer::collect(
            &mut TwoStateEnv::new(5, 0),
            &mut two_state_expert(),
            10,
            None,
            0.0,
            &mut rng,
        )
        .unwrap();
        let noisy = ExpertBuffer::collect(
            &mut TwoStateEnv::new(5, 0),
            &mut two_state_expert(),
            10,
            None,
            0.5,
            &mut rng,
        )
        .unwrap();
        assert_eq!(clean.actions(), noisy.actions());
        assert_ne!(clean.observations(), noisy.observations());
        assert_eq!(clean.reward_mean(), noisy.reward_mean());
    }

    #[test]
    fn noise_applies_to_continuous_actions() {
        let mut rng = Prng::seed_from_u64(1);
        let reference = PointMass::default();
        let mut expert = FnExpert(move |obs: &[f64]| reference.expert_action(obs));
        let clean = ExpertBuffer::collect(
            &mut PointMass::default(),
            &mut expert,
            20,
            None,
            0.0,
            &mut rng,
        )
        .unwrap();
        let noisy = ExpertBuffer::collect(
            &mut PointMass::default(),
            &mut expert,
            20,
            None,
            0.1,
            &mut rng,
        )
        .unwrap();
        assert_eq!(clean.len(), noisy.len());
        assert_ne!(clean.actions(), noisy.actions());
    }

    #[rstest]
    #[case::negative(-0.5)]
    #[case::nan(f64::NAN)]
    #[case::infinite(f64::INFINITY)]
    fn invalid_noise_is_rejected(#[case] noise: f64) {
        let mut rng = Prng::seed_from_u64(0);
        let result = ExpertBuffer::collect(
            &mut TwoStateEnv::new(5, 0),
            &mut two_state_expert(),
            10,
            None,
            noise,
            &mut rng,
        );
        assert!(matches!(
            result,
            Err(ConfigError::OutOfRange {
                name: "expert_noise",
                ..
            })
        ));
    }
}
