//! Rollout collection
use crate::agents::{Actor, ActorMode};
use crate::envs::Environment;
use crate::spaces::Action;
use crate::utils::stats::OnlineMeanVariance;
use crate::Prng;

/// How a trajectory ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Termination {
    /// The environment reported the end of the episode.
    Natural,
    /// The episode was cut off at the horizon.
    Horizon,
}

/// A single episode of (observation, action, reward) steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub observations: Vec<Vec<f64>>,
    pub actions: Vec<Action>,
    pub rewards: Vec<f64>,
    pub termination: Termination,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    /// Undiscounted sum of the environment rewards.
    pub fn total_reward(&self) -> f64 {
        self.rewards.iter().sum()
    }
}

/// Trajectories collected in one iteration, in collection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    trajectories: Vec<Trajectory>,
    num_steps: usize,
}

impl Batch {
    pub fn trajectories(&self) -> &[Trajectory] {
        &self.trajectories
    }

    /// Total number of steps over all trajectories.
    pub const fn num_steps(&self) -> usize {
        self.num_steps
    }

    pub fn num_episodes(&self) -> usize {
        self.trajectories.len()
    }

    pub fn episode_lengths(&self) -> Vec<usize> {
        self.trajectories.iter().map(Trajectory::len).collect()
    }

    /// All step observations, trajectory by trajectory.
    pub fn observations(&self) -> impl Iterator<Item = &Vec<f64>> {
        self.trajectories.iter().flat_map(|t| &t.observations)
    }

    /// All step actions, aligned with [`Batch::observations`].
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.trajectories.iter().flat_map(|t| &t.actions)
    }

    /// Mean episode reward over the completed trajectories or `None` if there are none.
    ///
    /// Trajectories cut off at the horizon count as completed.
    pub fn completed_reward_mean(&self) -> Option<f64> {
        self.trajectories
            .iter()
            .map(Trajectory::total_reward)
            .collect::<OnlineMeanVariance<f64>>()
            .mean_or_none()
    }

    fn push(&mut self, trajectory: Trajectory) {
        self.num_steps += trajectory.len();
        self.trajectories.push(trajectory);
    }
}

/// Run one episode from a fresh reset.
///
/// The episode ends when the environment reports `done`
/// or, if `horizon` is set, after `horizon` steps.
/// With `horizon = None` this does not return unless the environment ends the episode.
pub fn run_episode<E, A>(
    env: &mut E,
    actor: &mut A,
    mode: ActorMode,
    horizon: Option<usize>,
    rng: &mut Prng,
) -> Trajectory
where
    E: Environment + ?Sized,
    A: Actor + ?Sized,
{
    let mut observations = Vec::new();
    let mut actions = Vec::new();
    let mut rewards = Vec::new();
    let mut observation = env.reset();
    let termination = loop {
        let action = actor.act(&observation, mode, rng);
        let step = env.step(&action);
        observations.push(observation);
        actions.push(action);
        rewards.push(step.reward);
        if step.done {
            break Termination::Natural;
        }
        if horizon.map_or(false, |h| rewards.len() >= h) {
            break Termination::Horizon;
        }
        observation = step.observation;
    };
    Trajectory {
        observations,
        actions,
        rewards,
        termination,
    }
}

/// Collect whole episodes until at least `num_steps` steps have been taken.
///
/// The episode in progress when the budget is reached runs to its end,
/// so the batch may exceed the budget by less than the episode length.
/// With `horizon = Some(1)` the batch has exactly `num_steps` steps.
///
/// With `horizon = None` every episode must end naturally,
/// otherwise this never returns. Set a horizon for environments without terminal states.
pub fn collect<E, A>(
    env: &mut E,
    actor: &mut A,
    mode: ActorMode,
    num_steps: usize,
    horizon: Option<usize>,
    rng: &mut Prng,
) -> Batch
where
    E: Environment + ?Sized,
    A: Actor + ?Sized,
{
    let mut batch = Batch::default();
    while batch.num_steps() < num_steps {
        batch.push(run_episode(env, actor, mode, horizon, rng));
    }
    batch
}
