//! Actors and expert demonstrations
mod expert;

pub use expert::{ExpertBuffer, FnExpert};

use crate::spaces::Action;
use crate::Prng;

/// Whether an actor is exploring during training or acting deterministically.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ActorMode {
    /// Sample actions from the action distribution.
    Training,
    /// Take the most likely action (the distribution mode).
    Release,
}

/// An actor that produces actions given observations.
pub trait Actor {
    /// Choose an action in the environment.
    ///
    /// # Args
    /// * `observation`: The current observation of the environment state.
    /// * `mode`: Sampled (training) or deterministic (release) action selection.
    /// * `rng`: A (pseudo) random number generator available to the actor.
    fn act(&mut self, observation: &[f64], mode: ActorMode, rng: &mut Prng) -> Action;
}

impl<T: Actor + ?Sized> Actor for &'_ mut T {
    fn act(&mut self, observation: &[f64], mode: ActorMode, rng: &mut Prng) -> Action {
        T::act(self, observation, mode, rng)
    }
}

impl<T: Actor + ?Sized> Actor for Box<T> {
    fn act(&mut self, observation: &[f64], mode: ActorMode, rng: &mut Prng) -> Action {
        T::act(self, observation, mode, rng)
    }
}
