//! Deterministic policy evaluation
use crate::agents::{Actor, ActorMode};
use crate::envs::Environment;
use crate::utils::stats::OnlineMeanVariance;
use crate::Prng;

/// Mean undiscounted return of `actor` over `num_episodes` evaluation episodes.
///
/// Episode `n` runs on the environment reseeded with `n` so evaluations are reproducible
/// and comparable across iterations. Actions are the deterministic mode of the policy
/// ([`ActorMode::Release`]). Each episode stops after at most `max_steps` steps.
///
/// Returns zero if `num_episodes` is zero.
pub fn evaluate<E, A>(
    actor: &mut A,
    env: &mut E,
    num_episodes: usize,
    max_steps: usize,
    rng: &mut Prng,
) -> f64
where
    E: Environment + ?Sized,
    A: Actor + ?Sized,
{
    let mut returns = OnlineMeanVariance::default();
    for n in 0..num_episodes {
        env.seed(n as u64);
        let mut observation = env.reset();
        let mut total = 0.0;
        for _ in 0..max_steps {
            let action = actor.act(&observation, ActorMode::Release, rng);
            let step = env.step(&action);
            total += step.reward;
            if step.done {
                break;
            }
            observation = step.observation;
        }
        returns.push(total);
    }
    returns.mean()
}
