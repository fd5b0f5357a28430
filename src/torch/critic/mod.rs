//! Cost-to-go and advantage estimation
mod gae;

pub use gae::{discounted_returns, generalized_advantages, td_residuals};

use super::utils::to_f64_vec;
use super::value::ValueNetwork;
use crate::utils::stats::OnlineMeanVariance;
use tch::Tensor;
use thiserror::Error;

/// Advantages cannot be standardized.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum AdvantageError {
    #[error("cannot standardize {0} advantage(s); at least 2 are required")]
    TooFewSamples(usize),
    #[error("advantage standard deviation is {0}")]
    DegenerateStd(f64),
}

/// Per-step regression targets for the value function and advantages for the policy.
///
/// Both are aligned with the steps of the batch they were estimated from.
#[derive(Debug, Clone, PartialEq)]
pub struct Targets {
    pub returns: Vec<f64>,
    pub advantages: Vec<f64>,
}

/// Estimate returns and advantages for a batch of concatenated trajectories.
///
/// # Args
/// * `value_fn` - State value function evaluated on `observations` (without gradients).
/// * `observations` - Batch observations, shape `[N, observation_dim]`.
/// * `episode_lengths` - Lengths of the consecutive trajectories making up the batch; sum to `N`.
/// * `costs` - Per-step costs, length `N`.
/// * `gamma` - Discount factor.
/// * `lambda` - GAE trace-decay factor.
///
/// # Panics
/// If the lengths are inconsistent.
pub fn estimate_targets(
    value_fn: &ValueNetwork,
    observations: &Tensor,
    episode_lengths: &[usize],
    costs: &[f64],
    gamma: f64,
    lambda: f64,
) -> Targets {
    let values = {
        let _no_grad = tch::no_grad_guard();
        to_f64_vec(&value_fn.forward(observations))
    };
    assert_eq!(values.len(), costs.len(), "one observation per cost");
    assert_eq!(
        episode_lengths.iter().sum::<usize>(),
        costs.len(),
        "episode lengths must cover the batch"
    );

    let mut returns = Vec::with_capacity(costs.len());
    let mut advantages = Vec::with_capacity(costs.len());
    let mut start = 0;
    for len in episode_lengths {
        let end = start + len;
        returns.extend(discounted_returns(&costs[start..end], gamma));
        advantages.extend(generalized_advantages(
            &costs[start..end],
            &values[start..end],
            gamma,
            lambda,
        ));
        start = end;
    }
    Targets {
        returns,
        advantages,
    }
}

/// Standardize advantages in place to zero mean and unit (sample) standard deviation.
pub fn normalize_advantages(advantages: &mut [f64]) -> Result<(), AdvantageError> {
    if advantages.len() < 2 {
        return Err(AdvantageError::TooFewSamples(advantages.len()));
    }
    let stats: OnlineMeanVariance<f64> = advantages.iter().copied().collect();
    let std = stats.sample_variance().sqrt();
    if !(std > 0.0 && std.is_finite()) {
        return Err(AdvantageError::DegenerateStd(std));
    }
    let mean = stats.mean();
    for a in advantages.iter_mut() {
        *a = (*a - mean) / std;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::torch::{observation_tensor, MlpConfig};
    use crate::Prng;
    use rand::SeedableRng;

    #[test]
    fn normalized_mean_and_std() {
        let mut advantages = vec![1.0, 2.0, 3.0, 4.0];
        normalize_advantages(&mut advantages).unwrap();
        let mean: f64 = advantages.iter().sum::<f64>() / 4.0;
        let var: f64 = advantages.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / 3.0;
        assert!(mean.abs() < 1e-12);
        assert!((var - 1.0).abs() < 1e-12);
    }

    #[test]
    fn zero_variance_is_an_error() {
        let mut advantages = vec![0.5; 10];
        assert_eq!(
            normalize_advantages(&mut advantages),
            Err(AdvantageError::DegenerateStd(0.0))
        );
        assert_eq!(advantages, vec![0.5; 10]);
    }

    #[test]
    fn single_sample_is_an_error() {
        assert_eq!(
            normalize_advantages(&mut [1.0]),
            Err(AdvantageError::TooFewSamples(1))
        );
    }

    #[test]
    fn non_finite_is_an_error() {
        let mut advantages = vec![1.0, f64::NAN, 2.0];
        assert!(matches!(
            normalize_advantages(&mut advantages),
            Err(AdvantageError::DegenerateStd(_))
        ));
    }

    #[test]
    fn targets_restart_at_episode_boundaries() {
        let value_fn = ValueNetwork::new(1, &MlpConfig::default(), &mut Prng::seed_from_u64(0));
        let observations: Vec<Vec<f64>> = (0..5).map(|i| vec![f64::from(i)]).collect();
        let observations = observation_tensor(&observations, 1);
        let costs = [0.1, 0.2, 0.3, 0.4, 0.5];

        let targets = estimate_targets(&value_fn, &observations, &[2, 3], &costs, 0.9, 0.8);
        let mut expected_returns = discounted_returns(&costs[..2], 0.9);
        expected_returns.extend(discounted_returns(&costs[2..], 0.9));
        assert_eq!(targets.returns, expected_returns);
        assert_eq!(targets.advantages.len(), 5);

        let values = {
            let _no_grad = tch::no_grad_guard();
            to_f64_vec(&value_fn.forward(&observations))
        };
        // Last step of the first episode bootstraps from 0, not from the next episode's value
        let last = costs[1] - values[1];
        assert!((targets.advantages[1] - last).abs() < 1e-6);
    }
}
