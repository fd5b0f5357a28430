//! Diagonal Gaussian distribution
use super::{sum_last, BatchDistribution};
use crate::spaces::Action;
use crate::torch::utils::to_f64_vec;
use crate::Prng;
use rand_distr::{Distribution, StandardNormal};
use std::f64::consts::PI;
use tch::Tensor;

/// Multivariate Gaussian distribution(s) with a diagonal covariance matrix.
#[derive(Debug)]
pub struct DiagGaussian {
    /// Means. Shape `[N, K]`.
    mean: Tensor,
    /// Log standard deviations. Same shape as `mean`.
    log_std: Tensor,
}

impl DiagGaussian {
    /// Initialize from means of shape `[N, K]` and log standard deviations.
    ///
    /// `log_std` may have any shape that broadcasts to the shape of `mean`,
    /// typically a single state-independent vector of shape `[K]`.
    pub fn new(mean: Tensor, log_std: &Tensor) -> Self {
        let log_std = log_std.expand_as(&mean);
        Self { mean, log_std }
    }

    pub const fn mean(&self) -> &Tensor {
        &self.mean
    }

    pub const fn log_std(&self) -> &Tensor {
        &self.log_std
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn rows(tensor: &Tensor) -> Vec<Vec<f64>> {
        let dim = *tensor.size().last().unwrap_or(&0) as usize;
        if dim == 0 {
            return Vec::new();
        }
        to_f64_vec(&tensor.detach())
            .chunks(dim)
            .map(<[f64]>::to_vec)
            .collect()
    }
}

impl BatchDistribution for DiagGaussian {
    #[allow(clippy::cast_precision_loss)]
    fn log_probs(&self, elements: &Tensor) -> Tensor {
        let dim = *self.mean.size().last().unwrap_or(&0) as f64;
        let z = (elements - &self.mean) / self.log_std.exp();
        -0.5 * sum_last(&(&z * &z)) - sum_last(&self.log_std) - 0.5 * dim * (2.0 * PI).ln()
    }

    fn entropy(&self) -> Tensor {
        sum_last(&(&self.log_std + 0.5 * (2.0 * PI * std::f64::consts::E).ln()))
    }

    fn kl_divergence_from(&self, other: &Self) -> Tensor {
        let var = (2.0_f64 * &self.log_std).exp();
        let other_var = (2.0_f64 * &other.log_std).exp();
        let diff = &self.mean - &other.mean;
        sum_last(
            &(&other.log_std - &self.log_std + (var + &diff * &diff) / (2.0 * other_var) - 0.5),
        )
    }

    fn mode(&self) -> Vec<Action> {
        Self::rows(&self.mean)
            .into_iter()
            .map(Action::Continuous)
            .collect()
    }

    fn sample(&self, rng: &mut Prng) -> Vec<Action> {
        let stds = Self::rows(&self.log_std.exp());
        Self::rows(&self.mean)
            .into_iter()
            .zip(stds)
            .map(|(mean, std)| {
                let values = mean
                    .iter()
                    .zip(&std)
                    .map(|(m, s)| {
                        let noise: f64 = StandardNormal.sample(rng);
                        m + s * noise
                    })
                    .collect();
                Action::Continuous(values)
            })
            .collect()
    }

    fn detach(&self) -> Self {
        Self {
            mean: self.mean.detach(),
            log_std: self.log_std.detach(),
        }
    }
}
