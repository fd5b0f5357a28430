//! Torch statistical distributions
//!
//! These types represent a batch of action distributions, one per observation.
//! The return values of statistics methods are tensors with the batch shape `[N]`.
mod categorical;
mod gaussian;

pub use categorical::Categorical;
pub use gaussian::DiagGaussian;

use crate::spaces::Action;
use crate::Prng;
use tch::{Kind, Tensor};

/// A batch of distributions supporting the statistics needed for trust region updates.
pub trait BatchDistribution {
    /// Log probabilities of the given elements, one per distribution.
    fn log_probs(&self, elements: &Tensor) -> Tensor;

    /// Distribution entropies.
    fn entropy(&self) -> Tensor;

    /// The KL divergence (relative entropy) from another batch of distributions.
    ///
    /// `KL(self || other)`
    fn kl_divergence_from(&self, other: &Self) -> Tensor;

    /// The most likely element of each distribution.
    fn mode(&self) -> Vec<Action>;

    /// Sample one element from each distribution.
    fn sample(&self, rng: &mut Prng) -> Vec<Action>;

    /// A copy that does not track gradients.
    #[must_use]
    fn detach(&self) -> Self;
}

/// Action distribution of a policy, one variant per kind of action space.
#[derive(Debug)]
pub enum ActionDistribution {
    /// Discrete actions parameterized by logits.
    Discrete(Categorical),
    /// Continuous actions with a diagonal covariance.
    Continuous(DiagGaussian),
}

impl BatchDistribution for ActionDistribution {
    fn log_probs(&self, elements: &Tensor) -> Tensor {
        match self {
            Self::Discrete(d) => d.log_probs(elements),
            Self::Continuous(d) => d.log_probs(elements),
        }
    }

    fn entropy(&self) -> Tensor {
        match self {
            Self::Discrete(d) => d.entropy(),
            Self::Continuous(d) => d.entropy(),
        }
    }

    /// # Panics
    /// If `other` is a different variant.
    fn kl_divergence_from(&self, other: &Self) -> Tensor {
        match (self, other) {
            (Self::Discrete(a), Self::Discrete(b)) => a.kl_divergence_from(b),
            (Self::Continuous(a), Self::Continuous(b)) => a.kl_divergence_from(b),
            _ => panic!("KL divergence between discrete and continuous distributions"),
        }
    }

    fn mode(&self) -> Vec<Action> {
        match self {
            Self::Discrete(d) => d.mode(),
            Self::Continuous(d) => d.mode(),
        }
    }

    fn sample(&self, rng: &mut Prng) -> Vec<Action> {
        match self {
            Self::Discrete(d) => d.sample(rng),
            Self::Continuous(d) => d.sample(rng),
        }
    }

    fn detach(&self) -> Self {
        match self {
            Self::Discrete(d) => Self::Discrete(d.detach()),
            Self::Continuous(d) => Self::Continuous(d.detach()),
        }
    }
}

/// Clamp float values to be >= the smallest finite float value.
fn clamp_float_min(x: &Tensor) -> Result<Tensor, Kind> {
    match x.kind() {
        Kind::Float => Ok(x.clamp_min(f64::from(f32::MIN))),
        Kind::Double => Ok(x.clamp_min(f64::MIN)),
        kind => Err(kind),
    }
}

/// Sum over the last dimension.
fn sum_last(x: &Tensor) -> Tensor {
    x.sum_dim_intlist(&[-1], false, Kind::Float)
}
