//! Parameter initializers
//!
//! Values are drawn from the caller's random number generator rather than the global libtorch
//! generator so that independent runs are reproducible even when they share a process.
use crate::Prng;
use rand::distributions::{Distribution, Uniform};
use rand_distr::Normal;
use serde::{Deserialize, Serialize};
use tch::{TchError, Tensor};

/// Tensor initializers.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum Initializer {
    /// Initialize to all zeros
    Zeros,
    /// Initialize all elements to the given constant value.
    Constant(f64),
    /// Uniform distribution with variance scaled by the tensor dimensions.
    Uniform(VarianceScale),
    /// Normal distribution with variance scaled by the tensor dimensions.
    Normal(VarianceScale),
}

/// Defaults to `Uniform(FanAvg)` a.k.a. Glorot or Xavier initialization.
///
/// This samples from `Unif(±√(6 / (fan_in + fan_out)))`.
impl Default for Initializer {
    fn default() -> Self {
        Self::Uniform(VarianceScale::FanAvg)
    }
}

/// Variance scaling mode.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum VarianceScale {
    /// The initializer sampling variance is set to the given constant.
    Constant(f64),
    /// The initializer sampling variance is set to `1 / fan_in`.
    FanIn,
    /// The initializer sampling variance is set to `1 / fan_out`.
    FanOut,
    /// The initializer sampling variance is set to `2 / (fan_in + fan_out)`.
    FanAvg,
}

impl Default for VarianceScale {
    fn default() -> Self {
        Self::FanIn
    }
}

impl VarianceScale {
    /// Element sampling variance for the given tensor shape.
    fn variance(self, shape: &[i64]) -> f64 {
        let (fan_in, fan_out) = calculate_fan_in_and_fan_out(shape);
        match self {
            Self::Constant(v) => v,
            Self::FanIn => (fan_in as f64).recip(),
            Self::FanOut => (fan_out as f64).recip(),
            Self::FanAvg => 2.0 / (fan_in as f64 + fan_out as f64),
        }
    }
}

/// Calculate fan in and fan out for a tensor shape.
///
/// Based on the pytorch function [of the same name][1].
///
/// [1]: https://github.com/pytorch/pytorch/blob/f87f753bb997b2da82f7d2a561ccb40ab4f6bd9d/torch/nn/init.py#L284-L300
fn calculate_fan_in_and_fan_out(shape: &[i64]) -> (i64, i64) {
    // Use feature size of 1 if the dimensions are missing instead of returning an error
    let num_input_fmaps = shape.get(1).copied().unwrap_or(1);
    let num_output_fmaps = shape.get(0).copied().unwrap_or(1);
    let receptive_field_size: i64 = if shape.len() >= 2 {
        shape[2..].iter().product()
    } else {
        1
    };
    (
        num_input_fmaps * receptive_field_size,
        num_output_fmaps * receptive_field_size,
    )
}

impl Initializer {
    /// Overwrite the contents of `tensor` with freshly sampled values.
    ///
    /// Gradients are not recorded; a trainable tensor stays trainable.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn f_fill(&self, tensor: &Tensor, rng: &mut Prng) -> Result<(), TchError> {
        let shape = tensor.size();
        let numel = shape.iter().product::<i64>() as usize;
        let values: Vec<f64> = match self {
            Self::Zeros => vec![0.0; numel],
            Self::Constant(v) => vec![*v; numel],
            Self::Uniform(scaling) => {
                let lim = (3.0 * scaling.variance(&shape)).sqrt();
                if lim > 0.0 {
                    let dist = Uniform::new_inclusive(-lim, lim);
                    dist.sample_iter(rng).take(numel).collect()
                } else {
                    vec![0.0; numel]
                }
            }
            Self::Normal(scaling) => {
                let stddev = scaling.variance(&shape).sqrt();
                match Normal::new(0.0, stddev) {
                    Ok(dist) => dist.sample_iter(rng).take(numel).collect(),
                    Err(_) => vec![0.0; numel],
                }
            }
        };
        let source = Tensor::of_slice(&values)
            .to_kind(tensor.kind())
            .f_reshape(&shape)?;
        let _no_grad = tch::no_grad_guard();
        tensor.detach().f_copy_(&source)
    }

    /// Overwrite the contents of `tensor` with freshly sampled values.
    ///
    /// # Panics
    /// If the tensor is not a floating-point tensor on which copying is possible.
    pub fn fill(&self, tensor: &Tensor, rng: &mut Prng) {
        self.f_fill(tensor, rng).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use tch::{Device, Kind};

    fn filled(initializer: Initializer, shape: &[i64], seed: u64) -> Tensor {
        let tensor = Tensor::ones(shape, (Kind::Float, Device::Cpu));
        initializer.fill(&tensor, &mut Prng::seed_from_u64(seed));
        tensor
    }

    #[test]
    fn zeros() {
        let a = filled(Initializer::Zeros, &[5], 0);
        assert_eq!(a, Tensor::zeros(&[5], (Kind::Float, Device::Cpu)));
    }

    #[test]
    fn constant() {
        let a = filled(Initializer::Constant(2.0), &[5], 0);
        assert_eq!(a, Tensor::full(&[5], 2.0, (Kind::Float, Device::Cpu)));
    }

    #[test]
    fn fan_in_bound() {
        // With fan_in of 100, max is sqrt(3/100) ~= 0.173
        let a = filled(Initializer::Uniform(VarianceScale::FanIn), &[1, 100], 1);
        let max = a.abs().max().double_value(&[]);
        assert!(max <= 0.174, "{:?}", max);
        assert!(max >= 0.173 * 0.75, "{:?}", max);
    }

    #[test]
    fn same_seed_same_values() {
        let init = Initializer::default();
        assert_eq!(filled(init, &[4, 3], 7), filled(init, &[4, 3], 7));
        assert_ne!(filled(init, &[4, 3], 7), filled(init, &[4, 3], 8));
    }

    #[test]
    fn keeps_requires_grad() {
        let tensor = Tensor::zeros(&[3], (Kind::Float, Device::Cpu)).set_requires_grad(true);
        Initializer::Normal(VarianceScale::FanIn).fill(&tensor, &mut Prng::seed_from_u64(0));
        assert!(tensor.requires_grad());
    }
}
