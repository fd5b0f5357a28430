//! Trust region Newton step for the value function
use super::super::modules::Module;
use super::super::optimizers::{conjugate_gradient, HessianVectorProduct, MatrixVectorProduct};
use super::super::utils;
use super::super::value::ValueNetwork;
use crate::config::TrainConfig;
use log::warn;
use tch::{Kind, Reduction, TchError, Tensor};

/// Mean squared deviation of the value predictions from a snapshot of the old predictions.
///
/// Zero with zero gradient at the snapshot parameters;
/// its Hessian there is the curvature model of the value step.
pub struct ValueConstraint<'a> {
    observations: &'a Tensor,
    old_values: Tensor,
}

impl<'a> ValueConstraint<'a> {
    /// Snapshot the current predictions of `value_fn` on `observations`.
    pub fn new(value_fn: &ValueNetwork, observations: &'a Tensor) -> Self {
        let old_values = {
            let _no_grad = tch::no_grad_guard();
            value_fn.forward(observations).detach()
        };
        Self {
            observations,
            old_values,
        }
    }

    /// Differentiable constraint value `mean((old_v - v)^2)`.
    pub fn evaluate(&self, value_fn: &ValueNetwork) -> Tensor {
        (&self.old_values - value_fn.forward(self.observations))
            .square()
            .mean(Kind::Float)
    }
}

/// Result of a value step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueStepOutcome {
    /// Parameters moved by `step_size` times the conjugate gradient direction.
    Stepped {
        step_size: f64,
        loss_before: f64,
        loss_after: f64,
    },
    /// No step because the curvature `sᵀHs` along the direction was not positive and finite.
    Skipped { curvature: f64, loss: f64 },
}

/// Fit the value function to `returns` with a single trust region Newton step.
///
/// Solves `H s = g` by conjugate gradient where `g` is the negative gradient of the mean
/// squared error and `H` is the Hessian of [`ValueConstraint`], then sets
/// `φ ← φ + sqrt(2ε / sᵀHs) s`. No line search is performed.
pub fn update_value(
    value_fn: &mut ValueNetwork,
    observations: &Tensor,
    returns: &[f64],
    config: &TrainConfig,
) -> Result<ValueStepOutcome, TchError> {
    let targets = Tensor::of_slice(returns).to_kind(Kind::Float);
    let params: Vec<Tensor> = value_fn
        .trainable_variables()
        .iter()
        .map(Tensor::shallow_clone)
        .collect();
    let old_params = value_fn.flat_parameters();

    let loss = value_fn
        .forward(observations)
        .f_mse_loss(&targets, Reduction::Mean)?;
    let loss_before = loss.f_double_value(&[])?;
    let descent_grads = Tensor::run_backward(&[-loss], &params, false, false);
    let descent_direction = utils::f_flatten_tensors(&descent_grads)?;

    let (step, curvature) = {
        let constraint = ValueConstraint::new(value_fn, observations).evaluate(value_fn);
        let hvp = HessianVectorProduct::new(&constraint, &params, 0.0);
        let step = conjugate_gradient(
            &hvp,
            &descent_direction,
            config.cg_iters,
            config.cg_residual_tol,
        );
        let curvature = step.f_dot(&hvp.mat_vec_mul(&step))?.f_double_value(&[])?;
        (step, curvature)
    };

    if !(curvature > 0.0 && curvature.is_finite()) {
        warn!("value step skipped: curvature {}", curvature);
        return Ok(ValueStepOutcome::Skipped {
            curvature,
            loss: loss_before,
        });
    }
    let step_size = (2.0 * config.epsilon / curvature).sqrt();
    value_fn.set_flat_parameters(&old_params.f_add(&(step * step_size))?)?;

    let loss_after = {
        let _no_grad = tch::no_grad_guard();
        value_fn
            .forward(observations)
            .f_mse_loss(&targets, Reduction::Mean)?
            .f_double_value(&[])?
    };
    Ok(ValueStepOutcome::Stepped {
        step_size,
        loss_before,
        loss_after,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::torch::{observation_tensor, MlpConfig};
    use crate::Prng;
    use rand::SeedableRng;

    fn setup() -> (ValueNetwork, Tensor) {
        let value_fn = ValueNetwork::new(2, &MlpConfig::default(), &mut Prng::seed_from_u64(0));
        let observations: Vec<Vec<f64>> = (0..8)
            .map(|i| vec![f64::from(i) / 8.0, 1.0 - f64::from(i) / 8.0])
            .collect();
        (value_fn, observation_tensor(&observations, 2))
    }

    #[test]
    fn constraint_is_zero_at_snapshot() {
        let (value_fn, observations) = setup();
        let constraint = ValueConstraint::new(&value_fn, &observations);
        assert_eq!(constraint.evaluate(&value_fn).double_value(&[]), 0.0);
    }

    #[test]
    fn step_reduces_loss() {
        let (mut value_fn, observations) = setup();
        let returns = vec![1.0; 8];
        let outcome = update_value(&mut value_fn, &observations, &returns, &TrainConfig::default())
            .unwrap();
        match outcome {
            ValueStepOutcome::Stepped {
                step_size,
                loss_before,
                loss_after,
            } => {
                assert!(step_size > 0.0);
                assert!(loss_after < loss_before, "{} >= {}", loss_after, loss_before);
            }
            ValueStepOutcome::Skipped { .. } => panic!("expected a step"),
        }
    }

    #[test]
    fn step_respects_trust_region() {
        let (mut value_fn, observations) = setup();
        let constraint = ValueConstraint::new(&value_fn, &observations);
        let config = TrainConfig::default();
        update_value(&mut value_fn, &observations, &[5.0; 8], &config).unwrap();
        let moved = constraint.evaluate(&value_fn).double_value(&[]);
        assert!(moved > 0.0);
        // Quadratic model predicts `epsilon`; allow for model error
        assert!(moved < 10.0 * config.epsilon, "{}", moved);
    }

    #[test]
    fn repeated_steps_converge() {
        let (mut value_fn, observations) = setup();
        let returns: Vec<f64> = (0..8).map(|i| 0.1 * f64::from(i)).collect();
        let config = TrainConfig {
            epsilon: 0.05,
            ..TrainConfig::default()
        };
        let first = match update_value(&mut value_fn, &observations, &returns, &config).unwrap() {
            ValueStepOutcome::Stepped { loss_before, .. } => loss_before,
            ValueStepOutcome::Skipped { loss, .. } => loss,
        };
        let mut last = first;
        for _ in 0..20 {
            last = match update_value(&mut value_fn, &observations, &returns, &config).unwrap() {
                ValueStepOutcome::Stepped { loss_after, .. } => loss_after,
                ValueStepOutcome::Skipped { loss, .. } => loss,
            };
        }
        assert!(last < 0.5 * first, "{} vs {}", last, first);
    }

    #[test]
    fn exact_fit_skips() {
        let (mut value_fn, observations) = setup();
        let current = {
            let _no_grad = tch::no_grad_guard();
            utils::to_f64_vec(&value_fn.forward(&observations))
        };
        let before = value_fn.flat_parameters();
        let outcome =
            update_value(&mut value_fn, &observations, &current, &TrainConfig::default()).unwrap();
        assert!(matches!(outcome, ValueStepOutcome::Skipped { .. }), "{:?}", outcome);
        assert_eq!(value_fn.flat_parameters(), before);
    }
}
