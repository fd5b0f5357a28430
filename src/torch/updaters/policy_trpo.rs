//! Trust region policy optimization step
use super::super::distributions::{ActionDistribution, BatchDistribution};
use super::super::modules::Module;
use super::super::optimizers::{
    backtracking_line_search, conjugate_gradient, HessianVectorProduct, LineSearchOutcome,
    MatrixVectorProduct, TrustRegionObjective,
};
use super::super::policy::PolicyNetwork;
use super::super::utils;
use crate::config::TrainConfig;
use log::{debug, warn};
use tch::{Kind, TchError, Tensor};

/// Importance-weighted surrogate advantage `mean(A * exp(log π(a|s) - log π_old(a|s)))`.
pub struct SurrogateObjective<'a> {
    observations: &'a Tensor,
    actions: &'a Tensor,
    advantages: Tensor,
    old_log_probs: Tensor,
}

impl<'a> SurrogateObjective<'a> {
    pub fn new(
        observations: &'a Tensor,
        actions: &'a Tensor,
        advantages: &[f64],
        old_distribution: &ActionDistribution,
    ) -> Self {
        let old_log_probs = {
            let _no_grad = tch::no_grad_guard();
            old_distribution.log_probs(actions).detach()
        };
        Self {
            observations,
            actions,
            advantages: Tensor::of_slice(advantages).to_kind(Kind::Float),
            old_log_probs,
        }
    }

    pub fn evaluate(&self, policy: &PolicyNetwork) -> Tensor {
        let log_probs = policy.distribution(self.observations).log_probs(self.actions);
        let ratios = (log_probs - &self.old_log_probs).exp();
        (ratios * &self.advantages).mean(Kind::Float)
    }
}

/// Mean KL divergence `KL(π_old || π)` over the batch observations.
pub struct KlConstraint<'a> {
    observations: &'a Tensor,
    old_distribution: ActionDistribution,
}

impl<'a> KlConstraint<'a> {
    pub fn new(observations: &'a Tensor, old_distribution: &ActionDistribution) -> Self {
        Self {
            observations,
            old_distribution: old_distribution.detach(),
        }
    }

    pub fn evaluate(&self, policy: &PolicyNetwork) -> Tensor {
        self.old_distribution
            .kl_divergence_from(&policy.distribution(self.observations))
            .mean(Kind::Float)
    }
}

/// Surrogate and KL constraint evaluated at candidate policy parameters.
pub struct PolicyLineSearch<'a, 'b> {
    pub policy: &'b mut PolicyNetwork,
    pub surrogate: &'b SurrogateObjective<'a>,
    pub constraint: &'b KlConstraint<'a>,
}

impl<'a, 'b> TrustRegionObjective for PolicyLineSearch<'a, 'b> {
    fn evaluate_at(&mut self, params: &Tensor) -> Result<(f64, f64), TchError> {
        self.policy.set_flat_parameters(params)?;
        let _no_grad = tch::no_grad_guard();
        let surrogate = self.surrogate.evaluate(self.policy).f_double_value(&[])?;
        let kl = self.constraint.evaluate(self.policy).f_double_value(&[])?;
        Ok((surrogate, kl))
    }
}

/// Statistics of a policy step.
#[derive(Debug)]
pub struct PolicyStats {
    /// Surrogate objective at the old parameters.
    pub surrogate_before: f64,
    /// Surrogate objective at the committed parameters.
    pub surrogate_after: f64,
    /// Mean KL divergence from the old policy at the committed parameters.
    pub kl: f64,
    /// Mean entropy of the old policy.
    pub entropy: f64,
    pub line_search: LineSearchOutcome,
}

/// Take one trust region step on the policy.
///
/// The natural gradient direction `s ≈ F⁻¹ g` comes from conjugate gradient on the damped
/// Fisher-vector product, is scaled to `β = sqrt(2 max_kl / sᵀFs)` and then shrunk by a
/// backtracking line search until the surrogate improves within the KL bound.
/// If no step is accepted the policy keeps its old parameters.
///
/// # Args
/// * `observations` - Batch observations, shape `[N, observation_dim]`.
/// * `actions` - Batch actions as returned by [`crate::spaces::ActionSpace::batch_repr`].
/// * `advantages` - Per-step advantages, larger is better.
pub fn update_policy(
    policy: &mut PolicyNetwork,
    observations: &Tensor,
    actions: &Tensor,
    advantages: &[f64],
    config: &TrainConfig,
) -> Result<PolicyStats, TchError> {
    let params: Vec<Tensor> = policy
        .trainable_variables()
        .iter()
        .map(Tensor::shallow_clone)
        .collect();
    let old_params = policy.flat_parameters();

    let old_distribution = {
        let _no_grad = tch::no_grad_guard();
        policy.distribution(observations).detach()
    };
    let entropy = old_distribution
        .entropy()
        .f_mean(Kind::Float)?
        .f_double_value(&[])?;
    let surrogate = SurrogateObjective::new(observations, actions, advantages, &old_distribution);
    let constraint = KlConstraint::new(observations, &old_distribution);

    let surrogate_value = surrogate.evaluate(policy);
    let surrogate_before = surrogate_value.f_double_value(&[])?;
    let grads = Tensor::run_backward(&[surrogate_value], &params, false, false);
    let gradient = utils::f_flatten_tensors(&grads)?;

    let (direction, curvature) = {
        let kl = constraint.evaluate(policy);
        let fvp = HessianVectorProduct::new(&kl, &params, config.cg_damping);
        let direction =
            conjugate_gradient(&fvp, &gradient, config.cg_iters, config.cg_residual_tol);
        let curvature = direction
            .f_dot(&fvp.mat_vec_mul(&direction))?
            .f_double_value(&[])?;
        (direction, curvature)
    };

    let line_search = if curvature > 0.0 && curvature.is_finite() {
        let step_size = (2.0 * config.max_kl / curvature).sqrt();
        let full_step = direction * step_size;
        let expected_improvement = gradient.f_dot(&full_step)?.f_double_value(&[])?;
        debug!(
            "policy step size {:.3e}, expected improvement {:.3e}",
            step_size, expected_improvement
        );
        let mut objective = PolicyLineSearch {
            policy: &mut *policy,
            surrogate: &surrogate,
            constraint: &constraint,
        };
        backtracking_line_search(
            &mut objective,
            &old_params,
            &full_step,
            surrogate_before,
            expected_improvement,
            config.max_kl,
            &config.line_search,
        )?
    } else {
        debug!("policy step skipped: curvature {}", curvature);
        LineSearchOutcome::Exhausted {
            params: old_params.copy(),
            backtracks: 0,
        }
    };
    if let LineSearchOutcome::Exhausted { backtracks, .. } = &line_search {
        let backtracks = *backtracks;
        if backtracks > 0 {
            warn!("policy line search rejected all {} step sizes", backtracks);
        }
    }
    policy.set_flat_parameters(line_search.params())?;

    let (surrogate_after, kl) = {
        let _no_grad = tch::no_grad_guard();
        (
            surrogate.evaluate(policy).f_double_value(&[])?,
            constraint.evaluate(policy).f_double_value(&[])?,
        )
    };
    Ok(PolicyStats {
        surrogate_before,
        surrogate_after,
        kl,
        entropy,
        line_search,
    })
}
