//! Backtracking line search for trust region steps
use crate::config::LineSearchConfig;
use log::debug;
use tch::{TchError, Tensor};

/// An objective to maximize subject to an upper bound on a constraint value.
pub trait TrustRegionObjective {
    /// Set the parameters to `params` and evaluate `(objective, constraint)` there.
    fn evaluate_at(&mut self, params: &Tensor) -> Result<(f64, f64), TchError>;
}

/// A step accepted by the line search.
#[derive(Debug)]
pub struct AcceptedStep {
    /// Accepted flat parameter vector.
    pub params: Tensor,
    /// Fraction of the full step that was taken.
    pub step_fraction: f64,
    /// Objective value at the accepted parameters.
    pub objective: f64,
    /// Constraint value at the accepted parameters.
    pub constraint: f64,
    /// Number of rejected step sizes before this one.
    pub backtracks: u64,
}

/// Line search state.
///
/// Starts at `Evaluating` with the full step.
/// Every transition out of `Evaluating` either accepts the current step
/// or moves to a strictly smaller step fraction, until the try budget is exhausted.
#[derive(Debug)]
pub enum LineSearchState {
    /// Evaluating the step `step_fraction * full_step` after `backtracks` rejections.
    Evaluating { step_fraction: f64, backtracks: u64 },
    /// Terminal: the first step satisfying all acceptance conditions.
    Accepted(AcceptedStep),
    /// Terminal: no step was accepted. The old parameters are kept.
    Exhausted { backtracks: u64 },
}

/// Terminal result of a line search.
#[derive(Debug)]
pub enum LineSearchOutcome {
    Accepted(AcceptedStep),
    /// No step was accepted; `params` is an exact copy of the old parameters.
    Exhausted { params: Tensor, backtracks: u64 },
}

impl LineSearchOutcome {
    /// The parameters to commit.
    pub const fn params(&self) -> &Tensor {
        match self {
            Self::Accepted(step) => &step.params,
            Self::Exhausted { params, .. } => params,
        }
    }

    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Backtracking line search from `old_params` along `full_step`.
///
/// Tries `old_params + ratio^k * full_step` for `k = 0 .. max_backtracks` and accepts the first
/// candidate where the objective strictly improves on `old_objective`,
/// the constraint is at most `max_constraint`,
/// and the improvement is at least `accept_ratio` times the first-order prediction
/// `ratio^k * expected_improvement`.
///
/// The objective is left at whichever parameters were evaluated last;
/// callers commit [`LineSearchOutcome::params`].
pub fn backtracking_line_search<O>(
    objective: &mut O,
    old_params: &Tensor,
    full_step: &Tensor,
    old_objective: f64,
    expected_improvement: f64,
    max_constraint: f64,
    config: &LineSearchConfig,
) -> Result<LineSearchOutcome, TchError>
where
    O: TrustRegionObjective + ?Sized,
{
    let mut state = LineSearchState::Evaluating {
        step_fraction: 1.0,
        backtracks: 0,
    };
    loop {
        state = match state {
            LineSearchState::Evaluating {
                step_fraction,
                backtracks,
            } => {
                if backtracks >= config.max_backtracks {
                    LineSearchState::Exhausted { backtracks }
                } else {
                    let params = old_params.f_add(&(full_step * step_fraction))?;
                    let (value, constraint) = objective.evaluate_at(&params)?;
                    let improvement = value - old_objective;
                    let expected = expected_improvement * step_fraction;
                    debug!(
                        "line search fraction {:.3e}: improvement {:.3e} (expected {:.3e}), constraint {:.3e}",
                        step_fraction, improvement, expected, constraint
                    );
                    if improvement > 0.0
                        && constraint <= max_constraint
                        && improvement >= config.accept_ratio * expected
                    {
                        LineSearchState::Accepted(AcceptedStep {
                            params,
                            step_fraction,
                            objective: value,
                            constraint,
                            backtracks,
                        })
                    } else {
                        LineSearchState::Evaluating {
                            step_fraction: step_fraction * config.backtrack_ratio,
                            backtracks: backtracks + 1,
                        }
                    }
                }
            }
            LineSearchState::Accepted(step) => return Ok(LineSearchOutcome::Accepted(step)),
            LineSearchState::Exhausted { backtracks } => {
                return Ok(LineSearchOutcome::Exhausted {
                    params: old_params.copy(),
                    backtracks,
                })
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    /// Maximize `-(x - 1)^2` subject to `x^2 <= bound`, recording every evaluated point.
    struct Quadratic {
        evaluated: Vec<f64>,
    }

    impl Quadratic {
        fn new() -> Self {
            Self {
                evaluated: Vec::new(),
            }
        }
    }

    impl TrustRegionObjective for Quadratic {
        fn evaluate_at(&mut self, params: &Tensor) -> Result<(f64, f64), TchError> {
            let x = params.f_double_value(&[0])?;
            self.evaluated.push(x);
            Ok((-(x - 1.0).powi(2), x * x))
        }
    }

    fn search(
        objective: &mut Quadratic,
        step: f64,
        max_constraint: f64,
        config: &LineSearchConfig,
    ) -> LineSearchOutcome {
        let old = Tensor::of_slice(&[0.0]);
        backtracking_line_search(
            objective,
            &old,
            &Tensor::of_slice(&[step]),
            -1.0,
            2.0 * step,
            max_constraint,
            config,
        )
        .unwrap()
    }

    #[test]
    fn accepts_full_step() {
        let mut objective = Quadratic::new();
        let outcome = search(&mut objective, 1.0, 10.0, &LineSearchConfig::default());
        match outcome {
            LineSearchOutcome::Accepted(step) => {
                assert_eq!(step.backtracks, 0);
                assert!((step.step_fraction - 1.0).abs() < 1e-12);
                assert!((step.objective - 0.0).abs() < 1e-12);
                assert_eq!(step.params, Tensor::of_slice(&[1.0]));
            }
            LineSearchOutcome::Exhausted { .. } => panic!("expected acceptance"),
        }
        assert_eq!(objective.evaluated, vec![1.0]);
    }

    #[test]
    fn backtracks_until_constraint_holds() {
        let mut objective = Quadratic::new();
        // x = 1 violates x^2 <= 0.1; x = 0.25 satisfies it
        let outcome = search(&mut objective, 1.0, 0.1, &LineSearchConfig::default());
        match outcome {
            LineSearchOutcome::Accepted(step) => {
                assert_eq!(step.backtracks, 2);
                assert!((step.step_fraction - 0.25).abs() < 1e-12);
                assert!(step.constraint <= 0.1);
            }
            LineSearchOutcome::Exhausted { .. } => panic!("expected acceptance"),
        }
        assert_eq!(objective.evaluated, vec![1.0, 0.5, 0.25]);
    }

    #[test]
    fn step_fractions_strictly_decrease() {
        let mut objective = Quadratic::new();
        // Wrong direction: never improves
        let outcome = search(&mut objective, -1.0, 10.0, &LineSearchConfig::default());
        assert!(!outcome.is_accepted());
        assert_eq!(objective.evaluated.len(), 10);
        for pair in objective.evaluated.windows(2) {
            assert!(pair[1].abs() < pair[0].abs());
        }
    }

    #[rstest]
    #[case::no_improvement(-1.0, 10.0)]
    #[case::constraint_unsatisfiable(1.0, 0.0)]
    fn exhausted_keeps_old_params(#[case] step: f64, #[case] max_constraint: f64) {
        let mut objective = Quadratic::new();
        let config = LineSearchConfig {
            max_backtracks: 4,
            ..LineSearchConfig::default()
        };
        let outcome = search(&mut objective, step, max_constraint, &config);
        match &outcome {
            LineSearchOutcome::Exhausted { params, backtracks } => {
                assert_eq!(*backtracks, 4);
                assert_eq!(params, &Tensor::of_slice(&[0.0]));
            }
            LineSearchOutcome::Accepted(_) => panic!("expected exhaustion"),
        }
        assert_eq!(outcome.params(), &Tensor::of_slice(&[0.0]));
        assert_eq!(objective.evaluated.len(), 4);
    }

    #[test]
    fn accept_ratio_requires_expected_improvement() {
        let mut objective = Quadratic::new();
        // Full step x = 1.8: improvement 0.36, expected 3.6, ratio 0.1
        // Half step x = 0.9: improvement 0.99, expected 1.8, ratio 0.55
        let config = LineSearchConfig {
            accept_ratio: 0.5,
            ..LineSearchConfig::default()
        };
        let outcome = search(&mut objective, 1.8, 10.0, &config);
        match outcome {
            LineSearchOutcome::Accepted(step) => assert_eq!(step.backtracks, 1),
            LineSearchOutcome::Exhausted { .. } => panic!("expected acceptance"),
        }
    }
}
