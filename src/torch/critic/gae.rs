//! Generalized Advantage Estimation over per-step costs
//!
//! All functions operate on a single trajectory.
//! The trajectory is treated as ending at its last step: the value after the last step is `0`.
//!
//! # Reference
//! High-Dimensional Continuous Control Using Generalized Advantage Estimation. ICLR  2016
//! by John Schulman, Philipp Moritz, Sergey Levine, Michael I. Jordan, Pieter Abbeel
//! <https://arxiv.org/pdf/1506.02438.pdf>

/// Reverse discounted cumulative sum: `out[t] = Σ_{k>=t} factor^(k-t) x[k]`.
fn discounted_cumsum_from_end(x: &[f64], factor: f64) -> Vec<f64> {
    let mut out = vec![0.0; x.len()];
    let mut acc = 0.0;
    for (o, v) in out.iter_mut().zip(x).rev() {
        acc = v + factor * acc;
        *o = acc;
    }
    out
}

/// Discounted cost-to-go `R_t = Σ_{k=t}^{T-1} γ^(k-t) c_k`.
///
/// Equal to the trajectory-relative return `Σ_{k=t}^{T-1} γ^k c_k` divided by `γ^t`,
/// computed without forming `γ^t`.
pub fn discounted_returns(costs: &[f64], gamma: f64) -> Vec<f64> {
    discounted_cumsum_from_end(costs, gamma)
}

/// One-step temporal difference residuals `δ_t = c_t + γ V(s_{t+1}) - V(s_t)` with `V(s_T) = 0`.
///
/// # Panics
/// If `costs` and `values` have different lengths.
pub fn td_residuals(costs: &[f64], values: &[f64], gamma: f64) -> Vec<f64> {
    assert_eq!(costs.len(), values.len(), "one value per step");
    costs
        .iter()
        .enumerate()
        .map(|(t, c)| {
            let next_value = values.get(t + 1).copied().unwrap_or(0.0);
            c + gamma * next_value - values[t]
        })
        .collect()
}

/// Generalized advantages `A_t = Σ_{k=t}^{T-1} (γλ)^(k-t) δ_k`.
///
/// # Panics
/// If `costs` and `values` have different lengths.
pub fn generalized_advantages(costs: &[f64], values: &[f64], gamma: f64, lambda: f64) -> Vec<f64> {
    discounted_cumsum_from_end(&td_residuals(costs, values, gamma), gamma * lambda)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const COSTS: [f64; 5] = [0.3, 0.9, 0.1, 0.5, 0.7];
    const VALUES: [f64; 5] = [1.0, -0.5, 0.25, 2.0, 0.0];

    fn assert_all_close(expected: &[f64], actual: &[f64]) {
        assert_eq!(expected.len(), actual.len());
        for (e, a) in expected.iter().zip(actual) {
            assert!((e - a).abs() < 1e-10, "expected {:?}, actual {:?}", expected, actual);
        }
    }

    #[test]
    fn returns_undiscounted() {
        assert_all_close(&[2.5, 2.2, 1.3, 1.2, 0.7], &discounted_returns(&COSTS, 1.0));
    }

    #[rstest]
    #[case(0.0)]
    #[case(0.5)]
    #[case(0.99)]
    fn returns_match_debiased_trajectory_returns(#[case] gamma: f64) {
        let returns = discounted_returns(&COSTS, gamma);
        let debiased: Vec<f64> = (0..COSTS.len())
            .map(|t| {
                let total: f64 = (t..COSTS.len())
                    .map(|k| gamma.powi(k as i32) * COSTS[k])
                    .sum();
                if gamma == 0.0 {
                    COSTS[t]
                } else {
                    total / gamma.powi(t as i32)
                }
            })
            .collect();
        assert_all_close(&debiased, &returns);
    }

    #[test]
    fn residuals_use_zero_terminal_value() {
        let residuals = td_residuals(&COSTS, &VALUES, 0.5);
        assert_all_close(
            &[
                0.3 + 0.5 * -0.5 - 1.0,
                0.9 + 0.5 * 0.25 + 0.5,
                0.1 + 0.5 * 2.0 - 0.25,
                0.5 + 0.5 * 0.0 - 2.0,
                0.7 - 0.0,
            ],
            &residuals,
        );
    }

    #[rstest]
    #[case(0.99, 0.99)]
    #[case(0.9, 0.0)]
    #[case(0.5, 1.0)]
    #[case(1.0, 0.95)]
    fn advantages_match_closed_form(#[case] gamma: f64, #[case] lambda: f64) {
        let advantages = generalized_advantages(&COSTS, &VALUES, gamma, lambda);
        let residuals = td_residuals(&COSTS, &VALUES, gamma);
        let closed_form: Vec<f64> = (0..COSTS.len())
            .map(|t| {
                (t..COSTS.len())
                    .map(|k| (gamma * lambda).powi((k - t) as i32) * residuals[k])
                    .sum()
            })
            .collect();
        assert_all_close(&closed_form, &advantages);
        let expected_sum: f64 = closed_form.iter().sum();
        let actual_sum: f64 = advantages.iter().sum();
        assert!((expected_sum - actual_sum).abs() < 1e-10);
    }

    #[test]
    fn lambda_one_advantages_are_returns_minus_values() {
        let gamma = 0.9;
        let advantages = generalized_advantages(&COSTS, &VALUES, gamma, 1.0);
        let returns = discounted_returns(&COSTS, gamma);
        let expected: Vec<f64> = returns.iter().zip(&VALUES).map(|(r, v)| r - v).collect();
        assert_all_close(&expected, &advantages);
    }

    #[test]
    fn single_step() {
        assert_eq!(discounted_returns(&[0.4], 0.99), vec![0.4]);
        assert_all_close(&[0.4 - 0.1], &generalized_advantages(&[0.4], &[0.1], 0.99, 0.99));
    }

    #[test]
    fn empty_trajectory() {
        assert!(discounted_returns(&[], 0.99).is_empty());
        assert!(generalized_advantages(&[], &[], 0.99, 0.99).is_empty());
    }
}
