//! Categorical distribution
use super::{clamp_float_min, sum_last, BatchDistribution};
use crate::spaces::Action;
use crate::torch::utils::to_f64_vec;
use crate::Prng;
use rand::distributions::{Distribution, WeightedIndex};
use tch::{Kind, Tensor};

/// Categorical distribution(s).
#[derive(Debug)]
pub struct Categorical {
    /// Log probability of each event.
    ///
    /// A float tensor of shape `[N, NUM_EVENTS]`.
    logits: Tensor,
}

impl Categorical {
    /// Initialze from possibly unnormalized log probabilities.
    ///
    /// The log probabilities are normalized by adding some value `C` to each
    /// such that `sum_i exp(log_prob[i] + C) = 1`.
    pub fn new(logits: &Tensor) -> Self {
        Self {
            logits: logits.log_softmax(-1, Kind::Float),
        }
    }

    /// Event probabilities, shape `[N, NUM_EVENTS]`.
    pub fn probs(&self) -> Tensor {
        self.logits.exp()
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn rows(&self) -> Vec<Vec<f64>> {
        let num_events = *self.logits.size().last().unwrap_or(&0) as usize;
        let probs = to_f64_vec(&self.probs().detach());
        if num_events == 0 {
            return Vec::new();
        }
        probs.chunks(num_events).map(<[f64]>::to_vec).collect()
    }
}

impl BatchDistribution for Categorical {
    fn log_probs(&self, elements: &Tensor) -> Tensor {
        self.logits
            .gather(-1, &elements.unsqueeze(-1), false)
            .squeeze_dim(-1)
    }

    fn entropy(&self) -> Tensor {
        let clamped_logits = clamp_float_min(&self.logits)
            .map_err(|kind| format!("logits must be f32 or f64, not {:?}", kind))
            .unwrap();
        -sum_last(&(clamped_logits * self.logits.exp()))
    }

    fn kl_divergence_from(&self, other: &Self) -> Tensor {
        let clamped_rel_logits = clamp_float_min(&(&self.logits - &other.logits))
            .map_err(|kind| format!("logits must be f32 or f64, not {:?}", kind))
            .unwrap();
        sum_last(&(clamped_rel_logits * self.logits.exp()))
    }

    fn mode(&self) -> Vec<Action> {
        self.rows()
            .iter()
            .map(|row| {
                let (index, _) = row.iter().enumerate().fold(
                    (0, f64::NEG_INFINITY),
                    |(best_i, best_p), (i, &p)| if p > best_p { (i, p) } else { (best_i, best_p) },
                );
                Action::Discrete(index)
            })
            .collect()
    }

    /// # Panics
    /// If the probabilities of a row are not finite, e.g. from NaN logits.
    fn sample(&self, rng: &mut Prng) -> Vec<Action> {
        self.rows()
            .iter()
            .map(|row| match WeightedIndex::new(row) {
                Ok(dist) => Action::Discrete(dist.sample(rng)),
                Err(err) => panic!("invalid action probabilities {:?}: {}", row, err),
            })
            .collect()
    }

    fn detach(&self) -> Self {
        Self {
            logits: self.logits.detach(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn assert_close(expected: &Tensor, actual: &Tensor) {
        assert!(
            Into::<bool>::into(expected.isclose(actual, 1e-6, 1e-6, false).all()),
            "expected: {:?}\nactual: {:?}",
            expected,
            actual
        );
    }

    #[test]
    fn log_probs() {
        let logits = Tensor::of_slice(&[
            // elem: 1
            f32::NEG_INFINITY,
            0.0,
            f32::NEG_INFINITY,
            // elem: 2
            f32::NEG_INFINITY,
            0.0,
            0.0,
            // elem: 0
            -1.0,
            0.0,
            1.0,
            // elem: 0
            0.0,
            0.0,
            0.0,
        ])
        .reshape(&[-1, 3]);
        let distribution = Categorical::new(&logits);
        let elements = Tensor::of_slice(&[1_i64, 2, 0, 0]);

        // Log normalizing constant for the [-1, 0.0, 1] distribution
        let log_normalizer = f32::ln(f32::exp(-1.0) + 1.0 + f32::exp(1.0));
        let expected = Tensor::of_slice(&[
            0.0,
            -f32::ln(2.0),
            -1.0 - log_normalizer,
            f32::ln(3.0_f32.recip()),
        ]);
        assert_close(&expected, &distribution.log_probs(&elements));
    }

    #[test]
    fn entropies() {
        let logits = Tensor::of_slice(&[
            0.0_f32,
            0.0,
            0.0,
            //
            0.1_f32.ln(),
            0.3_f32.ln(),
            0.6_f32.ln(),
        ])
        .reshape(&[-1, 3]);
        let distribution = Categorical::new(&logits);
        let expected = Tensor::of_slice(&[
            -(3.0_f32.recip().ln()),
            -0.1 * 0.1_f32.ln() - 0.3 * 0.3_f32.ln() - 0.6 * 0.6_f32.ln(),
        ]);
        assert_close(&expected, &distribution.entropy());
    }

    #[test]
    fn kl_divergence() {
        let logits_a = Tensor::of_slice(&[
            0.2_f32, 0.3, 0.5, //
            0.2, 0.3, 0.5, //
            0.0, 1.0, 0.0, //
        ])
        .reshape(&[3, 3])
        .log();
        let distribution_a = Categorical::new(&logits_a);

        let logits_b = Tensor::of_slice(&[
            0.2_f32, 0.3, 0.5, //
            0.7, 0.2, 0.1, //
            0.2, 0.3, 0.5, //
        ])
        .reshape(&[3, 3])
        .log();
        let distribution_b = Categorical::new(&logits_b);

        let expected = Tensor::of_slice(&[
            0.0_f32,
            0.2 * (0.2_f32 / 0.7).ln() + 0.3 * (0.3_f32 / 0.2).ln() + 0.5 * (0.5_f32 / 0.1).ln(),
            (1.0_f32 / 0.3).ln(),
        ]);
        assert_close(&expected, &distribution_a.kl_divergence_from(&distribution_b));
    }

    #[test]
    fn mode_is_argmax() {
        let logits = Tensor::of_slice(&[0.1_f32, 2.0, -1.0, 3.0, 0.0, 0.0]).reshape(&[2, 3]);
        let distribution = Categorical::new(&logits);
        assert_eq!(
            distribution.mode(),
            vec![Action::Discrete(1), Action::Discrete(0)]
        );
    }

    #[test]
    fn sample_respects_zero_probability() {
        let logits = Tensor::of_slice(&[f32::NEG_INFINITY, 0.0]).reshape(&[1, 2]);
        let distribution = Categorical::new(&logits);
        let mut rng = Prng::seed_from_u64(0);
        for _ in 0..20 {
            assert_eq!(distribution.sample(&mut rng), vec![Action::Discrete(1)]);
        }
    }

    #[test]
    #[should_panic(expected = "invalid action probabilities")]
    fn sample_nan_logits_panics() {
        let logits = Tensor::of_slice(&[f32::NAN, 0.0]).reshape(&[1, 2]);
        let distribution = Categorical::new(&logits);
        distribution.sample(&mut Prng::seed_from_u64(0));
    }
}
