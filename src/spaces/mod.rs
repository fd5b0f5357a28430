//! Action spaces
use std::fmt;
use tch::{Kind, Tensor};

/// The space of actions accepted by an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionSpace {
    /// Actions are indices `0 .. num_actions`.
    Discrete { num_actions: usize },
    /// Actions are real vectors of length `dim`.
    Continuous { dim: usize },
}

/// An element of an [`ActionSpace`].
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Discrete(usize),
    Continuous(Vec<f64>),
}

impl fmt::Display for ActionSpace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Discrete { num_actions } => write!(f, "Discrete({})", num_actions),
            Self::Continuous { dim } => write!(f, "Continuous({})", dim),
        }
    }
}

impl ActionSpace {
    /// Check if the space contains a particular action.
    pub fn contains(&self, action: &Action) -> bool {
        match (self, action) {
            (Self::Discrete { num_actions }, Action::Discrete(index)) => index < num_actions,
            (Self::Continuous { dim }, Action::Continuous(values)) => values.len() == *dim,
            _ => false,
        }
    }

    /// Number of features used to represent an action as a network input.
    ///
    /// Discrete actions use a one-hot encoding.
    pub const fn num_features(&self) -> usize {
        match self {
            Self::Discrete { num_actions } => *num_actions,
            Self::Continuous { dim } => *dim,
        }
    }

    /// Number of policy outputs needed to parameterize a distribution over the space.
    ///
    /// The continuous log standard deviation is a separate state-independent parameter.
    pub const fn num_distribution_params(&self) -> usize {
        self.num_features()
    }

    /// Represent a batch of actions as a tensor.
    ///
    /// * Discrete: an `i64` tensor of shape `[N]` holding the action indices.
    /// * Continuous: an `f32` tensor of shape `[N, dim]`.
    ///
    /// # Panics
    /// If any action is not an element of this space.
    #[allow(clippy::cast_possible_truncation)]
    pub fn batch_repr<'a, I>(&self, actions: I) -> Tensor
    where
        I: IntoIterator<Item = &'a Action>,
    {
        match self {
            Self::Discrete { num_actions } => {
                let indices: Vec<i64> = actions
                    .into_iter()
                    .map(|action| match action {
                        Action::Discrete(index) if index < num_actions => *index as i64,
                        other => panic!("action {:?} is not in {}", other, self),
                    })
                    .collect();
                Tensor::of_slice(&indices)
            }
            Self::Continuous { dim } => {
                let mut values: Vec<f32> = Vec::new();
                for action in actions {
                    match action {
                        Action::Continuous(v) if v.len() == *dim => {
                            values.extend(v.iter().map(|&x| x as f32))
                        }
                        other => panic!("action {:?} is not in {}", other, self),
                    }
                }
                Tensor::of_slice(&values).reshape(&[-1, *dim as i64])
            }
        }
    }

    /// Represent a batch of actions as `f32` feature vectors of shape `[N, num_features]`.
    pub fn batch_features<'a, I>(&self, actions: I) -> Tensor
    where
        I: IntoIterator<Item = &'a Action>,
    {
        let repr = self.batch_repr(actions);
        match self {
            Self::Discrete { num_actions } => {
                #[allow(clippy::cast_possible_wrap)]
                let num_classes = *num_actions as i64;
                repr.one_hot(num_classes).to_kind(Kind::Float)
            }
            Self::Continuous { .. } => repr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discrete_contains() {
        let space = ActionSpace::Discrete { num_actions: 2 };
        assert!(space.contains(&Action::Discrete(1)));
        assert!(!space.contains(&Action::Discrete(2)));
        assert!(!space.contains(&Action::Continuous(vec![0.0])));
    }

    #[test]
    fn continuous_contains() {
        let space = ActionSpace::Continuous { dim: 2 };
        assert!(space.contains(&Action::Continuous(vec![0.0, 1.0])));
        assert!(!space.contains(&Action::Continuous(vec![0.0])));
        assert!(!space.contains(&Action::Discrete(0)));
    }

    #[test]
    fn discrete_batch_features_one_hot() {
        let space = ActionSpace::Discrete { num_actions: 3 };
        let actions = [Action::Discrete(2), Action::Discrete(0)];
        assert_eq!(
            space.batch_features(&actions),
            Tensor::of_slice(&[0.0_f32, 0.0, 1.0, 1.0, 0.0, 0.0]).reshape(&[2, 3])
        );
    }

    #[test]
    fn continuous_batch_repr() {
        let space = ActionSpace::Continuous { dim: 2 };
        let actions = [
            Action::Continuous(vec![1.0, 2.0]),
            Action::Continuous(vec![3.0, 4.0]),
        ];
        assert_eq!(
            space.batch_repr(&actions),
            Tensor::of_slice(&[1.0_f32, 2.0, 3.0, 4.0]).reshape(&[2, 2])
        );
    }

    #[test]
    #[should_panic]
    fn batch_repr_rejects_foreign_action() {
        let space = ActionSpace::Discrete { num_actions: 2 };
        let _ = space.batch_repr(&[Action::Discrete(5)]);
    }
}
