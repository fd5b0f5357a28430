//! Second-order optimization building blocks
//!
//! The trust region updaters are assembled from these parts:
//! a Hessian-vector product oracle, a conjugate gradient solver for the step direction,
//! and a backtracking line search over a [`TrustRegionObjective`].
mod conjugate_gradient;
mod line_search;

pub use conjugate_gradient::{conjugate_gradient, HessianVectorProduct};
pub use line_search::{
    backtracking_line_search, AcceptedStep, LineSearchOutcome, LineSearchState,
    TrustRegionObjective,
};

use tch::Tensor;

/// A Matrix-Vector product
pub trait MatrixVectorProduct {
    type Vector;

    fn mat_vec_mul(&self, vector: &Self::Vector) -> Self::Vector;
}

impl MatrixVectorProduct for Tensor {
    type Vector = Self;

    fn mat_vec_mul(&self, vector: &Self::Vector) -> Self::Vector {
        self.mv(vector)
    }
}
