//! Conjugate gradient solver and Hessian-vector products
//!
//! Based on the [Python CGD implementation][garage_cgo] of the
//! [Garage Toolkit](https://github.com/rlworkgroup/garage).
//!
//! [garage_cgo]: https://github.com/rlworkgroup/garage/blob/90b60905b29cea8f8373c6732ced0cadf8489b0c/src/garage/torch/optimizers/conjugate_gradient_optimizer.py

// == MIT License For This File Only ==
//
// Copyright (c) 2019 Reinforcement Learning Working Group
// Copyright (c) 2021 Eric Langlois
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use super::super::utils;
use super::MatrixVectorProduct;
use log::debug;
use std::borrow::Borrow;
use tch::{TchError, Tensor};

/// Implements a Hessian-vector product function
///
/// Computes `(H + damping * I) v` where `H` is the Hessian of a scalar output
/// with respect to a list of parameters.
///
/// # Reference
/// Pearlmutter, Barak A. "Fast exact multiplication by the Hessian."
/// Neural computation 6.1 (1994): 147-160.`
pub struct HessianVectorProduct<'a, T> {
    /// Parameter tensors
    params: &'a [T],
    /// Damping coefficient. A small value so that `H -> H + damping * I`.
    damping: f64,
    /// The shape of each tensor in params.
    param_shapes: Vec<Vec<i64>>,
    /// Gradients with respect to each of `params`, with a graph for differentiating again.
    grads: Vec<Tensor>,
}

impl<'a, T> HessianVectorProduct<'a, T>
where
    T: Borrow<Tensor>,
{
    /// Create a new Hessian-vector product function
    ///
    /// Evaluates the Hessian of the mapping `params -> output`.
    /// Zeros the existing gradients and backpropagates gradients from `output`.
    ///
    /// # Args
    /// * `output` - Scalar function output tensor.
    /// * `params` - A list of function parameter tensors.
    /// * `damping` - Added multiple of the identity. Zero for an undamped product.
    pub fn new(output: &Tensor, params: &'a [T], damping: f64) -> Self {
        let param_shapes = params.iter().map(|t| t.borrow().size()).collect();
        for param in params.iter() {
            utils::zero_grad(param.borrow());
        }
        let grads = Tensor::run_backward(&[output], params, true, true);
        Self {
            params,
            damping,
            param_shapes,
            grads,
        }
    }

    /// Matrix-vector product returning an error instead of panicking on a shape mismatch.
    pub fn f_mat_vec_mul(&self, vector: &Tensor) -> Result<Tensor, TchError> {
        let unflattened_vector = utils::f_unflatten_tensors(vector, &self.param_shapes)?;

        let grad_vector_product = Tensor::f_stack(
            &self
                .grads
                .iter()
                .zip(&unflattened_vector)
                .map(|(g, x)| utils::f_flat_dot(g, x))
                .collect::<Result<Vec<_>, _>>()?,
            0,
        )?
        .f_sum(vector.kind())?;

        let hvp = Tensor::run_backward(&[grad_vector_product], self.params, true, false);
        let flat_output = utils::f_flatten_tensors(&hvp)?;
        if self.damping == 0.0 {
            Ok(flat_output)
        } else {
            flat_output.f_add(&(vector * self.damping))
        }
    }
}

impl<'a, T> MatrixVectorProduct for HessianVectorProduct<'a, T>
where
    T: Borrow<Tensor>,
{
    type Vector = Tensor;

    fn mat_vec_mul(&self, vector: &Tensor) -> Tensor {
        self.f_mat_vec_mul(vector).unwrap()
    }
}

/// Use Conjugate Gradient iteration to solve `Ax = b` where `A` is symmetric positive definite.
///
/// Stops early once the squared residual norm drops below `residual_tol`
/// or when the curvature along the search direction is not positive.
/// On non-convergence the iterate with the smallest residual is returned.
/// The result never contains NaN values.
///
/// # Args
/// * `f_Ax` - Computes the matrix-vector product.
/// * `b` - Right hand side of the equation to solve.
/// * `cg_iters` - Maximum number of iterations to run the conjugate gradient algorithm.
/// * `residual_tol`: Tolerance on the squared residual norm for convergence.
///
/// # Returns
/// Approximate solution `x*` for the equation `Ax = b`.
///
/// # Reference
/// <https://en.wikipedia.org/wiki/Conjugate_gradient_method>
pub fn conjugate_gradient<T: MatrixVectorProduct<Vector = Tensor> + ?Sized>(
    #[allow(non_snake_case)] f_Ax: &T,
    b: &Tensor,
    cg_iters: u64,
    residual_tol: f64,
) -> Tensor {
    let mut x = b.zeros_like();
    let mut residual = b.copy(); // b - Ax where x = 0

    // step direction (p). residual projected to be orthogonal to previous steps
    let mut step = b.copy();
    let mut residual_norm_squared = f64::from(residual.dot(&residual));
    if !residual_norm_squared.is_finite() {
        return x;
    }
    let mut best = (x.shallow_clone(), residual_norm_squared);

    let mut converged = residual_norm_squared < residual_tol;
    for _ in 0..cg_iters {
        if converged {
            break;
        }
        let z = f_Ax.mat_vec_mul(&step); // A * step
        let curvature = f64::from(step.dot(&z));
        if !(curvature > 0.0 && curvature.is_finite()) {
            break;
        }
        let alpha = residual_norm_squared / curvature; // ||r||^2 / (step' * A * step)
        x = &x + &step * alpha;
        residual = &residual - &z * alpha;

        let new_residual_norm_squared = f64::from(residual.dot(&residual));
        if !new_residual_norm_squared.is_finite() {
            break;
        }
        if new_residual_norm_squared < best.1 {
            best = (x.shallow_clone(), new_residual_norm_squared);
        }
        if new_residual_norm_squared < residual_tol {
            converged = true;
            break;
        }

        let mu = new_residual_norm_squared / residual_norm_squared;
        step = &residual + &step * mu;
        residual_norm_squared = new_residual_norm_squared;
    }
    if !converged {
        debug!(
            "conjugate gradient stopped at squared residual {:.3e} after {} iterations",
            best.1, cg_iters
        );
    }
    best.0.nan_to_num(0.0, None::<f64>, None::<f64>)
}

#[cfg(test)]
mod hessian_vector_product {
    use super::*;
    use tch::{Cuda, Device, Kind};

    #[test]
    fn quadratic_hessian() {
        // Work-around for https://github.com/pytorch/pytorch/issues/35736
        Cuda::is_available();

        // f(x) = 1/2*x'Mx + b'x
        // H_f(x) = M
        let m = Tensor::of_slice(&[1.0f32, -1.0, -1.0, 2.0]).reshape(&[2, 2]);
        let b = Tensor::of_slice(&[2.0f32, -3.0]);
        let x = Tensor::zeros(&[2], (Kind::Float, Device::Cpu)).requires_grad_(true);
        let y = m.mv(&x).dot(&x) / 2 + b.dot(&x);
        let params = [&x];

        let hvp = HessianVectorProduct::new(&y, &params, 0.0);

        assert_eq!(
            hvp.mat_vec_mul(&Tensor::of_slice(&[1.0f32, 0.0])),
            Tensor::of_slice(&[1.0f32, -1.0])
        );
        assert_eq!(
            hvp.mat_vec_mul(&Tensor::of_slice(&[0.0f32, 1.0])),
            Tensor::of_slice(&[-1.0f32, 2.0])
        );
    }

    #[test]
    fn damped_quadratic_hessian() {
        let m = Tensor::of_slice(&[2.0f32, 0.0, 0.0, 4.0]).reshape(&[2, 2]);
        let x = Tensor::ones(&[2], (Kind::Float, Device::Cpu)).requires_grad_(true);
        let y = m.mv(&x).dot(&x) / 2;
        let params = [&x];

        let hvp = HessianVectorProduct::new(&y, &params, 0.5);
        assert_eq!(
            hvp.mat_vec_mul(&Tensor::of_slice(&[1.0f32, 1.0])),
            Tensor::of_slice(&[2.5f32, 4.5])
        );
    }
}

#[cfg(test)]
mod cg {
    use super::*;
    use rstest::rstest;
    use tch::Kind;

    /// Symmetric positive definite matrix `M M' + n I` from a fixed pseudo-random `M`.
    fn spd_matrix(n: i64) -> Tensor {
        let m = Tensor::arange(n * n, (Kind::Double, tch::Device::Cpu))
            .sin()
            .reshape(&[n, n]);
        m.matmul(&m.tr()) + Tensor::eye(n, (Kind::Double, tch::Device::Cpu)) * (n as f64)
    }

    #[rstest]
    #[case(2)]
    #[case(5)]
    #[case(10)]
    fn solves_spd_system(#[case] n: i64) {
        let a = spd_matrix(n);
        let b = Tensor::arange(n, (Kind::Double, tch::Device::Cpu)).cos();
        let x = conjugate_gradient(&a, &b, 10, 1e-20);
        let relative_residual = f64::from((a.mv(&x) - &b).norm()) / f64::from(b.norm());
        assert!(relative_residual < 1e-6, "{}", relative_residual);
    }

    #[test]
    fn identity_converges_in_one_step() {
        let a = Tensor::eye(3, (Kind::Double, tch::Device::Cpu));
        let b = Tensor::of_slice(&[1.0, -2.0, 3.0]);
        assert_eq!(conjugate_gradient(&a, &b, 1, 1e-10), b);
    }

    #[test]
    fn zero_rhs_gives_zero() {
        let a = spd_matrix(3);
        let b = Tensor::zeros(&[3], (Kind::Double, tch::Device::Cpu));
        assert_eq!(conjugate_gradient(&a, &b, 10, 1e-10), b);
    }

    #[test]
    fn non_convergence_returns_finite_best() {
        let a = spd_matrix(10);
        let b = Tensor::ones(&[10], (Kind::Double, tch::Device::Cpu));
        let x = conjugate_gradient(&a, &b, 2, 0.0);
        assert!(bool::from(x.isfinite().all()));
        let residual = f64::from((a.mv(&x) - &b).norm());
        assert!(residual <= f64::from(b.norm()));
        assert!(f64::from(x.norm()) > 0.0);
    }

    #[test]
    fn zero_matrix_is_nan_free() {
        let a = Tensor::zeros(&[2, 2], (Kind::Double, tch::Device::Cpu));
        let b = Tensor::of_slice(&[1.0, 1.0]);
        let x = conjugate_gradient(&a, &b, 10, 1e-10);
        assert!(bool::from(x.isfinite().all()));
    }
}
