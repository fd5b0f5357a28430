//! Torch modules
mod mlp;

pub use mlp::{Activation, Mlp, MlpConfig};

use super::utils;
use tch::{TchError, Tensor};

/// A network with trainable parameters.
///
/// The trainable variables, in the order returned by [`Module::trainable_variables`],
/// define the flat parameter vector used by the second-order updaters.
pub trait Module {
    /// The trainable parameter tensors in a fixed order.
    fn trainable_variables(&self) -> &[Tensor];

    /// Total number of trainable scalar parameters.
    fn num_parameters(&self) -> usize {
        self.trainable_variables()
            .iter()
            .map(|t| t.numel() as usize)
            .sum()
    }

    /// A detached copy of all parameters as a single vector.
    fn flat_parameters(&self) -> Tensor {
        let _no_grad = tch::no_grad_guard();
        utils::flatten_tensors(self.trainable_variables()).detach().copy()
    }

    /// Overwrite all parameters from a single vector.
    fn set_flat_parameters(&mut self, vector: &Tensor) -> Result<(), TchError> {
        utils::f_copy_flat_into(self.trainable_variables(), vector)
    }

    /// Zero the gradients of all parameters.
    fn zero_grad(&self) {
        for param in self.trainable_variables() {
            utils::zero_grad(param);
        }
    }
}
