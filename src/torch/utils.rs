//! Torch utilities.
use std::borrow::Borrow;
use tch::{TchError, Tensor};

/// Flatten a set of tensors into a single vector.
pub fn f_flatten_tensors<I>(tensors: I) -> Result<Tensor, TchError>
where
    I: IntoIterator,
    <I as IntoIterator>::Item: Borrow<Tensor>,
{
    Tensor::f_cat(
        &tensors
            .into_iter()
            .map(|t| t.borrow().f_flatten(0, -1))
            .collect::<Result<Vec<_>, _>>()?,
        0,
    )
}

/// Flatten a set of tensors into a single tensor.
pub fn flatten_tensors<I>(tensors: I) -> Tensor
where
    I: IntoIterator,
    <I as IntoIterator>::Item: Borrow<Tensor>,
{
    f_flatten_tensors(tensors).unwrap()
}

/// The number of elements in a Tensor with the given shape.
///
/// # Panics
/// If any dimension has negative size.
fn shape_size(shape: &[i64]) -> i64 {
    assert!(
        shape.iter().all(|&d| d >= 0),
        "Negative dimension in shape {:?}",
        shape
    );
    shape.iter().product()
}

/// Unflatten a vector into a set of tensors with the given shapes.
///
/// # Panics
/// Panics if any shape has a dimension with negative size.
pub fn f_unflatten_tensors(vector: &Tensor, shapes: &[Vec<i64>]) -> Result<Vec<Tensor>, TchError> {
    let sizes: Vec<_> = shapes.iter().map(|shape| shape_size(shape)).collect();
    vector
        .f_split_with_sizes(&sizes, 0)?
        .iter()
        .zip(shapes)
        .map(|(t, shape)| t.f_reshape(shape))
        .collect()
}

/// Dot product of two flattened tensors.
///
/// The shapes may differ so long as the total number of elements are the same.
pub fn f_flat_dot(a: &Tensor, b: &Tensor) -> Result<Tensor, TchError> {
    a.f_flatten(0, -1)?.f_dot(&b.f_flatten(0, -1)?)
}

/// Zero the gradient of a tensor.
pub fn f_zero_grad(x: &Tensor) -> Result<(), TchError> {
    let mut grad = x.f_grad()?;
    if grad.defined() {
        let _ = grad.f_detach_()?;
        let _ = grad.f_zero_()?;
    }
    Ok(())
}

/// Zero the gradient of a tensor.
pub fn zero_grad(x: &Tensor) {
    f_zero_grad(x).unwrap()
}

/// Copy a flat vector into a set of parameter tensors without recording gradients.
///
/// The parameters keep their identity (and `requires_grad` flag);
/// only their storage contents change.
pub fn f_copy_flat_into(params: &[Tensor], vector: &Tensor) -> Result<(), TchError> {
    let shapes: Vec<_> = params.iter().map(Tensor::size).collect();
    let values = f_unflatten_tensors(vector, &shapes)?;
    let _no_grad = tch::no_grad_guard();
    for (param, value) in params.iter().zip(&values) {
        let mut target = param.detach();
        target.f_copy_(value)?;
    }
    Ok(())
}

/// Copy the elements of a tensor, in row-major order, into a vector of `f64`.
pub fn to_f64_vec(tensor: &Tensor) -> Vec<f64> {
    Vec::<f64>::from(
        &tensor
            .to_kind(tch::Kind::Double)
            .reshape(&[-1])
            .contiguous(),
    )
}



#[cfg(test)]
mod zero_grad {
    use super::*;
    use tch::{Cuda, Device, Kind};

    #[test]
    fn zeros_nonzero_grad() {
        // Work-around for https://github.com/pytorch/pytorch/issues/35736
        Cuda::is_available();

        let mut x = Tensor::zeros(&[3], (Kind::Float, Device::Cpu));
        let _ = x.requires_grad_(true);
        let y = x.sum(Kind::Float);
        y.backward();
        assert_eq!(x.grad(), Tensor::ones_like(&x));

        zero_grad(&x);
        assert_eq!(x.grad(), Tensor::zeros_like(&x));
    }
}
