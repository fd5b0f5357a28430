//! Torch components
pub mod critic;
pub mod discriminator;
pub mod distributions;
pub mod initializers;
pub mod modules;
pub mod optimizers;
pub mod policy;
pub mod updaters;
pub mod utils;
pub mod value;

pub use discriminator::{Discriminator, DiscriminatorConfig};
pub use modules::{Activation, Mlp, MlpConfig, Module};
pub use policy::PolicyNetwork;
pub use value::ValueNetwork;

use tch::{Device, Kind, Tensor};

/// Stack observation vectors into an `f32` tensor of shape `[N, observation_dim]`.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn observation_tensor<I>(observations: I, observation_dim: usize) -> Tensor
where
    I: IntoIterator,
    I::Item: AsRef<[f64]>,
{
    let mut values: Vec<f32> = Vec::new();
    for observation in observations {
        values.extend(observation.as_ref().iter().map(|&x| x as f32));
    }
    if values.is_empty() {
        return Tensor::zeros(&[0, observation_dim as i64], (Kind::Float, Device::Cpu));
    }
    Tensor::of_slice(&values).reshape(&[-1, observation_dim as i64])
}
