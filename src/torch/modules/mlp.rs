//! Multi-layer perceptron
use crate::torch::initializers::Initializer;
use crate::Prng;
use serde::{Deserialize, Serialize};
use std::iter;
use tch::{nn::Path, Tensor};

/// Activation functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activation {
    /// No transformation
    Identity,
    /// Rectified linear
    Relu,
    /// Sigmoid function
    Sigmoid,
    /// Hyperbolic tangent
    Tanh,
}

impl Default for Activation {
    fn default() -> Self {
        Self::Tanh
    }
}

impl Activation {
    /// The function pointer for this activation function if not the identity function.
    #[inline]
    pub fn maybe_function(&self) -> Option<fn(&Tensor) -> Tensor> {
        match self {
            Self::Identity => None,
            Self::Relu => Some(Tensor::relu),
            Self::Sigmoid => Some(Tensor::sigmoid),
            Self::Tanh => Some(Tensor::tanh),
        }
    }
}

/// Configuration for the [`Mlp`] module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MlpConfig {
    /// Sizes of the hidden layers
    pub hidden_sizes: Vec<usize>,
    /// Activation function between hidden layers.
    pub activation: Activation,
    /// Activation function on the output.
    pub output_activation: Activation,
    /// Initializer for the layer weight matrices.
    pub weight_init: Initializer,
    /// Initializer for the layer bias vectors.
    pub bias_init: Initializer,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden_sizes: vec![50, 50],
            activation: Activation::Tanh,
            output_activation: Activation::Identity,
            weight_init: Initializer::default(),
            bias_init: Initializer::Zeros,
        }
    }
}

/// Fully connected layer computing `input * weight' + bias`.
struct Layer {
    /// Weight matrix of shape `[out_dim, in_dim]`.
    weight: Tensor,
    /// Bias vector of shape `[out_dim]`.
    bias: Tensor,
}

impl Layer {
    fn forward(&self, input: &Tensor) -> Tensor {
        input.matmul(&self.weight.tr()) + &self.bias
    }
}

/// Multi-layer perceptron
pub struct Mlp {
    layers: Vec<Layer>,
    activation: Option<fn(&Tensor) -> Tensor>,
    output_activation: Option<fn(&Tensor) -> Tensor>,
}

impl Mlp {
    /// Create a new MLP under the variable store path `vs`.
    ///
    /// Parameters are initialized from `rng`; the libtorch default initialization is discarded.
    /// Returns the module and its trainable parameters in creation order.
    #[allow(clippy::cast_possible_wrap)]
    pub fn new(
        vs: &Path,
        in_dim: usize,
        out_dim: usize,
        config: &MlpConfig,
        rng: &mut Prng,
    ) -> (Self, Vec<Tensor>) {
        let in_dims = iter::once(&in_dim).chain(&config.hidden_sizes);
        let out_dims = config.hidden_sizes.iter().chain(iter::once(&out_dim));

        let mut params = Vec::new();
        let layers: Vec<_> = in_dims
            .zip(out_dims)
            .enumerate()
            .map(|(i, (in_, out_))| {
                let path = vs / format!("layer_{}", i);
                let weight = path.zeros("weight", &[*out_ as i64, *in_ as i64]);
                let bias = path.zeros("bias", &[*out_ as i64]);
                config.weight_init.fill(&weight, rng);
                config.bias_init.fill(&bias, rng);
                params.push(weight.shallow_clone());
                params.push(bias.shallow_clone());
                Layer { weight, bias }
            })
            .collect();

        let mlp = Self {
            layers,
            activation: config.activation.maybe_function(),
            output_activation: config.output_activation.maybe_function(),
        };
        (mlp, params)
    }

    pub fn forward(&self, input: &Tensor) -> Tensor {
        let mut iter_layers = self.layers.iter();
        let mut hidden = iter_layers
            .next()
            .expect("must have >= 1 layers by construction")
            .forward(input);
        for layer in iter_layers {
            if let Some(activation) = self.activation {
                hidden = activation(&hidden);
            }
            hidden = layer.forward(&hidden);
        }
        if let Some(output_activation) = self.output_activation {
            hidden = output_activation(&hidden);
        }
        hidden
    }
}
