//! Neural network stages for the convolutional pipeline.
//!
//! The network has a fixed five-stage topology:
//!
//! ```text
//! image ─► ConvolutionLayer ─► PoolingLayer ─► FlattenLayer ─► FullyConnectedLayer ─► SoftmaxLayer ─► probabilities
//! ```
//!
//! Every stage implements [`Layer`]. `forward` is a pure function of the
//! layer's parameters and returns the output together with an explicit
//! cache; `backward` consumes that cache, so a backward pass can only ever
//! be paired with the forward pass that produced it. Stages that own
//! parameters update them in place inside `backward` (online SGD).
//!
//! # References
//!
//! - LeCun, Y., et al. (1998). Gradient-based learning applied to document
//!   recognition. Proc. IEEE.
//! - Glorot, X., & Bengio, Y. (2010). Understanding the difficulty of training
//!   deep feedforward neural networks. AISTATS.

mod activation;
mod conv;
mod flatten;
mod init;
mod linear;
mod pool;
mod softmax;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use activation::{floor_relu, leaky_relu, relu_step, CONV_RELU_FLOOR, LEAKY_RELU_SLOPE};
pub use conv::{ConvCache, ConvolutionLayer};
pub use flatten::{FlattenCache, FlattenLayer};
pub use init::{dense_init, kernel_init, rng_from_seed};
pub use linear::{DenseCache, FullyConnectedLayer};
pub use pool::{PoolCache, PoolingLayer};
pub use softmax::{softmax, softmax_with_temperature, SoftmaxCache, SoftmaxLayer, SUM_FLOOR};

/// Tag identifying a pipeline stage (used in errors, logs and summaries).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Kernel bank with floor-ReLU activation.
    Convolution,
    /// Max pooling with argmax routing.
    Pooling,
    /// Volume to vector reshape.
    Flatten,
    /// Dense layer with leaky-ReLU activation.
    Dense,
    /// Probability normalization.
    Softmax,
}

impl Stage {
    /// All stages in forward order.
    pub const PIPELINE: [Stage; 5] = [
        Stage::Convolution,
        Stage::Pooling,
        Stage::Flatten,
        Stage::Dense,
        Stage::Softmax,
    ];

    /// Short lowercase name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Stage::Convolution => "convolution",
            Stage::Pooling => "pooling",
            Stage::Flatten => "flatten",
            Stage::Dense => "fully-connected",
            Stage::Softmax => "softmax",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A pipeline stage with manual forward and backward passes.
pub trait Layer {
    /// Input accepted by `forward` (and gradient type returned by `backward`).
    type Input;
    /// Output produced by `forward` (and gradient type accepted by `backward`).
    type Output;
    /// Activation state needed by the matching `backward`.
    type Cache;

    /// Which stage this layer is.
    fn stage(&self) -> Stage;

    /// Computes the output and the cache for one sample.
    ///
    /// # Errors
    ///
    /// Returns an error if the input shape doesn't match the layer.
    fn forward(&self, input: &Self::Input) -> Result<(Self::Output, Self::Cache)>;

    /// Propagates `grad_output` back through the stage, updating owned
    /// parameters, and returns the gradient with respect to the input.
    ///
    /// # Errors
    ///
    /// Returns an error if `grad_output` doesn't match the cached shapes.
    fn backward(&mut self, cache: Self::Cache, grad_output: &Self::Output) -> Result<Self::Input>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Dense.to_string(), "fully-connected");
        assert_eq!(Stage::PIPELINE.len(), 5);
        assert_eq!(Stage::PIPELINE[0], Stage::Convolution);
    }
}
