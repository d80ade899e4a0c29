//! The five-stage convolutional classifier and its training loop.
//!
//! [`ConvNet`] wires a fixed pipeline:
//!
//! ```text
//! image ─► conv ─► pool ─► flatten ─► dense ─► softmax ─► probabilities
//! ```
//!
//! Training is online SGD: [`ConvNet::train`] runs one forward pass, one
//! backward pass and one in-place update per sample. [`Trainer`] adds the
//! epoch loop (shuffling, periodic pruning, early stopping) on top.
//!
//! # Example
//!
//! ```
//! use cnnkit::data::synthetic;
//! use cnnkit::network::{ConvNet, NetworkConfig};
//!
//! let config = NetworkConfig::new(8, 8, 3, 2, 2).with_seed(7);
//! let mut net = ConvNet::new(config).expect("valid config");
//!
//! let samples = synthetic::bars(4, 8, 7);
//! for s in &samples {
//!     net.train(&s.image, &s.target, None).expect("finite");
//! }
//! let accuracy = net.evaluate(&samples).expect("shapes match");
//! assert!((0.0..=1.0).contains(&accuracy));
//! ```

mod config;
mod trainer;

pub use config::{Architecture, CompressionConfig, NetworkConfig};
pub use trainer::{EpochStats, Trainer, TrainerConfig, TrainingHistory};

use tracing::{debug, info};

use crate::compression::CompressionSummary;
use crate::data::Sample;
use crate::distillation::KnowledgeDistiller;
use crate::error::{CnnError, Result};
use crate::nn::{
    rng_from_seed, ConvCache, ConvolutionLayer, DenseCache, FlattenCache, FlattenLayer,
    FullyConnectedLayer, Layer, PoolCache, PoolingLayer, SoftmaxCache, SoftmaxLayer, Stage,
};
use crate::primitives::Matrix;

/// Probability floor used by the cross-entropy loss.
pub const LOSS_FLOOR: f64 = 1e-15;

/// Every output-gradient component is clipped to `[-GRAD_CLIP, GRAD_CLIP]`.
pub const GRAD_CLIP: f64 = 1.0;

/// Convolution → max-pool → flatten → dense → softmax classifier.
#[derive(Debug, Clone)]
pub struct ConvNet {
    config: NetworkConfig,
    architecture: Architecture,
    conv: ConvolutionLayer,
    pool: PoolingLayer,
    flatten: FlattenLayer,
    dense: FullyConnectedLayer,
    softmax: SoftmaxLayer,
    distiller: KnowledgeDistiller,
}

/// Caches from every stage of one forward pass.
#[derive(Debug, Clone)]
pub struct PipelineCache {
    conv: ConvCache,
    pool: PoolCache,
    flatten: FlattenCache,
    dense: DenseCache,
    softmax: SoftmaxCache,
}

impl PipelineCache {
    /// Convolution stage cache.
    #[must_use]
    pub fn conv(&self) -> &ConvCache {
        &self.conv
    }

    /// Pooling stage cache.
    #[must_use]
    pub fn pool(&self) -> &PoolCache {
        &self.pool
    }

    /// Dense stage cache.
    #[must_use]
    pub fn dense(&self) -> &DenseCache {
        &self.dense
    }

    /// Output probabilities.
    #[must_use]
    pub fn probabilities(&self) -> &[f64] {
        self.softmax.output()
    }
}

/// Result of one [`ConvNet::train`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainStep {
    /// Cross-entropy of the output before the update.
    pub loss: f64,
    /// Whether the teacher's outputs shaped the gradient.
    pub distilled: bool,
}

impl ConvNet {
    /// Builds a network with freshly initialized weights.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails validation.
    pub fn new(config: NetworkConfig) -> Result<Self> {
        let architecture = config.architecture()?;
        let mut rng = rng_from_seed(config.seed);
        let conv = ConvolutionLayer::new(
            config.kernel_size,
            config.num_kernels,
            config.stride,
            config.learning_rate,
            &mut rng,
        );
        let pool = PoolingLayer::new(config.pool_size, config.pool_stride)?;
        let dense = FullyConnectedLayer::new(
            architecture.flattened,
            config.fc_output_size,
            config.learning_rate,
            &mut rng,
        );
        let distiller = KnowledgeDistiller::new(config.compression.distillation());

        info!(
            kernels = config.num_kernels,
            kernel_size = config.kernel_size,
            flattened = architecture.flattened,
            classes = config.fc_output_size,
            weights = architecture.weight_count(),
            "Built convolutional network"
        );

        Ok(Self {
            config,
            architecture,
            conv,
            pool,
            flatten: FlattenLayer::new(),
            dense,
            softmax: SoftmaxLayer::new(),
            distiller,
        })
    }

    /// The configuration the network was built from.
    #[must_use]
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Per-stage sizes.
    #[must_use]
    pub fn architecture(&self) -> &Architecture {
        &self.architecture
    }

    /// Convolution kernels, in output-depth order.
    #[must_use]
    pub fn kernels(&self) -> &[Matrix<f64>] {
        self.conv.kernels()
    }

    /// Convolution stage.
    #[must_use]
    pub fn conv(&self) -> &ConvolutionLayer {
        &self.conv
    }

    /// Dense stage.
    #[must_use]
    pub fn dense(&self) -> &FullyConnectedLayer {
        &self.dense
    }

    /// Class probabilities for one image.
    ///
    /// # Errors
    ///
    /// Returns an error if the image shape doesn't match the configuration.
    pub fn forward(&self, image: &Matrix<f64>) -> Result<Vec<f64>> {
        self.forward_with_cache(image).map(|(probs, _)| probs)
    }

    /// Class probabilities plus every stage's cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the image shape doesn't match the configuration.
    pub fn forward_with_cache(&self, image: &Matrix<f64>) -> Result<(Vec<f64>, PipelineCache)> {
        let expected = (self.config.input_height, self.config.input_width);
        if image.shape() != expected {
            let (r, c) = image.shape();
            return Err(CnnError::shape_mismatch("image", &[expected.0, expected.1], &[r, c]));
        }
        let (maps, conv) = self.conv.forward(image)?;
        let (pooled, pool) = self.pool.forward(&maps)?;
        let (flat, flatten) = self.flatten.forward(&pooled)?;
        let (scores, dense) = self.dense.forward(&flat)?;
        let (probs, softmax) = self.softmax.forward(&scores)?;
        Ok((
            probs,
            PipelineCache {
                conv,
                pool,
                flatten,
                dense,
                softmax,
            },
        ))
    }

    /// Index of the most probable class.
    ///
    /// # Errors
    ///
    /// Returns an error if the image shape doesn't match the configuration.
    pub fn predict(&self, image: &Matrix<f64>) -> Result<usize> {
        self.forward(image).map(|p| argmax(&p))
    }

    /// One online SGD step on a single sample.
    ///
    /// When distillation is enabled and `teacher` is given, the output
    /// gradient comes from [`KnowledgeDistiller::calculate_gradient`] with
    /// both networks' probabilities; otherwise it is `(p - y) / n`. Each
    /// component is clipped to `[-1, 1]` before backpropagation.
    ///
    /// # Errors
    ///
    /// - [`CnnError::DimensionMismatch`] for a wrong image shape or target length.
    /// - [`CnnError::NumericalInstability`] if the output, or any weight after
    ///   the update, is NaN or infinite. Layers already updated are not rolled back.
    /// - [`CnnError::BackpropagationFailed`] wrapping any error raised while
    ///   propagating gradients.
    pub fn train(
        &mut self,
        image: &Matrix<f64>,
        target: &[f64],
        teacher: Option<&ConvNet>,
    ) -> Result<TrainStep> {
        if target.len() != self.config.fc_output_size {
            return Err(CnnError::dimension_mismatch(
                "target",
                self.config.fc_output_size,
                target.len(),
            ));
        }
        let (output, cache) = self.forward_with_cache(image)?;
        if output.iter().any(|p| !p.is_finite()) {
            return Err(CnnError::NumericalInstability {
                stage: Stage::Softmax,
                details: "forward output contains NaN or infinity".to_string(),
            });
        }
        let loss = self.calculate_loss(&output, target)?;

        let (grad, distilled) = match teacher {
            Some(teacher) if self.config.compression.enable_distillation => {
                let teacher_output = teacher.forward(image)?;
                let grad = self
                    .distiller
                    .calculate_gradient(&output, &teacher_output, target)?;
                (grad, true)
            }
            _ => {
                let n = output.len() as f64;
                let grad: Vec<f64> =
                    output.iter().zip(target).map(|(p, y)| (p - y) / n).collect();
                (grad, false)
            }
        };
        let grad: Vec<f64> = grad
            .into_iter()
            .map(|g| g.clamp(-GRAD_CLIP, GRAD_CLIP))
            .collect();

        self.backpropagate(cache, grad)
            .map_err(|e| CnnError::BackpropagationFailed(Box::new(e)))?;

        self.conv.check_finite()?;
        self.dense.check_finite()?;

        Ok(TrainStep { loss, distilled })
    }

    fn backpropagate(&mut self, cache: PipelineCache, grad: Vec<f64>) -> Result<()> {
        let grad = self.dense.backward(cache.dense, &grad)?;
        let grad = self.flatten.backward(cache.flatten, &grad)?;
        let grad = self.pool.backward(cache.pool, &grad)?;
        self.conv.backward(cache.conv, &grad)?;
        Ok(())
    }

    /// Categorical cross-entropy `-Σ y · ln(max(p, 1e-15))`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lengths differ.
    pub fn calculate_loss(&self, predicted: &[f64], target: &[f64]) -> Result<f64> {
        cross_entropy(predicted, target)
    }

    /// Fraction of samples whose predicted class matches the target's argmax.
    ///
    /// An empty slice scores `0.0`.
    ///
    /// # Errors
    ///
    /// Returns an error if a sample's image has the wrong shape.
    pub fn evaluate(&self, samples: &[Sample]) -> Result<f64> {
        if samples.is_empty() {
            return Ok(0.0);
        }
        let mut correct = 0usize;
        for sample in samples {
            if self.predict(&sample.image)? == argmax(&sample.target) {
                correct += 1;
            }
        }
        Ok(correct as f64 / samples.len() as f64)
    }

    /// Magnitude-prunes both the kernels and the dense weights.
    ///
    /// Does nothing unless pruning is enabled in the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if pruning is enabled and `sparsity` is not in (0, 1).
    pub fn prune(&mut self, sparsity: f64) -> Result<CompressionSummary> {
        if !self.config.compression.enable_pruning {
            debug!("Pruning disabled; skipping");
            return Ok(CompressionSummary::default());
        }
        let summary = CompressionSummary {
            conv_pruning: Some(self.conv.prune_kernels(sparsity)?),
            dense_pruning: Some(self.dense.prune_weights(sparsity)?),
            ..CompressionSummary::default()
        };
        info!(
            sparsity,
            pruned = summary.weights_pruned(),
            conv_nonzero = summary.conv_pruning.map_or(0, |r| r.nonzero_after),
            dense_nonzero = summary.dense_pruning.map_or(0, |r| r.nonzero_after),
            "Pruned network"
        );
        Ok(summary)
    }

    /// Quantizes each kernel and the dense matrix to 256 affine levels.
    ///
    /// Does nothing unless quantization is enabled in the configuration.
    pub fn quantize_model(&mut self) -> CompressionSummary {
        if !self.config.compression.enable_quantization {
            debug!("Quantization disabled; skipping");
            return CompressionSummary::default();
        }
        let summary = CompressionSummary {
            conv_quantization: self.conv.quantize_kernels(),
            dense_quantization: self.dense.quantize_weights(),
            ..CompressionSummary::default()
        };
        info!(
            kernels = summary.conv_quantization.len(),
            quantized = summary.weights_quantized(),
            "Quantized network"
        );
        summary
    }

    /// Replaces all kernel and dense weights (used when loading a model).
    pub(crate) fn load_parameters(&mut self, kernels: &[f64], dense: &[f64]) -> Result<()> {
        self.conv.load_weights(kernels)?;
        self.dense.load_weights(dense)
    }
}

/// Categorical cross-entropy with predictions floored at [`LOSS_FLOOR`].
///
/// # Errors
///
/// Returns an error if the lengths differ.
pub fn cross_entropy(predicted: &[f64], target: &[f64]) -> Result<f64> {
    if predicted.len() != target.len() {
        return Err(CnnError::dimension_mismatch(
            "prediction/target",
            target.len(),
            predicted.len(),
        ));
    }
    Ok(-predicted
        .iter()
        .zip(target)
        .map(|(p, y)| y * p.max(LOSS_FLOOR).ln())
        .sum::<f64>())
}

/// Index of the largest value; the first wins ties, `0` for an empty slice.
#[must_use]
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
#[path = "network_tests.rs"]
mod tests;
