//! Fully connected (dense) layer.
//!
//! Implements `y = leaky_relu(Wx + b)` with `W` stored as
//! `[out_features, in_features]`.
//!
//! The backward pass differentiates the *hard* ReLU (`1` if the
//! pre-activation is positive, `0` otherwise) rather than the leaky slope
//! used going forward. Weights that are exactly zero are never updated, so
//! pruned connections stay pruned. Biases start at zero and are held fixed.
//!
//! # References
//!
//! - Glorot, X., & Bengio, Y. (2010). Understanding the difficulty of training
//!   deep feedforward neural networks. AISTATS.

use rand::Rng;
use tracing::{debug, warn};

use super::activation::{leaky_relu, relu_step, LEAKY_RELU_SLOPE};
use super::init::dense_init;
use super::{Layer, Stage};
use crate::compression::{prune_by_magnitude, quantize_in_place, PruneReport, QuantizationReport};
use crate::error::{CnnError, Result};
use crate::primitives::Matrix;

/// Dense layer with leaky-ReLU activation.
///
/// # Example
///
/// ```
/// use cnnkit::nn::{rng_from_seed, FullyConnectedLayer, Layer};
///
/// let layer = FullyConnectedLayer::new(18, 2, 0.01, &mut rng_from_seed(Some(0)));
/// let (out, _) = layer.forward(&vec![0.5; 18]).expect("18 inputs");
/// assert_eq!(out.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FullyConnectedLayer {
    /// Shape: [out_features, in_features]
    weights: Matrix<f64>,
    biases: Vec<f64>,
    learning_rate: f64,
}

/// Activation state recorded by [`FullyConnectedLayer::forward`].
#[derive(Debug, Clone, PartialEq)]
pub struct DenseCache {
    input: Vec<f64>,
    pre_activation: Vec<f64>,
    output: Vec<f64>,
}

impl DenseCache {
    /// Input vector seen by the forward pass.
    #[must_use]
    pub fn input(&self) -> &[f64] {
        &self.input
    }

    /// `Wx + b` before the activation.
    #[must_use]
    pub fn pre_activation(&self) -> &[f64] {
        &self.pre_activation
    }

    /// Activated output.
    #[must_use]
    pub fn output(&self) -> &[f64] {
        &self.output
    }
}

impl FullyConnectedLayer {
    /// Creates a layer with Glorot-uniform weights and zero biases.
    pub fn new<R: Rng + ?Sized>(
        in_features: usize,
        out_features: usize,
        learning_rate: f64,
        rng: &mut R,
    ) -> Self {
        Self {
            weights: dense_init(in_features, out_features, rng),
            biases: vec![0.0; out_features],
            learning_rate,
        }
    }

    /// Creates a layer from explicit parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if `biases.len()` differs from the weight row count.
    pub fn from_parts(weights: Matrix<f64>, biases: Vec<f64>, learning_rate: f64) -> Result<Self> {
        if biases.len() != weights.n_rows() {
            return Err(CnnError::dimension_mismatch(
                "dense biases (out_features)",
                weights.n_rows(),
                biases.len(),
            ));
        }
        Ok(Self {
            weights,
            biases,
            learning_rate,
        })
    }

    /// Number of inputs.
    #[must_use]
    pub fn in_features(&self) -> usize {
        self.weights.n_cols()
    }

    /// Number of outputs.
    #[must_use]
    pub fn out_features(&self) -> usize {
        self.weights.n_rows()
    }

    /// Weight matrix, `[out_features, in_features]`.
    #[must_use]
    pub fn weights(&self) -> &Matrix<f64> {
        &self.weights
    }

    /// Bias vector.
    #[must_use]
    pub fn biases(&self) -> &[f64] {
        &self.biases
    }

    /// SGD step size.
    #[must_use]
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Zeroes the smallest-magnitude weights of the matrix.
    ///
    /// # Errors
    ///
    /// Returns an error if `sparsity` is not in (0, 1).
    pub fn prune_weights(&mut self, sparsity: f64) -> Result<PruneReport> {
        let report = prune_by_magnitude(&mut [self.weights.as_mut_slice()], sparsity)?;
        if report.skipped() {
            warn!(
                nonzero = report.nonzero_before,
                "Dense pruning skipped: no distinct non-zero weights"
            );
        } else {
            debug!(
                before = report.nonzero_before,
                after = report.nonzero_after,
                threshold = ?report.threshold,
                "Pruned dense weights"
            );
        }
        Ok(report)
    }

    /// Quantizes the whole weight matrix as one 8-bit affine group.
    ///
    /// Returns `None` if there was nothing to quantize.
    pub fn quantize_weights(&mut self) -> Option<QuantizationReport> {
        let report = quantize_in_place(self.weights.as_mut_slice());
        match &report {
            Some(r) => debug!(
                min = r.quantizer.min(),
                max = r.quantizer.max(),
                weights = r.quantized,
                "Quantized dense weights to 256 levels"
            ),
            None => warn!("Dense quantization skipped: degenerate range"),
        }
        report
    }

    /// Fails if any weight is NaN or infinite.
    ///
    /// # Errors
    ///
    /// Returns [`CnnError::NumericalInstability`].
    pub fn check_finite(&self) -> Result<()> {
        if self.weights.is_finite() {
            Ok(())
        } else {
            Err(CnnError::NumericalInstability {
                stage: Stage::Dense,
                details: "invalid values in weight matrix".to_string(),
            })
        }
    }

    /// Overwrites the weight matrix from a row-major buffer.
    pub(crate) fn load_weights(&mut self, values: &[f64]) -> Result<()> {
        if values.len() != self.weights.len() {
            return Err(CnnError::dimension_mismatch(
                "dense weights",
                self.weights.len(),
                values.len(),
            ));
        }
        self.weights.as_mut_slice().copy_from_slice(values);
        Ok(())
    }
}

impl Layer for FullyConnectedLayer {
    type Input = Vec<f64>;
    type Output = Vec<f64>;
    type Cache = DenseCache;

    fn stage(&self) -> Stage {
        Stage::Dense
    }

    fn forward(&self, input: &Vec<f64>) -> Result<(Vec<f64>, DenseCache)> {
        if input.len() != self.in_features() {
            return Err(CnnError::dimension_mismatch(
                "dense input",
                self.in_features(),
                input.len(),
            ));
        }
        let pre_activation: Vec<f64> = (0..self.out_features())
            .map(|i| {
                let dot: f64 = self
                    .weights
                    .row(i)
                    .iter()
                    .zip(input)
                    .map(|(w, x)| w * x)
                    .sum();
                self.biases[i] + dot
            })
            .collect();
        let output: Vec<f64> = pre_activation
            .iter()
            .map(|&z| leaky_relu(z, LEAKY_RELU_SLOPE))
            .collect();

        let cache = DenseCache {
            input: input.clone(),
            pre_activation,
            output: output.clone(),
        };
        Ok((output, cache))
    }

    fn backward(&mut self, cache: DenseCache, grad: &Vec<f64>) -> Result<Vec<f64>> {
        let (out_features, in_features) = self.weights.shape();
        if grad.len() != out_features {
            return Err(CnnError::dimension_mismatch(
                "dense gradient",
                out_features,
                grad.len(),
            ));
        }
        if cache.input.len() != in_features {
            return Err(CnnError::dimension_mismatch(
                "dense cache input",
                in_features,
                cache.input.len(),
            ));
        }

        let activation_grad: Vec<f64> = grad
            .iter()
            .zip(&cache.pre_activation)
            .map(|(g, &z)| g * relu_step(z))
            .collect();

        let mut input_grad = vec![0.0; in_features];
        for (i, &ag) in activation_grad.iter().enumerate() {
            for (j, slot) in input_grad.iter_mut().enumerate() {
                *slot += self.weights.get(i, j) * ag;
            }
        }

        let lr = self.learning_rate;
        for (i, &ag) in activation_grad.iter().enumerate() {
            if ag == 0.0 {
                continue;
            }
            for (j, &x) in cache.input.iter().enumerate() {
                let w = self.weights.get(i, j);
                if w != 0.0 {
                    self.weights.set(i, j, w - lr * ag * x);
                }
            }
        }

        Ok(input_grad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(rows: &[Vec<f64>], lr: f64) -> FullyConnectedLayer {
        let weights = Matrix::from_rows(rows).expect("rectangular");
        let biases = vec![0.0; weights.n_rows()];
        FullyConnectedLayer::from_parts(weights, biases, lr).expect("consistent")
    }

    #[test]
    fn test_forward_leaky_relu() {
        let fc = layer(&[vec![1.0, 2.0], vec![-1.0, -1.0]], 0.1);
        let (out, cache) = fc.forward(&vec![1.0, 1.0]).expect("2 inputs");
        assert_eq!(out[0], 3.0);
        assert!((out[1] + 0.02).abs() < 1e-15);
        assert_eq!(cache.pre_activation(), &[3.0, -2.0]);
        assert_eq!(cache.output(), out.as_slice());
    }

    #[test]
    fn test_forward_rejects_wrong_length() {
        let fc = layer(&[vec![1.0, 2.0]], 0.1);
        assert!(matches!(
            fc.forward(&vec![1.0; 3]),
            Err(CnnError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_backward_uses_hard_step_and_pre_update_weights() {
        let mut fc = layer(&[vec![1.0, 2.0], vec![-1.0, -1.0]], 0.1);
        let (_, cache) = fc.forward(&vec![1.0, 3.0]).expect("2 inputs");
        let input_grad = fc.backward(cache, &vec![0.5, 0.5]).expect("2 grads");

        // second unit is negative: no gradient through it despite the leaky slope
        assert_eq!(input_grad, vec![0.5, 1.0]);
        assert!((fc.weights().get(0, 0) - 0.95).abs() < 1e-12);
        assert!((fc.weights().get(0, 1) - 1.85).abs() < 1e-12);
        assert_eq!(fc.weights().row(1), &[-1.0, -1.0]);
        assert_eq!(fc.biases(), &[0.0, 0.0]);
    }

    #[test]
    fn test_backward_skips_zero_weights() {
        let mut fc = layer(&[vec![0.0, 2.0]], 0.1);
        let (_, cache) = fc.forward(&vec![1.0, 1.0]).expect("2 inputs");
        fc.backward(cache, &vec![1.0]).expect("1 grad");
        assert_eq!(fc.weights().get(0, 0), 0.0);
        assert!((fc.weights().get(0, 1) - 1.9).abs() < 1e-12);
    }

    #[test]
    fn test_backward_rejects_wrong_gradient_length() {
        let mut fc = layer(&[vec![1.0, 2.0]], 0.1);
        let (_, cache) = fc.forward(&vec![1.0, 1.0]).expect("2 inputs");
        assert!(fc.backward(cache, &vec![1.0, 1.0]).is_err());
    }

    #[test]
    fn test_prune_and_quantize_weights() {
        let mut fc = layer(&[vec![0.1, -0.2, 0.3], vec![-0.4, 0.5, -0.6]], 0.1);
        let report = fc.prune_weights(0.5).expect("valid sparsity");
        assert_eq!(report.nonzero_before, 6);
        assert_eq!(report.pruned(), 2);
        assert_eq!(fc.weights().count_nonzero(), 4);

        let before = fc.weights().clone();
        let q = fc.quantize_weights().expect("range");
        assert_eq!(q.quantized, 4);
        for (a, b) in before.as_slice().iter().zip(fc.weights().as_slice()) {
            assert!((a - b).abs() <= q.quantizer.scale() / 2.0 + 1e-12);
        }
    }

    #[test]
    fn test_check_finite_and_load() {
        let mut fc = layer(&[vec![1.0, 2.0]], 0.1);
        assert!(fc.check_finite().is_ok());
        fc.load_weights(&[f64::INFINITY, 0.0]).expect("2 weights");
        assert!(fc.check_finite().expect_err("inf").is_numerical());
        assert!(fc.load_weights(&[1.0]).is_err());
    }

    #[test]
    fn test_from_parts_checks_bias_length() {
        assert!(FullyConnectedLayer::from_parts(Matrix::zeros(2, 3), vec![0.0], 0.1).is_err());
    }
}
