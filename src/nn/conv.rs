//! Single-channel convolution with a bank of square kernels.
//!
//! Forward is a valid (no padding) 2D cross-correlation at a fixed stride,
//! followed by a ReLU floored at [`CONV_RELU_FLOOR`]. Each kernel produces
//! one slice of the output [`Volume`].
//!
//! Backward does two things per kernel:
//!
//! 1. scatters `deriv * kernel[i][j]` into the input gradient over every
//!    receptive field (overlapping windows accumulate), where
//!    `deriv = grad * step(activated_output)`;
//! 2. accumulates the weight gradient `Σ grad[x][y] * input_patch[i][j]`
//!    and applies `w -= lr * g` only to weights that are non-zero.
//!
//! Because the activation is floored at a positive epsilon the step is
//! evaluated on the activated output, which is always positive: the whole
//! incoming gradient flows back.

use rand::Rng;
use tracing::{debug, warn};

use super::activation::{floor_relu, relu_step, CONV_RELU_FLOOR};
use super::init::kernel_init;
use super::{Layer, Stage};
use crate::compression::{prune_by_magnitude, quantize_in_place, PruneReport, QuantizationReport};
use crate::error::{CnnError, Result};
use crate::primitives::{Matrix, Volume};

/// Bank of `num_kernels` square kernels applied to a single-channel image.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvolutionLayer {
    kernels: Vec<Matrix<f64>>,
    kernel_size: usize,
    stride: usize,
    learning_rate: f64,
}

/// Activation state recorded by [`ConvolutionLayer::forward`].
#[derive(Debug, Clone)]
pub struct ConvCache {
    input: Matrix<f64>,
    outputs: Volume,
}

impl ConvCache {
    /// The image seen by the forward pass.
    #[must_use]
    pub fn input(&self) -> &Matrix<f64> {
        &self.input
    }

    /// Activated outputs, one slice per kernel.
    #[must_use]
    pub fn outputs(&self) -> &Volume {
        &self.outputs
    }
}

impl ConvolutionLayer {
    /// Creates a layer with randomly initialized kernels.
    ///
    /// # Arguments
    ///
    /// * `kernel_size` - Side length of each square kernel
    /// * `num_kernels` - Number of kernels (output depth)
    /// * `stride` - Step between window placements
    /// * `learning_rate` - SGD step size used in `backward`
    /// * `rng` - Source of initial weights
    pub fn new<R: Rng + ?Sized>(
        kernel_size: usize,
        num_kernels: usize,
        stride: usize,
        learning_rate: f64,
        rng: &mut R,
    ) -> Self {
        let kernels = (0..num_kernels)
            .map(|_| kernel_init(kernel_size, rng))
            .collect();
        Self {
            kernels,
            kernel_size,
            stride,
            learning_rate,
        }
    }

    /// Creates a layer from explicit kernels.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no kernels, a kernel is not square, the
    /// kernels differ in size, or `stride` is zero.
    pub fn from_kernels(
        kernels: Vec<Matrix<f64>>,
        stride: usize,
        learning_rate: f64,
    ) -> Result<Self> {
        let kernel_size = match kernels.first() {
            Some(k) => k.n_rows(),
            None => {
                return Err(CnnError::InvalidHyperparameter {
                    param: "num_kernels".to_string(),
                    value: "0".to_string(),
                    constraint: ">= 1".to_string(),
                })
            }
        };
        if kernel_size == 0 {
            return Err(CnnError::InvalidHyperparameter {
                param: "kernel_size".to_string(),
                value: "0".to_string(),
                constraint: ">= 1".to_string(),
            });
        }
        for k in &kernels {
            let (r, c) = k.shape();
            if r != kernel_size || c != kernel_size {
                return Err(CnnError::shape_mismatch(
                    "kernel",
                    &[kernel_size, kernel_size],
                    &[r, c],
                ));
            }
        }
        if stride == 0 {
            return Err(CnnError::InvalidHyperparameter {
                param: "stride".to_string(),
                value: "0".to_string(),
                constraint: ">= 1".to_string(),
            });
        }
        Ok(Self {
            kernels,
            kernel_size,
            stride,
            learning_rate,
        })
    }

    /// The kernels, in output-depth order.
    #[must_use]
    pub fn kernels(&self) -> &[Matrix<f64>] {
        &self.kernels
    }

    /// Number of kernels.
    #[must_use]
    pub fn num_kernels(&self) -> usize {
        self.kernels.len()
    }

    /// Side length of each kernel.
    #[must_use]
    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    /// Window stride.
    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// SGD step size.
    #[must_use]
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Output feature-map size for an input of `rows × cols`.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel doesn't fit in the input.
    pub fn output_shape(&self, rows: usize, cols: usize) -> Result<(usize, usize)> {
        if rows < self.kernel_size || cols < self.kernel_size {
            return Err(CnnError::shape_mismatch(
                "convolution input (at least kernel size)",
                &[self.kernel_size, self.kernel_size],
                &[rows, cols],
            ));
        }
        Ok((
            (rows - self.kernel_size) / self.stride + 1,
            (cols - self.kernel_size) / self.stride + 1,
        ))
    }

    /// Zeroes the smallest-magnitude weights across all kernels.
    ///
    /// Magnitudes of every non-zero weight in every kernel are pooled into a
    /// single percentile ranking. A warning is logged and nothing changes if
    /// no non-zero weights remain or all magnitudes are equal.
    ///
    /// # Errors
    ///
    /// Returns an error if `sparsity` is not in (0, 1).
    pub fn prune_kernels(&mut self, sparsity: f64) -> Result<PruneReport> {
        let mut groups: Vec<&mut [f64]> = self
            .kernels
            .iter_mut()
            .map(Matrix::as_mut_slice)
            .collect();
        let report = prune_by_magnitude(&mut groups, sparsity)?;
        if report.skipped() {
            warn!(
                nonzero = report.nonzero_before,
                "Convolution pruning skipped: no distinct non-zero weights"
            );
        } else {
            debug!(
                before = report.nonzero_before,
                after = report.nonzero_after,
                threshold = ?report.threshold,
                "Pruned convolution kernels"
            );
        }
        Ok(report)
    }

    /// Quantizes each kernel independently to 256 affine levels.
    ///
    /// Kernels with no non-zero weights (or a zero-width range) are skipped
    /// and absent from the returned reports.
    pub fn quantize_kernels(&mut self) -> Vec<QuantizationReport> {
        let mut reports = Vec::with_capacity(self.kernels.len());
        for (index, kernel) in self.kernels.iter_mut().enumerate() {
            match quantize_in_place(kernel.as_mut_slice()) {
                Some(report) => {
                    debug!(
                        kernel = index,
                        min = report.quantizer.min(),
                        max = report.quantizer.max(),
                        "Quantized kernel to 256 levels"
                    );
                    reports.push(report);
                }
                None => warn!(kernel = index, "Kernel quantization skipped: degenerate range"),
            }
        }
        reports
    }

    /// Fails if any kernel holds a NaN or infinity.
    ///
    /// # Errors
    ///
    /// Returns [`CnnError::NumericalInstability`] naming the first bad kernel.
    pub fn check_finite(&self) -> Result<()> {
        match self.kernels.iter().position(|k| !k.is_finite()) {
            None => Ok(()),
            Some(index) => Err(CnnError::NumericalInstability {
                stage: Stage::Convolution,
                details: format!("invalid values in kernel {index}"),
            }),
        }
    }

    /// Overwrites all kernel weights from a row-major, kernel-major buffer.
    pub(crate) fn load_weights(&mut self, values: &[f64]) -> Result<()> {
        let per_kernel = self.kernel_size * self.kernel_size;
        let expected = per_kernel * self.kernels.len();
        if values.len() != expected {
            return Err(CnnError::dimension_mismatch(
                "kernel weights",
                expected,
                values.len(),
            ));
        }
        for (kernel, chunk) in self.kernels.iter_mut().zip(values.chunks_exact(per_kernel)) {
            kernel.as_mut_slice().copy_from_slice(chunk);
        }
        Ok(())
    }

    fn correlate(
        &self,
        image: &Matrix<f64>,
        kernel: &Matrix<f64>,
        out_rows: usize,
        out_cols: usize,
    ) -> Matrix<f64> {
        let mut out = Matrix::zeros(out_rows, out_cols);
        for x in 0..out_rows {
            for y in 0..out_cols {
                let mut sum = 0.0;
                for i in 0..self.kernel_size {
                    for j in 0..self.kernel_size {
                        sum += image.get(x * self.stride + i, y * self.stride + j)
                            * kernel.get(i, j);
                    }
                }
                out.set(x, y, floor_relu(sum, CONV_RELU_FLOOR));
            }
        }
        out
    }
}

impl Layer for ConvolutionLayer {
    type Input = Matrix<f64>;
    type Output = Volume;
    type Cache = ConvCache;

    fn stage(&self) -> Stage {
        Stage::Convolution
    }

    fn forward(&self, image: &Matrix<f64>) -> Result<(Volume, ConvCache)> {
        let (rows, cols) = image.shape();
        let (out_rows, out_cols) = self.output_shape(rows, cols)?;

        let maps: Vec<Matrix<f64>> = self
            .kernels
            .iter()
            .map(|k| self.correlate(image, k, out_rows, out_cols))
            .collect();
        let outputs = Volume::from_slices(&maps)?;

        let cache = ConvCache {
            input: image.clone(),
            outputs: outputs.clone(),
        };
        Ok((outputs, cache))
    }

    fn backward(&mut self, cache: ConvCache, grad: &Volume) -> Result<Matrix<f64>> {
        let (depth, out_rows, out_cols) = cache.outputs.shape();
        if grad.shape() != (depth, out_rows, out_cols) || depth != self.kernels.len() {
            let (gd, gr, gc) = grad.shape();
            return Err(CnnError::shape_mismatch(
                "convolution gradient",
                &[self.kernels.len(), out_rows, out_cols],
                &[gd, gr, gc],
            ));
        }

        let input = &cache.input;
        let (in_rows, in_cols) = input.shape();
        let mut input_grad = Matrix::zeros(in_rows, in_cols);
        let (k_size, stride, lr) = (self.kernel_size, self.stride, self.learning_rate);

        for (k, kernel) in self.kernels.iter_mut().enumerate() {
            for x in 0..out_rows {
                for y in 0..out_cols {
                    let deriv = grad.get(k, x, y) * relu_step(cache.outputs.get(k, x, y));
                    if deriv == 0.0 {
                        continue;
                    }
                    for i in 0..k_size {
                        for j in 0..k_size {
                            input_grad.add_at(
                                x * stride + i,
                                y * stride + j,
                                deriv * kernel.get(i, j),
                            );
                        }
                    }
                }
            }

            for i in 0..k_size {
                for j in 0..k_size {
                    let w = kernel.get(i, j);
                    if w == 0.0 {
                        continue;
                    }
                    let mut grad_sum = 0.0;
                    for x in 0..out_rows {
                        for y in 0..out_cols {
                            grad_sum +=
                                grad.get(k, x, y) * input.get(x * stride + i, y * stride + j);
                        }
                    }
                    kernel.set(i, j, w - lr * grad_sum);
                }
            }
        }

        Ok(input_grad)
    }
}

#[cfg(test)]
#[path = "conv_tests.rs"]
mod tests;
