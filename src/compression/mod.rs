//! Model compression: magnitude pruning and affine 8-bit quantization.
//!
//! Both passes operate on raw weight buffers and are destructive: a pruned
//! weight is exactly `0.0` and stays frozen afterwards, because every layer
//! skips zero weights in its update step. Quantization leaves zeros alone
//! for the same reason.
//!
//! The layers own their tensors and call into this module from
//! `prune_*`/`quantize_*`; nothing here knows about layer shapes.
//!
//! # References
//! - Han, S., et al. (2015). Learning both weights and connections. NeurIPS.
//! - Jacob, B., et al. (2018). Quantization and training of neural networks
//!   for efficient integer-arithmetic-only inference. CVPR.

mod pruning;
mod quantize;

pub use pruning::{prune_by_magnitude, validate_sparsity, PruneReport};
pub use quantize::{quantize_in_place, AffineQuantizer, QuantizationReport, QUANT_LEVELS};

/// Aggregated result of a network-level compression pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompressionSummary {
    /// Pruning result for the convolution kernels.
    pub conv_pruning: Option<PruneReport>,
    /// Pruning result for the dense weight matrix.
    pub dense_pruning: Option<PruneReport>,
    /// Per-kernel quantization results (skipped kernels are absent).
    pub conv_quantization: Vec<QuantizationReport>,
    /// Quantization result for the dense weight matrix.
    pub dense_quantization: Option<QuantizationReport>,
}

impl CompressionSummary {
    /// Total number of weights zeroed by this pass.
    #[must_use]
    pub fn weights_pruned(&self) -> usize {
        self.conv_pruning.as_ref().map_or(0, PruneReport::pruned)
            + self.dense_pruning.as_ref().map_or(0, PruneReport::pruned)
    }

    /// Total number of weights snapped to a quantization level.
    #[must_use]
    pub fn weights_quantized(&self) -> usize {
        self.conv_quantization
            .iter()
            .map(|r| r.quantized)
            .sum::<usize>()
            + self.dense_quantization.as_ref().map_or(0, |r| r.quantized)
    }

    /// True when the pass did nothing (feature disabled or degenerate input).
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.weights_pruned() == 0 && self.weights_quantized() == 0
    }
}
