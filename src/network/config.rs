//! Network and compression configuration.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::compression::validate_sparsity;
use crate::distillation::{DistillationConfig, DEFAULT_ALPHA, DEFAULT_TEMPERATURE};
use crate::error::{CnnError, Result};
use crate::nn::Stage;

/// Feature flags and knobs for pruning, quantization and distillation.
///
/// Set once when the network is built and never changed during a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Allow [`ConvNet::prune`](super::ConvNet::prune) to modify weights.
    pub enable_pruning: bool,
    /// Allow [`ConvNet::quantize_model`](super::ConvNet::quantize_model) to modify weights.
    pub enable_quantization: bool,
    /// Use the teacher's outputs in `train` when one is supplied.
    pub enable_distillation: bool,
    /// Fraction of non-zero weights removed per pruning pass.
    pub pruning_sparsity: f64,
    /// Prune every this many epochs during [`Trainer::fit`](super::Trainer::fit).
    pub pruning_frequency: usize,
    /// Softening temperature for distillation.
    pub distillation_temperature: f64,
    /// Weight of the hard-label term in the distillation gradient.
    pub distillation_alpha: f64,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enable_pruning: false,
            enable_quantization: false,
            enable_distillation: false,
            pruning_sparsity: 0.2,
            pruning_frequency: 5,
            distillation_temperature: DEFAULT_TEMPERATURE,
            distillation_alpha: DEFAULT_ALPHA,
        }
    }
}

impl CompressionConfig {
    /// Enables pruning with the given sparsity.
    #[must_use]
    pub fn with_pruning(mut self, sparsity: f64) -> Self {
        self.enable_pruning = true;
        self.pruning_sparsity = sparsity;
        self
    }

    /// Sets the pruning period in epochs.
    #[must_use]
    pub fn with_pruning_frequency(mut self, epochs: usize) -> Self {
        self.pruning_frequency = epochs;
        self
    }

    /// Enables quantization.
    #[must_use]
    pub fn with_quantization(mut self) -> Self {
        self.enable_quantization = true;
        self
    }

    /// Enables distillation with the given temperature and alpha.
    #[must_use]
    pub fn with_distillation(mut self, temperature: f64, alpha: f64) -> Self {
        self.enable_distillation = true;
        self.distillation_temperature = temperature;
        self.distillation_alpha = alpha;
        self
    }

    /// Distillation settings as a [`DistillationConfig`].
    #[must_use]
    pub fn distillation(&self) -> DistillationConfig {
        DistillationConfig::default()
            .with_temperature(self.distillation_temperature)
            .with_alpha(self.distillation_alpha)
    }

    /// Validates the numeric knobs.
    ///
    /// # Errors
    ///
    /// Returns [`CnnError::InvalidHyperparameter`] for the first bad value.
    pub fn validate(&self) -> Result<()> {
        validate_sparsity(self.pruning_sparsity)?;
        if self.pruning_frequency == 0 {
            return Err(CnnError::InvalidHyperparameter {
                param: "pruning_frequency".to_string(),
                value: "0".to_string(),
                constraint: ">= 1".to_string(),
            });
        }
        self.distillation().validate()
    }
}

/// Shape and training configuration of a [`ConvNet`](super::ConvNet).
///
/// # Example
///
/// ```
/// use cnnkit::network::NetworkConfig;
///
/// let config = NetworkConfig::new(8, 8, 3, 2, 2)
///     .with_learning_rate(0.001)
///     .with_seed(42);
/// let arch = config.architecture().expect("valid config");
/// assert_eq!(arch.flattened, 2 * 3 * 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Image width in pixels.
    pub input_width: usize,
    /// Image height in pixels.
    pub input_height: usize,
    /// Side length of each convolution kernel.
    pub kernel_size: usize,
    /// Number of convolution kernels.
    pub num_kernels: usize,
    /// Number of classes.
    pub fc_output_size: usize,
    /// SGD step size shared by the convolution and dense layers.
    pub learning_rate: f64,
    /// Convolution stride.
    pub stride: usize,
    /// Pooling window side length.
    pub pool_size: usize,
    /// Pooling stride.
    pub pool_stride: usize,
    /// Seed for weight initialization; OS entropy when `None`.
    pub seed: Option<u64>,
    /// Compression features.
    pub compression: CompressionConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            input_width: 28,
            input_height: 28,
            kernel_size: 8,
            num_kernels: 16,
            fc_output_size: 10,
            learning_rate: 0.001,
            stride: 1,
            pool_size: 2,
            pool_stride: 2,
            seed: None,
            compression: CompressionConfig::default(),
        }
    }
}

impl NetworkConfig {
    /// Creates a configuration with default learning rate, strides and pooling.
    #[must_use]
    pub fn new(
        input_width: usize,
        input_height: usize,
        kernel_size: usize,
        num_kernels: usize,
        fc_output_size: usize,
    ) -> Self {
        Self {
            input_width,
            input_height,
            kernel_size,
            num_kernels,
            fc_output_size,
            ..Self::default()
        }
    }

    /// Sets the learning rate.
    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Sets the convolution stride.
    #[must_use]
    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    /// Sets the pooling window and stride.
    #[must_use]
    pub fn with_pooling(mut self, pool_size: usize, pool_stride: usize) -> Self {
        self.pool_size = pool_size;
        self.pool_stride = pool_stride;
        self
    }

    /// Seeds weight initialization.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the compression features.
    #[must_use]
    pub fn with_compression(mut self, compression: CompressionConfig) -> Self {
        self.compression = compression;
        self
    }

    /// Validates every field and that the stages fit together.
    ///
    /// # Errors
    ///
    /// Returns [`CnnError::InvalidHyperparameter`] or
    /// [`CnnError::DimensionMismatch`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.architecture().map(|_| ())
    }

    /// Derives the per-stage sizes.
    ///
    /// # Errors
    ///
    /// Same as [`validate`](Self::validate).
    pub fn architecture(&self) -> Result<Architecture> {
        for (param, value) in [
            ("input_width", self.input_width),
            ("input_height", self.input_height),
            ("kernel_size", self.kernel_size),
            ("num_kernels", self.num_kernels),
            ("fc_output_size", self.fc_output_size),
            ("stride", self.stride),
            ("pool_size", self.pool_size),
            ("pool_stride", self.pool_stride),
        ] {
            if value == 0 {
                return Err(CnnError::InvalidHyperparameter {
                    param: param.to_string(),
                    value: "0".to_string(),
                    constraint: ">= 1".to_string(),
                });
            }
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(CnnError::InvalidHyperparameter {
                param: "learning_rate".to_string(),
                value: format!("{}", self.learning_rate),
                constraint: "> 0 and finite".to_string(),
            });
        }
        self.compression.validate()?;

        if self.kernel_size > self.input_height || self.kernel_size > self.input_width {
            return Err(CnnError::shape_mismatch(
                "input (at least kernel size)",
                &[self.kernel_size, self.kernel_size],
                &[self.input_height, self.input_width],
            ));
        }
        let conv_rows = (self.input_height - self.kernel_size) / self.stride + 1;
        let conv_cols = (self.input_width - self.kernel_size) / self.stride + 1;
        if self.pool_size > conv_rows || self.pool_size > conv_cols {
            return Err(CnnError::shape_mismatch(
                "feature map (at least pool size)",
                &[self.pool_size, self.pool_size],
                &[conv_rows, conv_cols],
            ));
        }
        let pooled_rows = (conv_rows - self.pool_size) / self.pool_stride + 1;
        let pooled_cols = (conv_cols - self.pool_size) / self.pool_stride + 1;

        Ok(Architecture {
            input: (self.input_height, self.input_width),
            num_kernels: self.num_kernels,
            kernel_size: self.kernel_size,
            stride: self.stride,
            conv: (conv_rows, conv_cols),
            pool_size: self.pool_size,
            pool_stride: self.pool_stride,
            pooled: (pooled_rows, pooled_cols),
            flattened: self.num_kernels * pooled_rows * pooled_cols,
            classes: self.fc_output_size,
        })
    }

    /// Loads and validates a JSON configuration file.
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be read, isn't valid JSON, or
    /// fails [`validate`](Self::validate).
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Sizes of every stage, derived from a [`NetworkConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Architecture {
    /// Image (rows, cols).
    pub input: (usize, usize),
    /// Convolution depth.
    pub num_kernels: usize,
    /// Kernel side length.
    pub kernel_size: usize,
    /// Convolution stride.
    pub stride: usize,
    /// Feature map (rows, cols) after convolution.
    pub conv: (usize, usize),
    /// Pooling window.
    pub pool_size: usize,
    /// Pooling stride.
    pub pool_stride: usize,
    /// Feature map (rows, cols) after pooling.
    pub pooled: (usize, usize),
    /// Length of the flattened vector.
    pub flattened: usize,
    /// Number of output classes.
    pub classes: usize,
}

impl Architecture {
    /// Trainable weights (kernels plus dense matrix; biases are fixed).
    #[must_use]
    pub fn weight_count(&self) -> usize {
        self.num_kernels * self.kernel_size * self.kernel_size + self.flattened * self.classes
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (k, ks) = (self.num_kernels, self.kernel_size);
        writeln!(f, "input            1x{}x{}", self.input.0, self.input.1)?;
        for stage in Stage::PIPELINE {
            let detail = match stage {
                Stage::Convolution => format!(
                    "{k} kernels {ks}x{ks}, stride {} -> {k}x{}x{}",
                    self.stride, self.conv.0, self.conv.1
                ),
                Stage::Pooling => format!(
                    "max {}x{}, stride {} -> {k}x{}x{}",
                    self.pool_size, self.pool_size, self.pool_stride, self.pooled.0, self.pooled.1
                ),
                Stage::Flatten => format!("{}", self.flattened),
                Stage::Dense => format!("{} -> {}", self.flattened, self.classes),
                Stage::Softmax => format!("{}", self.classes),
            };
            writeln!(f, "{:<16} {detail}", stage.name())?;
        }
        write!(f, "weights          {}", self.weight_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_architecture() {
        let arch = NetworkConfig::default().architecture().expect("default is valid");
        assert_eq!(arch.conv, (21, 21));
        assert_eq!(arch.pooled, (10, 10));
        assert_eq!(arch.flattened, 1600);
        assert_eq!(arch.weight_count(), 16 * 64 + 1600 * 10);
    }

    #[test]
    fn test_rejects_kernel_larger_than_input() {
        let config = NetworkConfig::new(4, 4, 5, 1, 2);
        assert!(matches!(
            config.validate(),
            Err(CnnError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_and_bad_rates() {
        assert!(NetworkConfig::new(8, 8, 3, 0, 2).validate().is_err());
        assert!(NetworkConfig::new(8, 8, 3, 2, 2)
            .with_learning_rate(-1.0)
            .validate()
            .is_err());
        let bad = CompressionConfig::default().with_pruning(1.0);
        assert!(NetworkConfig::new(8, 8, 3, 2, 2)
            .with_compression(bad)
            .validate()
            .is_err());
    }

    #[test]
    fn test_rejects_pool_larger_than_feature_map() {
        let config = NetworkConfig::new(4, 4, 4, 1, 2);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_round_trip_and_partial_input() {
        let config = NetworkConfig::new(8, 8, 3, 2, 2)
            .with_seed(9)
            .with_compression(CompressionConfig::default().with_quantization());
        let json = config.to_json_pretty().expect("serializable");
        let back: NetworkConfig = serde_json::from_str(&json).expect("valid json");
        assert_eq!(back, config);

        let partial: NetworkConfig =
            serde_json::from_str(r#"{"num_kernels": 4}"#).expect("defaults fill in");
        assert_eq!(partial.num_kernels, 4);
        assert_eq!(partial.input_width, 28);
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("net.json");
        std::fs::write(&path, r#"{"input_width": 8, "input_height": 8, "kernel_size": 3}"#)
            .expect("write");
        let config = NetworkConfig::from_json_file(&path).expect("valid file");
        assert_eq!(config.kernel_size, 3);

        std::fs::write(&path, r#"{"kernel_size": 0}"#).expect("write");
        assert!(NetworkConfig::from_json_file(&path).is_err());
    }

    #[test]
    fn test_architecture_display_lists_every_stage() {
        let text = NetworkConfig::new(8, 8, 3, 2, 2)
            .architecture()
            .expect("valid")
            .to_string();
        for stage in Stage::PIPELINE {
            assert!(text.contains(stage.name()), "{text}");
        }
        assert!(text.contains("2x3x3"));
    }
}
