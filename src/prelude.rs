//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use cnnkit::prelude::*;
//! ```

pub use crate::compression::CompressionSummary;
pub use crate::data::{one_hot, synthetic, Sample};
pub use crate::distillation::{DistillationConfig, KnowledgeDistiller};
pub use crate::error::{CnnError, Result};
pub use crate::metrics::ClassificationReport;
pub use crate::network::{
    CompressionConfig, ConvNet, NetworkConfig, Trainer, TrainerConfig, TrainingHistory,
};
pub use crate::nn::Layer;
pub use crate::primitives::{Matrix, Volume};
pub use crate::serialization::{load_model, save_model, ModelFormat};
