//! cnnkit: a small convolutional image classifier with manual backprop and
//! model compression, in pure Rust.
//!
//! The network is a fixed five-stage pipeline (convolution, max pooling,
//! flatten, dense, softmax) trained one sample at a time with hand-written
//! gradients. Trained models can be magnitude-pruned, quantized to 8-bit
//! affine levels, distilled from a larger teacher network, and saved in a
//! compact binary format.
//!
//! # Quick Start
//!
//! ```
//! use cnnkit::prelude::*;
//!
//! let config = NetworkConfig::new(8, 8, 3, 2, 2)
//!     .with_learning_rate(0.01)
//!     .with_seed(42);
//! let mut net = ConvNet::new(config).expect("valid config");
//!
//! let data = synthetic::bars(8, 8, 42);
//! let trainer = Trainer::new(TrainerConfig::default().with_epochs(5).with_seed(42));
//! let history = trainer.fit(&mut net, &data, &data, None).expect("finite training");
//! assert!(!history.epochs.is_empty());
//!
//! let class = net.predict(&data[0].image).expect("8x8 image");
//! assert!(class < 2);
//! ```
//!
//! # Modules
//!
//! - [`primitives`]: `Matrix` and `Volume` storage
//! - [`nn`]: the pipeline stages and the [`nn::Layer`] trait
//! - [`network`]: the [`ConvNet`] orchestrator, configuration and trainer
//! - [`compression`]: magnitude pruning and affine 8-bit quantization
//! - [`distillation`]: teacher/student gradient blending
//! - [`serialization`]: `ORIG` / `QNT` model files
//! - [`data`]: samples, pixel helpers and synthetic datasets
//! - [`metrics`]: confusion matrix and per-class accuracy

pub mod compression;
pub mod data;
pub mod distillation;
pub mod error;
pub mod metrics;
pub mod network;
pub mod nn;
pub mod prelude;
pub mod primitives;
pub mod serialization;

pub use error::{CnnError, Result};
pub use network::{ConvNet, NetworkConfig};
pub use primitives::{Matrix, Volume};
