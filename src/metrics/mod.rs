//! Evaluation metrics for trained networks.
//!
//! Provides overall and per-class accuracy, the mean probability assigned
//! to the true class, and a confusion matrix.

pub mod classification;

pub use classification::{confusion_matrix, ClassStats, ClassificationReport};
