//! Error types for cnnkit operations.
//!
//! Every fallible operation returns [`Result`], whose error side is
//! [`CnnError`]. Errors fall into four groups:
//!
//! - **Fatal numerical failures** ([`CnnError::NumericalInstability`]): a NaN
//!   or infinity appeared in a forward output or in a parameter tensor after
//!   an update. The training call is aborted and nothing is rolled back.
//! - **Contract violations** ([`CnnError::DimensionMismatch`],
//!   [`CnnError::InvalidHyperparameter`]): rejected immediately.
//! - **Wrapped failures** ([`CnnError::BackpropagationFailed`]): anything that
//!   goes wrong inside the backward chain, with the original cause attached.
//! - **Persistence failures** ([`CnnError::Io`], [`CnnError::FormatError`],
//!   [`CnnError::UnsupportedVersion`], [`CnnError::Serialization`]).

use std::fmt;

use crate::nn::Stage;

/// Main error type for cnnkit operations.
///
/// # Examples
///
/// ```
/// use cnnkit::error::CnnError;
///
/// let err = CnnError::dimension_mismatch("dense input", 18, 12);
/// assert!(err.to_string().contains("dimension mismatch"));
/// ```
#[derive(Debug)]
pub enum CnnError {
    /// Tensor or vector dimensions don't match what the layer expects.
    DimensionMismatch {
        /// Expected dimensions description
        expected: String,
        /// Actual dimensions found
        actual: String,
    },

    /// A NaN or infinite value was detected.
    NumericalInstability {
        /// Pipeline stage where the value was found
        stage: Stage,
        /// What was inspected
        details: String,
    },

    /// Invalid hyperparameter or configuration value.
    InvalidHyperparameter {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// The backward chain failed; holds the original cause.
    BackpropagationFailed(Box<CnnError>),

    /// I/O error (file not found, permission denied, etc.).
    Io(std::io::Error),

    /// Invalid or corrupt model file.
    FormatError {
        /// Error description
        message: String,
    },

    /// Model file version this build cannot read.
    UnsupportedVersion {
        /// Version found in the header
        found: i32,
        /// Version supported by this build
        supported: i32,
    },

    /// Configuration (de)serialization error.
    Serialization(String),
}

impl fmt::Display for CnnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CnnError::DimensionMismatch { expected, actual } => {
                write!(
                    f,
                    "Tensor dimension mismatch: expected {expected}, got {actual}"
                )
            }
            CnnError::NumericalInstability { stage, details } => {
                write!(f, "Numerical instability in {stage}: {details}")
            }
            CnnError::InvalidHyperparameter {
                param,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "Invalid hyperparameter: {param} = {value}, expected {constraint}"
                )
            }
            CnnError::BackpropagationFailed(cause) => {
                write!(f, "Backpropagation failed: {cause}")
            }
            CnnError::Io(e) => write!(f, "I/O error: {e}"),
            CnnError::FormatError { message } => {
                write!(f, "Invalid model format: {message}")
            }
            CnnError::UnsupportedVersion { found, supported } => {
                write!(
                    f,
                    "Unsupported model version: found {found}, supported {supported}"
                )
            }
            CnnError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
        }
    }
}

impl std::error::Error for CnnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CnnError::Io(e) => Some(e),
            CnnError::BackpropagationFailed(cause) => Some(cause.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CnnError {
    fn from(err: std::io::Error) -> Self {
        CnnError::Io(err)
    }
}

impl From<serde_json::Error> for CnnError {
    fn from(err: serde_json::Error) -> Self {
        CnnError::Serialization(err.to_string())
    }
}

impl CnnError {
    /// Create a dimension mismatch error with descriptive context
    #[must_use]
    pub fn dimension_mismatch(context: &str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            expected: format!("{context}={expected}"),
            actual: format!("{actual}"),
        }
    }

    /// Create a dimension mismatch error for 2D/3D shapes
    #[must_use]
    pub fn shape_mismatch(context: &str, expected: &[usize], actual: &[usize]) -> Self {
        Self::DimensionMismatch {
            expected: format!("{context}={expected:?}"),
            actual: format!("{actual:?}"),
        }
    }

    /// Create a format error
    #[must_use]
    pub fn format(message: impl Into<String>) -> Self {
        Self::FormatError {
            message: message.into(),
        }
    }

    /// Returns true for errors that abort training because of NaN/Inf,
    /// including ones wrapped by the backward chain.
    #[must_use]
    pub fn is_numerical(&self) -> bool {
        match self {
            CnnError::NumericalInstability { .. } => true,
            CnnError::BackpropagationFailed(cause) => cause.is_numerical(),
            _ => false,
        }
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, CnnError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_dimension_mismatch_display() {
        let err = CnnError::dimension_mismatch("dense input", 18, 12);
        let msg = err.to_string();
        assert!(msg.contains("dimension mismatch"));
        assert!(msg.contains("dense input=18"));
        assert!(msg.contains("12"));
    }

    #[test]
    fn test_shape_mismatch_display() {
        let err = CnnError::shape_mismatch("image", &[8, 8], &[4, 4]);
        assert!(err.to_string().contains("[8, 8]"));
        assert!(err.to_string().contains("[4, 4]"));
    }

    #[test]
    fn test_numerical_instability_display() {
        let err = CnnError::NumericalInstability {
            stage: Stage::Softmax,
            details: "NaN in output".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Numerical instability"));
        assert!(msg.contains("softmax"));
        assert!(err.is_numerical());
    }

    #[test]
    fn test_backprop_failed_keeps_cause() {
        let cause = CnnError::dimension_mismatch("flatten gradient", 18, 17);
        let err = CnnError::BackpropagationFailed(Box::new(cause));
        assert!(err.to_string().starts_with("Backpropagation failed"));
        let source = err.source().expect("wrapped cause");
        assert!(source.to_string().contains("flatten gradient=18"));
        assert!(!err.is_numerical());
    }

    #[test]
    fn test_wrapped_numerical_is_numerical() {
        let err = CnnError::BackpropagationFailed(Box::new(CnnError::NumericalInstability {
            stage: Stage::Convolution,
            details: "kernel 0".to_string(),
        }));
        assert!(err.is_numerical());
    }

    #[test]
    fn test_invalid_hyperparameter_display() {
        let err = CnnError::InvalidHyperparameter {
            param: "sparsity".to_string(),
            value: "1.5".to_string(),
            constraint: "in (0, 1)".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("sparsity"));
        assert!(msg.contains("1.5"));
        assert!(msg.contains("(0, 1)"));
    }

    #[test]
    fn test_io_error_source() {
        let err: CnnError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.source().is_some());
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_unsupported_version_display() {
        let err = CnnError::UnsupportedVersion {
            found: 7,
            supported: 1,
        };
        assert!(err.to_string().contains("found 7"));
    }
}
