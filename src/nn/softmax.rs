//! Numerically stable softmax.

use super::{Layer, Stage};
use crate::error::{CnnError, Result};

/// Lower bound on the exponential sum before dividing.
pub const SUM_FLOOR: f64 = 1e-15;

/// Softmax at temperature 1.
///
/// # Example
///
/// ```
/// use cnnkit::nn::softmax;
///
/// let p = softmax(&[1000.0, 1000.0]);
/// assert!((p[0] - 0.5).abs() < 1e-12);
/// ```
#[must_use]
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    softmax_with_temperature(logits, 1.0)
}

/// Softmax of `logits / temperature`, shifted by the max logit.
///
/// The exponential sum is floored at [`SUM_FLOOR`], so the output stays
/// finite even for degenerate input.
#[must_use]
pub fn softmax_with_temperature(logits: &[f64], temperature: f64) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits
        .iter()
        .map(|&z| ((z - max) / temperature).exp())
        .collect();
    let sum = exps.iter().sum::<f64>().max(SUM_FLOOR);
    exps.into_iter().map(|e| e / sum).collect()
}

/// Final pipeline stage mapping scores to class probabilities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoftmaxLayer;

/// Probabilities recorded by [`SoftmaxLayer::forward`].
#[derive(Debug, Clone, PartialEq)]
pub struct SoftmaxCache {
    output: Vec<f64>,
}

impl SoftmaxCache {
    /// The probabilities that were returned.
    #[must_use]
    pub fn output(&self) -> &[f64] {
        &self.output
    }
}

impl SoftmaxLayer {
    /// Creates a softmax stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Layer for SoftmaxLayer {
    type Input = Vec<f64>;
    type Output = Vec<f64>;
    type Cache = SoftmaxCache;

    fn stage(&self) -> Stage {
        Stage::Softmax
    }

    fn forward(&self, logits: &Vec<f64>) -> Result<(Vec<f64>, SoftmaxCache)> {
        let output = softmax(logits);
        Ok((output.clone(), SoftmaxCache { output }))
    }

    /// Jacobian-vector product `s ⊙ (g - (g · s))`.
    fn backward(&mut self, cache: SoftmaxCache, grad: &Vec<f64>) -> Result<Vec<f64>> {
        let s = &cache.output;
        if grad.len() != s.len() {
            return Err(CnnError::dimension_mismatch(
                "softmax gradient",
                s.len(),
                grad.len(),
            ));
        }
        let dot: f64 = grad.iter().zip(s).map(|(g, p)| g * p).sum();
        Ok(s.iter().zip(grad).map(|(p, g)| p * (g - dot)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sums_to_one() {
        let p = softmax(&[1.0, 2.0, 3.0]);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(p[2] > p[1] && p[1] > p[0]);
    }

    #[test]
    fn test_large_logits_stay_finite() {
        let p = softmax(&[1e308, -1e308, 0.0]);
        assert!(p.iter().all(|v| v.is_finite()));
        assert!((p[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_temperature_softens() {
        let sharp = softmax_with_temperature(&[2.0, 0.0], 1.0);
        let soft = softmax_with_temperature(&[2.0, 0.0], 4.0);
        assert!(soft[0] < sharp[0]);
        assert!(soft[0] > 0.5);
    }

    #[test]
    fn test_backward_jacobian() {
        let mut layer = SoftmaxLayer::new();
        let (p, cache) = layer.forward(&vec![0.0, 0.0]).expect("softmax");
        assert_eq!(p, vec![0.5, 0.5]);
        let g = layer.backward(cache, &vec![1.0, 0.0]).expect("2 grads");
        // d p0 / d z0 = 0.25, d p0 / d z1 = -0.25
        assert!((g[0] - 0.25).abs() < 1e-12);
        assert!((g[1] + 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_backward_rejects_length_mismatch() {
        let mut layer = SoftmaxLayer::new();
        let (_, cache) = layer.forward(&vec![0.0, 1.0]).expect("softmax");
        assert!(layer.backward(cache, &vec![1.0]).is_err());
    }
}
