//! Min-max affine 8-bit quantization.
//!
//! `r = min + q * scale`, `scale = (max - min) / 255`, `q ∈ [0, 255]`.
//! Only non-zero weights take part: zeros mark pruned connections and must
//! stay exactly zero.

use serde::{Deserialize, Serialize};

/// Number of quantization steps between `min` and `max` (256 levels).
pub const QUANT_LEVELS: f64 = 255.0;

/// Affine mapping between real weights and 8-bit codes.
///
/// # Examples
///
/// ```
/// use cnnkit::compression::AffineQuantizer;
///
/// let q = AffineQuantizer::fit(&[-1.0, 0.0, 0.5, 1.0]).expect("non-degenerate range");
/// assert_eq!(q.quantize(-1.0), 0);
/// assert_eq!(q.quantize(1.0), 255);
/// assert!((q.dequantize(q.quantize(0.5)) - 0.5).abs() <= q.scale() / 2.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineQuantizer {
    min: f64,
    max: f64,
    scale: f64,
}

impl AffineQuantizer {
    /// Fits the range of the non-zero entries of `values`.
    ///
    /// Returns `None` when there are no non-zero entries or when they are all
    /// equal (zero-width range).
    #[must_use]
    pub fn fit(values: &[f64]) -> Option<Self> {
        let (min, max) = values
            .iter()
            .filter(|&&v| v != 0.0)
            .fold(None, |acc: Option<(f64, f64)>, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })?;
        let scale = (max - min) / QUANT_LEVELS;
        if scale <= 0.0 || !scale.is_finite() {
            return None;
        }
        Some(Self { min, max, scale })
    }

    /// Lower end of the fitted range.
    #[must_use]
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Upper end of the fitted range.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Step size between adjacent levels.
    #[must_use]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Maps a real value to its nearest 8-bit code (clamped to the range).
    #[must_use]
    pub fn quantize(&self, value: f64) -> u8 {
        ((value - self.min) / self.scale)
            .round()
            .clamp(0.0, QUANT_LEVELS) as u8
    }

    /// Maps an 8-bit code back to a real value.
    #[must_use]
    pub fn dequantize(&self, code: u8) -> f64 {
        self.min + f64::from(code) * self.scale
    }

    /// Snaps a value to its nearest representable level.
    #[must_use]
    pub fn snap(&self, value: f64) -> f64 {
        self.dequantize(self.quantize(value))
    }

    /// Like [`snap`](Self::snap), but never returns `0.0` for a non-zero
    /// value.
    ///
    /// When the nearest level is exactly zero the value moves to the
    /// adjacent level on its own side of zero, so the error can reach one
    /// full step instead of half.
    #[must_use]
    pub fn snap_nonzero(&self, value: f64) -> f64 {
        let code = self.quantize(value);
        let level = self.dequantize(code);
        if level != 0.0 || value == 0.0 {
            return level;
        }
        let neighbour = if value > 0.0 {
            code.saturating_add(1)
        } else {
            code.saturating_sub(1)
        };
        self.dequantize(neighbour)
    }
}

/// Outcome of quantizing one weight group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantizationReport {
    /// Fitted mapping.
    pub quantizer: AffineQuantizer,
    /// Number of non-zero weights that were snapped.
    pub quantized: usize,
}

/// Replaces every non-zero entry of `values` with its nearest 8-bit level.
///
/// A live weight is never snapped to `0.0`: that would mark it as pruned
/// and freeze it. See [`AffineQuantizer::snap_nonzero`].
///
/// Returns `None` (and leaves `values` untouched) when the group has no
/// non-zero entries or a zero-width range.
pub fn quantize_in_place(values: &mut [f64]) -> Option<QuantizationReport> {
    let quantizer = AffineQuantizer::fit(values)?;
    let mut quantized = 0;
    for v in values.iter_mut().filter(|v| **v != 0.0) {
        *v = quantizer.snap_nonzero(*v);
        quantized += 1;
    }
    Some(QuantizationReport {
        quantizer,
        quantized,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_ignores_zeros() {
        let q = AffineQuantizer::fit(&[0.0, 0.2, 0.0, 0.8]).expect("range");
        assert_eq!(q.min(), 0.2);
        assert_eq!(q.max(), 0.8);
        assert!((q.scale() - 0.6 / 255.0).abs() < 1e-15);
    }

    #[test]
    fn test_fit_degenerate() {
        assert!(AffineQuantizer::fit(&[]).is_none());
        assert!(AffineQuantizer::fit(&[0.0, 0.0]).is_none());
        assert!(AffineQuantizer::fit(&[0.3, 0.3, 0.0]).is_none());
    }

    #[test]
    fn test_quantize_clamps_out_of_range() {
        let q = AffineQuantizer::fit(&[-1.0, 1.0]).expect("range");
        assert_eq!(q.quantize(-5.0), 0);
        assert_eq!(q.quantize(5.0), 255);
    }

    #[test]
    fn test_quantize_in_place_error_bound() {
        let mut w: Vec<f64> = (1..=100).map(|i| (f64::from(i) * 0.37).sin()).collect();
        let original = w.clone();
        let report = quantize_in_place(&mut w).expect("non-degenerate");
        let half_step = report.quantizer.scale() / 2.0;
        for (a, b) in original.iter().zip(w.iter()) {
            assert!((a - b).abs() <= half_step + 1e-12, "{a} -> {b}");
        }
        assert_eq!(report.quantized, 100);
    }

    #[test]
    fn test_quantize_in_place_keeps_zeros() {
        let mut w = vec![0.0, -0.4, 0.0, 0.9, 0.1];
        let report = quantize_in_place(&mut w).expect("range");
        assert_eq!(w[0], 0.0);
        assert_eq!(w[2], 0.0);
        assert_eq!(report.quantized, 3);
        // endpoints are exact levels
        assert_eq!(w[1], -0.4);
        assert!((w[3] - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_live_weight_never_snaps_to_zero() {
        // scale is 1.0 and level 1 is exactly 0.0
        let mut w = vec![-1.0, 254.0, 0.2, -0.3];
        let report = quantize_in_place(&mut w).expect("range");
        assert_eq!(report.quantized, 4);
        assert!(w.iter().all(|&v| v != 0.0));
        assert_eq!(w[2], 1.0);
        assert_eq!(w[3], -1.0);
    }

    #[test]
    fn test_snap_nonzero_matches_snap_away_from_zero() {
        let q = AffineQuantizer::fit(&[-1.0, 254.0]).expect("range");
        assert_eq!(q.snap(0.2), 0.0);
        assert_eq!(q.snap_nonzero(0.2), 1.0);
        assert_eq!(q.snap_nonzero(3.4), q.snap(3.4));
        assert_eq!(q.snap_nonzero(0.0), 0.0);
    }

    #[test]
    fn test_quantize_is_idempotent() {
        let mut w = vec![0.11, -0.37, 0.52, 0.05];
        quantize_in_place(&mut w).expect("range");
        let once = w.clone();
        quantize_in_place(&mut w).expect("range");
        for (a, b) in once.iter().zip(w.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }
}
