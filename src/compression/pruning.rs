//! Unstructured magnitude pruning with a percentile threshold.

use crate::error::{CnnError, Result};

/// Outcome of one pruning pass over a group of weight buffers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PruneReport {
    /// Non-zero weights before the pass.
    pub nonzero_before: usize,
    /// Non-zero weights after the pass.
    pub nonzero_after: usize,
    /// Magnitude threshold used; `None` when the pass was skipped.
    pub threshold: Option<f64>,
}

impl PruneReport {
    /// Number of weights zeroed by this pass.
    #[must_use]
    pub fn pruned(&self) -> usize {
        self.nonzero_before - self.nonzero_after
    }

    /// True if the pass was skipped (nothing to prune, or all magnitudes equal).
    #[must_use]
    pub fn skipped(&self) -> bool {
        self.threshold.is_none()
    }

    fn skipped_with(nonzero: usize) -> Self {
        Self {
            nonzero_before: nonzero,
            nonzero_after: nonzero,
            threshold: None,
        }
    }
}

/// Rejects sparsity targets outside the open interval (0, 1).
///
/// # Errors
///
/// Returns [`CnnError::InvalidHyperparameter`] for `0`, `1`, anything
/// outside that range, and NaN.
pub fn validate_sparsity(sparsity: f64) -> Result<()> {
    if sparsity > 0.0 && sparsity < 1.0 {
        Ok(())
    } else {
        Err(CnnError::InvalidHyperparameter {
            param: "sparsity".to_string(),
            value: format!("{sparsity}"),
            constraint: "in the open interval (0, 1)".to_string(),
        })
    }
}

/// Zeroes the smallest-magnitude non-zero weights across all `groups`.
///
/// Magnitudes of every non-zero weight are pooled and sorted; the value at
/// index `floor(sparsity * (n - 1))` becomes the threshold and every
/// non-zero weight strictly below it is set to `0.0`. Weights that are
/// already zero do not take part in the percentile.
///
/// The pass is skipped (report with `threshold == None`) when there are no
/// non-zero weights or when all magnitudes are equal.
///
/// # Errors
///
/// Returns an error if `sparsity` is not in (0, 1).
///
/// # Examples
///
/// ```
/// use cnnkit::compression::prune_by_magnitude;
///
/// let mut w = vec![0.1, -0.2, 0.3, -0.4, 0.5];
/// let report = prune_by_magnitude(&mut [w.as_mut_slice()], 0.5).expect("valid sparsity");
/// assert_eq!(report.pruned(), 2);
/// assert_eq!(w, vec![0.0, 0.0, 0.3, -0.4, 0.5]);
/// ```
pub fn prune_by_magnitude(groups: &mut [&mut [f64]], sparsity: f64) -> Result<PruneReport> {
    validate_sparsity(sparsity)?;

    let mut magnitudes: Vec<f64> = groups
        .iter()
        .flat_map(|g| g.iter())
        .filter(|&&w| w != 0.0)
        .map(|w| w.abs())
        .collect();
    let nonzero_before = magnitudes.len();

    if magnitudes.is_empty() {
        return Ok(PruneReport::skipped_with(0));
    }

    magnitudes.sort_by(f64::total_cmp);
    let (lowest, highest) = (magnitudes[0], magnitudes[nonzero_before - 1]);
    if lowest == highest {
        return Ok(PruneReport::skipped_with(nonzero_before));
    }

    let threshold_index = (sparsity * (nonzero_before - 1) as f64) as usize;
    let threshold = magnitudes[threshold_index];

    let mut nonzero_after = 0;
    for group in groups.iter_mut() {
        for w in group.iter_mut() {
            if *w == 0.0 {
                continue;
            }
            if w.abs() < threshold {
                *w = 0.0;
            } else {
                nonzero_after += 1;
            }
        }
    }

    Ok(PruneReport {
        nonzero_before,
        nonzero_after,
        threshold: Some(threshold),
    })
}
