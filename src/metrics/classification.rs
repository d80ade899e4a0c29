//! Classification report for a [`ConvNet`] on a labelled set.

use std::fmt;

use serde::Serialize;

use crate::data::Sample;
use crate::error::{CnnError, Result};
use crate::network::{argmax, ConvNet};
use crate::primitives::Matrix;

/// Compute confusion matrix.
///
/// Element `[i, j]` counts samples with true label `i` predicted as `j`.
///
/// # Errors
///
/// Returns an error if the slices differ in length or a label is not
/// below `n_classes`.
///
/// # Examples
///
/// ```
/// use cnnkit::metrics::confusion_matrix;
///
/// let y_true = vec![0, 0, 1, 1, 2, 2];
/// let y_pred = vec![0, 1, 1, 1, 2, 0];
/// let cm = confusion_matrix(&y_pred, &y_true, 3).expect("labels in range");
/// assert_eq!(cm.get(0, 1), 1);
/// assert_eq!(cm.get(1, 1), 2);
/// ```
pub fn confusion_matrix(
    y_pred: &[usize],
    y_true: &[usize],
    n_classes: usize,
) -> Result<Matrix<usize>> {
    if y_pred.len() != y_true.len() {
        return Err(CnnError::dimension_mismatch(
            "predicted labels",
            y_true.len(),
            y_pred.len(),
        ));
    }
    let mut data = vec![0usize; n_classes * n_classes];
    for (&actual, &predicted) in y_true.iter().zip(y_pred) {
        if actual >= n_classes || predicted >= n_classes {
            return Err(CnnError::InvalidHyperparameter {
                param: "label".to_string(),
                value: actual.max(predicted).to_string(),
                constraint: format!("< {n_classes}"),
            });
        }
        data[actual * n_classes + predicted] += 1;
    }
    Matrix::from_vec(n_classes, n_classes, data)
}

/// Per-class results.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassStats {
    /// Samples of this class predicted correctly.
    pub correct: usize,
    /// Samples of this class.
    pub total: usize,
    /// Mean probability the network gave to this class on its own samples.
    pub mean_true_probability: f64,
}

impl ClassStats {
    /// `correct / total`, or `0.0` for an absent class.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

/// Accuracy breakdown of a network over a labelled set.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    confusion: Matrix<usize>,
    classes: Vec<ClassStats>,
    samples: usize,
}

impl ClassificationReport {
    /// Runs `net` over `samples` and tallies the results.
    ///
    /// # Errors
    ///
    /// Returns an error if an image or target doesn't match the network.
    pub fn compute(net: &ConvNet, samples: &[Sample]) -> Result<Self> {
        let n_classes = net.config().fc_output_size;
        let mut y_true = Vec::with_capacity(samples.len());
        let mut y_pred = Vec::with_capacity(samples.len());
        let mut prob_sums = vec![0.0; n_classes];

        for sample in samples {
            if sample.target.len() != n_classes {
                return Err(CnnError::dimension_mismatch(
                    "target",
                    n_classes,
                    sample.target.len(),
                ));
            }
            let probs = net.forward(&sample.image)?;
            let actual = argmax(&sample.target);
            prob_sums[actual] += probs[actual];
            y_true.push(actual);
            y_pred.push(argmax(&probs));
        }

        let confusion = confusion_matrix(&y_pred, &y_true, n_classes)?;
        let classes = (0..n_classes)
            .map(|c| {
                let total: usize = confusion.row(c).iter().sum();
                ClassStats {
                    correct: confusion.get(c, c),
                    total,
                    mean_true_probability: if total == 0 {
                        0.0
                    } else {
                        prob_sums[c] / total as f64
                    },
                }
            })
            .collect();

        Ok(Self {
            confusion,
            classes,
            samples: samples.len(),
        })
    }

    /// Confusion matrix, rows actual, columns predicted.
    #[must_use]
    pub fn confusion(&self) -> &Matrix<usize> {
        &self.confusion
    }

    /// Per-class results, indexed by class.
    #[must_use]
    pub fn classes(&self) -> &[ClassStats] {
        &self.classes
    }

    /// Fraction of all samples classified correctly.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.samples == 0 {
            return 0.0;
        }
        let correct: usize = self.classes.iter().map(|c| c.correct).sum();
        correct as f64 / self.samples as f64
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>5}  {:>7}  {:>5}  {:>8}  {:>7}",
            "class", "correct", "total", "accuracy", "p(true)"
        )?;
        for (c, stats) in self.classes.iter().enumerate() {
            writeln!(
                f,
                "{c:>5}  {:>7}  {:>5}  {:>7.2}%  {:>7.4}",
                stats.correct,
                stats.total,
                stats.accuracy() * 100.0,
                stats.mean_true_probability
            )?;
        }
        writeln!(f, "overall accuracy: {:.2}%", self.accuracy() * 100.0)?;
        writeln!(f, "confusion (rows actual, columns predicted):")?;
        for r in 0..self.confusion.n_rows() {
            let row: Vec<String> = self
                .confusion
                .row(r)
                .iter()
                .map(|n| format!("{n:>5}"))
                .collect();
            writeln!(f, "{r:>5} {}", row.join(""))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic;
    use crate::network::NetworkConfig;

    #[test]
    fn test_confusion_matrix_rejects_out_of_range() {
        assert!(confusion_matrix(&[0, 3], &[0, 1], 3).is_err());
        assert!(confusion_matrix(&[0], &[0, 1], 3).is_err());
    }

    #[test]
    fn test_report_counts_every_sample() {
        let net = ConvNet::new(NetworkConfig::new(8, 8, 3, 2, 2).with_seed(3)).expect("valid");
        let samples = synthetic::bars(5, 8, 3);
        let report = ClassificationReport::compute(&net, &samples).expect("shapes match");

        let total: usize = report.classes().iter().map(|c| c.total).sum();
        assert_eq!(total, 10);
        assert_eq!(report.classes()[0].total, 5);
        let cm_total: usize = report.confusion().as_slice().iter().sum();
        assert_eq!(cm_total, 10);

        let accuracy = net.evaluate(&samples).expect("shapes match");
        assert!((report.accuracy() - accuracy).abs() < 1e-12);
        for c in report.classes() {
            assert!((0.0..=1.0).contains(&c.mean_true_probability));
        }
        let text = report.to_string();
        assert!(text.contains("overall accuracy"));
    }

    #[test]
    fn test_report_rejects_wrong_target_length() {
        let net = ConvNet::new(NetworkConfig::new(8, 8, 3, 2, 3).with_seed(3)).expect("valid");
        let samples = synthetic::bars(1, 8, 3);
        assert!(ClassificationReport::compute(&net, &samples).is_err());
    }

    #[test]
    fn test_empty_report() {
        let net = ConvNet::new(NetworkConfig::new(8, 8, 3, 2, 2).with_seed(3)).expect("valid");
        let report = ClassificationReport::compute(&net, &[]).expect("empty is fine");
        assert_eq!(report.accuracy(), 0.0);
        assert_eq!(report.classes()[1].accuracy(), 0.0);
    }
}
