//! Training samples and helpers for turning raw images into them.
//!
//! A sample is one single-channel image plus a one-hot target. Reading image
//! files and assigning labels is left to the caller; the helpers here cover
//! the common last steps (binarizing pixels, reshaping, one-hot encoding).

pub mod synthetic;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{CnnError, Result};
use crate::network::argmax;
use crate::primitives::Matrix;

/// One labelled image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Pixel intensities, `rows × cols`.
    pub image: Matrix<f64>,
    /// One-hot class vector.
    pub target: Vec<f64>,
}

impl Sample {
    /// Creates a sample.
    #[must_use]
    pub fn new(image: Matrix<f64>, target: Vec<f64>) -> Self {
        Self { image, target }
    }

    /// Creates a sample from a class index.
    ///
    /// # Errors
    ///
    /// Returns an error if `class >= num_classes`.
    pub fn labelled(image: Matrix<f64>, class: usize, num_classes: usize) -> Result<Self> {
        Ok(Self::new(image, one_hot(class, num_classes)?))
    }

    /// The class index (argmax of the target).
    #[must_use]
    pub fn label(&self) -> usize {
        argmax(&self.target)
    }
}

/// One-hot vector of length `num_classes` with a `1.0` at `class`.
///
/// # Errors
///
/// Returns an error if `class >= num_classes`.
///
/// # Examples
///
/// ```
/// use cnnkit::data::one_hot;
///
/// assert_eq!(one_hot(2, 4).expect("in range"), vec![0.0, 0.0, 1.0, 0.0]);
/// assert!(one_hot(4, 4).is_err());
/// ```
pub fn one_hot(class: usize, num_classes: usize) -> Result<Vec<f64>> {
    if class >= num_classes {
        return Err(CnnError::InvalidHyperparameter {
            param: "class".to_string(),
            value: class.to_string(),
            constraint: format!("< {num_classes}"),
        });
    }
    let mut v = vec![0.0; num_classes];
    v[class] = 1.0;
    Ok(v)
}

/// Maps packed ARGB pixels to `0.0` for white and `1.0` for anything else.
///
/// Only the RGB channels are compared; alpha is ignored.
#[must_use]
pub fn binarize_pixels(argb: &[u32]) -> Vec<f64> {
    argb.iter()
        .map(|&p| if p & 0x00FF_FFFF == 0x00FF_FFFF { 0.0 } else { 1.0 })
        .collect()
}

/// Reshapes a flat, row-major pixel buffer into a square image.
///
/// # Errors
///
/// Returns an error if the length is not a perfect square.
pub fn image_from_flat(pixels: Vec<f64>) -> Result<Matrix<f64>> {
    let side = (pixels.len() as f64).sqrt().round() as usize;
    if side * side != pixels.len() {
        return Err(CnnError::format(format!(
            "{} pixels do not form a square image",
            pixels.len()
        )));
    }
    Matrix::from_vec(side, side, pixels)
}

/// Shuffles samples in place.
pub fn shuffle<R: Rng + ?Sized>(samples: &mut [Sample], rng: &mut R) {
    samples.shuffle(rng);
}

/// Number of samples per class, indexed by class.
#[must_use]
pub fn class_counts(samples: &[Sample], num_classes: usize) -> Vec<usize> {
    let mut counts = vec![0; num_classes];
    for sample in samples {
        if let Some(c) = counts.get_mut(sample.label()) {
            *c += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::rng_from_seed;

    #[test]
    fn test_binarize_pixels() {
        let pixels = [0xFFFF_FFFF, 0xFF00_0000, 0x00FF_FFFF, 0xFF12_3456];
        assert_eq!(binarize_pixels(&pixels), vec![0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_image_from_flat() {
        let img = image_from_flat(vec![1.0, 2.0, 3.0, 4.0]).expect("2x2");
        assert_eq!(img.shape(), (2, 2));
        assert_eq!(img.get(1, 0), 3.0);
        assert!(image_from_flat(vec![0.0; 5]).is_err());
    }

    #[test]
    fn test_sample_label_and_counts() {
        let samples = vec![
            Sample::labelled(Matrix::zeros(2, 2), 1, 3).expect("in range"),
            Sample::labelled(Matrix::zeros(2, 2), 1, 3).expect("in range"),
            Sample::labelled(Matrix::zeros(2, 2), 0, 3).expect("in range"),
        ];
        assert_eq!(samples[0].label(), 1);
        assert_eq!(class_counts(&samples, 3), vec![1, 2, 0]);
    }

    #[test]
    fn test_shuffle_keeps_samples() {
        let mut samples = synthetic::bars(5, 6, 0);
        let before = class_counts(&samples, 2);
        shuffle(&mut samples, &mut rng_from_seed(Some(1)));
        assert_eq!(class_counts(&samples, 2), before);
        assert_eq!(samples.len(), 10);
    }
}
