//! Small deterministic image datasets for tests, benches and demos.

use rand::Rng;

use super::Sample;
use crate::nn::rng_from_seed;
use crate::primitives::Matrix;

/// Two-class "bars" dataset of binary `size × size` images.
///
/// Class 0 holds a one-pixel-wide vertical bar, class 1 a horizontal one,
/// each at a random position away from the border. Returns
/// `n_per_class` samples of class 0 followed by `n_per_class` of class 1.
///
/// # Panics
///
/// Panics if `size < 3`.
///
/// # Example
///
/// ```
/// use cnnkit::data::synthetic::bars;
///
/// let data = bars(8, 8, 42);
/// assert_eq!(data.len(), 16);
/// assert_eq!(data[0].image.shape(), (8, 8));
/// assert_eq!(data[0].image.sum(), 8.0);
/// ```
#[must_use]
pub fn bars(n_per_class: usize, size: usize, seed: u64) -> Vec<Sample> {
    assert!(size >= 3, "bars need at least a 3x3 image");
    let mut rng = rng_from_seed(Some(seed));
    let mut samples = Vec::with_capacity(2 * n_per_class);
    for class in 0..2 {
        for _ in 0..n_per_class {
            let pos = rng.gen_range(1..size - 1);
            let mut image = Matrix::zeros(size, size);
            for i in 0..size {
                if class == 0 {
                    image.set(i, pos, 1.0);
                } else {
                    image.set(pos, i, 1.0);
                }
            }
            let mut target = vec![0.0; 2];
            target[class] = 1.0;
            samples.push(Sample::new(image, target));
        }
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bars_are_deterministic() {
        assert_eq!(bars(3, 6, 9), bars(3, 6, 9));
    }

    #[test]
    fn test_bar_orientation_matches_label() {
        for sample in bars(4, 7, 2) {
            let img = &sample.image;
            let col_hits = (0..7).filter(|&c| img.get(0, c) == 1.0).count();
            if sample.label() == 0 {
                // vertical: exactly one lit pixel in the top row, never at the border
                assert_eq!(col_hits, 1);
                assert_eq!(img.get(0, 0), 0.0);
                assert_eq!(img.get(0, 6), 0.0);
            } else {
                // horizontal: top row is never the bar
                assert_eq!(col_hits, 0);
            }
        }
    }
}
