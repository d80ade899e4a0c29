//! Weight initialization.
//!
//! Both schemes draw from a symmetric uniform distribution `U(-a, a)`:
//!
//! - Kernels (He-style, fan-in only): `a = sqrt(2 / k²)` for a `k × k` kernel.
//! - Dense weights (Glorot-style): `a = sqrt(2 / (fan_in + fan_out))`.
//!
//! All randomness flows through one caller-owned RNG so a seeded network
//! is fully reproducible.
//!
//! # References
//!
//! - Glorot, X., & Bengio, Y. (2010). Understanding the difficulty of training
//!   deep feedforward neural networks. AISTATS.
//! - He, K., et al. (2015). Delving deep into rectifiers. ICCV.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::primitives::Matrix;

/// Builds the RNG used for initialization: seeded when `seed` is given,
/// from OS entropy otherwise.
#[must_use]
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

/// Initializes one square convolution kernel.
///
/// # Example
///
/// ```
/// use cnnkit::nn::{kernel_init, rng_from_seed};
///
/// let mut rng = rng_from_seed(Some(7));
/// let k = kernel_init(3, &mut rng);
/// let bound = (2.0_f64 / 9.0).sqrt();
/// assert!(k.as_slice().iter().all(|w| w.abs() <= bound));
/// ```
pub fn kernel_init<R: Rng + ?Sized>(size: usize, rng: &mut R) -> Matrix<f64> {
    let bound = (2.0 / (size * size) as f64).sqrt();
    uniform(size, size, bound, rng)
}

/// Initializes a `fan_out × fan_in` dense weight matrix.
pub fn dense_init<R: Rng + ?Sized>(fan_in: usize, fan_out: usize, rng: &mut R) -> Matrix<f64> {
    let bound = (2.0 / (fan_in + fan_out) as f64).sqrt();
    uniform(fan_out, fan_in, bound, rng)
}

fn uniform<R: Rng + ?Sized>(rows: usize, cols: usize, bound: f64, rng: &mut R) -> Matrix<f64> {
    let mut m = Matrix::zeros(rows, cols);
    for w in m.as_mut_slice() {
        *w = rng.gen_range(-bound..bound);
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_init_is_reproducible() {
        let a = kernel_init(5, &mut rng_from_seed(Some(42)));
        let b = kernel_init(5, &mut rng_from_seed(Some(42)));
        assert_eq!(a, b);
    }

    #[test]
    fn test_dense_init_shape_and_bounds() {
        let mut rng = rng_from_seed(Some(1));
        let w = dense_init(18, 2, &mut rng);
        assert_eq!(w.shape(), (2, 18));
        let bound = (2.0_f64 / 20.0).sqrt();
        assert!(w.as_slice().iter().all(|x| x.abs() < bound));
    }

    #[test]
    fn test_init_is_not_constant() {
        let w = dense_init(10, 10, &mut rng_from_seed(Some(3)));
        let first = w.as_slice()[0];
        assert!(w.as_slice().iter().any(|&x| x != first));
    }
}
