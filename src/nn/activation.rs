//! Scalar activation functions used by the pipeline stages.

/// Floor applied by the convolution activation, `max(CONV_RELU_FLOOR, x)`.
pub const CONV_RELU_FLOOR: f64 = 1e-7;

/// Negative slope of the dense layer's leaky ReLU.
pub const LEAKY_RELU_SLOPE: f64 = 0.01;

/// ReLU floored at a small positive `epsilon` instead of zero.
///
/// NaN passes through unchanged so the network's finiteness checks see it.
#[inline]
#[must_use]
pub fn floor_relu(x: f64, epsilon: f64) -> f64 {
    if x.is_nan() {
        x
    } else {
        x.max(epsilon)
    }
}

/// Leaky ReLU: `x` for positive input, `slope * x` otherwise.
#[inline]
#[must_use]
pub fn leaky_relu(x: f64, slope: f64) -> f64 {
    if x > 0.0 {
        x
    } else {
        slope * x
    }
}

/// Hard ReLU derivative: `1` for positive input, `0` otherwise.
#[inline]
#[must_use]
pub fn relu_step(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_relu() {
        assert_eq!(floor_relu(-3.0, CONV_RELU_FLOOR), CONV_RELU_FLOOR);
        assert_eq!(floor_relu(0.0, CONV_RELU_FLOOR), CONV_RELU_FLOOR);
        assert_eq!(floor_relu(2.5, CONV_RELU_FLOOR), 2.5);
        assert!(floor_relu(f64::NAN, CONV_RELU_FLOOR).is_nan());
    }

    #[test]
    fn test_leaky_relu() {
        assert_eq!(leaky_relu(4.0, LEAKY_RELU_SLOPE), 4.0);
        assert!((leaky_relu(-2.0, LEAKY_RELU_SLOPE) + 0.02).abs() < 1e-15);
        assert_eq!(leaky_relu(0.0, LEAKY_RELU_SLOPE), 0.0);
    }

    #[test]
    fn test_relu_step() {
        assert_eq!(relu_step(1e-12), 1.0);
        assert_eq!(relu_step(0.0), 0.0);
        assert_eq!(relu_step(-1.0), 0.0);
    }
}
