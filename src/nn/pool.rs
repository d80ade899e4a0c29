//! Max pooling with argmax routing.

use super::{Layer, Stage};
use crate::error::{CnnError, Result};
use crate::primitives::Volume;

/// Max pooling over `filter_size × filter_size` windows, applied to each
/// depth slice independently.
///
/// # Example
///
/// ```
/// use cnnkit::nn::{Layer, PoolingLayer};
/// use cnnkit::primitives::Volume;
///
/// let pool = PoolingLayer::default();
/// let input = Volume::from_vec(1, 2, 2, vec![1.0, 4.0, 3.0, 2.0]).expect("1x2x2");
/// let (out, _) = pool.forward(&input).expect("fits");
/// assert_eq!(out.as_slice(), &[4.0]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolingLayer {
    filter_size: usize,
    stride: usize,
}

/// Argmax coordinates recorded by [`PoolingLayer::forward`].
#[derive(Debug, Clone, PartialEq)]
pub struct PoolCache {
    input_shape: (usize, usize, usize),
    output_shape: (usize, usize, usize),
    argmax: Vec<(usize, usize)>,
}

impl PoolCache {
    /// Shape of the pooled input as (depth, rows, cols).
    #[must_use]
    pub fn input_shape(&self) -> (usize, usize, usize) {
        self.input_shape
    }

    /// Input `(row, col)` that won each output cell, depth-major.
    #[must_use]
    pub fn argmax(&self) -> &[(usize, usize)] {
        &self.argmax
    }
}

impl Default for PoolingLayer {
    fn default() -> Self {
        Self {
            filter_size: 2,
            stride: 2,
        }
    }
}

impl PoolingLayer {
    /// Creates a pooling layer.
    ///
    /// # Errors
    ///
    /// Returns an error if `filter_size` or `stride` is zero.
    pub fn new(filter_size: usize, stride: usize) -> Result<Self> {
        for (param, value) in [("pool_size", filter_size), ("pool_stride", stride)] {
            if value == 0 {
                return Err(CnnError::InvalidHyperparameter {
                    param: param.to_string(),
                    value: "0".to_string(),
                    constraint: ">= 1".to_string(),
                });
            }
        }
        Ok(Self {
            filter_size,
            stride,
        })
    }

    /// Window side length.
    #[must_use]
    pub fn filter_size(&self) -> usize {
        self.filter_size
    }

    /// Step between windows.
    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Pooled size of a `rows × cols` map.
    ///
    /// # Errors
    ///
    /// Returns an error if the window doesn't fit.
    pub fn output_shape(&self, rows: usize, cols: usize) -> Result<(usize, usize)> {
        if rows < self.filter_size || cols < self.filter_size {
            return Err(CnnError::shape_mismatch(
                "pooling input (at least filter size)",
                &[self.filter_size, self.filter_size],
                &[rows, cols],
            ));
        }
        Ok((
            (rows - self.filter_size) / self.stride + 1,
            (cols - self.filter_size) / self.stride + 1,
        ))
    }
}

impl Layer for PoolingLayer {
    type Input = Volume;
    type Output = Volume;
    type Cache = PoolCache;

    fn stage(&self) -> Stage {
        Stage::Pooling
    }

    fn forward(&self, input: &Volume) -> Result<(Volume, PoolCache)> {
        let (depth, rows, cols) = input.shape();
        let (out_rows, out_cols) = self.output_shape(rows, cols)?;
        let mut output = Volume::zeros(depth, out_rows, out_cols);
        let mut argmax = Vec::with_capacity(depth * out_rows * out_cols);

        for d in 0..depth {
            for x in 0..out_rows {
                for y in 0..out_cols {
                    let (r0, c0) = (x * self.stride, y * self.stride);
                    let mut best = (r0, c0);
                    let mut max = input.get(d, r0, c0);
                    for i in 0..self.filter_size {
                        for j in 0..self.filter_size {
                            let v = input.get(d, r0 + i, c0 + j);
                            // strict: the first maximum seen wins ties
                            if v > max {
                                max = v;
                                best = (r0 + i, c0 + j);
                            }
                        }
                    }
                    output.set(d, x, y, max);
                    argmax.push(best);
                }
            }
        }

        let cache = PoolCache {
            input_shape: (depth, rows, cols),
            output_shape: output.shape(),
            argmax,
        };
        Ok((output, cache))
    }

    fn backward(&mut self, cache: PoolCache, grad: &Volume) -> Result<Volume> {
        if grad.shape() != cache.output_shape {
            let (d, r, c) = cache.output_shape;
            let (gd, gr, gc) = grad.shape();
            return Err(CnnError::shape_mismatch(
                "pooling gradient",
                &[d, r, c],
                &[gd, gr, gc],
            ));
        }
        let (depth, rows, cols) = cache.input_shape;
        let (_, out_rows, out_cols) = cache.output_shape;
        let mut input_grad = Volume::zeros(depth, rows, cols);

        let mut winners = cache.argmax.iter();
        for d in 0..depth {
            for x in 0..out_rows {
                for y in 0..out_cols {
                    if let Some(&(r, c)) = winners.next() {
                        input_grad.set(d, r, c, grad.get(d, x, y));
                    }
                }
            }
        }
        Ok(input_grad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Volume {
        Volume::from_vec(
            1,
            4,
            4,
            vec![
                1.0, 5.0, 2.0, 0.0, //
                3.0, 2.0, 8.0, 1.0, //
                0.0, 9.0, 4.0, 4.0, //
                6.0, 1.0, 3.0, 7.0,
            ],
        )
        .expect("1x4x4")
    }

    #[test]
    fn test_forward_2x2_stride_2() {
        let pool = PoolingLayer::default();
        let (out, cache) = pool.forward(&grid()).expect("fits");
        assert_eq!(out.shape(), (1, 2, 2));
        assert_eq!(out.as_slice(), &[5.0, 8.0, 9.0, 7.0]);
        assert_eq!(cache.argmax(), &[(0, 1), (1, 2), (2, 1), (3, 3)]);
    }

    #[test]
    fn test_backward_routes_to_argmax() {
        let mut pool = PoolingLayer::default();
        let (_, cache) = pool.forward(&grid()).expect("fits");
        let grad = Volume::from_vec(1, 2, 2, vec![1.0, 2.0, 3.0, 4.0]).expect("1x2x2");
        let input_grad = pool.backward(cache, &grad).expect("matching shapes");

        assert_eq!(input_grad.shape(), (1, 4, 4));
        assert_eq!(input_grad.get(0, 0, 1), 1.0);
        assert_eq!(input_grad.get(0, 1, 2), 2.0);
        assert_eq!(input_grad.get(0, 2, 1), 3.0);
        assert_eq!(input_grad.get(0, 3, 3), 4.0);
        let total: f64 = input_grad.as_slice().iter().sum();
        assert_eq!(total, 10.0);
    }

    #[test]
    fn test_ties_go_to_first_seen() {
        let pool = PoolingLayer::default();
        let input = Volume::from_vec(1, 2, 2, vec![3.0; 4]).expect("1x2x2");
        let (_, cache) = pool.forward(&input).expect("fits");
        assert_eq!(cache.argmax(), &[(0, 0)]);
    }

    #[test]
    fn test_each_depth_slice_pooled_independently() {
        let pool = PoolingLayer::default();
        let input =
            Volume::from_vec(2, 2, 2, vec![1.0, 2.0, 3.0, 4.0, -1.0, -2.0, -3.0, -4.0])
                .expect("2x2x2");
        let (out, _) = pool.forward(&input).expect("fits");
        assert_eq!(out.as_slice(), &[4.0, -1.0]);
    }

    #[test]
    fn test_backward_rejects_wrong_gradient_shape() {
        let mut pool = PoolingLayer::default();
        let (_, cache) = pool.forward(&grid()).expect("fits");
        let result = pool.backward(cache, &Volume::zeros(1, 3, 3));
        assert!(matches!(result, Err(CnnError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_new_rejects_zero() {
        assert!(PoolingLayer::new(0, 2).is_err());
        assert!(PoolingLayer::new(2, 0).is_err());
        assert_eq!(PoolingLayer::new(3, 1).expect("valid").filter_size(), 3);
    }
}
