//! Volume to vector reshape.

use super::{Layer, Stage};
use crate::error::{CnnError, Result};
use crate::primitives::Volume;

/// Linearizes a [`Volume`] depth-major, then row-major, then by column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlattenLayer;

/// Dimensions recorded by [`FlattenLayer::forward`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlattenCache {
    shape: (usize, usize, usize),
}

impl FlattenCache {
    /// The (depth, rows, cols) of the flattened volume.
    #[must_use]
    pub fn shape(&self) -> (usize, usize, usize) {
        self.shape
    }
}

impl FlattenLayer {
    /// Creates a flatten stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Layer for FlattenLayer {
    type Input = Volume;
    type Output = Vec<f64>;
    type Cache = FlattenCache;

    fn stage(&self) -> Stage {
        Stage::Flatten
    }

    fn forward(&self, input: &Volume) -> Result<(Vec<f64>, FlattenCache)> {
        Ok((
            input.as_slice().to_vec(),
            FlattenCache {
                shape: input.shape(),
            },
        ))
    }

    fn backward(&mut self, cache: FlattenCache, grad: &Vec<f64>) -> Result<Volume> {
        let (depth, rows, cols) = cache.shape;
        if grad.len() != depth * rows * cols {
            return Err(CnnError::dimension_mismatch(
                "flattened gradient",
                depth * rows * cols,
                grad.len(),
            ));
        }
        Volume::from_vec(depth, rows, cols, grad.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_order_is_depth_row_col() {
        let mut v = Volume::zeros(2, 2, 3);
        v.set(1, 0, 2, 7.0);
        v.set(0, 1, 0, 3.0);
        let (flat, cache) = FlattenLayer.forward(&v).expect("flatten");
        assert_eq!(flat.len(), 12);
        assert_eq!(flat[3], 3.0);
        assert_eq!(flat[6 + 2], 7.0);
        assert_eq!(cache.shape(), (2, 2, 3));
    }

    #[test]
    fn test_backward_restores_volume() {
        let data: Vec<f64> = (0..12).map(f64::from).collect();
        let v = Volume::from_vec(3, 2, 2, data.clone()).expect("3x2x2");
        let mut layer = FlattenLayer::new();
        let (_, cache) = layer.forward(&v).expect("flatten");
        let back = layer.backward(cache, &data).expect("same length");
        assert_eq!(back, v);
    }

    #[test]
    fn test_backward_rejects_length_mismatch() {
        let mut layer = FlattenLayer::new();
        let (_, cache) = layer.forward(&Volume::zeros(1, 2, 2)).expect("flatten");
        let result = layer.backward(cache, &vec![0.0; 5]);
        assert!(matches!(result, Err(CnnError::DimensionMismatch { .. })));
    }
}
