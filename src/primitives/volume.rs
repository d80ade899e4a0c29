//! Depth-stacked feature maps.

use serde::{Deserialize, Serialize};

use super::Matrix;
use crate::error::{CnnError, Result};

/// A 3D tensor of `depth` slices, each `rows × cols`.
///
/// Storage is depth-major, then row-major, then column: the same order the
/// flatten stage uses, so flattening is a plain copy of the buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    data: Vec<f64>,
    depth: usize,
    rows: usize,
    cols: usize,
}

impl Volume {
    /// Creates a zero-filled volume.
    #[must_use]
    pub fn zeros(depth: usize, rows: usize, cols: usize) -> Self {
        Self {
            data: vec![0.0; depth * rows * cols],
            depth,
            rows,
            cols,
        }
    }

    /// Creates a volume from depth-major data.
    ///
    /// # Errors
    ///
    /// Returns an error if `data.len() != depth * rows * cols`.
    pub fn from_vec(depth: usize, rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != depth * rows * cols {
            return Err(CnnError::dimension_mismatch(
                "volume data (depth * rows * cols)",
                depth * rows * cols,
                data.len(),
            ));
        }
        Ok(Self {
            data,
            depth,
            rows,
            cols,
        })
    }

    /// Stacks equally-shaped matrices along the depth axis.
    ///
    /// # Errors
    ///
    /// Returns an error if the slices have different shapes.
    pub fn from_slices(slices: &[Matrix<f64>]) -> Result<Self> {
        let (rows, cols) = slices.first().map_or((0, 0), Matrix::shape);
        let mut data = Vec::with_capacity(slices.len() * rows * cols);
        for slice in slices {
            if slice.shape() != (rows, cols) {
                let (r, c) = slice.shape();
                return Err(CnnError::shape_mismatch("volume slice", &[rows, cols], &[r, c]));
            }
            data.extend_from_slice(slice.as_slice());
        }
        Ok(Self {
            data,
            depth: slices.len(),
            rows,
            cols,
        })
    }

    /// Returns the shape as (depth, rows, cols).
    #[must_use]
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.depth, self.rows, self.cols)
    }

    /// Number of depth slices.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Total number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the volume has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn offset(&self, d: usize, row: usize, col: usize) -> usize {
        (d * self.rows + row) * self.cols + col
    }

    /// Gets element at (depth, row, col).
    ///
    /// # Panics
    ///
    /// Panics if indices are out of bounds.
    #[must_use]
    pub fn get(&self, d: usize, row: usize, col: usize) -> f64 {
        self.data[self.offset(d, row, col)]
    }

    /// Sets element at (depth, row, col).
    ///
    /// # Panics
    ///
    /// Panics if indices are out of bounds.
    pub fn set(&mut self, d: usize, row: usize, col: usize, value: f64) {
        let idx = self.offset(d, row, col);
        self.data[idx] = value;
    }

    /// Borrows one depth slice as a row-major slice.
    #[must_use]
    pub fn slice_data(&self, d: usize) -> &[f64] {
        let plane = self.rows * self.cols;
        &self.data[d * plane..(d + 1) * plane]
    }

    /// Returns the underlying data as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Returns true if every element is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slices_layout() {
        let a = Matrix::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]).expect("2x2");
        let b = Matrix::from_vec(2, 2, vec![5.0, 6.0, 7.0, 8.0]).expect("2x2");
        let v = Volume::from_slices(&[a.clone(), b]).expect("same shapes");
        assert_eq!(v.shape(), (2, 2, 2));
        assert_eq!(v.get(1, 0, 1), 6.0);
        assert_eq!(v.slice_data(0), a.as_slice());
        assert_eq!(v.as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_from_slices_rejects_mixed_shapes() {
        let a = Matrix::zeros(2, 2);
        let b = Matrix::zeros(3, 2);
        assert!(Volume::from_slices(&[a, b]).is_err());
    }

    #[test]
    fn test_set_and_slice_data() {
        let mut v = Volume::zeros(2, 3, 3);
        v.set(1, 2, 0, 4.5);
        assert_eq!(v.slice_data(1)[6], 4.5);
        assert!(v.slice_data(0).iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_from_vec_length_check() {
        assert!(Volume::from_vec(2, 2, 2, vec![0.0; 7]).is_err());
        assert!(Volume::from_vec(2, 2, 2, vec![0.0; 8]).is_ok());
    }
}
