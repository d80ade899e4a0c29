//! Core compute primitives (Matrix, Volume).
//!
//! These types hold every image, kernel, feature map and weight matrix in
//! the pipeline. They are deliberately plain: row-major `f64` buffers with
//! shape bookkeeping and no hidden allocation tricks.

mod matrix;
mod volume;

pub use matrix::Matrix;
pub use volume::Volume;
