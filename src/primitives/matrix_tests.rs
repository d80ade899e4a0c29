pub(crate) use super::*;

#[test]
fn test_from_vec() {
    let m = Matrix::<f64>::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
        .expect("test data has correct dimensions: 2*3=6 elements");
    assert_eq!(m.shape(), (2, 3));
    assert!((m.get(0, 0) - 1.0).abs() < 1e-12);
    assert!((m.get(1, 2) - 6.0).abs() < 1e-12);
}

#[test]
fn test_from_vec_error() {
    let result = Matrix::<f64>::from_vec(2, 3, vec![1.0, 2.0, 3.0]);
    assert!(matches!(result, Err(CnnError::DimensionMismatch { .. })));
}

#[test]
fn test_from_rows() {
    let m = Matrix::<f64>::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).expect("square rows");
    assert_eq!(m.shape(), (2, 2));
    assert_eq!(m.row(1), &[3.0, 4.0]);
}

#[test]
fn test_from_rows_ragged() {
    let result = Matrix::<f64>::from_rows(&[vec![1.0, 2.0], vec![3.0]]);
    assert!(result.is_err());
}

#[test]
fn test_zeros_and_ones() {
    let z = Matrix::zeros(2, 3);
    assert!(z.as_slice().iter().all(|&x| x == 0.0));
    let o = Matrix::ones(3, 3);
    assert!((o.sum() - 9.0).abs() < 1e-12);
}

#[test]
fn test_map_and_add_at() {
    let mut m = Matrix::filled(2, 2, -1.0).map(f64::abs);
    m.add_at(0, 1, 2.5);
    assert_eq!(m.as_slice(), &[1.0, 3.5, 1.0, 1.0]);
}

#[test]
fn test_is_finite() {
    let mut m = Matrix::zeros(2, 2);
    assert!(m.is_finite());
    m.set(1, 1, f64::NAN);
    assert!(!m.is_finite());
    m.set(1, 1, f64::INFINITY);
    assert!(!m.is_finite());
}

#[test]
fn test_count_nonzero() {
    let m = Matrix::<f64>::from_vec(1, 4, vec![0.0, -0.5, 0.0, 2.0]).expect("1x4");
    assert_eq!(m.count_nonzero(), 2);
}
