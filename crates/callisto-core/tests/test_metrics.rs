mod common;

use ndarray::Array2;

use callisto_core::rank::metrics::{laplace_stddev, local_contrast, sobel_mean_magnitude};
use common::checkerboard;

#[test]
fn test_local_contrast_of_flat_image_is_zero() {
    let flat = Array2::<f32>::from_elem((16, 16), 0.5);
    assert_eq!(local_contrast(&flat, 2), 0.0);
}

#[test]
fn test_local_contrast_of_checkerboard_is_twice_the_amplitude() {
    let board = checkerboard(16, 16, 3.0);
    let score = local_contrast(&board, 1);
    assert!((score - 6.0).abs() < 1e-9, "expected 6.0, got {score}");
}

#[test]
fn test_local_contrast_sharp_beats_blurry() {
    let sharp = checkerboard(16, 16, 1.0);

    // Smooth gradient: the same dynamic range spread over the whole image.
    let blurry = Array2::from_shape_fn((16, 16), |(r, c)| (r + c) as f32 / 30.0);

    assert!(local_contrast(&sharp, 2) > local_contrast(&blurry, 2));
}

#[test]
fn test_local_contrast_degenerate_stride_is_zero() {
    let board = checkerboard(8, 8, 1.0);
    assert_eq!(local_contrast(&board, 0), 0.0);
    assert_eq!(local_contrast(&board, 8), 0.0);
}

#[test]
fn test_laplace_stddev_of_constant_is_zero() {
    let flat = Array2::<f32>::from_elem((10, 10), 4.0);
    assert!(laplace_stddev(&flat).abs() < 1e-9);
}

#[test]
fn test_laplace_stddev_of_checkerboard() {
    // Values a and 0 in equal numbers: mean a/2, stddev a/2.
    let board = checkerboard(16, 16, 2.0);
    let score = laplace_stddev(&board);
    assert!((score - 1.0).abs() < 1e-9, "expected 1.0, got {score}");
}

#[test]
fn test_sobel_of_flat_image_is_zero() {
    let flat = Array2::<f32>::from_elem((10, 10), 0.5);
    assert!(sobel_mean_magnitude(&flat).abs() < 1e-9);
}

#[test]
fn test_sobel_sharp_beats_blurry() {
    let sharp = checkerboard(16, 16, 1.0);
    let blurry = Array2::from_shape_fn((16, 16), |(r, c)| (r + c) as f32 / 30.0);
    assert!(sobel_mean_magnitude(&sharp) > sobel_mean_magnitude(&blurry));
}

#[test]
fn test_sobel_of_tiny_image_is_zero() {
    let tiny = Array2::<f32>::from_elem((2, 2), 1.0);
    assert_eq!(sobel_mean_magnitude(&tiny), 0.0);
}
