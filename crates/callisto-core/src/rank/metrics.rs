use ndarray::Array2;

/// Mean absolute local contrast of a pre-blurred image, sampled on a
/// `stride`-spaced lattice.
///
/// At each lattice point the x- and y-neighbour differences (one stride away)
/// are summed; the score is the mean over all lattice points with both
/// neighbours in bounds. Higher = sharper.
pub fn local_contrast(image: &Array2<f32>, stride: usize) -> f64 {
    let (h, w) = image.dim();
    if stride == 0 || h <= stride || w <= stride {
        return 0.0;
    }

    let mut sum = 0.0f64;
    let mut count = 0usize;

    let mut row = 0;
    while row + stride < h {
        let mut col = 0;
        while col + stride < w {
            let v = image[[row, col]];
            sum += ((v - image[[row, col + stride]]).abs()
                + (v - image[[row + stride, col]]).abs()) as f64;
            count += 1;
            col += stride;
        }
        row += stride;
    }

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Standard deviation of a precomputed Laplacian image. Higher = sharper.
///
/// The Laplacian itself comes from the frame source; this kernel only
/// measures its spread.
pub fn laplace_stddev(laplacian: &Array2<f32>) -> f64 {
    let count = laplacian.len();
    if count == 0 {
        return 0.0;
    }

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    for &v in laplacian.iter() {
        let v = v as f64;
        sum += v;
        sum_sq += v * v;
    }

    let mean = sum / count as f64;
    (sum_sq / count as f64 - mean * mean).max(0.0).sqrt()
}

/// Mean 3x3 Sobel gradient magnitude over the valid interior.
///
/// Sobel kernels:
///   Gx = [[-1, 0, 1], [-2, 0, 2], [-1, 0, 1]]
///   Gy = [[-1, -2, -1], [0, 0, 0], [1, 2, 1]]
///
/// Score = mean of sqrt(Gx² + Gy²). Higher = sharper.
pub fn sobel_mean_magnitude(image: &Array2<f32>) -> f64 {
    let (h, w) = image.dim();
    if h < 3 || w < 3 {
        return 0.0;
    }

    let mut sum = 0.0f64;
    let count = ((h - 2) * (w - 2)) as f64;

    for row in 1..h - 1 {
        for col in 1..w - 1 {
            let gx = -image[[row - 1, col - 1]] as f64
                + image[[row - 1, col + 1]] as f64
                - 2.0 * image[[row, col - 1]] as f64
                + 2.0 * image[[row, col + 1]] as f64
                - image[[row + 1, col - 1]] as f64
                + image[[row + 1, col + 1]] as f64;

            let gy = -image[[row - 1, col - 1]] as f64
                - 2.0 * image[[row - 1, col]] as f64
                - image[[row - 1, col + 1]] as f64
                + image[[row + 1, col - 1]] as f64
                + 2.0 * image[[row + 1, col]] as f64
                + image[[row + 1, col + 1]] as f64;

            sum += (gx * gx + gy * gy).sqrt();
        }
    }

    sum / count
}
