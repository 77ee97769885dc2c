use ndarray::Array2;
use rayon::prelude::*;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::frame::ImagePlanes;

/// Bilinear resize with half-pixel center alignment and border replication.
///
/// The destination pixel `(r, c)` samples the source at
/// `((r + 0.5) * in/out - 0.5, ...)`, so integer upscales interpolate between
/// neighbouring source pixels instead of merely replicating them.
pub fn resize_bilinear(src: &Array2<f32>, out_height: usize, out_width: usize) -> Array2<f32> {
    let scale_y = src.nrows() as f64 / out_height as f64;
    let scale_x = src.ncols() as f64 / out_width as f64;

    if out_height * out_width >= PARALLEL_PIXEL_THRESHOLD {
        let rows: Vec<Vec<f32>> = (0..out_height)
            .into_par_iter()
            .map(|row| resize_row(src, row, out_width, scale_y, scale_x))
            .collect();

        let mut result = Array2::<f32>::zeros((out_height, out_width));
        for (row, row_data) in rows.into_iter().enumerate() {
            for (col, val) in row_data.into_iter().enumerate() {
                result[[row, col]] = val;
            }
        }
        result
    } else {
        let mut result = Array2::<f32>::zeros((out_height, out_width));
        for row in 0..out_height {
            let row_data = resize_row(src, row, out_width, scale_y, scale_x);
            for (col, val) in row_data.into_iter().enumerate() {
                result[[row, col]] = val;
            }
        }
        result
    }
}

fn resize_row(
    src: &Array2<f32>,
    out_row: usize,
    out_width: usize,
    scale_y: f64,
    scale_x: f64,
) -> Vec<f32> {
    let (in_h, in_w) = src.dim();

    let src_y = (out_row as f64 + 0.5) * scale_y - 0.5;
    let y0 = src_y.floor();
    let fy = (src_y - y0) as f32;
    let y0i = (y0 as i64).clamp(0, in_h as i64 - 1) as usize;
    let y1i = (y0 as i64 + 1).clamp(0, in_h as i64 - 1) as usize;

    (0..out_width)
        .map(|col| {
            let src_x = (col as f64 + 0.5) * scale_x - 0.5;
            let x0 = src_x.floor();
            let fx = (src_x - x0) as f32;
            let x0i = (x0 as i64).clamp(0, in_w as i64 - 1) as usize;
            let x1i = (x0 as i64 + 1).clamp(0, in_w as i64 - 1) as usize;

            let top = src[[y0i, x0i]] * (1.0 - fx) + src[[y0i, x1i]] * fx;
            let bottom = src[[y1i, x0i]] * (1.0 - fx) + src[[y1i, x1i]] * fx;
            top * (1.0 - fy) + bottom * fy
        })
        .collect()
}

/// Upsample every plane by an integer drizzle factor.
pub fn upsample_planes(src: &ImagePlanes, factor: usize) -> ImagePlanes {
    let (h, w) = src.dim();
    ImagePlanes::from_planes(
        src.planes()
            .iter()
            .map(|plane| resize_bilinear(plane, h * factor, w * factor))
            .collect(),
    )
}

/// Halve both spatial dimensions of a 16-bit plane (final step of the 1.5x
/// drizzle mode).
pub fn halve_u16(src: &Array2<u16>) -> Array2<u16> {
    let out_h = (src.nrows() as f64 * 0.5).round() as usize;
    let out_w = (src.ncols() as f64 * 0.5).round() as usize;
    let float = src.mapv(|v| v as f32);
    resize_bilinear(&float, out_h, out_w).mapv(|v| v.clamp(0.0, 65535.0).round() as u16)
}
