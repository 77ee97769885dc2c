use ndarray::{s, Array2};

use crate::ap::PatchRect;
use crate::config::StackConfig;
use crate::consts::HOLE_EPSILON;
use crate::frame::ImagePlanes;

/// Where the averaged background image must be computed.
///
/// Patch weights never reach every pixel when the alignment points leave
/// gaps; those pixels are filled from an average of globally shifted best
/// frames. Computing that average per pixel is expensive, so when the gaps
/// are sparse the work is restricted to hole-bearing tiles.
#[derive(Clone, Debug, Default)]
pub struct BackgroundPlan {
    /// Drizzled pixels with (numerically) zero patch coverage. Zero means no
    /// background is needed at all.
    pub holes: usize,
    /// Source-coordinate tiles where the background must be computed; empty
    /// means the whole image.
    pub tiles: Vec<PatchRect>,
}

/// Decide whether a background is needed and, if the holes are sparse
/// enough, which tiles to compute it on.
///
/// Two distinct thresholds are involved: allocation is decided against
/// [`HOLE_EPSILON`] (any pixel no patch reaches), while tile membership and
/// later blending use `blend_threshold · stack_size` (pixels where the
/// background will shine through).
pub fn plan_background(
    weight_sum: &Array2<f32>,
    stack_size: usize,
    config: &StackConfig,
    source_dims: (usize, usize),
    drizzle: usize,
) -> BackgroundPlan {
    let holes = weight_sum.iter().filter(|&&w| w < HOLE_EPSILON).count();
    if holes == 0 {
        return BackgroundPlan::default();
    }

    let blend_cutoff = config.background_blend_threshold * stack_size as f32;
    let background_used = weight_sum.iter().filter(|&&w| w < blend_cutoff).count();

    let mut tiles = Vec::new();
    if (background_used as f64 / weight_sum.len() as f64) < config.background_fraction as f64 {
        let (dim_y, dim_x) = source_dims;
        let patch_size = config.background_patch_size;

        let mut y_low = 0;
        while y_low < dim_y {
            let y_high = (y_low + patch_size).min(dim_y);
            let mut x_low = 0;
            while x_low < dim_x {
                let x_high = (x_low + patch_size).min(dim_x);
                let region = weight_sum.slice(s![
                    y_low * drizzle..y_high * drizzle,
                    x_low * drizzle..x_high * drizzle
                ]);
                if region.iter().any(|&w| w < blend_cutoff) {
                    tiles.push(PatchRect::new(y_low, y_high, x_low, x_high));
                }
                x_low += patch_size;
            }
            y_low += patch_size;
        }
    }

    BackgroundPlan { holes, tiles }
}

/// Add the globally shifted `rect` of `frame` into the same `rect` of
/// `accumulator`, clipping where the shifted source leaves the frame.
///
/// Unlike the patch remap this never moves the destination origin relative
/// to the accumulator and records no border clips; uncovered margins stay at
/// their previous value.
pub fn add_shifted_rect(
    frame: &ImagePlanes,
    accumulator: &mut ImagePlanes,
    shift_y: i64,
    shift_x: i64,
    rect: &PatchRect,
) {
    let (frame_height, frame_width) = frame.dim();

    let y_low_source = (rect.y_low as i64 + shift_y).max(0);
    let y_high_source = (rect.y_high as i64 + shift_y).min(frame_height as i64);
    let x_low_source = (rect.x_low as i64 + shift_x).max(0);
    let x_high_source = (rect.x_high as i64 + shift_x).min(frame_width as i64);
    if y_high_source <= y_low_source || x_high_source <= x_low_source {
        return;
    }

    let y_low_target = (y_low_source - shift_y) as usize;
    let y_high_target = (y_high_source - shift_y) as usize;
    let x_low_target = (x_low_source - shift_x) as usize;
    let x_high_target = (x_high_source - shift_x) as usize;

    for (source, target) in frame.planes().iter().zip(accumulator.planes_mut()) {
        let mut region = target.slice_mut(s![
            y_low_target..y_high_target,
            x_low_target..x_high_target
        ]);
        region += &source.slice(s![
            y_low_source as usize..y_high_source as usize,
            x_low_source as usize..x_high_source as usize
        ]);
    }
}
