use ndarray::s;

use crate::ap::PatchRect;
use crate::frame::ImagePlanes;

/// Maximum clip observed at each image border over a whole stacking run.
///
/// Warp shifts can push a patch beyond the frame; the clipped margins leave
/// incomplete stacks at the image borders, which are trimmed off the final
/// image using these counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BorderCounters {
    pub y_low: usize,
    pub y_high: usize,
    pub x_low: usize,
    pub x_high: usize,
}

impl BorderCounters {
    pub fn any(&self) -> bool {
        self.y_low != 0 || self.y_high != 0 || self.x_low != 0 || self.x_high != 0
    }
}

/// Copy the patch rectangle of `frame`, rigidly shifted by
/// `(shift_y, shift_x)`, into `buffer`, adding pixel-wise.
///
/// The buffer origin corresponds to the patch origin. Where the shifted
/// source rectangle reaches beyond the frame it is clipped, the destination
/// origin moves by the clipped amount, and the border counters record the
/// largest clip ever observed in each direction. All planes use the same
/// index mapping.
pub fn remap_rigid(
    frame: &ImagePlanes,
    buffer: &mut ImagePlanes,
    shift_y: i64,
    shift_x: i64,
    patch: &PatchRect,
    borders: &mut BorderCounters,
) {
    let (frame_height, frame_width) = frame.dim();

    let mut y_low_source = patch.y_low as i64 + shift_y;
    let mut y_high_source = patch.y_high as i64 + shift_y;
    let mut y_low_target = 0i64;
    if y_low_source < 0 {
        y_low_target = -y_low_source;
        y_low_source = 0;
        borders.y_low = borders.y_low.max(y_low_target as usize);
    }
    if y_high_source > frame_height as i64 {
        borders.y_high = borders.y_high.max((y_high_source - frame_height as i64) as usize);
        y_high_source = frame_height as i64;
    }
    let y_high_target = y_low_target + y_high_source - y_low_source;

    let mut x_low_source = patch.x_low as i64 + shift_x;
    let mut x_high_source = patch.x_high as i64 + shift_x;
    let mut x_low_target = 0i64;
    if x_low_source < 0 {
        x_low_target = -x_low_source;
        x_low_source = 0;
        borders.x_low = borders.x_low.max(x_low_target as usize);
    }
    if x_high_source > frame_width as i64 {
        borders.x_high = borders.x_high.max((x_high_source - frame_width as i64) as usize);
        x_high_source = frame_width as i64;
    }
    let x_high_target = x_low_target + x_high_source - x_low_source;

    // Shifted entirely off the frame: nothing left to add.
    if y_high_source <= y_low_source || x_high_source <= x_low_source {
        return;
    }

    for (source, target) in frame.planes().iter().zip(buffer.planes_mut()) {
        let mut region = target.slice_mut(s![
            y_low_target as usize..y_high_target as usize,
            x_low_target as usize..x_high_target as usize
        ]);
        region += &source.slice(s![
            y_low_source as usize..y_high_source as usize,
            x_low_source as usize..x_high_source as usize
        ]);
    }
}
