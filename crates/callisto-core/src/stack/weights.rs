use ndarray::{Array1, Array2};

use crate::ap::PatchRect;

/// One-dimensional blending ramp over the patch interval `[low, high)` with
/// the reference point at `center`.
///
/// Rises from `1/(center − low + 1)` at `low` up to 1.0 at `center`, then
/// falls to `1/(high − center)` at `high − 1`. A side flagged `extend_*` is
/// replaced with constant 1.0; this is used where the patch abuts the image
/// edge, so the background never shines through at image borders.
///
/// The rising divisor is `center − low + 1` (not `center − low`), which keeps
/// the leftmost weight strictly positive.
pub fn one_dim_weight(
    low: usize,
    high: usize,
    center: usize,
    extend_low: bool,
    extend_high: bool,
) -> Array1<f32> {
    let length = high - low;
    let center_offset = center - low;
    let mut weights = Array1::<f32>::zeros(length);

    if extend_low {
        for i in 0..center_offset {
            weights[i] = 1.0;
        }
    } else {
        let divisor = (center_offset + 1) as f32;
        for i in 0..center_offset {
            weights[i] = (i + 1) as f32 / divisor;
        }
    }

    if extend_high {
        for i in center_offset..length {
            weights[i] = 1.0;
        }
    } else {
        let divisor = (high - center) as f32;
        for i in center_offset..length {
            weights[i] = (length - i) as f32 / divisor;
        }
    }

    weights
}

/// Two-dimensional blending mask for one alignment point patch in drizzled
/// coordinates: the element-wise minimum of the y and x ramps.
///
/// Minimum (not product) keeps a plateau along the central axes and fades
/// toward the corners.
pub fn patch_weight_mask(
    patch: &PatchRect,
    center_y: usize,
    center_x: usize,
    dim_y: usize,
    dim_x: usize,
) -> Array2<f32> {
    let weights_y = one_dim_weight(
        patch.y_low,
        patch.y_high,
        center_y,
        patch.y_low == 0,
        patch.y_high == dim_y,
    );
    let weights_x = one_dim_weight(
        patch.x_low,
        patch.x_high,
        center_x,
        patch.x_low == 0,
        patch.x_high == dim_x,
    );

    let mut mask = Array2::<f32>::zeros((weights_y.len(), weights_x.len()));
    for (row, &wy) in weights_y.iter().enumerate() {
        for (col, &wx) in weights_x.iter().enumerate() {
            mask[[row, col]] = wy.min(wx);
        }
    }
    mask
}
