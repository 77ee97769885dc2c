/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Initial fill of the per-pixel weight accumulator. Keeps the final
/// normalization division total, without a per-pixel branch.
pub const WEIGHT_SUM_SENTINEL: f32 = 1e-30;

/// Accumulated weights below this count as stacking holes.
pub const HOLE_EPSILON: f32 = 1e-10;

/// Added to the average frame brightness before dividing by it.
pub const BRIGHTNESS_EPSILON: f32 = 1e-7;

/// Search width reserved for the second correlation phase when sizing the
/// first-phase weight matrix of the multi-level matcher.
pub const SECOND_PHASE_SEARCH_WIDTH: usize = 4;

/// Number of progress notifications emitted per stage.
pub const PROGRESS_STEPS: usize = 10;
