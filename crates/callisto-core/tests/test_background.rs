use ndarray::{s, Array2};

use callisto_core::ap::PatchRect;
use callisto_core::config::StackConfig;
use callisto_core::frame::ImagePlanes;
use callisto_core::stack::background::{add_shifted_rect, plan_background};

fn config(blend_threshold: f32, fraction: f32, patch_size: usize) -> StackConfig {
    StackConfig {
        background_blend_threshold: blend_threshold,
        background_fraction: fraction,
        background_patch_size: patch_size,
        ..StackConfig::default()
    }
}

#[test]
fn test_full_coverage_needs_no_background() {
    let weight_sum = Array2::from_elem((8, 8), 3.0f32);
    let plan = plan_background(&weight_sum, 3, &config(0.5, 0.1, 4), (8, 8), 1);
    assert_eq!(plan.holes, 0);
    assert!(plan.tiles.is_empty());
}

#[test]
fn test_sparse_holes_restrict_to_tiles() {
    // One 2x2 hole in the top-left corner of an otherwise covered image.
    let mut weight_sum = Array2::from_elem((8, 8), 1.0f32);
    weight_sum.slice_mut(s![0..2, 0..2]).fill(1e-30);

    // 4 of 64 pixels need the background, below the 50% fraction: tiles.
    let plan = plan_background(&weight_sum, 1, &config(0.5, 0.5, 4), (8, 8), 1);
    assert_eq!(plan.holes, 4);
    assert_eq!(plan.tiles, vec![PatchRect::new(0, 4, 0, 4)]);
}

#[test]
fn test_dense_holes_use_the_whole_image() {
    let weight_sum = Array2::from_elem((8, 8), 1e-30f32);
    // Every pixel needs the background; an empty tile list means full image.
    let plan = plan_background(&weight_sum, 1, &config(0.5, 0.5, 4), (8, 8), 1);
    assert_eq!(plan.holes, 64);
    assert!(plan.tiles.is_empty());
}

#[test]
fn test_tiles_cover_the_image_up_to_its_edges() {
    let weight_sum = Array2::from_elem((10, 10), 1e-30f32);
    // Fraction of 1.1 forces tiling even with every pixel below threshold.
    let plan = plan_background(&weight_sum, 1, &config(0.5, 1.1, 4), (10, 10), 1);

    assert_eq!(plan.tiles.len(), 9);
    let last = plan.tiles.last().unwrap();
    assert_eq!(*last, PatchRect::new(8, 10, 8, 10));
}

#[test]
fn test_tile_check_runs_in_drizzled_coordinates() {
    // Source 4x4, drizzle 2: the weight map is 8x8. Only the drizzled
    // projection of the lower-right source tile contains holes.
    let mut weight_sum = Array2::from_elem((8, 8), 1.0f32);
    weight_sum.slice_mut(s![6..8, 6..8]).fill(1e-30);

    let plan = plan_background(&weight_sum, 1, &config(0.5, 0.5, 2), (4, 4), 2);
    assert_eq!(plan.tiles, vec![PatchRect::new(2, 4, 2, 4)]);
}

#[test]
fn test_add_shifted_rect_applies_the_global_shift() {
    let frame = ImagePlanes::mono(Array2::from_shape_fn((4, 4), |(r, c)| (r * 10 + c) as f32));
    let mut accumulator = ImagePlanes::zeros(1, 4, 4);

    add_shifted_rect(&frame, &mut accumulator, 1, 0, &PatchRect::new(0, 4, 0, 4));

    let plane = &accumulator.planes()[0];
    // Row r of the accumulator holds frame row r+1; the clipped last row
    // stays untouched.
    assert_eq!(plane[[0, 0]], 10.0);
    assert_eq!(plane[[2, 3]], 33.0);
    assert_eq!(plane[[3, 0]], 0.0);
}

#[test]
fn test_add_shifted_rect_restricted_to_a_tile() {
    let frame = ImagePlanes::mono(Array2::from_elem((4, 4), 5.0));
    let mut accumulator = ImagePlanes::zeros(1, 4, 4);

    add_shifted_rect(&frame, &mut accumulator, 0, 0, &PatchRect::new(2, 4, 2, 4));

    let plane = &accumulator.planes()[0];
    assert_eq!(plane[[0, 0]], 0.0);
    assert_eq!(plane[[2, 2]], 5.0);
    assert_eq!(plane[[3, 3]], 5.0);
}
