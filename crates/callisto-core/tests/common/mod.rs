#![allow(dead_code)]

use ndarray::Array2;

use callisto_core::ap::{AlignmentPoint, ApSet, ApShift, ApShiftSolver, PatchRect, ShiftRequest};
use callisto_core::error::Result;
use callisto_core::frame::{BitDepth, FrameSource, ImagePlanes};

/// Checkerboard pattern with the given amplitude: `amplitude` on even
/// diagonals, 0 elsewhere. Its xy-gradient local contrast is exactly
/// `2 * amplitude`.
pub fn checkerboard(height: usize, width: usize, amplitude: f32) -> Array2<f32> {
    Array2::from_shape_fn((height, width), |(row, col)| {
        if (row + col) % 2 == 0 {
            amplitude
        } else {
            0.0
        }
    })
}

/// In-memory frame source for tests.
pub struct TestSource {
    pub frames: Vec<ImagePlanes>,
    pub blurred: Vec<Array2<f32>>,
    pub laplacian: Vec<Array2<f32>>,
    pub brightness: Vec<f32>,
    pub used_aps: Vec<Vec<usize>>,
    pub depth: BitDepth,
}

impl TestSource {
    /// Constant mono frames with the given pixel values.
    ///
    /// The blurred (and Laplacian) views get checkerboard textures of
    /// increasing amplitude so ranking sees strictly ordered scores; every
    /// frame contributes to alignment point 0.
    pub fn constant_mono(height: usize, width: usize, values: &[f32], depth: BitDepth) -> Self {
        let frames = values
            .iter()
            .map(|&v| ImagePlanes::mono(Array2::from_elem((height, width), v)))
            .collect();
        let blurred: Vec<Array2<f32>> = (0..values.len())
            .map(|i| checkerboard(height, width, (i + 1) as f32))
            .collect();
        Self {
            frames,
            laplacian: blurred.clone(),
            blurred,
            brightness: values.to_vec(),
            used_aps: vec![vec![0]; values.len()],
            depth,
        }
    }

    pub fn with_used_aps(mut self, used_aps: Vec<Vec<usize>>) -> Self {
        self.used_aps = used_aps;
        self
    }

    pub fn with_blurred(mut self, blurred: Vec<Array2<f32>>) -> Self {
        self.laplacian = blurred.clone();
        self.blurred = blurred;
        self
    }

    pub fn with_brightness(mut self, brightness: Vec<f32>) -> Self {
        self.brightness = brightness;
        self
    }
}

impl FrameSource for TestSource {
    fn shape(&self) -> (usize, usize) {
        self.frames[0].dim()
    }

    fn number(&self) -> usize {
        self.frames.len()
    }

    fn color(&self) -> bool {
        self.frames[0].is_color()
    }

    fn depth(&self) -> BitDepth {
        self.depth
    }

    fn frame(&self, index: usize) -> Result<ImagePlanes> {
        Ok(self.frames[index].clone())
    }

    fn frame_mono_blurred(&self, index: usize) -> Result<Array2<f32>> {
        Ok(self.blurred[index].clone())
    }

    fn frame_mono_blurred_laplacian(&self, index: usize) -> Result<Array2<f32>> {
        Ok(self.laplacian[index].clone())
    }

    fn average_brightness(&self, index: usize) -> f32 {
        self.brightness[index]
    }

    fn used_alignment_points(&self, index: usize) -> &[usize] {
        &self.used_aps[index]
    }
}

/// Solver returning one fixed shift for every measurement.
pub struct FixedShiftSolver {
    pub shift_y: f32,
    pub shift_x: f32,
    pub success: bool,
}

impl FixedShiftSolver {
    pub fn zero() -> Self {
        Self {
            shift_y: 0.0,
            shift_x: 0.0,
            success: true,
        }
    }
}

impl ApShiftSolver for FixedShiftSolver {
    fn compute_shift(
        &self,
        _frame_mono_blurred: &Array2<f32>,
        _frame_index: usize,
        _ap_index: usize,
        _request: &ShiftRequest<'_>,
    ) -> ApShift {
        ApShift {
            shift_y: self.shift_y,
            shift_x: self.shift_x,
            success: self.success,
        }
    }
}

/// A single alignment point whose patch covers the whole frame.
pub fn full_frame_ap_set(height: usize, width: usize, drizzle: usize, stack_size: usize) -> ApSet {
    ApSet {
        points: vec![AlignmentPoint::from_source(
            PatchRect::new(0, height, 0, width),
            height / 2,
            width / 2,
            drizzle,
        )],
        stack_size,
    }
}
