use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StackError};

/// Bit depth of the integer source material.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitDepth {
    Eight,
    Sixteen,
}

impl BitDepth {
    /// Full-scale pixel value for this depth.
    pub fn max_value(self) -> f32 {
        match self {
            BitDepth::Eight => 255.0,
            BitDepth::Sixteen => 65535.0,
        }
    }
}

/// Pixel planes of one image: one plane for mono, three (R, G, B) for color.
///
/// Values are raw integer counts stored as f32 (0..255 or 0..65535 depending
/// on [`BitDepth`]). All spatial operations in this crate are applied per
/// plane with identical index mapping.
#[derive(Clone, Debug)]
pub struct ImagePlanes {
    planes: Vec<Array2<f32>>,
}

impl ImagePlanes {
    /// Build from raw planes. One plane is mono, three are RGB; every plane
    /// must share one shape.
    pub fn new(planes: Vec<Array2<f32>>) -> Result<Self> {
        if planes.len() != 1 && planes.len() != 3 {
            return Err(StackError::InvalidArgument(format!(
                "expected 1 or 3 image planes, got {}",
                planes.len()
            )));
        }
        let dim = planes[0].dim();
        if planes.iter().any(|p| p.dim() != dim) {
            return Err(StackError::InvalidArgument(
                "image planes differ in shape".into(),
            ));
        }
        Ok(Self { planes })
    }

    pub fn mono(plane: Array2<f32>) -> Self {
        Self {
            planes: vec![plane],
        }
    }

    pub fn rgb(red: Array2<f32>, green: Array2<f32>, blue: Array2<f32>) -> Result<Self> {
        Self::new(vec![red, green, blue])
    }

    pub fn zeros(channels: usize, height: usize, width: usize) -> Self {
        Self {
            planes: (0..channels)
                .map(|_| Array2::zeros((height, width)))
                .collect(),
        }
    }

    pub(crate) fn from_planes(planes: Vec<Array2<f32>>) -> Self {
        Self { planes }
    }

    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    pub fn is_color(&self) -> bool {
        self.planes.len() == 3
    }

    /// (height, width) shared by every plane.
    pub fn dim(&self) -> (usize, usize) {
        self.planes[0].dim()
    }

    pub fn planes(&self) -> &[Array2<f32>] {
        &self.planes
    }

    pub fn planes_mut(&mut self) -> &mut [Array2<f32>] {
        &mut self.planes
    }

    /// Multiply every pixel of every plane by `factor`.
    pub fn scale_in_place(&mut self, factor: f32) {
        for plane in &mut self.planes {
            plane.mapv_inplace(|v| v * factor);
        }
    }
}

/// Random-access source of video frames and their precomputed monochrome
/// views.
///
/// Decoding, debayering and blur preprocessing happen upstream; the engine
/// only requires that all frames share one shape and that indices are
/// random-accessible. When an exclusion filter ("index translation") is
/// active on the source, `number` and all per-index accessors refer to the
/// reduced frame list.
pub trait FrameSource {
    /// (height, width) shared by every frame.
    fn shape(&self) -> (usize, usize);

    /// Number of frames currently visible.
    fn number(&self) -> usize;

    fn color(&self) -> bool;

    fn depth(&self) -> BitDepth;

    /// Full-resolution pixel data of frame `index`.
    fn frame(&self, index: usize) -> Result<ImagePlanes>;

    /// Pre-blurred monochrome view of frame `index`.
    fn frame_mono_blurred(&self, index: usize) -> Result<Array2<f32>>;

    /// Laplacian of the blurred monochrome view of frame `index`.
    fn frame_mono_blurred_laplacian(&self, index: usize) -> Result<Array2<f32>>;

    /// Mean brightness of frame `index`.
    fn average_brightness(&self, index: usize) -> f32;

    /// Alignment points for which frame `index` ranked among the best.
    fn used_alignment_points(&self, index: usize) -> &[usize];

    /// Whether an exclusion filter is currently applied.
    fn index_translation_active(&self) -> bool {
        false
    }

    /// Drop any exclusion filter, restoring the original frame indexing.
    fn reset_index_translation(&mut self) {}
}

/// Integer pixel shift of each frame relative to the mean frame, in source
/// coordinates.
#[derive(Clone, Debug, Default)]
pub struct GlobalShiftTable {
    pub dy: Vec<i64>,
    pub dx: Vec<i64>,
}

impl GlobalShiftTable {
    pub fn new(dy: Vec<i64>, dx: Vec<i64>) -> Result<Self> {
        if dy.len() != dx.len() {
            return Err(StackError::InvalidArgument(format!(
                "shift table length mismatch: {} dy vs {} dx entries",
                dy.len(),
                dx.len()
            )));
        }
        Ok(Self { dy, dx })
    }

    /// All-zero shifts for `number` frames.
    pub fn zeros(number: usize) -> Self {
        Self {
            dy: vec![0; number],
            dx: vec![0; number],
        }
    }

    pub fn len(&self) -> usize {
        self.dy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dy.is_empty()
    }
}
