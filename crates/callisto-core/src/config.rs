use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StackError;

/// Sharpness kernel used for frame ranking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RankMethod {
    /// Mean absolute x/y local contrast on a subsampled lattice.
    #[default]
    XyGradient,
    /// Standard deviation of the precomputed Laplacian view.
    Laplace,
    /// Mean 3x3 Sobel gradient magnitude.
    Sobel,
}

impl FromStr for RankMethod {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self, StackError> {
        match s {
            "xy gradient" => Ok(Self::XyGradient),
            "Laplace" => Ok(Self::Laplace),
            "Sobel" => Ok(Self::Sobel),
            other => Err(StackError::NotSupported(format!("ranking method {other}"))),
        }
    }
}

/// Frame ranking configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RankConfig {
    #[serde(default)]
    pub method: RankMethod,
    /// Lattice stride of the xy-gradient kernel, in pixels.
    #[serde(default = "default_pixel_stride")]
    pub pixel_stride: usize,
    /// Divide scores by the average frame brightness.
    #[serde(default)]
    pub normalize_brightness: bool,
}

fn default_pixel_stride() -> usize {
    2
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            method: RankMethod::default(),
            pixel_stride: default_pixel_stride(),
            normalize_brightness: false,
        }
    }
}

/// Local shift search algorithm selected upstream.
///
/// Only the choice matters inside the stacking engine: the multi-level
/// correlation matcher consumes a first-phase weight matrix which the engine
/// prepares once per run and forwards unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ApMatchMethod {
    #[default]
    MultiLevelCorrelation,
    RadialSearch,
    SteepestDescent,
}

impl FromStr for ApMatchMethod {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self, StackError> {
        match s {
            "MultiLevelCorrelation" => Ok(Self::MultiLevelCorrelation),
            "RadialSearch" => Ok(Self::RadialSearch),
            "SteepestDescent" => Ok(Self::SteepestDescent),
            other => Err(StackError::NotSupported(format!(
                "alignment point method {other}"
            ))),
        }
    }
}

/// Super-resolution factor applied by bilinear upsampling before stacking.
///
/// `OneFive` computes at 3x internally and halves the stacked image as a
/// final step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DrizzleFactor {
    #[default]
    Off,
    OneFive,
    Two,
    Three,
}

impl DrizzleFactor {
    /// Integer upsampling factor used during stacking.
    pub fn factor(self) -> usize {
        match self {
            DrizzleFactor::Off => 1,
            DrizzleFactor::Two => 2,
            DrizzleFactor::OneFive | DrizzleFactor::Three => 3,
        }
    }

    /// Whether the stacked image is halved as a final step.
    pub fn halves_output(self) -> bool {
        matches!(self, DrizzleFactor::OneFive)
    }
}

impl FromStr for DrizzleFactor {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self, StackError> {
        match s {
            "Off" => Ok(Self::Off),
            "1.5x" => Ok(Self::OneFive),
            "2x" => Ok(Self::Two),
            "3x" => Ok(Self::Three),
            other => Err(StackError::NotSupported(format!("drizzle factor {other}"))),
        }
    }
}

/// Stacking engine configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StackConfig {
    #[serde(default)]
    pub drizzle: DrizzleFactor,
    /// Half-extent of the local shift search, in source pixels. Sizes the
    /// shift histogram and the first-phase weight matrix.
    #[serde(default = "default_search_width")]
    pub search_width: usize,
    /// Curvature of the first-phase weight matrix penalty.
    #[serde(default = "default_penalty_factor")]
    pub penalty_factor: f32,
    /// Measure and apply per-AP warp shifts (forwarded to the shift solver).
    #[serde(default = "default_true")]
    pub de_warp: bool,
    #[serde(default)]
    pub match_method: ApMatchMethod,
    /// Equalize every frame to the median average brightness.
    #[serde(default)]
    pub normalize_brightness: bool,
    /// Fraction of the stack size below which the background shines through
    /// when blending, in (0, 1].
    #[serde(default = "default_blend_threshold")]
    pub background_blend_threshold: f32,
    /// Hole fraction above which the background is computed over the whole
    /// image instead of per tile.
    #[serde(default = "default_background_fraction")]
    pub background_fraction: f32,
    /// Side length of the quadratic background tiles, in source pixels.
    #[serde(default = "default_background_patch_size")]
    pub background_patch_size: usize,
}

fn default_search_width() -> usize {
    14
}

fn default_penalty_factor() -> f32 {
    0.00025
}

fn default_true() -> bool {
    true
}

fn default_blend_threshold() -> f32 {
    0.2
}

fn default_background_fraction() -> f32 {
    0.1
}

fn default_background_patch_size() -> usize {
    100
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            drizzle: DrizzleFactor::default(),
            search_width: default_search_width(),
            penalty_factor: default_penalty_factor(),
            de_warp: true,
            match_method: ApMatchMethod::default(),
            normalize_brightness: false,
            background_blend_threshold: default_blend_threshold(),
            background_fraction: default_background_fraction(),
            background_patch_size: default_background_patch_size(),
        }
    }
}

// --- Display implementations ---

impl fmt::Display for RankMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankMethod::XyGradient => write!(f, "xy gradient"),
            RankMethod::Laplace => write!(f, "Laplace"),
            RankMethod::Sobel => write!(f, "Sobel"),
        }
    }
}

impl fmt::Display for ApMatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApMatchMethod::MultiLevelCorrelation => write!(f, "MultiLevelCorrelation"),
            ApMatchMethod::RadialSearch => write!(f, "RadialSearch"),
            ApMatchMethod::SteepestDescent => write!(f, "SteepestDescent"),
        }
    }
}

impl fmt::Display for DrizzleFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrizzleFactor::Off => write!(f, "Off"),
            DrizzleFactor::OneFive => write!(f, "1.5x"),
            DrizzleFactor::Two => write!(f, "2x"),
            DrizzleFactor::Three => write!(f, "3x"),
        }
    }
}
