use std::time::Instant;

use ndarray::{s, Array2, Zip};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::ap::{first_phase_weight_matrix, ApSet, ApShift, ApShiftSolver, PatchRect, ShiftRequest};
use crate::config::{ApMatchMethod, StackConfig};
use crate::consts::{BRIGHTNESS_EPSILON, PROGRESS_STEPS, WEIGHT_SUM_SENTINEL};
use crate::error::{Result, StackError};
use crate::frame::{FrameSource, GlobalShiftTable, ImagePlanes};
use crate::progress::{coarse_percent, CancelToken, ProgressSink};
use crate::rank::RankEngine;
use crate::resample::{halve_u16, upsample_planes};
use crate::stack::background::{add_shifted_rect, plan_background};
use crate::stack::remap::{remap_rigid, BorderCounters};
use crate::stack::stats::ShiftStatistics;
use crate::stack::weights::patch_weight_mask;

/// The final stacked 16-bit image, mono or RGB.
#[derive(Clone, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum StackedImage {
    Mono(Array2<u16>),
    Color([Array2<u16>; 3]),
}

impl StackedImage {
    pub fn is_color(&self) -> bool {
        matches!(self, Self::Color(_))
    }

    /// (height, width) of the image.
    pub fn dim(&self) -> (usize, usize) {
        self.planes()[0].dim()
    }

    pub fn planes(&self) -> &[Array2<u16>] {
        match self {
            Self::Mono(plane) => std::slice::from_ref(plane),
            Self::Color(planes) => planes.as_slice(),
        }
    }
}

/// Per-AP scratch state owned by the engine for the duration of a stack: the
/// summation buffer and the blending weight mask, both at drizzled patch
/// size. Released when the final image is emitted.
struct ApWorkspace {
    buffer: ImagePlanes,
    weights: Array2<f32>,
}

/// Local stacking engine: de-warps the patch of every contributing frame at
/// every alignment point and co-adds the patches into per-AP buffers, then
/// merges the buffers into a single image.
///
/// Call order: [`StackEngine::new`], [`StackEngine::stack_frames`],
/// [`StackEngine::merge`].
pub struct StackEngine<'a, S: FrameSource> {
    config: &'a StackConfig,
    frames: &'a S,
    rank: &'a RankEngine,
    shifts: &'a GlobalShiftTable,
    aps: &'a ApSet,
    drizzle: usize,
    dim_y: usize,
    dim_x: usize,
    dim_y_drizzled: usize,
    dim_x_drizzled: usize,
    channels: usize,
    workspaces: Vec<ApWorkspace>,
    /// Per-pixel sum of blending weights over all patches, used to normalize
    /// the merged image. Filled with a tiny sentinel so the division needs no
    /// per-pixel branch.
    weight_sum: Array2<f32>,
    background: Option<ImagePlanes>,
    background_tiles: Vec<PatchRect>,
    number_stacking_holes: usize,
    borders: BorderCounters,
    stats: ShiftStatistics,
    stacked: bool,
    merged: bool,
}

impl<'a, S: FrameSource> StackEngine<'a, S> {
    pub fn new(
        config: &'a StackConfig,
        frames: &'a S,
        rank: &'a RankEngine,
        shifts: &'a GlobalShiftTable,
        aps: &'a ApSet,
    ) -> Result<Self> {
        let number = frames.number();
        if number == 0 {
            return Err(StackError::InvalidArgument("empty frame sequence".into()));
        }
        if shifts.len() != number {
            return Err(StackError::InvalidArgument(format!(
                "shift table covers {} frames, source has {number}",
                shifts.len()
            )));
        }
        if rank.number() != number {
            return Err(StackError::InvalidArgument(format!(
                "rank view covers {} frames, source has {number}",
                rank.number()
            )));
        }
        if aps.stack_size == 0 || aps.stack_size > number {
            return Err(StackError::InvalidArgument(format!(
                "stack size {} not in 1..={number}",
                aps.stack_size
            )));
        }
        if config.search_width == 0 {
            return Err(StackError::InvalidArgument("search width is zero".into()));
        }
        if !(config.background_blend_threshold > 0.0 && config.background_blend_threshold <= 1.0) {
            return Err(StackError::InvalidArgument(format!(
                "background blend threshold {} not in (0, 1]",
                config.background_blend_threshold
            )));
        }
        if config.background_patch_size == 0 {
            return Err(StackError::InvalidArgument(
                "background patch size is zero".into(),
            ));
        }

        let drizzle = config.drizzle.factor();
        let (dim_y, dim_x) = frames.shape();
        let dim_y_drizzled = dim_y * drizzle;
        let dim_x_drizzled = dim_x * drizzle;
        let channels = if frames.color() { 3 } else { 1 };

        let mut workspaces = Vec::with_capacity(aps.points.len());
        for (index, ap) in aps.points.iter().enumerate() {
            let rect = &ap.patch_drizzled;
            let geometry_ok = rect.y_low < rect.y_high
                && rect.x_low < rect.x_high
                && rect.y_high <= dim_y_drizzled
                && rect.x_high <= dim_x_drizzled
                && (rect.y_low..rect.y_high).contains(&ap.center_y_drizzled)
                && (rect.x_low..rect.x_high).contains(&ap.center_x_drizzled);
            if !geometry_ok {
                return Err(StackError::InvalidArgument(format!(
                    "alignment point {index} has invalid drizzled geometry"
                )));
            }

            workspaces.push(ApWorkspace {
                buffer: ImagePlanes::zeros(channels, rect.height(), rect.width()),
                weights: patch_weight_mask(
                    rect,
                    ap.center_y_drizzled,
                    ap.center_x_drizzled,
                    dim_y_drizzled,
                    dim_x_drizzled,
                ),
            });
        }

        Ok(Self {
            config,
            frames,
            rank,
            shifts,
            aps,
            drizzle,
            dim_y,
            dim_x,
            dim_y_drizzled,
            dim_x_drizzled,
            channels,
            workspaces,
            weight_sum: Array2::from_elem((dim_y_drizzled, dim_x_drizzled), WEIGHT_SUM_SENTINEL),
            background: None,
            background_tiles: Vec::new(),
            number_stacking_holes: 0,
            borders: BorderCounters::default(),
            stats: ShiftStatistics::new(2 * config.search_width * drizzle),
            stacked: false,
            merged: false,
        })
    }

    /// Sum the patch weights of every alignment point into `weight_sum`,
    /// then decide whether (and where) a background image is needed.
    fn prepare_blending(&mut self) {
        let stack_size = self.aps.stack_size as f32;
        for (ap, workspace) in self.aps.points.iter().zip(&self.workspaces) {
            let rect = &ap.patch_drizzled;
            let mut region = self
                .weight_sum
                .slice_mut(s![rect.y_low..rect.y_high, rect.x_low..rect.x_high]);
            region.scaled_add(stack_size, &workspace.weights);
        }

        let plan = plan_background(
            &self.weight_sum,
            self.aps.stack_size,
            self.config,
            (self.dim_y, self.dim_x),
            self.drizzle,
        );
        self.number_stacking_holes = plan.holes;
        if plan.holes > 0 {
            // Accumulated in source coordinates, upscaled after the frame loop.
            self.background = Some(ImagePlanes::zeros(self.channels, self.dim_y, self.dim_x));
            self.background_tiles = plan.tiles;
        }
    }

    /// Compute the shifted contribution of every frame to every alignment
    /// point it was selected for, and add it to that point's buffer. Frames
    /// in the best `stack_size` also feed the averaged background when the
    /// patches leave holes.
    pub fn stack_frames(
        &mut self,
        solver: &dyn ApShiftSolver,
        progress: Option<&dyn ProgressSink>,
        cancel: Option<&CancelToken>,
    ) -> Result<()> {
        if self.stacked {
            return Err(StackError::Internal("stack_frames called twice".into()));
        }
        let started = Instant::now();
        let number = self.frames.number();

        self.prepare_blending();
        debug!(
            holes = self.number_stacking_holes,
            tiles = self.background_tiles.len(),
            "background plan ready"
        );

        let weight_matrix = match self.config.match_method {
            ApMatchMethod::MultiLevelCorrelation => Some(first_phase_weight_matrix(
                self.config.search_width,
                self.config.penalty_factor,
            )),
            _ => None,
        };

        // Brightness equalization target: the median of all frame averages.
        let median_brightness = if self.config.normalize_brightness {
            Some(median_average_brightness(self.frames))
        } else {
            None
        };

        // Frames feeding the averaged background: the best `stack_size` of
        // the active ranking.
        let mut in_best_set = vec![false; number];
        for &index in &self.rank.active().quality_sorted_indices[..self.aps.stack_size] {
            in_best_set[index] = true;
        }

        let signal_step = (number / PROGRESS_STEPS).max(1);
        let subpixel_solve = self.drizzle > 1;
        let drizzle_i64 = self.drizzle as i64;

        for frame_index in 0..number {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    return Err(StackError::Cancelled);
                }
            }
            if let Some(sink) = progress {
                if frame_index % signal_step == 0 {
                    sink.report("Stack frames", coarse_percent(frame_index, number));
                }
            }

            let mut frame = self.frames.frame(frame_index)?;
            if frame.dim() != (self.dim_y, self.dim_x) || frame.channels() != self.channels {
                return Err(StackError::Internal(format!(
                    "frame {frame_index} does not match the source shape"
                )));
            }
            if let Some(median) = median_brightness {
                let brightness = self.frames.average_brightness(frame_index);
                frame.scale_in_place(median / (brightness + BRIGHTNESS_EPSILON));
            }

            let upsampled;
            let frame_drizzled: &ImagePlanes = if self.drizzle > 1 {
                upsampled = upsample_planes(&frame, self.drizzle);
                &upsampled
            } else {
                &frame
            };

            let mono_blurred = self.frames.frame_mono_blurred(frame_index)?;
            let dy = self.shifts.dy[frame_index];
            let dx = self.shifts.dx[frame_index];

            let used = self.frames.used_alignment_points(frame_index);
            if let Some(&bad) = used.iter().find(|&&index| index >= self.aps.points.len()) {
                return Err(StackError::Internal(format!(
                    "alignment point index {bad} out of range ({} points)",
                    self.aps.points.len()
                )));
            }

            let request = ShiftRequest {
                de_warp: self.config.de_warp,
                weight_matrix_first_phase: weight_matrix.as_ref(),
                subpixel_solve,
            };

            // Measure the local shifts of this frame's alignment points in
            // parallel; accumulation below stays in AP order so the result
            // is deterministic.
            let measured: Vec<(usize, ApShift)> = used
                .par_iter()
                .map(|&ap_index| {
                    (
                        ap_index,
                        solver.compute_shift(&mono_blurred, frame_index, ap_index, &request),
                    )
                })
                .collect();

            for (ap_index, shift) in measured {
                if let Some(token) = cancel {
                    if token.is_cancelled() {
                        return Err(StackError::Cancelled);
                    }
                }

                let shift_y_drizzled = (shift.shift_y * self.drizzle as f32).round() as i64;
                let shift_x_drizzled = (shift.shift_x * self.drizzle as f32).round() as i64;

                if !shift.success {
                    self.stats.record_failure();
                    continue;
                }

                let magnitude = ((shift_y_drizzled * shift_y_drizzled
                    + shift_x_drizzled * shift_x_drizzled) as f64)
                    .sqrt()
                    .round() as usize;
                self.stats.record_shift(magnitude)?;

                // Total remap shift: global shift reversed from the mean
                // frame to this frame, corrected by the local warp.
                let total_shift_y = dy * drizzle_i64 - shift_y_drizzled;
                let total_shift_x = dx * drizzle_i64 - shift_x_drizzled;

                let ap = &self.aps.points[ap_index];
                remap_rigid(
                    frame_drizzled,
                    &mut self.workspaces[ap_index].buffer,
                    total_shift_y,
                    total_shift_x,
                    &ap.patch_drizzled,
                    &mut self.borders,
                );
            }

            if self.number_stacking_holes > 0 && in_best_set[frame_index] {
                self.accumulate_background(&frame, dy, dx);
            }
        }

        if let Some(sink) = progress {
            sink.report("Stack frames", 100);
        }

        // The background was summed over `stack_size` frames in source
        // coordinates; bring it to drizzled size and average it.
        if self.number_stacking_holes > 0 {
            if let Some(background) = self.background.as_mut() {
                if self.drizzle > 1 {
                    *background = upsample_planes(background, self.drizzle);
                }
                background.scale_in_place(1.0 / self.aps.stack_size as f32);
            }
        }

        self.stacked = true;
        info!(
            frames = number,
            failure_percent = self.stats.failure_percent(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "stacking pass complete"
        );
        Ok(())
    }

    fn accumulate_background(&mut self, frame: &ImagePlanes, dy: i64, dx: i64) {
        let Some(background) = self.background.as_mut() else {
            return;
        };
        if self.background_tiles.is_empty() {
            let full = PatchRect::new(0, self.dim_y, 0, self.dim_x);
            add_shifted_rect(frame, background, dy, dx, &full);
        } else {
            for tile in &self.background_tiles {
                add_shifted_rect(frame, background, dy, dx, tile);
            }
        }
    }

    /// Merge the per-AP buffers into the final image: weight-blend the
    /// patches into a global buffer, normalize, blend in the background
    /// where patches left holes, trim clipped borders, and convert to
    /// 16-bit. In the 1.5x drizzle mode the image is halved as a final step.
    ///
    /// Consumes the per-AP scratch buffers; can only be called once, after
    /// [`StackEngine::stack_frames`].
    pub fn merge(&mut self) -> Result<StackedImage> {
        if !self.stacked {
            return Err(StackError::Internal(
                "merge called before stack_frames".into(),
            ));
        }
        if self.merged {
            return Err(StackError::Internal("merge called twice".into()));
        }
        let started = Instant::now();

        let mut stacked =
            ImagePlanes::zeros(self.channels, self.dim_y_drizzled, self.dim_x_drizzled);
        for (ap, workspace) in self.aps.points.iter().zip(&self.workspaces) {
            let rect = &ap.patch_drizzled;
            for (plane, buffer_plane) in
                stacked.planes_mut().iter_mut().zip(workspace.buffer.planes())
            {
                let region =
                    plane.slice_mut(s![rect.y_low..rect.y_high, rect.x_low..rect.x_high]);
                Zip::from(region)
                    .and(buffer_plane)
                    .and(&workspace.weights)
                    .for_each(|value, &buffered, &weight| *value += buffered * weight);
            }
        }

        // The sentinel fill of weight_sum keeps this division total.
        for plane in stacked.planes_mut() {
            Zip::from(plane)
                .and(&self.weight_sum)
                .for_each(|value, &weight| *value /= weight);
        }

        if self.number_stacking_holes > 0 {
            let background = self.background.as_ref().ok_or_else(|| {
                StackError::Internal(
                    "stacking holes present but no background was accumulated".into(),
                )
            })?;
            if background.dim() != (self.dim_y_drizzled, self.dim_x_drizzled)
                || background.channels() != self.channels
            {
                return Err(StackError::Internal(
                    "background buffer does not match the stacked image shape".into(),
                ));
            }

            // Foreground weight reaches 1.0 where the patch coverage passes
            // the blend threshold; below it the background shines through.
            let blend_cutoff = self.config.background_blend_threshold * self.aps.stack_size as f32;
            for (plane, background_plane) in
                stacked.planes_mut().iter_mut().zip(background.planes())
            {
                Zip::from(plane)
                    .and(background_plane)
                    .and(&self.weight_sum)
                    .for_each(|value, &bg, &weight| {
                        let foreground = (weight / blend_cutoff).clamp(0.0, 1.0);
                        *value = (*value - bg) * foreground + bg;
                    });
            }
        }

        let borders = self.borders;
        if borders.y_low + borders.y_high >= self.dim_y_drizzled
            || borders.x_low + borders.x_high >= self.dim_x_drizzled
        {
            return Err(StackError::Internal(format!(
                "border clips ({:?}) consume the whole image",
                borders
            )));
        }

        let full_scale = self.frames.depth().max_value();
        let halve = self.config.drizzle.halves_output();
        let output_planes: Vec<Array2<u16>> = stacked
            .planes()
            .iter()
            .map(|plane| {
                let view = if borders.any() {
                    plane.slice(s![
                        borders.y_low..self.dim_y_drizzled - borders.y_high,
                        borders.x_low..self.dim_x_drizzled - borders.x_high
                    ])
                } else {
                    plane.view()
                };
                // Scale into [0, 1], saturate, and expand to 16-bit full scale.
                let converted =
                    view.mapv(|v| ((v / full_scale).clamp(0.0, 1.0) * 65535.0).round() as u16);
                if halve {
                    halve_u16(&converted)
                } else {
                    converted
                }
            })
            .collect();

        self.workspaces.clear();
        self.workspaces.shrink_to_fit();
        self.background = None;
        self.merged = true;
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "alignment point buffers merged"
        );

        if self.channels == 3 {
            match <[Array2<u16>; 3]>::try_from(output_planes) {
                Ok(planes) => Ok(StackedImage::Color(planes)),
                Err(_) => Err(StackError::Internal("color plane count mismatch".into())),
            }
        } else {
            let plane = output_planes
                .into_iter()
                .next()
                .ok_or_else(|| StackError::Internal("missing image plane".into()))?;
            Ok(StackedImage::Mono(plane))
        }
    }

    /// Shift magnitude distribution and failure counter of the run.
    pub fn shift_statistics(&self) -> &ShiftStatistics {
        &self.stats
    }

    /// Largest border clips observed during stacking.
    pub fn border_counters(&self) -> BorderCounters {
        self.borders
    }

    /// Drizzled pixels no alignment point patch reaches (0 when the patches
    /// cover the whole image).
    pub fn stacking_holes(&self) -> usize {
        self.number_stacking_holes
    }

    /// Source-coordinate tiles selected for background computation; empty
    /// when the background covers the whole image (or none is needed).
    pub fn background_tiles(&self) -> &[PatchRect] {
        &self.background_tiles
    }

    /// Per-pixel sum of blending weights at drizzled size.
    pub fn weight_sum(&self) -> &Array2<f32> {
        &self.weight_sum
    }
}

/// Median of the per-frame average brightness values.
fn median_average_brightness<S: FrameSource>(frames: &S) -> f32 {
    let mut values: Vec<f32> = (0..frames.number())
        .map(|index| frames.average_brightness(index))
        .collect();
    values.sort_by(f32::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2.0
    }
}
