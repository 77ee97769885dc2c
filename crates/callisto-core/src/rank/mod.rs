pub mod metrics;

use std::time::Instant;

use ndarray::Array2;
use rayon::prelude::*;
use tracing::info;

use crate::config::{RankConfig, RankMethod};
use crate::consts::{BRIGHTNESS_EPSILON, PROGRESS_STEPS};
use crate::error::{Result, StackError};
use crate::frame::FrameSource;
use crate::progress::{coarse_percent, ProgressSink};

/// One normalized quality ranking of a frame set.
///
/// Scores are in (0, 1] with the best frame at exactly 1.0;
/// `quality_sorted_indices` lists frame indices in descending score order
/// (ties broken by ascending index) and `rank_indices` is its inverse
/// permutation. `best_value` keeps the raw score of the best frame before
/// normalization.
#[derive(Clone, Debug, PartialEq)]
pub struct RankTable {
    pub scores: Vec<f64>,
    pub quality_sorted_indices: Vec<usize>,
    pub rank_indices: Vec<usize>,
    pub best_index: usize,
    pub best_value: f64,
}

impl RankTable {
    fn build(mut scores: Vec<f64>) -> Result<Self> {
        let number = scores.len();
        let mut quality_sorted_indices: Vec<usize> = (0..number).collect();
        quality_sorted_indices
            .sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));

        let best_index = quality_sorted_indices[0];
        let best_value = scores[best_index];
        if !(best_value > 0.0) {
            return Err(StackError::Internal(
                "frame scores are all non-positive, cannot normalize".into(),
            ));
        }
        for score in &mut scores {
            *score /= best_value;
        }

        let mut rank_indices = vec![0; number];
        for (rank, &index) in quality_sorted_indices.iter().enumerate() {
            rank_indices[index] = rank;
        }

        Ok(Self {
            scores,
            quality_sorted_indices,
            rank_indices,
            best_index,
            best_value,
        })
    }

    pub fn number(&self) -> usize {
        self.scores.len()
    }
}

/// Best frames within one contiguous index window, found by
/// [`RankEngine::find_best_frames`].
#[derive(Clone, Debug)]
pub struct BestFrameWindow {
    /// Start of the winning window `[window_start, window_start + window_size)`.
    pub window_start: usize,
    pub window_size: usize,
    /// The chosen frame indices, best first.
    pub indices: Vec<usize>,
    /// Sum of the chosen scores.
    pub rank_sum: f64,
    /// Loss against the unrestricted top selection, in percent (one decimal).
    pub quality_loss_percent: f64,
    /// Mean chosen index as a percentage of the frame count (one decimal) —
    /// where on the video timeline the selection sits.
    pub time_line_position_percent: f64,
}

/// Ranks all frames of a set by overall sharpness.
///
/// The engine keeps the original ranking immutable and derives an active
/// view from an optional index-translation vector, so excluding frames never
/// loses the original data: resetting the translation restores the original
/// view exactly.
#[derive(Clone, Debug)]
pub struct RankEngine {
    original: RankTable,
    translated: Option<TranslatedView>,
}

#[derive(Clone, Debug)]
struct TranslatedView {
    translation: Vec<usize>,
    table: RankTable,
}

impl RankEngine {
    /// Score every frame with the configured kernel and build the ranking.
    ///
    /// Scoring always runs on the untranslated frame set; an active
    /// exclusion filter on the source is reset first. Progress is reported
    /// about every N/10 frames.
    pub fn score_frames<S: FrameSource>(
        frames: &mut S,
        config: &RankConfig,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<Self> {
        let number = frames.number();
        if number == 0 {
            return Err(StackError::InvalidArgument("empty frame sequence".into()));
        }
        if frames.index_translation_active() {
            frames.reset_index_translation();
        }

        let started = Instant::now();
        let step = (number / PROGRESS_STEPS).max(1);
        let mut raw_scores: Vec<f64> = Vec::with_capacity(number);

        for chunk_start in (0..number).step_by(step) {
            if let Some(sink) = progress {
                sink.report("Rank all frames", coarse_percent(chunk_start, number));
            }
            let chunk_end = (chunk_start + step).min(number);

            // Gather the inputs sequentially (the source need not be Sync),
            // then score the chunk in parallel.
            let inputs: Vec<(Array2<f32>, f32)> = (chunk_start..chunk_end)
                .map(|index| {
                    let image = match config.method {
                        RankMethod::Laplace => frames.frame_mono_blurred_laplacian(index)?,
                        _ => frames.frame_mono_blurred(index)?,
                    };
                    Ok((image, frames.average_brightness(index)))
                })
                .collect::<Result<_>>()?;

            let chunk_scores: Vec<f64> = inputs
                .par_iter()
                .map(|(image, brightness)| {
                    let score = match config.method {
                        RankMethod::XyGradient => {
                            metrics::local_contrast(image, config.pixel_stride)
                        }
                        RankMethod::Laplace => metrics::laplace_stddev(image),
                        RankMethod::Sobel => metrics::sobel_mean_magnitude(image),
                    };
                    if config.normalize_brightness {
                        score / (*brightness as f64 + BRIGHTNESS_EPSILON as f64)
                    } else {
                        score
                    }
                })
                .collect();
            raw_scores.extend(chunk_scores);
        }

        if let Some(sink) = progress {
            sink.report("Rank all frames", 100);
        }

        let original = RankTable::build(raw_scores)?;
        info!(
            frames = number,
            method = %config.method,
            best_index = original.best_index,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "frame ranking complete"
        );

        Ok(Self {
            original,
            translated: None,
        })
    }

    /// The immutable ranking of the full frame set.
    pub fn original(&self) -> &RankTable {
        &self.original
    }

    /// The ranking currently in effect: the translated view if an exclusion
    /// filter is active, the original otherwise.
    pub fn active(&self) -> &RankTable {
        match &self.translated {
            Some(view) => &view.table,
            None => &self.original,
        }
    }

    /// Number of frames in the active view.
    pub fn number(&self) -> usize {
        self.active().number()
    }

    /// The translation vector currently in effect, if any. Entry `j` is the
    /// original index of the j-th surviving frame.
    pub fn index_translation(&self) -> Option<&[usize]> {
        self.translated.as_ref().map(|view| view.translation.as_slice())
    }

    /// Rebuild the active view after frames have been excluded.
    ///
    /// Scores are gathered at the surviving original indices, renormalized
    /// to their maximum, and both index views are rebuilt.
    pub fn set_index_translation(&mut self, translation: Vec<usize>) -> Result<()> {
        if translation.is_empty() {
            return Err(StackError::InvalidArgument(
                "index translation excludes every frame".into(),
            ));
        }
        let number_original = self.original.number();
        if let Some(&bad) = translation.iter().find(|&&index| index >= number_original) {
            return Err(StackError::FrameIndexOutOfRange {
                index: bad,
                total: number_original,
            });
        }

        let gathered: Vec<f64> = translation
            .iter()
            .map(|&index| self.original.scores[index])
            .collect();
        let table = RankTable::build(gathered)?;
        self.translated = Some(TranslatedView { translation, table });
        Ok(())
    }

    /// Drop the exclusion filter and restore the original ranking.
    pub fn reset_index_translation(&mut self) {
        self.translated = None;
    }

    /// Find the `count` best frames under the condition that all of them lie
    /// within one contiguous window of `window` frames.
    ///
    /// Every window position is tried and the one with the highest top-`count`
    /// score sum wins; ties go to the earliest window. Works on the active
    /// view.
    pub fn find_best_frames(&self, count: usize, window: usize) -> Result<BestFrameWindow> {
        let table = self.active();
        let number = table.number();
        if count == 0 {
            return Err(StackError::InvalidArgument(
                "cannot select zero frames".into(),
            ));
        }
        if count > window {
            return Err(StackError::InvalidArgument(format!(
                "attempt to find {count} good frames in an index interval of size {window}"
            )));
        }
        if window > number {
            return Err(StackError::InvalidArgument(format!(
                "best frames window {window} larger than the total number of frames {number}"
            )));
        }

        let mut best_indices: Vec<usize> = Vec::new();
        let mut rank_sum_opt = 0.0f64;
        let mut window_start = 0usize;

        for start in 0..=(number - window) {
            let mut in_window: Vec<usize> = (start..start + window).collect();
            in_window.sort_by(|&a, &b| table.scores[b].total_cmp(&table.scores[a]).then(a.cmp(&b)));
            in_window.truncate(count);
            let rank_sum: f64 = in_window.iter().map(|&index| table.scores[index]).sum();
            if rank_sum > rank_sum_opt {
                rank_sum_opt = rank_sum;
                best_indices = in_window;
                window_start = start;
            }
        }

        let rank_sum_global: f64 = table.quality_sorted_indices[..count]
            .iter()
            .map(|&index| table.scores[index])
            .sum();
        let quality_loss_percent =
            round_one_decimal(100.0 * (rank_sum_global - rank_sum_opt) / rank_sum_global);

        let mean_index =
            best_indices.iter().sum::<usize>() as f64 / best_indices.len() as f64;
        let time_line_position_percent = round_one_decimal(100.0 * mean_index / number as f64);

        Ok(BestFrameWindow {
            window_start,
            window_size: window,
            indices: best_indices,
            rank_sum: rank_sum_opt,
            quality_loss_percent,
            time_line_position_percent,
        })
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
