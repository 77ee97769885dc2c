use std::fmt::Write as _;

use crate::error::{Result, StackError};

/// Distribution of measured warp-shift magnitudes (in drizzled pixels) plus
/// the count of failed measurements.
///
/// Every evaluated (frame, alignment point) pair lands in exactly one place:
/// the histogram bin of its rounded Euclidean shift magnitude on success, or
/// the failure counter otherwise.
#[derive(Clone, Debug)]
pub struct ShiftStatistics {
    histogram: Vec<u64>,
    failures: u64,
}

impl ShiftStatistics {
    pub fn new(bins: usize) -> Self {
        Self {
            histogram: vec![0; bins],
            failures: 0,
        }
    }

    pub fn record_shift(&mut self, magnitude: usize) -> Result<()> {
        match self.histogram.get_mut(magnitude) {
            Some(bin) => {
                *bin += 1;
                Ok(())
            }
            None => Err(StackError::Internal(format!(
                "shift magnitude {magnitude} exceeds the histogram extent {}",
                self.histogram.len()
            ))),
        }
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    pub fn histogram(&self) -> &[u64] {
        &self.histogram
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Successful measurements plus failures.
    pub fn total_entries(&self) -> u64 {
        self.histogram.iter().sum::<u64>() + self.failures
    }

    /// Failed measurements as a percentage of all measurements, rounded to
    /// three decimals; -1.0 when nothing was measured.
    pub fn failure_percent(&self) -> f64 {
        let total = self.total_entries();
        if total == 0 {
            return -1.0;
        }
        (100_000.0 * self.failures as f64 / total as f64).round() / 1000.0
    }

    /// Three-line table of shift magnitudes and their percentages up to the
    /// last non-zero bin, followed by the failure percentage. Empty when the
    /// histogram is empty.
    pub fn report(&self) -> String {
        let last_nonzero = match self.histogram.iter().rposition(|&count| count != 0) {
            Some(index) => index + 1,
            None => return String::new(),
        };
        let total = self.total_entries();

        let mut header = String::from("           Shift (pixels):");
        let mut rule = String::from("           ---------------");
        let mut percents = String::from("           Percent:       ");

        for magnitude in 0..last_nonzero {
            let _ = write!(header, "|{magnitude:7} ");
            rule.push_str("---------");
            let percent = 100.0 * self.histogram[magnitude] as f64 / total as f64;
            let _ = write!(percents, "|{percent:7.3} ");
        }
        header.push('|');
        rule.push('-');
        percents.push('|');

        format!(
            "{header}\n{rule}\n{percents}\n\n           Failed shift measurements: {:7.3} %",
            self.failure_percent()
        )
    }
}
