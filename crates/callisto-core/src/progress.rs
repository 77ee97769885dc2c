use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Fire-and-forget progress notification with the current activity and a
/// percentage in 0..=100.
///
/// The engine never depends on delivery timing; passing no sink at all is
/// always legal.
pub trait ProgressSink: Send + Sync {
    fn report(&self, activity: &str, percent: u32);
}

/// Cooperative cancellation flag shared between the engine and its caller.
///
/// The engine checks the flag between frames and between alignment points
/// within a frame; once set, it returns early and partial state is dropped
/// with the engine value.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Percent value for the `index`-th item of `total`, snapped to 10% steps.
pub(crate) fn coarse_percent(index: usize, total: usize) -> u32 {
    ((10.0 * index as f64 / total as f64).round() as u32) * 10
}
