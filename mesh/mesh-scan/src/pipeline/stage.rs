//! Pipeline stages and the hooks observed between them.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

/// One step of reconstruction, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Stage {
    /// Voxel-grid downsample.
    Downsample,
    /// Statistical outlier removal.
    OutlierRemoval,
    /// Normal estimation.
    NormalEstimation,
    /// Surface reconstruction.
    Reconstruction,
    /// Mesh repair.
    Repair,
    /// Laplacian smoothing.
    Smoothing,
    /// Quadric decimation.
    Decimation,
    /// Metric scaling.
    Scaling,
}

impl Stage {
    /// Every stage in order.
    pub const ALL: [Self; 8] = [
        Self::Downsample,
        Self::OutlierRemoval,
        Self::NormalEstimation,
        Self::Reconstruction,
        Self::Repair,
        Self::Smoothing,
        Self::Decimation,
        Self::Scaling,
    ];

    /// Overall progress reported when the stage starts.
    #[must_use]
    pub const fn progress(self) -> f32 {
        match self {
            Self::Downsample => 0.05,
            Self::OutlierRemoval => 0.15,
            Self::NormalEstimation => 0.25,
            Self::Reconstruction => 0.45,
            Self::Repair => 0.60,
            Self::Smoothing => 0.72,
            Self::Decimation => 0.85,
            Self::Scaling => 1.0,
        }
    }

    /// Lowercase name for logs and messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Downsample => "downsample",
            Self::OutlierRemoval => "outlier_removal",
            Self::NormalEstimation => "normal_estimation",
            Self::Reconstruction => "reconstruction",
            Self::Repair => "repair",
            Self::Smoothing => "smoothing",
            Self::Decimation => "decimation",
            Self::Scaling => "scaling",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives progress as stages start.
///
/// Reporting is best-effort: a panic in [`report`](Self::report) is caught
/// and logged, and the run continues.
pub trait ProgressSink {
    /// Called on entry to `stage` with overall progress in `[0, 1]`.
    fn report(&self, stage: Stage, progress: f32);
}

impl<F: Fn(Stage, f32)> ProgressSink for F {
    fn report(&self, stage: Stage, progress: f32) {
        self(stage, progress);
    }
}

/// Discards progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&self, _stage: Stage, _progress: f32) {}
}

pub(crate) fn report_guarded(sink: &dyn ProgressSink, stage: Stage) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| sink.report(stage, stage.progress())));
    if outcome.is_err() {
        warn!(%stage, "Progress sink panicked; continuing");
    }
}

/// Cooperative cancellation flag shared between a caller and a running
/// pipeline. Checked before every stage.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// A token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// True once [`cancel`](Self::cancel) was called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
