//! Incremental point accumulation across frames.

use std::fmt;
use std::sync::Arc;

use mesh_kernels::MeshKernels;
use mesh_types::PointCloud;
use tracing::{debug, warn};

/// Voxel edge used when thinning the accumulated cloud, in meters.
pub const VOXEL_SIZE_M: f32 = 0.002;

/// Upper bound on the accumulated cloud once downsampling has run.
pub const MAX_ACCUMULATED_POINTS: usize = 2_000_000;

/// Tuning for [`PointCloudAccumulator`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AccumulatorParams {
    /// Voxel size of the periodic downsample (default: 0.002 m).
    pub voxel_size: f32,
    /// Downsample after every this many frames (default: 10).
    pub downsample_every: u32,
    /// Clouds smaller than this are never downsampled (default: 1000).
    pub min_points: usize,
    /// Hard cap applied after each downsample (default: 2 000 000).
    pub max_points: usize,
}

impl Default for AccumulatorParams {
    fn default() -> Self {
        Self {
            voxel_size: VOXEL_SIZE_M,
            downsample_every: 10,
            min_points: 1000,
            max_points: MAX_ACCUMULATED_POINTS,
        }
    }
}

impl AccumulatorParams {
    /// Sets the voxel size.
    #[must_use]
    pub const fn with_voxel_size(mut self, voxel_size: f32) -> Self {
        self.voxel_size = voxel_size;
        self
    }

    /// Sets the downsample period in frames.
    #[must_use]
    pub const fn with_downsample_every(mut self, frames: u32) -> Self {
        self.downsample_every = frames;
        self
    }

    /// Sets the minimum size for downsampling.
    #[must_use]
    pub const fn with_min_points(mut self, min_points: usize) -> Self {
        self.min_points = min_points;
        self
    }

    /// Sets the point cap.
    #[must_use]
    pub const fn with_max_points(mut self, max_points: usize) -> Self {
        self.max_points = max_points;
        self
    }
}

/// Collects back-projected frames into one world-space cloud.
///
/// Points are appended as frames arrive and the whole set is voxel-filtered
/// every [`AccumulatorParams::downsample_every`] frames, so
/// [`point_count`](Self::point_count) can include duplicates from the most
/// recent frames.
pub struct PointCloudAccumulator {
    kernels: Arc<dyn MeshKernels>,
    params: AccumulatorParams,
    cloud: PointCloud,
    frame_count: u32,
}

impl fmt::Debug for PointCloudAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointCloudAccumulator")
            .field("params", &self.params)
            .field("points", &self.cloud.len())
            .field("frame_count", &self.frame_count)
            .finish_non_exhaustive()
    }
}

impl PointCloudAccumulator {
    /// Creates an empty accumulator with default parameters.
    #[must_use]
    pub fn new(kernels: Arc<dyn MeshKernels>) -> Self {
        Self::with_params(kernels, AccumulatorParams::default())
    }

    /// Creates an empty accumulator.
    #[must_use]
    pub fn with_params(kernels: Arc<dyn MeshKernels>, params: AccumulatorParams) -> Self {
        Self {
            kernels,
            params,
            cloud: PointCloud::new(),
            frame_count: 0,
        }
    }

    /// The parameters in use.
    #[must_use]
    pub const fn params(&self) -> &AccumulatorParams {
        &self.params
    }

    /// Appends a frame's points.
    pub fn add_frame(&mut self, mut frame: PointCloud) {
        self.cloud.append(&mut frame);
        self.frame_count += 1;
        debug!(frame = self.frame_count, points = self.cloud.len(), "Accumulated frame");

        let every = self.params.downsample_every;
        if every > 0 && self.frame_count % every == 0 {
            self.downsample();
        }
    }

    /// Voxel-filters the accumulated points, then caps them at
    /// [`AccumulatorParams::max_points`].
    ///
    /// Does nothing below [`AccumulatorParams::min_points`]. A kernel
    /// failure keeps the unfiltered points.
    pub fn downsample(&mut self) {
        if self.cloud.len() < self.params.min_points {
            return;
        }

        let before = self.cloud.len();
        match self.kernels.voxel_grid_filter(&self.cloud, self.params.voxel_size) {
            Ok(filtered) => self.cloud = filtered,
            Err(e) => warn!(error = %e, points = before, "Downsample failed, keeping points"),
        }

        if self.cloud.len() > self.params.max_points {
            self.cloud = thin_uniformly(&self.cloud, self.params.max_points);
        }
        debug!(before, after = self.cloud.len(), "Downsampled accumulated cloud");
    }

    /// Downsamples once more and returns a snapshot.
    pub fn accumulated_cloud(&mut self) -> PointCloud {
        self.downsample();
        self.cloud.clone()
    }

    /// Points currently held.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.cloud.len()
    }

    /// Frames added since the last reset.
    #[must_use]
    pub const fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Discards all points and the frame counter.
    pub fn reset(&mut self) {
        self.cloud.clear();
        self.frame_count = 0;
    }
}

/// Keeps `target` points spread evenly over the input order.
fn thin_uniformly(cloud: &PointCloud, target: usize) -> PointCloud {
    (0..target)
        .filter_map(|i| cloud.points.get(thinned_index(i, cloud.len(), target)?).copied())
        .collect()
}

/// `i * n / target` in 64-bit so it cannot overflow a 32-bit `usize`.
fn thinned_index(i: usize, n: usize, target: usize) -> Option<usize> {
    let wide = (i as u64).checked_mul(n as u64)? / (target as u64).max(1);
    usize::try_from(wide).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::cast_precision_loss)]
mod tests {
    use super::*;
    use crate::testing::MockKernels;
    use mesh_types::Point3;

    fn frame(n: usize, offset: f32) -> PointCloud {
        (0..n).map(|i| Point3::new(i as f32 + offset, 0.0, 0.0)).collect()
    }

    #[test]
    fn downsamples_every_tenth_frame() {
        let kernels = Arc::new(MockKernels::new());
        let mut acc = PointCloudAccumulator::new(kernels.clone());
        for i in 0..9 {
            acc.add_frame(frame(200, i as f32));
        }
        assert_eq!(kernels.count("voxel_grid_filter"), 0);
        acc.add_frame(frame(200, 9.0));
        assert_eq!(kernels.count("voxel_grid_filter"), 1);
        assert_eq!(acc.frame_count(), 10);
        assert_eq!(acc.point_count(), 2000);
    }

    #[test]
    fn small_clouds_are_left_alone() {
        let kernels = Arc::new(MockKernels::new());
        let mut acc = PointCloudAccumulator::new(kernels.clone());
        acc.add_frame(frame(999, 0.0));
        let cloud = acc.accumulated_cloud();
        assert_eq!(cloud.len(), 999);
        assert_eq!(kernels.count("voxel_grid_filter"), 0);
    }

    #[test]
    fn cap_is_enforced() {
        let kernels = Arc::new(MockKernels::new());
        let params = AccumulatorParams::default().with_max_points(1500);
        let mut acc = PointCloudAccumulator::with_params(kernels, params);
        acc.add_frame(frame(4000, 0.0));
        let cloud = acc.accumulated_cloud();
        assert_eq!(cloud.len(), 1500);
        assert_eq!(cloud.points[0], Point3::new(0.0, 0.0, 0.0));
        assert!(cloud.points.windows(2).all(|w| w[0].x < w[1].x));
    }

    #[test]
    fn thinning_index_survives_large_products() {
        // 1_999_999 * 4_000_000 does not fit in 32 bits.
        assert_eq!(
            thinned_index(1_999_999, 4_000_000, MAX_ACCUMULATED_POINTS),
            Some(3_999_998)
        );
        assert_eq!(thinned_index(0, 4_000_000, MAX_ACCUMULATED_POINTS), Some(0));
        assert_eq!(thinned_index(7, 10, 0), Some(70));
    }

    #[test]
    fn kernel_failure_keeps_points() {
        let kernels = Arc::new(MockKernels::new().failing("voxel_grid_filter"));
        let mut acc = PointCloudAccumulator::new(kernels);
        acc.add_frame(frame(1200, 0.0));
        assert_eq!(acc.accumulated_cloud().len(), 1200);
    }

    #[test]
    fn identity_downsample_is_stable() {
        let kernels = Arc::new(MockKernels::new());
        let mut acc = PointCloudAccumulator::new(kernels);
        acc.add_frame(frame(1500, 0.0));
        let first = acc.accumulated_cloud();
        acc.downsample();
        assert_eq!(acc.accumulated_cloud(), first);
    }

    #[test]
    fn reset_clears_everything() {
        let mut acc = PointCloudAccumulator::new(Arc::new(MockKernels::new()));
        acc.add_frame(frame(10, 0.0));
        acc.reset();
        assert_eq!(acc.point_count(), 0);
        assert_eq!(acc.frame_count(), 0);
    }
}
