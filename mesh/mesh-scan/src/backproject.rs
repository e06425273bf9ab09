//! Depth frame to world-space points.
//!
//! Each sampled pixel `(x, y)` with depth `d` (meters) becomes the camera
//! local point `((x - cx) / fx * d, (y - cy) / fy * d, -d)`, which is then
//! mapped into world space by the frame's camera pose. Pixels with low
//! confidence or depth outside the working range are skipped.

use mesh_types::{Point3, PointCloud};
use sensor_types::{ConfidenceImage, DepthImage, SensorError, SensorFrame};
use tracing::{debug, warn};

/// Confidence below which a pixel is rejected (0..=255).
pub const MIN_CONFIDENCE: u8 = 200;

/// Closest accepted depth in meters.
pub const MIN_DEPTH_M: f32 = 0.1;

/// Farthest accepted depth in meters.
pub const MAX_DEPTH_M: f32 = 3.0;

/// Target upper bound on points produced from one frame.
pub const MAX_POINTS_PER_FRAME: usize = 50_000;

/// Filter thresholds for back-projection.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BackProjectionParams {
    /// Minimum confidence (default: 200).
    pub min_confidence: u8,
    /// Minimum depth in meters (default: 0.1).
    pub min_depth_m: f32,
    /// Maximum depth in meters (default: 3.0).
    pub max_depth_m: f32,
    /// Sampling budget per frame (default: 50 000).
    pub max_points_per_frame: usize,
}

impl Default for BackProjectionParams {
    fn default() -> Self {
        Self {
            min_confidence: MIN_CONFIDENCE,
            min_depth_m: MIN_DEPTH_M,
            max_depth_m: MAX_DEPTH_M,
            max_points_per_frame: MAX_POINTS_PER_FRAME,
        }
    }
}

impl BackProjectionParams {
    /// Sets the confidence threshold.
    #[must_use]
    pub const fn with_min_confidence(mut self, min_confidence: u8) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// Sets the accepted depth range in meters.
    #[must_use]
    pub const fn with_depth_range(mut self, min_m: f32, max_m: f32) -> Self {
        self.min_depth_m = min_m;
        self.max_depth_m = max_m;
        self
    }

    /// Sets the per-frame sampling budget.
    #[must_use]
    pub const fn with_max_points_per_frame(mut self, max_points: usize) -> Self {
        self.max_points_per_frame = max_points;
        self
    }

    /// Pixel step applied on both axes for a `width × height` image.
    #[must_use]
    pub fn stride(&self, width: u32, height: u32) -> u32 {
        let pixels = width as usize * height as usize;
        let stride = pixels / self.max_points_per_frame.max(1);
        u32::try_from(stride.max(1)).unwrap_or(u32::MAX)
    }
}

/// Turns sensor frames into world-space point clouds.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameBackProjector {
    params: BackProjectionParams,
}

impl FrameBackProjector {
    /// Creates a projector with the given thresholds.
    #[must_use]
    pub const fn new(params: BackProjectionParams) -> Self {
        Self { params }
    }

    /// The thresholds in use.
    #[must_use]
    pub const fn params(&self) -> &BackProjectionParams {
        &self.params
    }

    /// Back-projects one frame.
    ///
    /// Returns `None` when the camera is not tracking, either image is not
    /// available yet, or the images and intrinsics are unusable. An empty
    /// cloud means the frame was readable but every pixel was rejected.
    pub fn process_frame<F: SensorFrame + ?Sized>(&self, frame: &F) -> Option<PointCloud> {
        let tracking = frame.tracking_state();
        if !tracking.is_tracking() {
            debug!(?tracking, "Skipping frame without tracking");
            return None;
        }

        // Both guards live until the end of this scope.
        let depth = match frame.acquire_depth() {
            Ok(depth) => depth,
            Err(e) => return Self::unavailable(&e),
        };
        let confidence = match frame.acquire_confidence() {
            Ok(confidence) => confidence,
            Err(e) => return Self::unavailable(&e),
        };

        let intrinsics = frame.intrinsics();
        if let Err(e) = intrinsics.validate() {
            warn!(error = %e, "Dropping frame with unusable intrinsics");
            return None;
        }
        if depth.dimensions() != confidence.dimensions() {
            warn!(
                depth = ?depth.dimensions(),
                confidence = ?confidence.dimensions(),
                "Dropping frame with mismatched image sizes"
            );
            return None;
        }

        let pose = frame.camera_pose();
        let cloud = self.project(&depth, &confidence, |x, y, d| {
            let local = Point3::new(
                (x - intrinsics.cx) / intrinsics.fx * d,
                (y - intrinsics.cy) / intrinsics.fy * d,
                -d,
            );
            pose.transform_point(&local)
        });
        debug!(points = cloud.len(), timestamp_ns = frame.timestamp_ns(), "Back-projected frame");
        Some(cloud)
    }

    #[allow(clippy::cast_precision_loss)]
    fn project(
        &self,
        depth: &DepthImage<'_>,
        confidence: &ConfidenceImage<'_>,
        to_world: impl Fn(f32, f32, f32) -> Point3<f32>,
    ) -> PointCloud {
        let (width, height) = depth.dimensions();
        let stride = self.params.stride(width, height) as usize;
        let depths = depth.as_slice();
        let scores = confidence.as_slice();
        let mut cloud = PointCloud::new();

        for y in (0..height).step_by(stride) {
            for x in (0..width).step_by(stride) {
                let idx = y as usize * width as usize + x as usize;
                let (Some(&score), Some(&mm)) = (scores.get(idx), depths.get(idx)) else {
                    continue;
                };
                if score < self.params.min_confidence {
                    continue;
                }
                let d = f32::from(mm) / 1000.0;
                if d < self.params.min_depth_m || d > self.params.max_depth_m {
                    continue;
                }
                cloud.push(to_world(x as f32, y as f32, d));
            }
        }
        cloud
    }

    fn unavailable(err: &SensorError) -> Option<PointCloud> {
        match err {
            SensorError::NotYetAvailable { image } => {
                debug!(image, "Frame image not yet available");
            }
            other => warn!(error = %other, "Dropping frame with unreadable image"),
        }
        None
    }
}
