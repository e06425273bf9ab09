//! Scan session lifecycle: Idle → Scanning → Idle.
//!
//! A [`ScanSession`] owns the back-projector and the accumulator. Frames are
//! fed with [`ScanSession::process_frame`]; `&mut self` receivers make
//! overlapping frame processing impossible.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mesh_io::ScanStore;
use mesh_kernels::MeshKernels;
use mesh_types::PointCloud;
use sensor_types::SensorFrame;
use tracing::{debug, info};
use uuid::Uuid;

use crate::accumulator::{AccumulatorParams, PointCloudAccumulator};
use crate::backproject::{BackProjectionParams, FrameBackProjector};
use crate::error::{ScanResult, SessionError};
use crate::quality::{QualityLevel, QualityModel};

/// Unique identifier of a scan (UUID v4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ScanId(Uuid);

impl ScanId {
    /// A fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ScanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Live view of the current (or last) scan.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanState {
    /// Id of the scan; `None` before the first start.
    pub scan_id: Option<ScanId>,
    /// True between start and stop.
    pub is_scanning: bool,
    /// Points held by the accumulator.
    pub point_count: usize,
    /// Frames accumulated.
    pub frame_count: u32,
    /// Coverage estimate in `[0, 1]`.
    pub coverage: f32,
    /// Quality score in `[0, 1]`.
    pub quality: f32,
    /// Quality bucket.
    pub quality_level: QualityLevel,
}

/// Bookkeeping of a finished scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanMetadata {
    /// Frames offered while scanning.
    pub total_frames: u32,
    /// Frames that produced points.
    pub accepted_frames: u32,
    /// Frames without usable data.
    pub dropped_frames: u32,
    /// Wall time from start to stop.
    pub duration: Duration,
}

/// Result of [`ScanSession::stop_scan`].
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedScan {
    /// Id of the scan.
    pub scan_id: ScanId,
    /// Downsampled accumulated cloud.
    pub cloud: PointCloud,
    /// Frame statistics and duration.
    pub metadata: ScanMetadata,
    /// Final session state.
    pub state: ScanState,
}

impl CapturedScan {
    /// Stores the cloud under the scan id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the write.
    pub fn persist(&self, store: &dyn ScanStore) -> ScanResult<()> {
        store.save_points(&self.scan_id.to_string(), &self.cloud)?;
        Ok(())
    }
}

/// Drives one scan at a time.
#[derive(Debug)]
pub struct ScanSession {
    projector: FrameBackProjector,
    accumulator: PointCloudAccumulator,
    quality: QualityModel,
    state: ScanState,
    started_at: Option<Instant>,
    frames_seen: u32,
    frames_accepted: u32,
}

impl ScanSession {
    /// An idle session with default parameters.
    #[must_use]
    pub fn new(kernels: Arc<dyn MeshKernels>) -> Self {
        Self {
            projector: FrameBackProjector::default(),
            accumulator: PointCloudAccumulator::new(kernels),
            quality: QualityModel::default(),
            state: ScanState::default(),
            started_at: None,
            frames_seen: 0,
            frames_accepted: 0,
        }
    }

    /// Replaces the back-projection thresholds.
    #[must_use]
    pub fn with_back_projection(mut self, params: BackProjectionParams) -> Self {
        self.projector = FrameBackProjector::new(params);
        self
    }

    /// Replaces the accumulator parameters.
    #[must_use]
    pub fn with_accumulator(
        mut self,
        kernels: Arc<dyn MeshKernels>,
        params: AccumulatorParams,
    ) -> Self {
        self.accumulator = PointCloudAccumulator::with_params(kernels, params);
        self
    }

    /// Replaces the quality heuristic.
    #[must_use]
    pub const fn with_quality_model(mut self, model: QualityModel) -> Self {
        self.quality = model;
        self
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &ScanState {
        &self.state
    }

    /// True while scanning.
    #[must_use]
    pub const fn is_scanning(&self) -> bool {
        self.state.is_scanning
    }

    /// Starts a new scan, discarding anything accumulated before.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadyScanning`] if a scan is running.
    pub fn start_scan(&mut self) -> Result<ScanId, SessionError> {
        if self.state.is_scanning {
            return Err(SessionError::AlreadyScanning);
        }
        self.accumulator.reset();
        self.frames_seen = 0;
        self.frames_accepted = 0;
        self.started_at = Some(Instant::now());

        let scan_id = ScanId::new();
        self.state = ScanState {
            scan_id: Some(scan_id),
            is_scanning: true,
            ..ScanState::default()
        };
        info!(%scan_id, "Scan started");
        Ok(scan_id)
    }

    /// Feeds one frame. Returns true if the frame was readable, even when
    /// every pixel was rejected.
    ///
    /// Ignored while idle. Frames without tracking or data are counted as
    /// dropped.
    pub fn process_frame<F: SensorFrame + ?Sized>(&mut self, frame: &F) -> bool {
        if !self.state.is_scanning {
            return false;
        }
        self.frames_seen += 1;

        let Some(cloud) = self.projector.process_frame(frame) else {
            debug!(frame = self.frames_seen, "Frame dropped");
            return false;
        };
        self.frames_accepted += 1;
        self.accumulator.add_frame(cloud);
        self.refresh_metrics();
        true
    }

    /// Ends the scan and returns the accumulated cloud.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotScanning`] if no scan is running.
    pub fn stop_scan(&mut self) -> Result<CapturedScan, SessionError> {
        let Some(scan_id) = self.state.scan_id.filter(|_| self.state.is_scanning) else {
            return Err(SessionError::NotScanning);
        };

        let cloud = self.accumulator.accumulated_cloud();
        self.refresh_metrics();
        self.state.is_scanning = false;

        let metadata = ScanMetadata {
            total_frames: self.frames_seen,
            accepted_frames: self.frames_accepted,
            dropped_frames: self.frames_seen - self.frames_accepted,
            duration: self.started_at.take().map_or(Duration::ZERO, |t| t.elapsed()),
        };
        info!(
            %scan_id,
            points = cloud.len(),
            frames = metadata.accepted_frames,
            dropped = metadata.dropped_frames,
            duration = ?metadata.duration,
            quality = %self.state.quality_level,
            "Scan stopped"
        );

        Ok(CapturedScan {
            scan_id,
            cloud,
            metadata,
            state: self.state.clone(),
        })
    }

    fn refresh_metrics(&mut self) {
        let points = self.accumulator.point_count();
        let frames = self.accumulator.frame_count();
        let quality = self.quality.quality(points, frames);
        self.state.point_count = points;
        self.state.frame_count = frames;
        self.state.coverage = self.quality.coverage(points);
        self.state.quality = quality;
        self.state.quality_level = self.quality.level(quality);
    }
}
