//! Per-frame sensor access.
//!
//! A depth sensor delivers one [`SensorFrame`] at a time. The frame exposes
//! the camera's tracking state, calibration and pose, plus scoped access to
//! its depth and confidence planes.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::camera::{CameraIntrinsics, CameraPose};
use crate::depth::{decode_depth_le, ConfidenceImage, DepthImage};
use crate::error::{SensorError, SensorResult};

/// Motion-tracking state reported by the sensor session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TrackingState {
    /// The pose is valid for this frame.
    Tracking,
    /// Tracking was lost temporarily; the pose is unreliable.
    #[default]
    Paused,
    /// Tracking has stopped and will not resume.
    Stopped,
}

impl TrackingState {
    /// Returns true if the pose can be trusted.
    #[must_use]
    pub const fn is_tracking(self) -> bool {
        matches!(self, Self::Tracking)
    }
}

/// One frame delivered by a depth-sensing session.
///
/// Image accessors return views that borrow from the frame. Implementations
/// backed by a native SDK lock the image on acquisition and release it when
/// the frame (and every view into it) is dropped.
pub trait SensorFrame {
    /// Capture time in nanoseconds since session start.
    fn timestamp_ns(&self) -> u64;

    /// Tracking state of the camera when the frame was captured.
    fn tracking_state(&self) -> TrackingState;

    /// Intrinsics of the depth image.
    fn intrinsics(&self) -> CameraIntrinsics;

    /// Camera-to-world transform.
    fn camera_pose(&self) -> CameraPose;

    /// Acquires the depth plane.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::NotYetAvailable`] when the sensor has not
    /// produced depth for this frame.
    fn acquire_depth(&self) -> SensorResult<DepthImage<'_>>;

    /// Acquires the confidence plane.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::NotYetAvailable`] when the sensor has not
    /// produced confidence for this frame.
    fn acquire_confidence(&self) -> SensorResult<ConfidenceImage<'_>>;
}

/// A frame whose planes are owned in memory.
///
/// Used for replaying recorded sessions and in tests.
///
/// # Example
///
/// ```
/// use sensor_types::{CameraIntrinsics, CameraPose, CapturedFrame, SensorFrame, TrackingState};
///
/// let frame = CapturedFrame::new(2, 1, vec![1000, 1200], vec![255, 255])
///     .unwrap()
///     .with_intrinsics(CameraIntrinsics::new(100.0, 100.0, 1.0, 0.5));
/// assert_eq!(frame.tracking_state(), TrackingState::Tracking);
/// assert_eq!(frame.acquire_depth().unwrap().get(1, 0), Some(1200));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedFrame {
    /// Capture time in nanoseconds.
    pub timestamp_ns: u64,
    /// Tracking state.
    pub tracking: TrackingState,
    /// Depth intrinsics.
    pub intrinsics: CameraIntrinsics,
    /// Camera-to-world transform.
    pub pose: CameraPose,
    width: u32,
    height: u32,
    depth_mm: Option<Vec<u16>>,
    confidence: Option<Vec<u8>>,
}

impl CapturedFrame {
    /// Creates a tracked frame at the identity pose.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::BufferSizeMismatch`] if either plane is not
    /// `width * height` pixels.
    pub fn new(
        width: u32,
        height: u32,
        depth_mm: Vec<u16>,
        confidence: Vec<u8>,
    ) -> SensorResult<Self> {
        let expected = width as usize * height as usize;
        for actual in [depth_mm.len(), confidence.len()] {
            if actual != expected {
                return Err(SensorError::buffer_mismatch(expected, actual));
            }
        }
        Ok(Self {
            timestamp_ns: 0,
            tracking: TrackingState::Tracking,
            intrinsics: CameraIntrinsics::ideal(1.0, width, height),
            pose: CameraPose::identity(),
            width,
            height,
            depth_mm: Some(depth_mm),
            confidence: Some(confidence),
        })
    }

    /// Creates a frame from a little-endian depth byte buffer.
    ///
    /// # Errors
    ///
    /// Returns an error on odd byte counts or mismatched plane sizes.
    pub fn from_le_bytes(
        width: u32,
        height: u32,
        depth_bytes: &[u8],
        confidence: Vec<u8>,
    ) -> SensorResult<Self> {
        Self::new(width, height, decode_depth_le(depth_bytes)?, confidence)
    }

    /// Creates a frame whose images have not been produced yet.
    #[must_use]
    pub fn pending(width: u32, height: u32) -> Self {
        Self {
            timestamp_ns: 0,
            tracking: TrackingState::Tracking,
            intrinsics: CameraIntrinsics::ideal(1.0, width, height),
            pose: CameraPose::identity(),
            width,
            height,
            depth_mm: None,
            confidence: None,
        }
    }

    /// Sets the intrinsics.
    #[must_use]
    pub const fn with_intrinsics(mut self, intrinsics: CameraIntrinsics) -> Self {
        self.intrinsics = intrinsics;
        self
    }

    /// Sets the pose.
    #[must_use]
    pub const fn with_pose(mut self, pose: CameraPose) -> Self {
        self.pose = pose;
        self
    }

    /// Sets the tracking state.
    #[must_use]
    pub const fn with_tracking(mut self, tracking: TrackingState) -> Self {
        self.tracking = tracking;
        self
    }

    /// Sets the timestamp.
    #[must_use]
    pub const fn with_timestamp_ns(mut self, timestamp_ns: u64) -> Self {
        self.timestamp_ns = timestamp_ns;
        self
    }
}

impl SensorFrame for CapturedFrame {
    fn timestamp_ns(&self) -> u64 {
        self.timestamp_ns
    }

    fn tracking_state(&self) -> TrackingState {
        self.tracking
    }

    fn intrinsics(&self) -> CameraIntrinsics {
        self.intrinsics
    }

    fn camera_pose(&self) -> CameraPose {
        self.pose
    }

    fn acquire_depth(&self) -> SensorResult<DepthImage<'_>> {
        let data = self
            .depth_mm
            .as_deref()
            .ok_or(SensorError::not_available("depth"))?;
        DepthImage::new(self.width, self.height, data)
    }

    fn acquire_confidence(&self) -> SensorResult<ConfidenceImage<'_>> {
        let data = self
            .confidence
            .as_deref()
            .ok_or(SensorError::not_available("confidence"))?;
        ConfidenceImage::new(self.width, self.height, data)
    }
}
