//! Depth-camera frame types for CortenForge scanning.
//!
//! This crate provides the raw sensor-side types consumed by `mesh-scan`:
//! - [`DepthImage`] / [`ConfidenceImage`] - co-registered single-plane images
//! - [`CameraIntrinsics`] - pinhole calibration of the depth image
//! - [`CameraPose`] - camera-to-world transform (4×4, column-major)
//! - [`TrackingState`] - motion-tracking status of the session
//! - [`SensorFrame`] - the per-frame collaborator contract
//! - [`CapturedFrame`] - an owned in-memory frame for replay and tests
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with no engine or SDK dependencies. Real sensor
//! integrations implement [`SensorFrame`] on top of their native handles.
//!
//! # Depth Convention
//!
//! Depth pixels are unsigned 16-bit millimeters. The camera looks down its
//! local -Z axis; +X is right and +Y follows image rows.
//!
//! # Example
//!
//! ```
//! use sensor_types::{CapturedFrame, SensorFrame};
//!
//! let frame = CapturedFrame::new(2, 2, vec![500; 4], vec![255; 4]).unwrap();
//! let depth = frame.acquire_depth().unwrap();
//! assert_eq!(depth.pixel_count(), 4);
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod camera;
mod depth;
mod error;
mod frame;

pub use camera::{CameraIntrinsics, CameraPose};
pub use depth::{decode_depth_le, ConfidenceImage, DepthImage, ImageView};
pub use error::{SensorError, SensorResult};
pub use frame::{CapturedFrame, SensorFrame, TrackingState};

// Re-export nalgebra so downstream crates agree on the version.
pub use nalgebra;
