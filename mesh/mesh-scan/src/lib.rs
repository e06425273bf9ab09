//! Depth-scan capture and mesh reconstruction.
//!
//! - **Capture** - back-project depth frames, accumulate them, track quality
//! - **Calibration** - derive a metric scale from two picked points
//! - **Registration** - rigidly align one scan onto another
//! - **Reconstruction** - the staged point cloud to mesh pipeline
//!
//! Every numerical step goes through an injected
//! [`MeshKernels`](mesh_kernels::MeshKernels) backend.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use mesh_kernels::{CpuKernels, KernelConfig, MeshKernels};
//! use mesh_scan::ScanSession;
//! use sensor_types::{CameraIntrinsics, CapturedFrame};
//!
//! let kernels: Arc<dyn MeshKernels> =
//!     Arc::new(CpuKernels::initialize(KernelConfig::default()).unwrap());
//!
//! let mut session = ScanSession::new(kernels);
//! session.start_scan().unwrap();
//!
//! let frame = CapturedFrame::new(4, 4, vec![800; 16], vec![255; 16])
//!     .unwrap()
//!     .with_intrinsics(CameraIntrinsics::new(200.0, 200.0, 2.0, 2.0));
//! session.process_frame(&frame);
//!
//! let scan = session.stop_scan().unwrap();
//! assert_eq!(scan.cloud.len(), 16);
//! ```
//!
//! Reconstruction usually runs off the capture thread:
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use mesh_kernels::{CpuKernels, KernelConfig};
//! # use mesh_types::PointCloud;
//! use mesh_scan::{PipelineConfig, ReconstructionPipeline, Stage};
//!
//! # let kernels = Arc::new(CpuKernels::initialize(KernelConfig::default()).unwrap());
//! # let cloud = PointCloud::new();
//! let pipeline = ReconstructionPipeline::new(kernels);
//! let handle = pipeline
//!     .spawn(cloud, PipelineConfig::default(), |stage: Stage, p: f32| {
//!         println!("{stage}: {:.0}%", p * 100.0);
//!     })
//!     .unwrap();
//! let result = handle.join().unwrap();
//! println!("{result}");
//! ```
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`backproject`] | Depth pixels to world points |
//! | [`accumulator`] | Frame accumulation with periodic voxel downsampling |
//! | [`session`] | Scan lifecycle and metadata |
//! | [`quality`] | Live quality heuristic |
//! | [`calibration`] | Two-point scale estimation |
//! | [`registration`] | ICP alignment |
//! | [`pipeline`] | Reconstruction stages, progress, cancellation |

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod accumulator;
pub mod backproject;
pub mod calibration;
pub mod pipeline;
pub mod quality;
pub mod registration;
pub mod session;

mod error;

#[cfg(test)]
mod testing;

pub use accumulator::{AccumulatorParams, PointCloudAccumulator, MAX_ACCUMULATED_POINTS};
pub use backproject::{BackProjectionParams, FrameBackProjector};
pub use calibration::{CalibrationEstimator, CalibrationState};
pub use error::{PipelineError, ScanError, ScanResult, SessionError};
pub use pipeline::{
    CancellationToken, NullProgress, PipelineConfig, PipelineHandle, PipelineResult, ProgressSink,
    ReconstructionMethod, ReconstructionPipeline, Stage,
};
pub use quality::{QualityLevel, QualityModel};
pub use registration::{IcpParams, ScanAligner};
pub use session::{CapturedScan, ScanId, ScanMetadata, ScanSession, ScanState};
