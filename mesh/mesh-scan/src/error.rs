//! Error types for capture sessions and reconstruction.

use mesh_io::IoError;
use mesh_kernels::KernelError;
use sensor_types::SensorError;
use thiserror::Error;

use crate::pipeline::Stage;

/// Result type for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// Session state violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    /// `stop_scan` was called with no scan running.
    #[error("no scan in progress")]
    NotScanning,

    /// `start_scan` was called while a scan is running.
    #[error("a scan is already in progress")]
    AlreadyScanning,
}

/// Reasons a reconstruction run ends without a mesh.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The configuration was rejected before any stage ran.
    #[error("invalid pipeline configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with it.
        reason: String,
    },

    /// The input cloud has no points.
    #[error("input point cloud is empty")]
    EmptyCloud,

    /// A kernel failed; no partial mesh is returned.
    #[error("stage '{stage}' failed: {source}")]
    StageFailed {
        /// The stage that was running.
        stage: Stage,
        /// The kernel error.
        #[source]
        source: KernelError,
    },

    /// The run was cancelled before `stage` started.
    #[error("reconstruction cancelled before stage '{stage}'")]
    Cancelled {
        /// The stage that did not run.
        stage: Stage,
    },

    /// The worker thread could not be started.
    #[error("failed to start reconstruction worker: {0}")]
    Spawn(#[source] std::io::Error),

    /// The worker thread panicked.
    #[error("reconstruction worker panicked")]
    WorkerPanicked,
}

impl PipelineError {
    /// Creates an invalid-configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns true for [`PipelineError::Cancelled`].
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Any failure surfaced by this crate.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Session misuse.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Reconstruction failure.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// A kernel called outside the pipeline failed.
    #[error(transparent)]
    Kernel(#[from] KernelError),

    /// Export or persistence failure.
    #[error(transparent)]
    Io(#[from] IoError),

    /// The sensor frame could not be read.
    #[error(transparent)]
    Sensor(#[from] SensorError),
}
