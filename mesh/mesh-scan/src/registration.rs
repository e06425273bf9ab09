//! Rigid alignment of one scan onto another.

use std::fmt;
use std::sync::Arc;

use mesh_kernels::MeshKernels;
use mesh_types::{Matrix4, PointCloud};
use tracing::debug;

use crate::error::ScanResult;

/// ICP stopping criteria.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IcpParams {
    /// Iteration cap (default: 50).
    pub max_iterations: u32,
    /// Stop when the RMS error changes by less than this (default: 1e-6).
    pub tolerance: f32,
}

impl Default for IcpParams {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            tolerance: 1e-6,
        }
    }
}

impl IcpParams {
    /// Sets the iteration cap.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the convergence tolerance.
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }
}

/// Aligns point clouds with the kernels' ICP.
pub struct ScanAligner {
    kernels: Arc<dyn MeshKernels>,
    params: IcpParams,
}

impl fmt::Debug for ScanAligner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanAligner")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl ScanAligner {
    /// Default stopping criteria.
    #[must_use]
    pub fn new(kernels: Arc<dyn MeshKernels>) -> Self {
        Self::with_params(kernels, IcpParams::default())
    }

    /// Custom stopping criteria.
    #[must_use]
    pub fn with_params(kernels: Arc<dyn MeshKernels>, params: IcpParams) -> Self {
        Self { kernels, params }
    }

    /// The stopping criteria.
    #[must_use]
    pub const fn params(&self) -> &IcpParams {
        &self.params
    }

    /// Transform taking `source` onto `target`.
    ///
    /// # Errors
    ///
    /// Returns the kernel error on empty clouds or numerical breakdown.
    pub fn align(&self, source: &PointCloud, target: &PointCloud) -> ScanResult<Matrix4<f32>> {
        let transform = self.kernels.icp_registration(
            source,
            target,
            self.params.max_iterations,
            self.params.tolerance,
        )?;
        debug!(
            source = source.len(),
            target = target.len(),
            translation = ?[transform[(0, 3)], transform[(1, 3)], transform[(2, 3)]],
            "Aligned scans"
        );
        Ok(transform)
    }

    /// Aligns `source` and moves its points onto `target`.
    ///
    /// # Errors
    ///
    /// See [`align`](Self::align); `source` is untouched on error.
    pub fn align_in_place(
        &self,
        source: &mut PointCloud,
        target: &PointCloud,
    ) -> ScanResult<Matrix4<f32>> {
        let transform = self.align(source, target)?;
        source.transform(&transform);
        Ok(transform)
    }
}
