//! Numerical kernels for point cloud cleanup and surface reconstruction.
//!
//! The scan pipeline treats every heavy numerical step as an opaque
//! primitive behind the [`MeshKernels`] trait. Pipelines hold an
//! `Arc<dyn MeshKernels>`, so sequencing logic can be tested with
//! deterministic stand-ins and a native backend can be swapped in without
//! touching the callers.
//!
//! | Operation | Input | Output |
//! |-----------|-------|--------|
//! | [`voxel_grid_filter`](MeshKernels::voxel_grid_filter) | points | points |
//! | [`statistical_outlier_removal`](MeshKernels::statistical_outlier_removal) | points | points |
//! | [`estimate_normals`](MeshKernels::estimate_normals) | points | oriented points |
//! | [`poisson_reconstruction`](MeshKernels::poisson_reconstruction) | oriented points | mesh |
//! | [`marching_cubes_reconstruction`](MeshKernels::marching_cubes_reconstruction) | oriented points | mesh |
//! | [`repair_mesh`](MeshKernels::repair_mesh) | mesh | mesh |
//! | [`smooth_mesh`](MeshKernels::smooth_mesh) | mesh | mesh |
//! | [`decimate_mesh`](MeshKernels::decimate_mesh) | mesh | mesh |
//! | [`icp_registration`](MeshKernels::icp_registration) | points × 2 | 4×4 transform |
//!
//! # Reference Backend
//!
//! [`CpuKernels`] implements every operation in pure Rust on a dedicated
//! rayon pool. It is created once with [`CpuKernels::initialize`] and passed
//! down explicitly; there is no global registration.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use mesh_kernels::{CpuKernels, KernelConfig, MeshKernels};
//! use mesh_types::{PointCloud, Point3};
//!
//! let kernels: Arc<dyn MeshKernels> =
//!     Arc::new(CpuKernels::initialize(KernelConfig::default()).unwrap());
//!
//! let cloud: PointCloud = (0..10)
//!     .map(|i| Point3::new(i as f32 * 0.0001, 0.0, 0.0))
//!     .collect();
//! let filtered = kernels.voxel_grid_filter(&cloud, 0.01).unwrap();
//! assert_eq!(filtered.len(), 1);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod cpu;
mod error;

pub use cpu::{CpuKernels, KernelConfig};
pub use error::{KernelError, KernelResult};

use mesh_types::{Matrix4, OrientedCloud, PointCloud, SerializedMesh};

/// The numerical primitives the reconstruction pipeline delegates to.
///
/// Implementations must be shareable across threads: the pipeline runs on
/// a worker thread while the capture path keeps using the same backend for
/// accumulation.
pub trait MeshKernels: Send + Sync {
    /// Replace all points inside each cubic cell of edge `voxel_size` by
    /// their centroid.
    ///
    /// # Errors
    ///
    /// Fails if `voxel_size` is not positive and finite.
    fn voxel_grid_filter(&self, cloud: &PointCloud, voxel_size: f32) -> KernelResult<PointCloud>;

    /// Drop points whose mean distance to their `k_neighbors` nearest
    /// neighbours exceeds the global mean by more than `std_ratio` standard
    /// deviations.
    ///
    /// # Errors
    ///
    /// Fails on invalid parameters.
    fn statistical_outlier_removal(
        &self,
        cloud: &PointCloud,
        k_neighbors: usize,
        std_ratio: f32,
    ) -> KernelResult<PointCloud>;

    /// Estimate a unit normal per point from its `k_neighbors` neighbourhood.
    ///
    /// # Errors
    ///
    /// Fails on an empty cloud or invalid `k_neighbors`.
    fn estimate_normals(
        &self,
        cloud: &PointCloud,
        k_neighbors: usize,
    ) -> KernelResult<OrientedCloud>;

    /// Depth-controlled implicit surface reconstruction.
    ///
    /// # Errors
    ///
    /// Fails on an empty cloud, an invalid depth, or when no surface is found.
    fn poisson_reconstruction(
        &self,
        cloud: &OrientedCloud,
        depth: u32,
    ) -> KernelResult<SerializedMesh>;

    /// Voxel-size-controlled isosurface reconstruction.
    ///
    /// # Errors
    ///
    /// Fails on an empty cloud, an invalid voxel size, or when no surface is found.
    fn marching_cubes_reconstruction(
        &self,
        cloud: &OrientedCloud,
        voxel_size: f32,
    ) -> KernelResult<SerializedMesh>;

    /// Close holes and fix non-manifold geometry.
    ///
    /// # Errors
    ///
    /// Fails on an empty mesh.
    fn repair_mesh(&self, mesh: &SerializedMesh) -> KernelResult<SerializedMesh>;

    /// Laplacian smoothing: `iterations` passes with step `lambda`.
    ///
    /// # Errors
    ///
    /// Fails if `lambda` is outside `(0, 1]`.
    fn smooth_mesh(
        &self,
        mesh: &SerializedMesh,
        iterations: u32,
        lambda: f32,
    ) -> KernelResult<SerializedMesh>;

    /// Reduce the triangle count to about `ratio` of the input. A ratio of
    /// 1 or more leaves the mesh unchanged.
    ///
    /// # Errors
    ///
    /// Fails if `ratio` is not positive.
    fn decimate_mesh(&self, mesh: &SerializedMesh, ratio: f32) -> KernelResult<SerializedMesh>;

    /// Rigid transform aligning `source` onto `target` (column-major 4×4).
    ///
    /// # Errors
    ///
    /// Fails on empty clouds or numerical breakdown.
    fn icp_registration(
        &self,
        source: &PointCloud,
        target: &PointCloud,
        max_iterations: u32,
        tolerance: f32,
    ) -> KernelResult<Matrix4<f32>>;
}
