//! Pure-Rust reference backend.

mod decimate;
mod icp;
mod normals;
mod outlier;
mod repair;
mod smooth;
mod spatial;
mod surface;
mod voxel;

use mesh_types::{IndexedMesh, Matrix4, OrientedCloud, PointCloud, SerializedMesh};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info};

use crate::error::{KernelError, KernelResult};
use crate::MeshKernels;
use repair::RepairTolerances;

/// Settings for [`CpuKernels`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelConfig {
    /// Worker threads for the kernel pool. `None` uses rayon's default.
    pub num_threads: Option<usize>,
    /// Upper bound on lattice cells along any axis during reconstruction.
    pub max_grid_resolution: usize,
    /// Distance under which repair welds vertices.
    pub weld_tolerance: f32,
    /// Area at or under which repair drops a triangle.
    pub degenerate_area: f32,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            max_grid_resolution: 200,
            weld_tolerance: 1e-6,
            degenerate_area: 1e-10,
        }
    }
}

impl KernelConfig {
    /// Set the worker thread count.
    #[must_use]
    pub const fn with_num_threads(mut self, threads: usize) -> Self {
        self.num_threads = Some(threads);
        self
    }

    /// Set the lattice resolution cap.
    #[must_use]
    pub const fn with_max_grid_resolution(mut self, cells: usize) -> Self {
        self.max_grid_resolution = cells;
        self
    }

    /// Set the weld tolerance.
    #[must_use]
    pub const fn with_weld_tolerance(mut self, tolerance: f32) -> Self {
        self.weld_tolerance = tolerance;
        self
    }

    const fn repair_tolerances(&self) -> RepairTolerances {
        RepairTolerances {
            degenerate_area: self.degenerate_area,
            weld_epsilon: self.weld_tolerance,
        }
    }
}

/// CPU implementation of [`MeshKernels`].
///
/// Owns a rayon pool; every operation runs inside it so kernel work never
/// competes with the global pool used by callers.
pub struct CpuKernels {
    pool: ThreadPool,
    config: KernelConfig,
}

impl std::fmt::Debug for CpuKernels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuKernels")
            .field("threads", &self.pool.current_num_threads())
            .field("config", &self.config)
            .finish()
    }
}

impl CpuKernels {
    /// Create the backend and its thread pool.
    ///
    /// Call once at startup and share the result.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Initialization`] if the config is invalid or
    /// the pool cannot be built.
    pub fn initialize(config: KernelConfig) -> KernelResult<Self> {
        if config.max_grid_resolution < 4 {
            return Err(KernelError::Initialization(format!(
                "max_grid_resolution must be at least 4, got {}",
                config.max_grid_resolution
            )));
        }
        if !(config.weld_tolerance >= 0.0 && config.degenerate_area >= 0.0) {
            return Err(KernelError::Initialization(
                "repair tolerances must be non-negative".to_string(),
            ));
        }

        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("mesh-kernel-{i}"));
        if let Some(n) = config.num_threads {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| KernelError::Initialization(e.to_string()))?;

        info!(
            threads = pool.current_num_threads(),
            max_grid_resolution = config.max_grid_resolution,
            "CPU mesh kernels initialized"
        );
        Ok(Self { pool, config })
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &KernelConfig {
        &self.config
    }

    fn with_mesh(
        &self,
        mesh: &SerializedMesh,
        f: impl FnOnce(&mut IndexedMesh) -> KernelResult<()> + Send,
    ) -> KernelResult<SerializedMesh> {
        let mut working = mesh.to_indexed();
        self.pool.install(|| f(&mut working))?;
        Ok(SerializedMesh::from_indexed(&working)?)
    }
}

impl MeshKernels for CpuKernels {
    fn voxel_grid_filter(&self, cloud: &PointCloud, voxel_size: f32) -> KernelResult<PointCloud> {
        self.pool.install(|| voxel::voxel_grid_filter(cloud, voxel_size))
    }

    fn statistical_outlier_removal(
        &self,
        cloud: &PointCloud,
        k_neighbors: usize,
        std_ratio: f32,
    ) -> KernelResult<PointCloud> {
        self.pool
            .install(|| outlier::statistical_outlier_removal(cloud, k_neighbors, std_ratio))
    }

    fn estimate_normals(
        &self,
        cloud: &PointCloud,
        k_neighbors: usize,
    ) -> KernelResult<OrientedCloud> {
        self.pool.install(|| normals::estimate_normals(cloud, k_neighbors))
    }

    fn poisson_reconstruction(
        &self,
        cloud: &OrientedCloud,
        depth: u32,
    ) -> KernelResult<SerializedMesh> {
        let mesh = self
            .pool
            .install(|| surface::poisson(cloud, depth, self.config.max_grid_resolution))?;
        Ok(SerializedMesh::from_indexed(&mesh)?)
    }

    fn marching_cubes_reconstruction(
        &self,
        cloud: &OrientedCloud,
        voxel_size: f32,
    ) -> KernelResult<SerializedMesh> {
        let mesh = self.pool.install(|| {
            surface::marching_cubes(cloud, voxel_size, self.config.max_grid_resolution)
        })?;
        Ok(SerializedMesh::from_indexed(&mesh)?)
    }

    fn repair_mesh(&self, mesh: &SerializedMesh) -> KernelResult<SerializedMesh> {
        if mesh.vertex_count() == 0 || mesh.triangle_count() == 0 {
            return Err(KernelError::EmptyInput {
                operation: "repair_mesh",
            });
        }
        let tolerances = self.config.repair_tolerances();
        self.with_mesh(mesh, |m| {
            let summary = repair::repair(m, &tolerances);
            debug!(%summary, "Mesh repaired");
            if m.faces.is_empty() {
                return Err(KernelError::failed(
                    "repair_mesh",
                    format!("no triangles survived repair ({summary})"),
                ));
            }
            Ok(())
        })
    }

    fn smooth_mesh(
        &self,
        mesh: &SerializedMesh,
        iterations: u32,
        lambda: f32,
    ) -> KernelResult<SerializedMesh> {
        self.with_mesh(mesh, |m| {
            let moved = smooth::smooth(m, iterations, lambda)?;
            debug!(iterations, lambda, max_displacement = moved, "Mesh smoothed");
            Ok(())
        })
    }

    fn decimate_mesh(&self, mesh: &SerializedMesh, ratio: f32) -> KernelResult<SerializedMesh> {
        if mesh.triangle_count() == 0 {
            return Err(KernelError::EmptyInput {
                operation: "decimate_mesh",
            });
        }
        self.with_mesh(mesh, |m| {
            *m = decimate::decimate(m, ratio)?;
            if m.faces.is_empty() {
                return Err(KernelError::failed("decimate_mesh", "no triangles left"));
            }
            Ok(())
        })
    }

    fn icp_registration(
        &self,
        source: &PointCloud,
        target: &PointCloud,
        max_iterations: u32,
        tolerance: f32,
    ) -> KernelResult<Matrix4<f32>> {
        let outcome = self
            .pool
            .install(|| icp::icp(source, target, max_iterations, tolerance))?;
        Ok(outcome.transform.cast::<f32>())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use mesh_types::{unit_cube, Point3};

    fn kernels() -> CpuKernels {
        CpuKernels::initialize(KernelConfig::default().with_num_threads(2)).unwrap()
    }

    #[test]
    fn initialize_validates_config() {
        let tiny_grid = KernelConfig::default().with_max_grid_resolution(2);
        assert!(CpuKernels::initialize(tiny_grid).is_err());
        assert!(CpuKernels::initialize(KernelConfig::default().with_weld_tolerance(-1.0)).is_err());
        let k = kernels();
        assert_eq!(k.config().max_grid_resolution, 200);
    }

    #[test]
    fn repair_rejects_empty_mesh() {
        let k = kernels();
        assert!(matches!(
            k.repair_mesh(&SerializedMesh::empty()),
            Err(KernelError::EmptyInput { .. })
        ));
    }

    #[test]
    fn repair_fails_when_every_triangle_is_degenerate() {
        let k = kernels();
        let p = Point3::new(0.1, 0.2, 0.3);
        let sliver = IndexedMesh::from_parts(vec![p; 3], vec![[0, 1, 2]]);
        let mesh = SerializedMesh::from_indexed(&sliver).unwrap();
        assert!(matches!(
            k.repair_mesh(&mesh),
            Err(KernelError::Failed { operation: "repair_mesh", .. })
        ));
    }

    #[test]
    fn decimate_rejects_empty_mesh() {
        let k = kernels();
        assert!(matches!(
            k.decimate_mesh(&SerializedMesh::empty(), 0.5),
            Err(KernelError::EmptyInput { operation: "decimate_mesh" })
        ));
    }

    #[test]
    fn collinear_cloud_does_not_panic() {
        let k = kernels();
        let line: PointCloud = (0..200u16)
            .map(|i| Point3::new(f32::from(i) * 0.001, 0.0, 0.5))
            .collect();
        let kept = k.statistical_outlier_removal(&line, 20, 2.0).unwrap();
        assert!(kept.len() <= line.len());
        let oriented = k.estimate_normals(&line, 15).unwrap();
        assert_eq!(oriented.len(), line.len());
    }

    #[test]
    fn open_cube_repairs_to_watertight() {
        let mut cube = unit_cube();
        cube.faces.pop();
        let mesh = SerializedMesh::from_indexed(&cube).unwrap();
        assert!(!mesh.is_watertight());
        let repaired = kernels().repair_mesh(&mesh).unwrap();
        assert!(repaired.is_watertight());
    }

    #[test]
    fn zero_smoothing_returns_same_mesh() {
        let mesh = SerializedMesh::from_indexed(&unit_cube()).unwrap();
        let out = kernels().smooth_mesh(&mesh, 0, 0.5).unwrap();
        assert_eq!(out, mesh);
    }

    #[test]
    fn icp_identity_for_same_cloud() {
        let cloud: PointCloud = (0..50)
            .map(|i| {
                let f = i as f32;
                Point3::new((f * 0.3).sin(), (f * 0.7).cos(), f * 0.02)
            })
            .collect();
        let m = kernels().icp_registration(&cloud, &cloud, 10, 1e-6).unwrap();
        approx::assert_relative_eq!(m, Matrix4::identity(), epsilon = 1e-5);
    }
}
