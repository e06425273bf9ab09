//! Instrumented kernels for sequencing tests.

use std::sync::Mutex;

use mesh_kernels::{KernelError, KernelResult, MeshKernels};
use mesh_types::{
    unit_cube, Matrix4, OrientedCloud, OrientedPoint, PointCloud, SerializedMesh, Vector3,
};

type Hook = Box<dyn Fn(&'static str) + Send + Sync>;

/// Records every call. Point filters return their input, reconstruction
/// returns a unit cube and mesh operations return their input.
pub(crate) struct MockKernels {
    calls: Mutex<Vec<&'static str>>,
    fail_on: Option<&'static str>,
    empty_from: Option<&'static str>,
    hook: Option<Hook>,
}

impl MockKernels {
    pub(crate) fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on: None,
            empty_from: None,
            hook: None,
        }
    }

    /// Make `operation` fail.
    pub(crate) fn failing(mut self, operation: &'static str) -> Self {
        self.fail_on = Some(operation);
        self
    }

    /// Make the mesh operation `operation` return an empty mesh.
    pub(crate) fn emptying(mut self, operation: &'static str) -> Self {
        self.empty_from = Some(operation);
        self
    }

    /// Run `hook` after each recorded call.
    pub(crate) fn with_hook(mut self, hook: impl Fn(&'static str) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub(crate) fn count(&self, operation: &str) -> usize {
        self.calls().iter().filter(|c| **c == operation).count()
    }

    fn record(&self, operation: &'static str) -> KernelResult<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(operation);
        }
        if let Some(hook) = &self.hook {
            hook(operation);
        }
        if self.fail_on == Some(operation) {
            return Err(KernelError::failed(operation, "scripted failure"));
        }
        Ok(())
    }

    fn mesh_out(
        &self,
        operation: &'static str,
        mesh: SerializedMesh,
    ) -> KernelResult<SerializedMesh> {
        self.record(operation)?;
        if self.empty_from == Some(operation) {
            return Ok(SerializedMesh::empty());
        }
        Ok(mesh)
    }
}

impl MeshKernels for MockKernels {
    fn voxel_grid_filter(&self, cloud: &PointCloud, _voxel_size: f32) -> KernelResult<PointCloud> {
        self.record("voxel_grid_filter")?;
        Ok(cloud.clone())
    }

    fn statistical_outlier_removal(
        &self,
        cloud: &PointCloud,
        _k_neighbors: usize,
        _std_ratio: f32,
    ) -> KernelResult<PointCloud> {
        self.record("statistical_outlier_removal")?;
        Ok(cloud.clone())
    }

    fn estimate_normals(
        &self,
        cloud: &PointCloud,
        _k_neighbors: usize,
    ) -> KernelResult<OrientedCloud> {
        self.record("estimate_normals")?;
        Ok(cloud
            .iter()
            .map(|&position| OrientedPoint {
                position,
                normal: Vector3::z(),
            })
            .collect())
    }

    fn poisson_reconstruction(
        &self,
        _cloud: &OrientedCloud,
        _depth: u32,
    ) -> KernelResult<SerializedMesh> {
        self.mesh_out("poisson_reconstruction", SerializedMesh::from_indexed(&unit_cube())?)
    }

    fn marching_cubes_reconstruction(
        &self,
        _cloud: &OrientedCloud,
        _voxel_size: f32,
    ) -> KernelResult<SerializedMesh> {
        self.mesh_out("marching_cubes_reconstruction", SerializedMesh::from_indexed(&unit_cube())?)
    }

    fn repair_mesh(&self, mesh: &SerializedMesh) -> KernelResult<SerializedMesh> {
        self.mesh_out("repair_mesh", mesh.clone())
    }

    fn smooth_mesh(
        &self,
        mesh: &SerializedMesh,
        _iterations: u32,
        _lambda: f32,
    ) -> KernelResult<SerializedMesh> {
        self.mesh_out("smooth_mesh", mesh.clone())
    }

    fn decimate_mesh(&self, mesh: &SerializedMesh, _ratio: f32) -> KernelResult<SerializedMesh> {
        self.mesh_out("decimate_mesh", mesh.clone())
    }

    fn icp_registration(
        &self,
        _source: &PointCloud,
        _target: &PointCloud,
        _max_iterations: u32,
        _tolerance: f32,
    ) -> KernelResult<Matrix4<f32>> {
        self.record("icp_registration")?;
        Ok(Matrix4::identity())
    }
}
