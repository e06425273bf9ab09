//! Point cloud to printable mesh.
//!
//! | # | Stage | Progress | Kernel |
//! |---|-------|----------|--------|
//! | 1 | [`Stage::Downsample`] | 0.05 | voxel grid filter |
//! | 2 | [`Stage::OutlierRemoval`] | 0.15 | statistical outlier removal |
//! | 3 | [`Stage::NormalEstimation`] | 0.25 | normal estimation |
//! | 4 | [`Stage::Reconstruction`] | 0.45 | Poisson or marching cubes |
//! | 5 | [`Stage::Repair`] | 0.60 | repair |
//! | 6 | [`Stage::Smoothing`] | 0.72 | Laplacian smoothing, skipped at 0 iterations |
//! | 7 | [`Stage::Decimation`] | 0.85 | quadric decimation |
//! | 8 | [`Stage::Scaling`] | 1.00 | in place, skipped at scale 1 |
//!
//! The configuration is validated and an empty cloud rejected before stage
//! 1. Cancellation is checked before every stage. A kernel failure aborts
//! the run; no partial mesh is returned.

mod config;
mod stage;
mod worker;

pub use config::{PipelineConfig, ReconstructionMethod};
pub use stage::{CancellationToken, NullProgress, ProgressSink, Stage};
pub use worker::PipelineHandle;

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mesh_io::{ExportFormat, ScanStore};
use mesh_kernels::{KernelError, KernelResult, MeshKernels};
use mesh_types::{PointCloud, SerializedMesh};
use tracing::{debug, info};

use crate::error::{PipelineError, ScanResult};

/// Output of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    /// The final mesh.
    pub mesh: SerializedMesh,
    /// Vertices in `mesh`.
    pub vertex_count: usize,
    /// Triangles in `mesh`.
    pub triangle_count: usize,
    /// Every edge has exactly two incident triangles and the mesh is not
    /// empty.
    pub is_watertight: bool,
    /// Wall time of the run.
    pub elapsed: Duration,
}

impl PipelineResult {
    fn new(mesh: SerializedMesh, elapsed: Duration) -> Self {
        Self {
            vertex_count: mesh.vertex_count(),
            triangle_count: mesh.triangle_count(),
            is_watertight: mesh.is_watertight(),
            mesh,
            elapsed,
        }
    }

    /// Writes the mesh in a local format.
    ///
    /// # Errors
    ///
    /// Returns an error for CAD formats or when writing fails.
    pub fn export(&self, format: ExportFormat, path: impl AsRef<Path>) -> ScanResult<()> {
        mesh_io::export_mesh(&self.mesh, format, path)?;
        Ok(())
    }

    /// Stores the mesh under `scan_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the write.
    pub fn persist(&self, store: &dyn ScanStore, scan_id: &str) -> ScanResult<()> {
        store.save_mesh(scan_id, &self.mesh)?;
        Ok(())
    }
}

impl fmt::Display for PipelineResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Reconstruction: {} vertices, {} triangles, {}, {:.1} s",
            self.vertex_count,
            self.triangle_count,
            if self.is_watertight { "watertight" } else { "open" },
            self.elapsed.as_secs_f64()
        )
    }
}

/// Runs the reconstruction stages against injected kernels.
#[derive(Clone)]
pub struct ReconstructionPipeline {
    kernels: Arc<dyn MeshKernels>,
}

impl fmt::Debug for ReconstructionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconstructionPipeline").finish_non_exhaustive()
    }
}

struct StageRunner<'a> {
    progress: &'a dyn ProgressSink,
    cancel: &'a CancellationToken,
}

impl StageRunner<'_> {
    fn enter(&self, stage: Stage) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            info!(%stage, "Reconstruction cancelled");
            return Err(PipelineError::Cancelled { stage });
        }
        stage::report_guarded(self.progress, stage);
        Ok(())
    }

    fn run<T>(
        &self,
        stage: Stage,
        op: impl FnOnce() -> KernelResult<T>,
    ) -> Result<T, PipelineError> {
        self.enter(stage)?;
        let started = Instant::now();
        let out = op().map_err(|source| PipelineError::StageFailed { stage, source })?;
        debug!(%stage, elapsed = ?started.elapsed(), "Stage finished");
        Ok(out)
    }

    /// [`run`](Self::run) for stages that produce a mesh, which must keep at
    /// least one triangle.
    fn run_mesh(
        &self,
        stage: Stage,
        op: impl FnOnce() -> KernelResult<SerializedMesh>,
    ) -> Result<SerializedMesh, PipelineError> {
        let mesh = self.run(stage, op)?;
        non_empty(stage, mesh)
    }
}

fn non_empty(stage: Stage, mesh: SerializedMesh) -> Result<SerializedMesh, PipelineError> {
    if mesh.triangle_count() == 0 {
        return Err(PipelineError::StageFailed {
            stage,
            source: KernelError::failed(stage.name(), "no triangles left"),
        });
    }
    Ok(mesh)
}

impl ReconstructionPipeline {
    /// Uses `kernels` for every numerical stage.
    #[must_use]
    pub fn new(kernels: Arc<dyn MeshKernels>) -> Self {
        Self { kernels }
    }

    /// The kernels in use.
    #[must_use]
    pub const fn kernels(&self) -> &Arc<dyn MeshKernels> {
        &self.kernels
    }

    /// Reconstructs a mesh from `cloud`.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::InvalidConfig`] before any stage runs
    /// - [`PipelineError::EmptyCloud`] for an empty input
    /// - [`PipelineError::Cancelled`] if `cancel` fires between stages
    /// - [`PipelineError::StageFailed`] if a kernel fails, or a mesh stage
    ///   leaves no triangles
    pub fn process(
        &self,
        cloud: &PointCloud,
        config: &PipelineConfig,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult, PipelineError> {
        config.validate()?;
        if cloud.is_empty() {
            return Err(PipelineError::EmptyCloud);
        }

        let started = Instant::now();
        let kernels = self.kernels.as_ref();
        let runner = StageRunner { progress, cancel };
        info!(
            points = cloud.len(),
            method = %config.reconstruction_method,
            "Starting reconstruction"
        );

        let downsampled = runner.run(Stage::Downsample, || {
            kernels.voxel_grid_filter(cloud, config.voxel_size)
        })?;
        debug!(points = downsampled.len(), "Downsampled");

        let cleaned = runner.run(Stage::OutlierRemoval, || {
            kernels.statistical_outlier_removal(
                &downsampled,
                config.sor_k_neighbors,
                config.sor_std_ratio,
            )
        })?;
        debug!(points = cleaned.len(), "Outliers removed");

        let oriented = runner.run(Stage::NormalEstimation, || {
            kernels.estimate_normals(&cleaned, config.normal_k_neighbors)
        })?;

        let raw = runner.run_mesh(Stage::Reconstruction, || {
            match config.reconstruction_method {
                ReconstructionMethod::Poisson => {
                    kernels.poisson_reconstruction(&oriented, config.poisson_depth)
                }
                ReconstructionMethod::MarchingCubes => kernels
                    .marching_cubes_reconstruction(&oriented, config.marching_cubes_voxel_size),
            }
        })?;
        debug!(triangles = raw.triangle_count(), "Surface extracted");

        let repaired = runner.run_mesh(Stage::Repair, || kernels.repair_mesh(&raw))?;

        runner.enter(Stage::Smoothing)?;
        let smoothed = if config.smoothing_iterations > 0 {
            let smoothed = kernels
                .smooth_mesh(&repaired, config.smoothing_iterations, config.smoothing_lambda)
                .map_err(|source| PipelineError::StageFailed {
                    stage: Stage::Smoothing,
                    source,
                })?;
            non_empty(Stage::Smoothing, smoothed)?
        } else {
            debug!("Smoothing skipped");
            repaired
        };

        let mut mesh = runner.run_mesh(Stage::Decimation, || {
            kernels.decimate_mesh(&smoothed, config.decimation_ratio)
        })?;

        runner.enter(Stage::Scaling)?;
        if (config.scale_factor - 1.0).abs() > f32::EPSILON {
            mesh.scale_in_place(config.scale_factor);
        }

        let result = PipelineResult::new(mesh, started.elapsed());
        info!(
            vertices = result.vertex_count,
            triangles = result.triangle_count,
            watertight = result.is_watertight,
            elapsed = ?result.elapsed,
            "Reconstruction finished"
        );
        Ok(result)
    }

    /// Runs [`process`](Self::process) on a named worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Spawn`] if the thread cannot be created.
    pub fn spawn<P>(
        &self,
        cloud: PointCloud,
        config: PipelineConfig,
        progress: P,
    ) -> Result<PipelineHandle, PipelineError>
    where
        P: ProgressSink + Send + 'static,
    {
        worker::spawn(self.clone(), cloud, config, progress)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::testing::MockKernels;
    use mesh_types::{unit_cube, Point3};
    use std::sync::Mutex;

    fn cloud() -> PointCloud {
        (0u8..50).map(|i| Point3::new(f32::from(i) * 0.01, 0.0, 0.0)).collect()
    }

    fn run(
        kernels: &Arc<MockKernels>,
        config: &PipelineConfig,
    ) -> Result<PipelineResult, PipelineError> {
        ReconstructionPipeline::new(kernels.clone()).process(
            &cloud(),
            config,
            &NullProgress,
            &CancellationToken::new(),
        )
    }

    #[test]
    fn stages_run_in_order() {
        let kernels = Arc::new(MockKernels::new());
        let seen = Mutex::new(Vec::new());
        let sink = |stage: Stage, p: f32| seen.lock().unwrap().push((stage, p));
        let result = ReconstructionPipeline::new(kernels.clone())
            .process(&cloud(), &PipelineConfig::default(), &sink, &CancellationToken::new())
            .unwrap();

        assert_eq!(
            kernels.calls(),
            vec![
                "voxel_grid_filter",
                "statistical_outlier_removal",
                "estimate_normals",
                "poisson_reconstruction",
                "repair_mesh",
                "smooth_mesh",
                "decimate_mesh",
            ]
        );
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.iter().map(|(s, _)| *s).collect::<Vec<_>>(), Stage::ALL.to_vec());
        assert_eq!(seen.last().map(|(_, p)| *p), Some(1.0));

        assert_eq!(result.vertex_count, 8);
        assert_eq!(result.triangle_count, 12);
        assert!(result.is_watertight);
    }

    #[test]
    fn marching_cubes_selected() {
        let kernels = Arc::new(MockKernels::new());
        let config = PipelineConfig::default()
            .with_reconstruction_method(ReconstructionMethod::MarchingCubes);
        run(&kernels, &config).unwrap();
        assert_eq!(kernels.count("marching_cubes_reconstruction"), 1);
        assert_eq!(kernels.count("poisson_reconstruction"), 0);
    }

    #[test]
    fn zero_iterations_skip_smoothing() {
        let kernels = Arc::new(MockKernels::new());
        run(&kernels, &PipelineConfig::default().with_smoothing(0, 0.5)).unwrap();
        assert_eq!(kernels.count("smooth_mesh"), 0);
        assert_eq!(kernels.count("decimate_mesh"), 1);
    }

    #[test]
    fn scale_touches_only_vertices() {
        let kernels = Arc::new(MockKernels::new());
        let result = run(&kernels, &PipelineConfig::default().with_scale_factor(2.0)).unwrap();
        let expected = SerializedMesh::from_indexed(&unit_cube()).unwrap();

        assert_eq!(result.vertex_count, 8);
        assert_eq!(result.triangle_count, 12);
        assert_eq!(result.mesh.triangle_data(), expected.triangle_data());
        for (scaled, original) in result.mesh.vertex_data().iter().zip(expected.vertex_data()) {
            assert_eq!(*scaled, original * 2.0);
        }
    }

    #[test]
    fn invalid_config_runs_nothing() {
        let kernels = Arc::new(MockKernels::new());
        let err = run(&kernels, &PipelineConfig::default().with_decimation_ratio(0.0)).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig { .. }));
        assert!(kernels.calls().is_empty());
    }

    #[test]
    fn empty_cloud_rejected() {
        let kernels = Arc::new(MockKernels::new());
        let err = ReconstructionPipeline::new(kernels.clone())
            .process(
                &PointCloud::new(),
                &PipelineConfig::default(),
                &NullProgress,
                &CancellationToken::new(),
            )
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyCloud));
        assert!(kernels.calls().is_empty());
    }

    #[test]
    fn kernel_failure_names_stage() {
        let kernels = Arc::new(MockKernels::new().failing("repair_mesh"));
        let err = run(&kernels, &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::StageFailed { stage: Stage::Repair, .. }));
        assert_eq!(kernels.count("smooth_mesh"), 0);
    }

    #[test]
    fn emptied_mesh_fails_its_stage() {
        for (op, stage) in [
            ("repair_mesh", Stage::Repair),
            ("smooth_mesh", Stage::Smoothing),
            ("decimate_mesh", Stage::Decimation),
        ] {
            let kernels = Arc::new(MockKernels::new().emptying(op));
            let err = run(&kernels, &PipelineConfig::default()).unwrap_err();
            match err {
                PipelineError::StageFailed { stage: failed, source } => {
                    assert_eq!(failed, stage);
                    assert!(matches!(source, KernelError::Failed { .. }));
                }
                other => panic!("{op}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn single_point_cloud_fails_instead_of_yielding_empty_mesh() {
        let kernels = mesh_kernels::CpuKernels::initialize(
            mesh_kernels::KernelConfig::default().with_num_threads(1),
        )
        .unwrap();
        let cloud: PointCloud = std::iter::once(Point3::new(0.1, 0.2, 0.3)).collect();
        let err = ReconstructionPipeline::new(Arc::new(kernels))
            .process(&cloud, &PipelineConfig::default(), &NullProgress, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, PipelineError::StageFailed { .. }), "{err:?}");
    }

    #[test]
    fn collinear_cloud_yields_result_or_stage_failure() {
        let kernels = Arc::new(
            mesh_kernels::CpuKernels::initialize(
                mesh_kernels::KernelConfig::default().with_num_threads(1),
            )
            .unwrap(),
        );
        let line: PointCloud = (0..200u16)
            .map(|i| Point3::new(f32::from(i) * 0.001, 0.0, 0.5))
            .collect();
        for method in [ReconstructionMethod::Poisson, ReconstructionMethod::MarchingCubes] {
            let config = PipelineConfig::default().with_reconstruction_method(method);
            let outcome = ReconstructionPipeline::new(kernels.clone()).process(
                &line,
                &config,
                &NullProgress,
                &CancellationToken::new(),
            );
            match outcome {
                Ok(result) => assert!(result.triangle_count > 0),
                Err(err) => assert!(matches!(err, PipelineError::StageFailed { .. }), "{err:?}"),
            }
        }
    }

    #[test]
    fn cancellation_between_stages() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        let kernels = Arc::new(MockKernels::new().with_hook(move |op| {
            if op == "estimate_normals" {
                trigger.cancel();
            }
        }));
        let err = ReconstructionPipeline::new(kernels.clone())
            .process(&cloud(), &PipelineConfig::default(), &NullProgress, &token)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled { stage: Stage::Reconstruction }));
        assert_eq!(kernels.calls().last(), Some(&"estimate_normals"));
    }

    #[test]
    fn cancelled_before_start() {
        let kernels = Arc::new(MockKernels::new());
        let token = CancellationToken::new();
        token.cancel();
        let err = ReconstructionPipeline::new(kernels.clone())
            .process(&cloud(), &PipelineConfig::default(), &NullProgress, &token)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled { stage: Stage::Downsample }));
        assert!(kernels.calls().is_empty());
    }

    #[test]
    fn panicking_progress_does_not_abort() {
        let kernels = Arc::new(MockKernels::new());
        let sink = |stage: Stage, _: f32| {
            assert!(stage != Stage::Repair, "sink failure");
        };
        let result = ReconstructionPipeline::new(kernels)
            .process(&cloud(), &PipelineConfig::default(), &sink, &CancellationToken::new());
        assert!(result.is_ok());
    }

    #[test]
    fn open_mesh_is_not_watertight() {
        let mut open = unit_cube();
        open.faces.truncate(10);
        let mesh = SerializedMesh::from_indexed(&open).unwrap();
        let result = PipelineResult::new(mesh, Duration::ZERO);
        assert!(!result.is_watertight);
        assert!(result.to_string().contains("open"));
        assert!(!PipelineResult::new(SerializedMesh::empty(), Duration::ZERO).is_watertight);
    }

    #[test]
    fn result_exports_and_persists() {
        let kernels = Arc::new(MockKernels::new());
        let result = run(&kernels, &PipelineConfig::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.stl");
        result.export(ExportFormat::Stl, &path).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 84 + 12 * 50);

        let store = mesh_io::FileScanStore::open(dir.path().join("store")).unwrap();
        result.persist(&store, "abc").unwrap();
        assert_eq!(store.load_mesh("abc").unwrap(), Some(result.mesh));
    }
}
