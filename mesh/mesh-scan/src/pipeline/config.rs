//! Reconstruction parameters.

use std::fmt;

use crate::error::PipelineError;

/// Surface reconstruction algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ReconstructionMethod {
    /// Implicit surface with resolution set by an octree-style depth.
    #[default]
    Poisson,
    /// Isosurface on a grid of explicit voxel size.
    MarchingCubes,
}

impl fmt::Display for ReconstructionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Poisson => "poisson",
            Self::MarchingCubes => "marching_cubes",
        })
    }
}

/// Parameters of one reconstruction run.
///
/// # Example
///
/// ```
/// use mesh_scan::{PipelineConfig, ReconstructionMethod};
///
/// let config = PipelineConfig::default()
///     .with_reconstruction_method(ReconstructionMethod::MarchingCubes)
///     .with_scale_factor(1.02);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineConfig {
    /// Voxel edge of the initial downsample in meters (default: 0.002).
    pub voxel_size: f32,
    /// Neighbours for outlier statistics (default: 20).
    pub sor_k_neighbors: usize,
    /// Standard deviations beyond which a point is an outlier (default: 2.0).
    pub sor_std_ratio: f32,
    /// Neighbours for normal estimation (default: 15).
    pub normal_k_neighbors: usize,
    /// Surface algorithm (default: Poisson).
    pub reconstruction_method: ReconstructionMethod,
    /// Poisson depth (default: 9).
    pub poisson_depth: u32,
    /// Marching cubes voxel edge in meters (default: 0.003).
    pub marching_cubes_voxel_size: f32,
    /// Fraction of triangles kept by decimation, in `(0, 1]` (default: 0.5).
    pub decimation_ratio: f32,
    /// Laplacian passes; 0 skips smoothing (default: 3).
    pub smoothing_iterations: u32,
    /// Laplacian step in `(0, 1]` (default: 0.5).
    pub smoothing_lambda: f32,
    /// Uniform scale of the final mesh (default: 1.0).
    pub scale_factor: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            voxel_size: 0.002,
            sor_k_neighbors: 20,
            sor_std_ratio: 2.0,
            normal_k_neighbors: 15,
            reconstruction_method: ReconstructionMethod::Poisson,
            poisson_depth: 9,
            marching_cubes_voxel_size: 0.003,
            decimation_ratio: 0.5,
            smoothing_iterations: 3,
            smoothing_lambda: 0.5,
            scale_factor: 1.0,
        }
    }
}

impl PipelineConfig {
    /// Default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Coarse and quick: larger voxels, shallower Poisson, heavier decimation.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            voxel_size: 0.004,
            sor_k_neighbors: 10,
            normal_k_neighbors: 10,
            poisson_depth: 7,
            marching_cubes_voxel_size: 0.006,
            decimation_ratio: 0.3,
            smoothing_iterations: 1,
            ..Self::default()
        }
    }

    /// Fine detail: small voxels, deeper Poisson, light decimation.
    #[must_use]
    pub fn detailed() -> Self {
        Self {
            voxel_size: 0.001,
            sor_k_neighbors: 30,
            normal_k_neighbors: 20,
            poisson_depth: 10,
            marching_cubes_voxel_size: 0.0015,
            decimation_ratio: 0.8,
            smoothing_iterations: 2,
            smoothing_lambda: 0.3,
            ..Self::default()
        }
    }

    /// Sets the downsample voxel size.
    #[must_use]
    pub const fn with_voxel_size(mut self, voxel_size: f32) -> Self {
        self.voxel_size = voxel_size;
        self
    }

    /// Sets the outlier removal parameters.
    #[must_use]
    pub const fn with_outlier_removal(mut self, k_neighbors: usize, std_ratio: f32) -> Self {
        self.sor_k_neighbors = k_neighbors;
        self.sor_std_ratio = std_ratio;
        self
    }

    /// Sets the normal estimation neighbourhood.
    #[must_use]
    pub const fn with_normal_k_neighbors(mut self, k: usize) -> Self {
        self.normal_k_neighbors = k;
        self
    }

    /// Sets the reconstruction algorithm.
    #[must_use]
    pub const fn with_reconstruction_method(mut self, method: ReconstructionMethod) -> Self {
        self.reconstruction_method = method;
        self
    }

    /// Sets the Poisson depth.
    #[must_use]
    pub const fn with_poisson_depth(mut self, depth: u32) -> Self {
        self.poisson_depth = depth;
        self
    }

    /// Sets the marching cubes voxel size.
    #[must_use]
    pub const fn with_marching_cubes_voxel_size(mut self, voxel_size: f32) -> Self {
        self.marching_cubes_voxel_size = voxel_size;
        self
    }

    /// Sets the decimation ratio.
    #[must_use]
    pub const fn with_decimation_ratio(mut self, ratio: f32) -> Self {
        self.decimation_ratio = ratio;
        self
    }

    /// Sets the smoothing passes and step.
    #[must_use]
    pub const fn with_smoothing(mut self, iterations: u32, lambda: f32) -> Self {
        self.smoothing_iterations = iterations;
        self.smoothing_lambda = lambda;
        self
    }

    /// Sets the final scale.
    #[must_use]
    pub const fn with_scale_factor(mut self, scale: f32) -> Self {
        self.scale_factor = scale;
        self
    }

    /// Checks every parameter.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let positive = |name: &str, v: f32| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(PipelineError::invalid_config(format!(
                    "{name} must be positive and finite, got {v}"
                )))
            }
        };
        positive("voxel_size", self.voxel_size)?;
        positive("sor_std_ratio", self.sor_std_ratio)?;
        positive("scale_factor", self.scale_factor)?;
        if self.reconstruction_method == ReconstructionMethod::MarchingCubes {
            positive("marching_cubes_voxel_size", self.marching_cubes_voxel_size)?;
        }

        if self.sor_k_neighbors == 0 {
            return Err(PipelineError::invalid_config("sor_k_neighbors must be at least 1"));
        }
        if self.normal_k_neighbors < 3 {
            return Err(PipelineError::invalid_config(format!(
                "normal_k_neighbors must be at least 3, got {}",
                self.normal_k_neighbors
            )));
        }
        if self.reconstruction_method == ReconstructionMethod::Poisson
            && !(1..=16).contains(&self.poisson_depth)
        {
            return Err(PipelineError::invalid_config(format!(
                "poisson_depth must be in 1..=16, got {}",
                self.poisson_depth
            )));
        }
        if !(self.decimation_ratio > 0.0 && self.decimation_ratio <= 1.0) {
            return Err(PipelineError::invalid_config(format!(
                "decimation_ratio must be in (0, 1], got {}",
                self.decimation_ratio
            )));
        }
        if self.smoothing_iterations > 0
            && !(self.smoothing_lambda > 0.0 && self.smoothing_lambda <= 1.0)
        {
            return Err(PipelineError::invalid_config(format!(
                "smoothing_lambda must be in (0, 1], got {}",
                self.smoothing_lambda
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sor_k_neighbors, 20);
        assert_eq!(config.poisson_depth, 9);
        assert_eq!(config.reconstruction_method, ReconstructionMethod::Poisson);
    }

    #[test]
    fn presets_are_valid() {
        assert!(PipelineConfig::fast().validate().is_ok());
        assert!(PipelineConfig::detailed().validate().is_ok());
        assert!(PipelineConfig::fast().voxel_size > PipelineConfig::detailed().voxel_size);
    }

    #[test]
    fn rejects_bad_values() {
        let bad = [
            PipelineConfig::default().with_voxel_size(0.0),
            PipelineConfig::default().with_voxel_size(f32::NAN),
            PipelineConfig::default().with_outlier_removal(0, 2.0),
            PipelineConfig::default().with_normal_k_neighbors(2),
            PipelineConfig::default().with_poisson_depth(0),
            PipelineConfig::default().with_decimation_ratio(0.0),
            PipelineConfig::default().with_decimation_ratio(1.5),
            PipelineConfig::default().with_smoothing(3, 0.0),
            PipelineConfig::default().with_scale_factor(-1.0),
            PipelineConfig::default()
                .with_reconstruction_method(ReconstructionMethod::MarchingCubes)
                .with_marching_cubes_voxel_size(0.0),
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(PipelineError::InvalidConfig { .. })),
                "{config:?}"
            );
        }
    }

    #[test]
    fn lambda_ignored_without_smoothing() {
        let config = PipelineConfig::default().with_smoothing(0, 0.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn poisson_depth_ignored_for_marching_cubes() {
        let config = PipelineConfig::default()
            .with_reconstruction_method(ReconstructionMethod::MarchingCubes)
            .with_poisson_depth(0);
        assert!(config.validate().is_ok());
    }
}
