//! Statistical outlier removal.
//!
//! For each point, the mean distance to its k nearest neighbours is
//! computed. Points whose mean distance exceeds
//! `global_mean + std_ratio * global_std` are dropped.

use mesh_types::PointCloud;
use rayon::prelude::*;
use tracing::debug;

use super::spatial::PointIndex;
use crate::error::{KernelError, KernelResult};

const OPERATION: &str = "statistical_outlier_removal";

/// Remove statistical outliers.
///
/// Clouds with `k_neighbors` or fewer points are returned unchanged, since
/// no point has a full neighbourhood.
pub fn statistical_outlier_removal(
    cloud: &PointCloud,
    k_neighbors: usize,
    std_ratio: f32,
) -> KernelResult<PointCloud> {
    if k_neighbors == 0 {
        return Err(KernelError::invalid(OPERATION, "k_neighbors must be at least 1"));
    }
    if !(std_ratio.is_finite() && std_ratio > 0.0) {
        return Err(KernelError::invalid(
            OPERATION,
            format!("std_ratio must be positive, got {std_ratio}"),
        ));
    }
    if cloud.len() <= k_neighbors {
        return Ok(cloud.clone());
    }
    let index = PointIndex::build(&cloud.points, OPERATION)?;

    let mean_distances: Vec<f64> = cloud
        .points
        .par_iter()
        .map(|p| {
            let neighbors = index.nearest_n(p, k_neighbors + 1);
            // Skip the first neighbour (self).
            let sum: f64 = neighbors
                .iter()
                .skip(1)
                .map(|n| f64::from(n.distance_sq).sqrt())
                .sum();
            #[allow(clippy::cast_precision_loss)]
            let mean = if neighbors.len() > 1 {
                sum / (neighbors.len() - 1) as f64
            } else {
                0.0
            };
            mean
        })
        .collect();

    #[allow(clippy::cast_precision_loss)]
    let n = mean_distances.len() as f64;
    let mean = mean_distances.iter().sum::<f64>() / n;
    let variance = mean_distances.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
    let threshold = f64::from(std_ratio).mul_add(variance.sqrt(), mean);

    let kept: PointCloud = cloud
        .points
        .iter()
        .zip(&mean_distances)
        .filter(|(_, &d)| d <= threshold)
        .map(|(p, _)| *p)
        .collect();

    debug!(
        input = cloud.len(),
        kept = kept.len(),
        threshold,
        "Statistical outlier removal"
    );
    Ok(kept)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use mesh_types::Point3;

    fn grid_with_outlier() -> PointCloud {
        let mut cloud: PointCloud = (0..100)
            .map(|i| {
                let x = (i % 10) as f32 * 0.01;
                let y = (i / 10) as f32 * 0.01;
                Point3::new(x, y, (i as f32 * 0.7).sin() * 0.0005)
            })
            .collect();
        cloud.push(Point3::new(5.0, 5.0, 5.0));
        cloud
    }

    #[test]
    fn removes_far_point() {
        let cloud = grid_with_outlier();
        let out = statistical_outlier_removal(&cloud, 8, 2.0).unwrap();
        assert_eq!(out.len(), 100);
        assert!(out.iter().all(|p| p.x < 1.0));
    }

    #[test]
    fn small_cloud_unchanged() {
        let cloud: PointCloud = (0..5).map(|i| Point3::new(i as f32, 0.0, 0.0)).collect();
        let out = statistical_outlier_removal(&cloud, 20, 2.0).unwrap();
        assert_eq!(out, cloud);
    }

    #[test]
    fn rejects_bad_parameters() {
        let cloud = grid_with_outlier();
        assert!(statistical_outlier_removal(&cloud, 0, 2.0).is_err());
        assert!(statistical_outlier_removal(&cloud, 8, -1.0).is_err());
    }
}
