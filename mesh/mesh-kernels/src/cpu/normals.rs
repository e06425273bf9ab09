//! Normal estimation by local PCA.
//!
//! The normal of a point is the eigenvector of its neighbourhood covariance
//! with the smallest eigenvalue. Normals are then flipped to point away
//! from the cloud centroid, which is correct for the closed, roughly convex
//! objects a handheld scan captures.

use mesh_types::{OrientedCloud, OrientedPoint, PointCloud, Vector3};
use nalgebra::{Matrix3, SymmetricEigen};
use rayon::prelude::*;

use super::spatial::PointIndex;
use crate::error::{KernelError, KernelResult};

const OPERATION: &str = "estimate_normals";

/// Estimate outward-oriented unit normals.
pub fn estimate_normals(cloud: &PointCloud, k_neighbors: usize) -> KernelResult<OrientedCloud> {
    if k_neighbors < 3 {
        return Err(KernelError::invalid(
            OPERATION,
            format!("k_neighbors must be at least 3, got {k_neighbors}"),
        ));
    }
    let Some(centroid) = cloud.centroid() else {
        return Err(KernelError::EmptyInput {
            operation: OPERATION,
        });
    };
    let index = PointIndex::build(&cloud.points, OPERATION)?;

    let points = cloud
        .points
        .par_iter()
        .map(|p| {
            let neighbors = index.nearest_n(p, k_neighbors);
            let positions: Vec<Vector3<f32>> = neighbors
                .iter()
                .map(|n| cloud.points[n.index].coords)
                .collect();
            let mut normal = pca_normal(&positions);
            if normal.dot(&(p - centroid)) < 0.0 {
                normal = -normal;
            }
            OrientedPoint::new(*p, normal)
        })
        .collect();

    Ok(OrientedCloud { points })
}

/// Smallest-eigenvalue direction of the neighbourhood covariance.
///
/// Falls back to +Z when the neighbourhood is too small or degenerate.
fn pca_normal(neighbors: &[Vector3<f32>]) -> Vector3<f32> {
    if neighbors.len() < 3 {
        return Vector3::z();
    }

    #[allow(clippy::cast_precision_loss)]
    let inv_n = 1.0 / neighbors.len() as f32;
    let mean: Vector3<f32> = neighbors.iter().sum::<Vector3<f32>>() * inv_n;

    let mut cov = Matrix3::zeros();
    for v in neighbors {
        let d = v - mean;
        cov += d * d.transpose();
    }
    cov *= inv_n;

    let eigen = SymmetricEigen::new(cov);
    let min_idx = eigen
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map_or(2, |(i, _)| i);
    let normal: Vector3<f32> = eigen.eigenvectors.column(min_idx).into_owned();

    let norm = normal.norm();
    if norm > 1e-10 {
        normal / norm
    } else {
        Vector3::z()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mesh_types::Point3;

    fn sphere(n: usize, radius: f32) -> PointCloud {
        // Fibonacci sphere.
        let golden = std::f32::consts::PI * (3.0 - 5.0_f32.sqrt());
        (0..n)
            .map(|i| {
                let y = 1.0 - 2.0 * (i as f32 + 0.5) / n as f32;
                let r = (1.0 - y * y).sqrt();
                let theta = golden * i as f32;
                Point3::new(r * theta.cos() * radius, y * radius, r * theta.sin() * radius)
            })
            .collect()
    }

    #[test]
    fn sphere_normals_point_outward() {
        let cloud = sphere(400, 1.0);
        let oriented = estimate_normals(&cloud, 12).unwrap();
        assert_eq!(oriented.len(), 400);
        for p in &oriented.points {
            assert_relative_eq!(p.normal.norm(), 1.0, epsilon = 1e-4);
            let radial = p.position.coords.normalize();
            assert!(p.normal.dot(&radial) > 0.9);
        }
    }

    #[test]
    fn plane_normal_is_axis() {
        let n = pca_normal(&[
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
        ]);
        assert_relative_eq!(n.z.abs(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn rejects_empty_and_small_k() {
        assert!(matches!(
            estimate_normals(&PointCloud::new(), 10),
            Err(KernelError::EmptyInput { .. })
        ));
        let cloud = sphere(10, 1.0);
        assert!(estimate_normals(&cloud, 2).is_err());
    }
}
