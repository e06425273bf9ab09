//! Point-to-point ICP.
//!
//! Each iteration pairs every transformed source point with its nearest
//! target point, solves the best rigid motion for those pairs with the
//! Kabsch SVD, and composes it onto the running transform. Iteration stops
//! when the RMS error changes by less than the tolerance.

use mesh_types::{Matrix4, Point3, PointCloud, Vector3};
use nalgebra::{Matrix3, Rotation3, Translation3};
use rayon::prelude::*;
use tracing::debug;

use super::spatial::PointIndex;
use crate::error::{KernelError, KernelResult};

const OPERATION: &str = "icp_registration";

/// Outcome of an ICP run.
#[derive(Debug, Clone)]
pub struct IcpOutcome {
    /// Homogeneous transform taking source into the target frame.
    pub transform: Matrix4<f64>,
    /// RMS distance of the last set of correspondences.
    pub rms_error: f64,
    /// Iterations run.
    pub iterations: u32,
    /// Whether the tolerance was reached before the iteration limit.
    pub converged: bool,
}

/// Align `source` to `target`.
pub fn icp(
    source: &PointCloud,
    target: &PointCloud,
    max_iterations: u32,
    tolerance: f32,
) -> KernelResult<IcpOutcome> {
    if !(tolerance.is_finite() && tolerance >= 0.0) {
        return Err(KernelError::invalid(
            OPERATION,
            format!("tolerance must be non-negative, got {tolerance}"),
        ));
    }
    if source.is_empty() {
        return Err(KernelError::EmptyInput {
            operation: OPERATION,
        });
    }
    let index = PointIndex::build(&target.points, OPERATION)?;

    let source: Vec<Point3<f64>> = source.iter().map(|p| p.cast::<f64>()).collect();
    let target_pts: Vec<Point3<f64>> = target.iter().map(|p| p.cast::<f64>()).collect();

    let mut transform = Matrix4::<f64>::identity();
    let mut prev_rms = f64::MAX;
    let mut outcome = IcpOutcome {
        transform,
        rms_error: 0.0,
        iterations: 0,
        converged: false,
    };

    for iteration in 1..=max_iterations {
        let moved: Vec<Point3<f64>> = source
            .iter()
            .map(|p| transform.transform_point(p))
            .collect();

        let pairs: Vec<(Point3<f64>, Point3<f64>, f64)> = moved
            .par_iter()
            .map(|p| {
                #[allow(clippy::cast_possible_truncation)]
                let query = Point3::new(p.x as f32, p.y as f32, p.z as f32);
                let n = index.nearest_one(&query);
                let t = target_pts[n.index];
                (*p, t, (t - p).norm_squared())
            })
            .collect();

        let (from, to): (Vec<_>, Vec<_>) = pairs.iter().map(|&(s, t, _)| (s, t)).unzip();
        let step = rigid_transform(&from, &to)?;
        transform = step * transform;

        #[allow(clippy::cast_precision_loss)]
        let rms = (pairs.iter().map(|p| p.2).sum::<f64>() / pairs.len() as f64).sqrt();
        outcome.rms_error = rms;
        outcome.iterations = iteration;
        if (prev_rms - rms).abs() < f64::from(tolerance) {
            outcome.converged = true;
            break;
        }
        prev_rms = rms;
    }
    outcome.transform = transform;

    debug!(
        iterations = outcome.iterations,
        rms = outcome.rms_error,
        converged = outcome.converged,
        "ICP registration"
    );
    Ok(outcome)
}

/// Best rigid motion mapping `from[i]` onto `to[i]` (Kabsch).
pub fn rigid_transform(from: &[Point3<f64>], to: &[Point3<f64>]) -> KernelResult<Matrix4<f64>> {
    if from.is_empty() || from.len() != to.len() {
        return Err(KernelError::NoCorrespondences);
    }
    #[allow(clippy::cast_precision_loss)]
    let inv_n = 1.0 / from.len() as f64;
    let from_c: Vector3<f64> = from.iter().map(|p| p.coords).sum::<Vector3<f64>>() * inv_n;
    let to_c: Vector3<f64> = to.iter().map(|p| p.coords).sum::<Vector3<f64>>() * inv_n;

    let mut h = Matrix3::zeros();
    for (s, t) in from.iter().zip(to) {
        h += (s.coords - from_c) * (t.coords - to_c).transpose();
    }

    let svd = h.svd(true, true);
    let u = svd.u.ok_or(KernelError::SvdFailed)?;
    let v = svd.v_t.ok_or(KernelError::SvdFailed)?.transpose();

    let mut r = v * u.transpose();
    if r.determinant() < 0.0 {
        let mut v = v;
        v.column_mut(2).neg_mut();
        r = v * u.transpose();
    }

    let rotation = Rotation3::from_matrix_unchecked(r);
    let translation = Translation3::from(to_c - rotation * from_c);
    Ok((translation * rotation).to_homogeneous())
}
