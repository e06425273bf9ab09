//! Voxel-grid downsampling.

use hashbrown::HashMap;
use mesh_types::{Point3, PointCloud, Vector3};

use crate::error::{KernelError, KernelResult};

const OPERATION: &str = "voxel_grid_filter";

/// Replace the points of every occupied cell by their centroid.
///
/// Cells are keyed by `floor(coord / voxel_size)`. Output order follows the
/// first point seen in each cell, so results are reproducible.
pub fn voxel_grid_filter(cloud: &PointCloud, voxel_size: f32) -> KernelResult<PointCloud> {
    if !(voxel_size.is_finite() && voxel_size > 0.0) {
        return Err(KernelError::invalid(
            OPERATION,
            format!("voxel size must be positive and finite, got {voxel_size}"),
        ));
    }
    if cloud.is_empty() {
        return Ok(PointCloud::new());
    }

    let inv = 1.0 / f64::from(voxel_size);
    let mut slots: HashMap<(i64, i64, i64), usize> = HashMap::with_capacity(cloud.len() / 4);
    let mut cells: Vec<(Vector3<f64>, u32)> = Vec::new();

    for p in cloud {
        #[allow(clippy::cast_possible_truncation)]
        let key = (
            (f64::from(p.x) * inv).floor() as i64,
            (f64::from(p.y) * inv).floor() as i64,
            (f64::from(p.z) * inv).floor() as i64,
        );
        let slot = *slots.entry(key).or_insert_with(|| {
            cells.push((Vector3::zeros(), 0));
            cells.len() - 1
        });
        let cell = &mut cells[slot];
        cell.0 += p.coords.cast::<f64>();
        cell.1 += 1;
    }

    #[allow(clippy::cast_possible_truncation)]
    let filtered = cells
        .into_iter()
        .map(|(sum, count)| {
            let c = sum / f64::from(count);
            Point3::new(c.x as f32, c.y as f32, c.z as f32)
        })
        .collect();
    Ok(filtered)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn merges_points_in_one_cell() {
        let cloud: PointCloud = [
            Point3::new(0.1, 0.1, 0.1),
            Point3::new(0.3, 0.3, 0.3),
            Point3::new(1.5, 0.0, 0.0),
        ]
        .into_iter()
        .collect();
        let out = voxel_grid_filter(&cloud, 1.0).unwrap();
        assert_eq!(out.len(), 2);
        assert_relative_eq!(out.points[0].x, 0.2, epsilon = 1e-6);
        assert_relative_eq!(out.points[1].x, 1.5);
    }

    #[test]
    fn negative_coordinates_use_floor() {
        let cloud: PointCloud = [Point3::new(-0.1, 0.0, 0.0), Point3::new(0.1, 0.0, 0.0)]
            .into_iter()
            .collect();
        assert_eq!(voxel_grid_filter(&cloud, 1.0).unwrap().len(), 2);
    }

    #[test]
    fn filter_is_stable_on_its_output() {
        let cloud: PointCloud = (0..500)
            .map(|i| {
                let f = i as f32;
                Point3::new((f * 0.37).sin(), (f * 0.11).cos(), f * 0.001)
            })
            .collect();
        let once = voxel_grid_filter(&cloud, 0.05).unwrap();
        let twice = voxel_grid_filter(&once, 0.05).unwrap();
        assert!(twice.len() <= once.len());
    }

    #[test]
    fn rejects_bad_voxel_size() {
        let cloud = PointCloud::new();
        assert!(voxel_grid_filter(&cloud, 0.0).is_err());
        assert!(voxel_grid_filter(&cloud, f32::NAN).is_err());
        assert!(voxel_grid_filter(&cloud, 0.01).unwrap().is_empty());
    }
}
