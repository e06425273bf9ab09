//! Property tests for the CPU kernels through the public trait.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::OnceLock;

use mesh_kernels::{CpuKernels, KernelConfig, MeshKernels};
use mesh_types::{unit_cube, Point3, PointCloud, SerializedMesh};
use proptest::prelude::*;

fn kernels() -> &'static CpuKernels {
    static KERNELS: OnceLock<CpuKernels> = OnceLock::new();
    KERNELS.get_or_init(|| {
        CpuKernels::initialize(KernelConfig::default().with_num_threads(2)).unwrap()
    })
}

fn cloud_strategy() -> impl Strategy<Value = PointCloud> {
    prop::collection::vec((-1.0f32..1.0, -1.0f32..1.0, -1.0f32..1.0), 0..300)
        .prop_map(|pts| pts.into_iter().map(|(x, y, z)| Point3::new(x, y, z)).collect())
}

proptest! {
    #[test]
    fn voxel_filter_never_grows(cloud in cloud_strategy(), voxel in 0.01f32..0.5) {
        let out = kernels().voxel_grid_filter(&cloud, voxel).unwrap();
        prop_assert!(out.len() <= cloud.len());
        prop_assert_eq!(out.is_empty(), cloud.is_empty());
    }

    #[test]
    fn voxel_filter_output_stays_in_bounds(cloud in cloud_strategy(), voxel in 0.01f32..0.5) {
        let out = kernels().voxel_grid_filter(&cloud, voxel).unwrap();
        let bounds = cloud.bounds().expanded(1e-5);
        for p in &out {
            prop_assert!(p.x >= bounds.min.x && p.x <= bounds.max.x);
            prop_assert!(p.y >= bounds.min.y && p.y <= bounds.max.y);
            prop_assert!(p.z >= bounds.min.z && p.z <= bounds.max.z);
        }
    }

    #[test]
    fn outlier_removal_returns_subset(
        cloud in cloud_strategy(),
        k in 1usize..12,
        ratio in 0.5f32..3.0,
    ) {
        let out = kernels().statistical_outlier_removal(&cloud, k, ratio).unwrap();
        prop_assert!(out.len() <= cloud.len());
        for p in &out {
            prop_assert!(cloud.points.contains(p));
        }
    }

    #[test]
    fn normals_are_unit_length(
        cloud in cloud_strategy().prop_filter("need points", |c| c.len() >= 3),
    ) {
        let out = kernels().estimate_normals(&cloud, 8).unwrap();
        prop_assert_eq!(out.len(), cloud.len());
        for p in &out.points {
            prop_assert!((p.normal.norm() - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn decimation_never_adds_faces(ratio in 0.05f32..1.0) {
        let mesh = SerializedMesh::from_indexed(&unit_cube()).unwrap();
        let out = kernels().decimate_mesh(&mesh, ratio).unwrap();
        prop_assert!(out.triangle_count() <= mesh.triangle_count());
    }
}
