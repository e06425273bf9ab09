//! Property tests for back-projection and accumulation.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]

use std::sync::{Arc, OnceLock};

use mesh_kernels::{CpuKernels, KernelConfig, MeshKernels};
use mesh_scan::backproject::{MAX_DEPTH_M, MIN_CONFIDENCE, MIN_DEPTH_M};
use mesh_scan::{AccumulatorParams, CalibrationEstimator, FrameBackProjector, PointCloudAccumulator};
use mesh_types::{Point3, PointCloud, Vector3};
use proptest::prelude::*;
use sensor_types::{CameraIntrinsics, CapturedFrame};

fn kernels() -> Arc<dyn MeshKernels> {
    static KERNELS: OnceLock<Arc<CpuKernels>> = OnceLock::new();
    KERNELS
        .get_or_init(|| {
            let config = KernelConfig::default().with_num_threads(2);
            Arc::new(CpuKernels::initialize(config).unwrap())
        })
        .clone()
}

fn frame_strategy() -> impl Strategy<Value = CapturedFrame> {
    (1u32..24, 1u32..24).prop_flat_map(|(w, h)| {
        let n = (w * h) as usize;
        (
            prop::collection::vec(0u16..4000, n),
            prop::collection::vec(any::<u8>(), n),
        )
            .prop_map(move |(depth, confidence)| {
                CapturedFrame::new(w, h, depth, confidence)
                    .unwrap()
                    .with_intrinsics(CameraIntrinsics::new(
                        300.0,
                        300.0,
                        w as f32 / 2.0,
                        h as f32 / 2.0,
                    ))
            })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn points_lie_in_depth_range(frame in frame_strategy()) {
        // Identity pose: depth along the view axis is -z.
        let cloud = FrameBackProjector::default().process_frame(&frame).unwrap();
        for p in &cloud {
            prop_assert!(-p.z >= MIN_DEPTH_M && -p.z <= MAX_DEPTH_M, "{p:?}");
        }
    }

    #[test]
    fn only_accepted_pixels_produce_points(frame in frame_strategy()) {
        use sensor_types::SensorFrame;
        let depth = frame.acquire_depth().unwrap();
        let confidence = frame.acquire_confidence().unwrap();
        let accepted = depth
            .as_slice()
            .iter()
            .zip(confidence.as_slice())
            .filter(|&(&mm, &c)| {
                let d = f32::from(mm) / 1000.0;
                c >= MIN_CONFIDENCE && (MIN_DEPTH_M..=MAX_DEPTH_M).contains(&d)
            })
            .count();
        // Frames here are far below the per-frame budget, so every pixel is sampled.
        let cloud = FrameBackProjector::default().process_frame(&frame).unwrap();
        prop_assert_eq!(cloud.len(), accepted);
    }

    #[test]
    fn accumulated_cloud_respects_cap(
        frames in prop::collection::vec(
            prop::collection::vec((-1.0f32..1.0, -1.0f32..1.0, -1.0f32..1.0), 0..400),
            1..12,
        ),
        cap in 1000usize..1500,
    ) {
        let params = AccumulatorParams::default().with_max_points(cap).with_voxel_size(1e-4);
        let mut acc = PointCloudAccumulator::with_params(kernels(), params);
        for pts in frames {
            acc.add_frame(pts.into_iter().map(|(x, y, z)| Point3::new(x, y, z)).collect());
        }
        let cloud = acc.accumulated_cloud();
        prop_assert!(cloud.len() <= cap.max(params.min_points - 1));
    }

    #[test]
    fn calibration_scale_matches_ratio(
        a in (-1.0f32..1.0, -1.0f32..1.0, -1.0f32..1.0),
        d in (0.01f32..0.5),
        known in 1.0f32..1000.0,
    ) {
        let mut c = CalibrationEstimator::new();
        let a = Point3::new(a.0, a.1, a.2);
        c.set_point_a(a);
        c.set_point_b(a + Vector3::new(d, 0.0, 0.0));
        c.set_known_distance(known);
        let expected = known / (d * 1000.0);
        prop_assert!(c.state().is_calibrated);
        prop_assert!((c.scale_factor() - expected).abs() <= expected * 1e-3);
    }
}

#[test]
fn identity_filter_downsample_is_idempotent() {
    // Points on a 1 cm lattice survive a 2 mm voxel filter unchanged.
    let mut cloud = PointCloud::new();
    for i in 0..12u8 {
        for j in 0..12u8 {
            cloud.push(Point3::new(f32::from(i) * 0.01, f32::from(j) * 0.01, 0.5));
        }
    }
    let mut acc = PointCloudAccumulator::new(kernels());
    for _ in 0..8 {
        acc.add_frame(cloud.clone());
    }
    let first = acc.accumulated_cloud();
    acc.downsample();
    let second = acc.accumulated_cloud();
    assert_eq!(first.len(), 144);
    assert_eq!(second.len(), first.len());
}
