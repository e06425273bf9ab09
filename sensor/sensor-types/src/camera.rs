//! Camera calibration and pose types.

use nalgebra::{Matrix4, Point3};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{SensorError, SensorResult};

/// Camera intrinsic parameters (pinhole model) of the depth image.
///
/// Projects a camera-space point `[X, Y, Z]` to pixel coordinates:
/// ```text
/// u = fx * X/Z + cx
/// v = fy * Y/Z + cy
/// ```
///
/// Values are expressed in depth-image pixels, not in the (usually larger)
/// color image the sensor may also deliver.
///
/// # Example
///
/// ```
/// use sensor_types::CameraIntrinsics;
///
/// let intrinsics = CameraIntrinsics::new(200.0, 200.0, 80.0, 60.0);
/// assert!(intrinsics.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CameraIntrinsics {
    /// Focal length in pixels (x direction).
    pub fx: f32,
    /// Focal length in pixels (y direction).
    pub fy: f32,
    /// Principal point x-coordinate in pixels.
    pub cx: f32,
    /// Principal point y-coordinate in pixels.
    pub cy: f32,
}

impl CameraIntrinsics {
    /// Creates new camera intrinsics.
    #[must_use]
    pub const fn new(fx: f32, fy: f32, cx: f32, cy: f32) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Creates intrinsics with equal focal lengths and a centered principal point.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ideal(focal_length: f32, width: u32, height: u32) -> Self {
        Self {
            fx: focal_length,
            fy: focal_length,
            cx: width as f32 / 2.0,
            cy: height as f32 / 2.0,
        }
    }

    /// Checks that both focal lengths are finite and non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::InvalidIntrinsics`] otherwise.
    pub fn validate(&self) -> SensorResult<()> {
        let ok = |f: f32| f.is_finite() && f.abs() > f32::EPSILON;
        if !ok(self.fx) || !ok(self.fy) {
            return Err(SensorError::InvalidIntrinsics(format!(
                "focal lengths must be finite and non-zero (fx={}, fy={})",
                self.fx, self.fy
            )));
        }
        if !self.cx.is_finite() || !self.cy.is_finite() {
            return Err(SensorError::InvalidIntrinsics(
                "principal point must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Camera-to-world transform of a frame.
///
/// Stored as a 4×4 homogeneous matrix. Columns 0..3 hold the rotation and
/// column 3 the translation. The raw representation exchanged with sensor
/// SDKs is 16 floats in column-major order.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CameraPose {
    matrix: Matrix4<f32>,
}

impl CameraPose {
    /// The identity pose (camera at the world origin looking down -Z).
    #[must_use]
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Creates a pose from 16 floats in column-major order.
    ///
    /// # Example
    ///
    /// ```
    /// use sensor_types::CameraPose;
    ///
    /// let mut m = [0.0_f32; 16];
    /// m[0] = 1.0;
    /// m[5] = 1.0;
    /// m[10] = 1.0;
    /// m[15] = 1.0;
    /// m[12] = 2.0; // translation x
    /// let pose = CameraPose::from_column_major(&m);
    /// assert_eq!(pose.translation(), [2.0, 0.0, 0.0]);
    /// ```
    #[must_use]
    pub fn from_column_major(values: &[f32; 16]) -> Self {
        Self {
            matrix: Matrix4::from_column_slice(values),
        }
    }

    /// Creates a pose from a homogeneous matrix.
    #[must_use]
    pub const fn from_matrix(matrix: Matrix4<f32>) -> Self {
        Self { matrix }
    }

    /// Creates a pure translation pose.
    #[must_use]
    pub fn from_translation(x: f32, y: f32, z: f32) -> Self {
        Self {
            matrix: Matrix4::new_translation(&nalgebra::Vector3::new(x, y, z)),
        }
    }

    /// Returns the homogeneous matrix.
    #[must_use]
    pub const fn matrix(&self) -> &Matrix4<f32> {
        &self.matrix
    }

    /// Returns the 16 matrix entries in column-major order.
    #[must_use]
    pub fn to_column_major(&self) -> [f32; 16] {
        let mut out = [0.0; 16];
        out.copy_from_slice(self.matrix.as_slice());
        out
    }

    /// Returns the translation column.
    #[must_use]
    pub fn translation(&self) -> [f32; 3] {
        [
            self.matrix[(0, 3)],
            self.matrix[(1, 3)],
            self.matrix[(2, 3)],
        ]
    }

    /// Maps a camera-local point into world space.
    ///
    /// Only the rotation columns and the translation column are used; the
    /// projective row is ignored.
    #[must_use]
    pub fn transform_point(&self, local: &Point3<f32>) -> Point3<f32> {
        let m = &self.matrix;
        let row = |r: usize| {
            m[(r, 0)].mul_add(
                local.x,
                m[(r, 1)].mul_add(local.y, m[(r, 2)].mul_add(local.z, m[(r, 3)])),
            )
        };
        Point3::new(row(0), row(1), row(2))
    }
}

impl Default for CameraPose {
    fn default() -> Self {
        Self::identity()
    }
}
