//! Triangle type for geometric calculations.

use nalgebra::{Point3, Vector3};

/// Cross-product length below which a triangle is treated as degenerate
/// when computing its unit normal.
pub const DEGENERATE_NORMAL_EPSILON: f32 = 1e-8;

/// A triangle with concrete vertex positions.
///
/// Winding is counter-clockwise when viewed from the front.
///
/// # Example
///
/// ```
/// use mesh_types::{Triangle, Point3};
///
/// let tri = Triangle::new(
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
/// );
///
/// assert!((tri.area() - 0.5).abs() < 1e-6);
/// assert_eq!(tri.unit_normal_or_zero().z, 1.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// First vertex.
    pub v0: Point3<f32>,
    /// Second vertex.
    pub v1: Point3<f32>,
    /// Third vertex.
    pub v2: Point3<f32>,
}

impl Triangle {
    /// Create a new triangle from three points.
    #[inline]
    #[must_use]
    pub const fn new(v0: Point3<f32>, v1: Point3<f32>, v2: Point3<f32>) -> Self {
        Self { v0, v1, v2 }
    }

    /// `(v1 - v0) × (v2 - v0)`; its length is twice the area.
    #[inline]
    #[must_use]
    pub fn normal_unnormalized(&self) -> Vector3<f32> {
        let e1 = self.v1 - self.v0;
        let e2 = self.v2 - self.v0;
        e1.cross(&e2)
    }

    /// Unit normal, or the zero vector for degenerate triangles.
    ///
    /// A triangle is degenerate when the cross-product length is below
    /// [`DEGENERATE_NORMAL_EPSILON`]; no division happens in that case.
    #[must_use]
    pub fn unit_normal_or_zero(&self) -> Vector3<f32> {
        let n = self.normal_unnormalized();
        let len = n.norm();
        if len < DEGENERATE_NORMAL_EPSILON {
            Vector3::zeros()
        } else {
            n / len
        }
    }

    /// Unit normal, or `None` for degenerate triangles.
    #[must_use]
    pub fn normal(&self) -> Option<Vector3<f32>> {
        let n = self.unit_normal_or_zero();
        if n == Vector3::zeros() {
            None
        } else {
            Some(n)
        }
    }

    /// Triangle area.
    #[must_use]
    pub fn area(&self) -> f32 {
        self.normal_unnormalized().norm() * 0.5
    }

    /// Centroid.
    #[must_use]
    pub fn centroid(&self) -> Point3<f32> {
        Point3::from((self.v0.coords + self.v1.coords + self.v2.coords) / 3.0)
    }
}
