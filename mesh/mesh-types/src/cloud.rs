//! Point cloud buffers.
//!
//! Two layouts are exchanged between capture and reconstruction:
//!
//! | Type | Flat layout |
//! |------|-------------|
//! | [`PointCloud`] | `[x0, y0, z0, x1, y1, z1, ...]` |
//! | [`OrientedCloud`] | `[x0, y0, z0, nx0, ny0, nz0, ...]` |

use nalgebra::{Matrix4, Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{MeshError, MeshResult};
use crate::Aabb;

/// An ordered set of world-space points (meters).
///
/// Order carries no meaning but is preserved so that pipelines stay
/// reproducible.
///
/// # Example
///
/// ```
/// use mesh_types::{PointCloud, Point3};
///
/// let mut cloud = PointCloud::new();
/// cloud.push(Point3::new(0.0, 0.0, 0.0));
/// cloud.push(Point3::new(2.0, 0.0, 0.0));
///
/// assert_eq!(cloud.len(), 2);
/// assert_eq!(cloud.centroid(), Some(Point3::new(1.0, 0.0, 0.0)));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointCloud {
    /// The points.
    pub points: Vec<Point3<f32>>,
}

impl PointCloud {
    /// Create an empty cloud.
    #[must_use]
    pub const fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Create an empty cloud with capacity for `capacity` points.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    /// Wrap an existing point vector.
    #[must_use]
    pub const fn from_points(points: Vec<Point3<f32>>) -> Self {
        Self { points }
    }

    /// Parse a flat `[x, y, z, ...]` buffer.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::RaggedBuffer`] if the length is not a multiple of 3.
    pub fn from_flat(values: &[f32]) -> MeshResult<Self> {
        if values.len() % 3 != 0 {
            return Err(MeshError::RaggedBuffer {
                len: values.len(),
                stride: 3,
            });
        }
        Ok(values
            .chunks_exact(3)
            .map(|c| Point3::new(c[0], c[1], c[2]))
            .collect())
    }

    /// Flatten to `[x, y, z, ...]`.
    #[must_use]
    pub fn to_flat(&self) -> Vec<f32> {
        self.points
            .iter()
            .flat_map(|p| [p.x, p.y, p.z])
            .collect()
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if the cloud has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Append one point.
    pub fn push(&mut self, point: Point3<f32>) {
        self.points.push(point);
    }

    /// Append every point of `other`, consuming it.
    pub fn append(&mut self, other: &mut Self) {
        self.points.append(&mut other.points);
    }

    /// Remove all points, keeping the allocation.
    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Iterate over the points.
    pub fn iter(&self) -> std::slice::Iter<'_, Point3<f32>> {
        self.points.iter()
    }

    /// Bounding box of the cloud.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.points.iter())
    }

    /// Mean position, or `None` if empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn centroid(&self) -> Option<Point3<f32>> {
        if self.points.is_empty() {
            return None;
        }
        let sum: Vector3<f32> = self.points.iter().map(|p| p.coords).sum();
        Some(Point3::from(sum / self.points.len() as f32))
    }

    /// Apply a homogeneous transform to every point.
    pub fn transform(&mut self, matrix: &Matrix4<f32>) {
        for p in &mut self.points {
            *p = matrix.transform_point(p);
        }
    }
}

impl FromIterator<Point3<f32>> for PointCloud {
    fn from_iter<I: IntoIterator<Item = Point3<f32>>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a PointCloud {
    type Item = &'a Point3<f32>;
    type IntoIter = std::slice::Iter<'a, Point3<f32>>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// A point with an estimated surface normal.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OrientedPoint {
    /// Position.
    pub position: Point3<f32>,
    /// Unit normal.
    pub normal: Vector3<f32>,
}

impl OrientedPoint {
    /// Create an oriented point.
    #[must_use]
    pub const fn new(position: Point3<f32>, normal: Vector3<f32>) -> Self {
        Self { position, normal }
    }
}

/// Points with normals, the input of surface reconstruction.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OrientedCloud {
    /// The oriented points.
    pub points: Vec<OrientedPoint>,
}

impl OrientedCloud {
    /// Create an empty oriented cloud.
    #[must_use]
    pub const fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Parse an interleaved `[x, y, z, nx, ny, nz, ...]` buffer.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::RaggedBuffer`] if the length is not a multiple of 6.
    pub fn from_interleaved(values: &[f32]) -> MeshResult<Self> {
        if values.len() % 6 != 0 {
            return Err(MeshError::RaggedBuffer {
                len: values.len(),
                stride: 6,
            });
        }
        Ok(Self {
            points: values
                .chunks_exact(6)
                .map(|c| {
                    OrientedPoint::new(
                        Point3::new(c[0], c[1], c[2]),
                        Vector3::new(c[3], c[4], c[5]),
                    )
                })
                .collect(),
        })
    }

    /// Flatten to the interleaved layout.
    #[must_use]
    pub fn to_interleaved(&self) -> Vec<f32> {
        self.points
            .iter()
            .flat_map(|p| {
                [
                    p.position.x,
                    p.position.y,
                    p.position.z,
                    p.normal.x,
                    p.normal.y,
                    p.normal.z,
                ]
            })
            .collect()
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Bounding box of the positions.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        let mut aabb = Aabb::empty();
        for p in &self.points {
            aabb.expand_to_include(&p.position);
        }
        aabb
    }

    /// Drop the normals.
    #[must_use]
    pub fn positions(&self) -> PointCloud {
        self.points.iter().map(|p| p.position).collect()
    }
}

impl FromIterator<OrientedPoint> for OrientedCloud {
    fn from_iter<I: IntoIterator<Item = OrientedPoint>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}
