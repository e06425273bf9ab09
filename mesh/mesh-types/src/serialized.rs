//! The flat serialized mesh layout.
//!
//! ```text
//! [vertex_count, triangle_count,
//!  v0.x, v0.y, v0.z, ..., v(n-1).z,
//!  t0.a, t0.b, t0.c, ..., t(m-1).c]
//! ```
//!
//! Counts and indices are stored as floats holding integral values. Every
//! reconstruction stage consumes and produces this layout, and exporters
//! read it directly.

use nalgebra::Point3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{MeshError, MeshResult};
use crate::topology::{analyze_edges, EdgeReport};
use crate::{Aabb, IndexedMesh, MeshTopology};

const HEADER_LEN: usize = 2;

/// Largest count or index that `f32` represents exactly (2^24).
pub const MAX_EXACT_INDEX: usize = 1 << 24;

/// A triangle mesh in the flat interchange layout.
///
/// Construction always validates the layout invariants, so a value of this
/// type is never malformed:
///
/// - both counts are non-negative integers;
/// - `len == 2 + 3 * vertex_count + 3 * triangle_count`;
/// - every triangle index is an integer `< vertex_count`.
///
/// # Example
///
/// ```
/// use mesh_types::{SerializedMesh, MeshTopology};
///
/// let mesh = SerializedMesh::from_raw(vec![
///     3.0, 1.0,
///     0.0, 0.0, 0.0,
///     1.0, 0.0, 0.0,
///     0.0, 1.0, 0.0,
///     0.0, 1.0, 2.0,
/// ]).unwrap();
///
/// assert_eq!(mesh.vertex_count(), 3);
/// assert_eq!(mesh.face_count(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "Vec<f32>", into = "Vec<f32>"))]
pub struct SerializedMesh {
    data: Vec<f32>,
    vertex_count: usize,
    triangle_count: usize,
}

impl SerializedMesh {
    /// A mesh with no vertices and no triangles: `[0, 0]`.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            data: vec![0.0, 0.0],
            vertex_count: 0,
            triangle_count: 0,
        }
    }

    /// Validate and wrap a raw float buffer.
    ///
    /// # Errors
    ///
    /// Returns a [`MeshError`] describing the first violated invariant.
    pub fn from_raw(data: Vec<f32>) -> MeshResult<Self> {
        if data.len() < HEADER_LEN {
            return Err(MeshError::MissingHeader { len: data.len() });
        }
        let vertex_count = parse_count("vertex count", data[0])?;
        let triangle_count = parse_count("triangle count", data[1])?;

        let expected = vertex_count
            .checked_add(triangle_count)
            .and_then(|n| n.checked_mul(3))
            .and_then(|n| n.checked_add(HEADER_LEN))
            .ok_or(MeshError::TooLarge {
                field: "buffer length",
                count: usize::MAX,
            })?;
        if data.len() != expected {
            return Err(MeshError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }

        let tri_start = HEADER_LEN + vertex_count * 3;
        for (triangle, chunk) in data[tri_start..].chunks_exact(3).enumerate() {
            for &value in chunk {
                if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
                    return Err(MeshError::NonIntegralIndex { triangle, value });
                }
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let index = value as u32;
                if index as usize >= vertex_count {
                    return Err(MeshError::IndexOutOfRange {
                        triangle,
                        index,
                        vertex_count,
                    });
                }
            }
        }

        Ok(Self {
            data,
            vertex_count,
            triangle_count,
        })
    }

    /// Build from typed vertices and triangles.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::IndexOutOfRange`] for a dangling index and
    /// [`MeshError::TooLarge`] if a count is not exactly representable.
    pub fn from_parts(vertices: &[Point3<f32>], triangles: &[[u32; 3]]) -> MeshResult<Self> {
        for (field, count) in [
            ("vertex count", vertices.len()),
            ("triangle count", triangles.len()),
        ] {
            if count > MAX_EXACT_INDEX {
                return Err(MeshError::TooLarge { field, count });
            }
        }

        let mut data = Vec::with_capacity(HEADER_LEN + 3 * (vertices.len() + triangles.len()));
        #[allow(clippy::cast_precision_loss)]
        {
            data.push(vertices.len() as f32);
            data.push(triangles.len() as f32);
        }
        for v in vertices {
            data.extend_from_slice(&[v.x, v.y, v.z]);
        }
        for (triangle, tri) in triangles.iter().enumerate() {
            for &index in tri {
                if index as usize >= vertices.len() {
                    return Err(MeshError::IndexOutOfRange {
                        triangle,
                        index,
                        vertex_count: vertices.len(),
                    });
                }
                #[allow(clippy::cast_precision_loss)]
                data.push(index as f32);
            }
        }

        Ok(Self {
            data,
            vertex_count: vertices.len(),
            triangle_count: triangles.len(),
        })
    }

    /// Build from an indexed mesh.
    ///
    /// # Errors
    ///
    /// See [`SerializedMesh::from_parts`].
    pub fn from_indexed(mesh: &IndexedMesh) -> MeshResult<Self> {
        Self::from_parts(&mesh.vertices, &mesh.faces)
    }

    /// Convert to an indexed mesh.
    #[must_use]
    pub fn to_indexed(&self) -> IndexedMesh {
        IndexedMesh::from_parts(
            (0..self.vertex_count).filter_map(|i| self.vertex(i)).collect(),
            self.faces().collect(),
        )
    }

    /// Number of vertices.
    #[must_use]
    pub const fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Number of triangles.
    #[must_use]
    pub const fn triangle_count(&self) -> usize {
        self.triangle_count
    }

    /// The full flat buffer, headers included.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Consume into the flat buffer.
    #[must_use]
    pub fn into_raw(self) -> Vec<f32> {
        self.data
    }

    /// The `3 * vertex_count` vertex coordinates.
    #[must_use]
    pub fn vertex_data(&self) -> &[f32] {
        &self.data[HEADER_LEN..HEADER_LEN + self.vertex_count * 3]
    }

    /// The `3 * triangle_count` index floats.
    #[must_use]
    pub fn triangle_data(&self) -> &[f32] {
        &self.data[HEADER_LEN + self.vertex_count * 3..]
    }

    /// Multiply every vertex coordinate by `factor`, in place.
    ///
    /// Counts and triangle indices are untouched.
    pub fn scale_in_place(&mut self, factor: f32) {
        let end = HEADER_LEN + self.vertex_count * 3;
        for value in &mut self.data[HEADER_LEN..end] {
            *value *= factor;
        }
    }

    /// Bounding box of the vertices.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        let mut aabb = Aabb::empty();
        for i in 0..self.vertex_count {
            if let Some(v) = self.vertex(i) {
                aabb.expand_to_include(&v);
            }
        }
        aabb
    }

    /// Edge incidence summary.
    #[must_use]
    pub fn edge_report(&self) -> EdgeReport {
        analyze_edges(self)
    }

    /// True if the mesh is non-empty and every edge borders exactly two
    /// triangles.
    #[must_use]
    pub fn is_watertight(&self) -> bool {
        self.edge_report().is_watertight()
    }
}

impl Default for SerializedMesh {
    fn default() -> Self {
        Self::empty()
    }
}

impl MeshTopology for SerializedMesh {
    fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    fn face_count(&self) -> usize {
        self.triangle_count
    }

    fn vertex(&self, index: usize) -> Option<Point3<f32>> {
        if index >= self.vertex_count {
            return None;
        }
        let o = HEADER_LEN + index * 3;
        Some(Point3::new(self.data[o], self.data[o + 1], self.data[o + 2]))
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn face(&self, index: usize) -> Option<[u32; 3]> {
        if index >= self.triangle_count {
            return None;
        }
        let o = HEADER_LEN + self.vertex_count * 3 + index * 3;
        Some([
            self.data[o] as u32,
            self.data[o + 1] as u32,
            self.data[o + 2] as u32,
        ])
    }
}

impl TryFrom<Vec<f32>> for SerializedMesh {
    type Error = MeshError;

    fn try_from(data: Vec<f32>) -> MeshResult<Self> {
        Self::from_raw(data)
    }
}

impl From<SerializedMesh> for Vec<f32> {
    fn from(mesh: SerializedMesh) -> Self {
        mesh.data
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_count(field: &'static str, value: f32) -> MeshResult<usize> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return Err(MeshError::InvalidCount { field, value });
    }
    Ok(value as usize)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::unit_cube;

    fn single_triangle() -> Vec<f32> {
        vec![
            3.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 2.0,
        ]
    }

    #[test]
    fn parses_single_triangle() {
        let mesh = SerializedMesh::from_raw(single_triangle()).unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.face(0), Some([0, 1, 2]));
        assert_eq!(mesh.vertex(1), Some(Point3::new(1.0, 0.0, 0.0)));
        assert_eq!(mesh.vertex(3), None);
        assert_eq!(mesh.vertex_data().len(), 9);
        assert_eq!(mesh.triangle_data(), &[0.0, 1.0, 2.0]);
    }

    #[test]
    fn empty_mesh_layout() {
        let mesh = SerializedMesh::empty();
        assert_eq!(mesh.as_slice(), &[0.0, 0.0]);
        assert!(MeshTopology::is_empty(&mesh));
        assert!(!mesh.is_watertight());
        assert!(SerializedMesh::from_raw(vec![0.0, 0.0]).is_ok());
    }

    #[test]
    fn rejects_short_buffer() {
        assert!(matches!(
            SerializedMesh::from_raw(vec![1.0]),
            Err(MeshError::MissingHeader { len: 1 })
        ));
    }

    #[test]
    fn rejects_length_mismatch() {
        let mut data = single_triangle();
        data.pop();
        assert!(matches!(
            SerializedMesh::from_raw(data),
            Err(MeshError::LengthMismatch {
                expected: 14,
                actual: 13
            })
        ));
    }

    #[test]
    fn rejects_bad_counts() {
        assert!(matches!(
            SerializedMesh::from_raw(vec![-1.0, 0.0]),
            Err(MeshError::InvalidCount { .. })
        ));
        assert!(matches!(
            SerializedMesh::from_raw(vec![0.5, 0.0]),
            Err(MeshError::InvalidCount { .. })
        ));
        assert!(matches!(
            SerializedMesh::from_raw(vec![f32::NAN, 0.0]),
            Err(MeshError::InvalidCount { .. })
        ));
    }

    #[test]
    fn rejects_dangling_index() {
        let mut data = single_triangle();
        data[13] = 3.0;
        assert!(matches!(
            SerializedMesh::from_raw(data),
            Err(MeshError::IndexOutOfRange { index: 3, .. })
        ));
    }

    #[test]
    fn rejects_fractional_index() {
        let mut data = single_triangle();
        data[12] = 0.5;
        assert!(matches!(
            SerializedMesh::from_raw(data),
            Err(MeshError::NonIntegralIndex { triangle: 0, .. })
        ));
    }

    #[test]
    fn from_parts_checks_indices() {
        let verts = [Point3::origin(); 2];
        assert!(SerializedMesh::from_parts(&verts, &[[0, 1, 2]]).is_err());
    }

    #[test]
    fn scale_only_touches_vertices() {
        let mut mesh = SerializedMesh::from_raw(single_triangle()).unwrap();
        mesh.scale_in_place(2.0);
        let data = mesh.as_slice();
        assert_eq!(&data[0..2], &[3.0, 1.0]);
        assert_eq!(&data[2..11], &[0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 2.0, 0.0]);
        assert_eq!(&data[11..14], &[0.0, 1.0, 2.0]);
    }

    #[test]
    fn indexed_roundtrip() {
        let cube = unit_cube();
        let mesh = SerializedMesh::from_indexed(&cube).unwrap();
        assert_eq!(mesh.as_slice().len(), 2 + 8 * 3 + 12 * 3);
        assert_eq!(mesh.to_indexed(), cube);
        assert!(mesh.is_watertight());
    }

    #[test]
    fn open_triangle_not_watertight() {
        let mesh = SerializedMesh::from_raw(single_triangle()).unwrap();
        assert!(!mesh.is_watertight());
        assert_eq!(mesh.edge_report().boundary_edges, 3);
    }
}
