//! Traits for mesh types.

use crate::Triangle;
use nalgebra::Point3;

/// Read access shared by every mesh representation.
///
/// Both the working [`IndexedMesh`](crate::IndexedMesh) and the flat
/// [`SerializedMesh`](crate::SerializedMesh) implement this, so topology
/// analysis and exporters work on either without conversion.
pub trait MeshTopology {
    /// Get the number of vertices.
    fn vertex_count(&self) -> usize;

    /// Get the number of faces (triangles).
    fn face_count(&self) -> usize;

    /// Check if the mesh is empty.
    fn is_empty(&self) -> bool {
        self.vertex_count() == 0 || self.face_count() == 0
    }

    /// Get a vertex position by index.
    fn vertex(&self, index: usize) -> Option<Point3<f32>>;

    /// Get a face by index.
    fn face(&self, index: usize) -> Option<[u32; 3]>;

    /// Get a triangle by face index with resolved vertex positions.
    fn triangle(&self, face_index: usize) -> Option<Triangle> {
        let [a, b, c] = self.face(face_index)?;
        Some(Triangle::new(
            self.vertex(a as usize)?,
            self.vertex(b as usize)?,
            self.vertex(c as usize)?,
        ))
    }

    /// Iterate over all faces.
    fn faces(&self) -> impl Iterator<Item = [u32; 3]> {
        (0..self.face_count()).filter_map(move |i| self.face(i))
    }

    /// Iterate over all triangles.
    fn triangles(&self) -> impl Iterator<Item = Triangle> {
        (0..self.face_count()).filter_map(move |i| self.triangle(i))
    }
}
