//! Laplacian mesh smoothing.
//!
//! Each interior vertex moves toward the centroid of its one-ring:
//!
//! ```text
//! v_new = v + lambda * (centroid(N(v)) - v)
//! ```
//!
//! Boundary vertices stay fixed so open patches do not shrink inward.

use hashbrown::{HashMap, HashSet};
use mesh_types::{edge_face_counts, IndexedMesh, Vector3};
use rayon::prelude::*;

use crate::error::{KernelError, KernelResult};

const OPERATION: &str = "smooth_mesh";

/// Run `iterations` passes of Laplacian smoothing in place.
///
/// Returns the largest displacement applied to any vertex in any pass.
pub fn smooth(mesh: &mut IndexedMesh, iterations: u32, lambda: f32) -> KernelResult<f32> {
    if !(lambda > 0.0 && lambda <= 1.0) {
        return Err(KernelError::invalid(
            OPERATION,
            format!("lambda must be in (0, 1], got {lambda}"),
        ));
    }
    if iterations == 0 || mesh.faces.is_empty() {
        return Ok(0.0);
    }

    let neighbors = vertex_neighbors(mesh);
    let boundary = boundary_vertices(mesh);

    let mut max_displacement = 0.0_f32;
    for _ in 0..iterations {
        let vertices = &mesh.vertices;
        let displacements: Vec<Vector3<f32>> = (0..vertices.len())
            .into_par_iter()
            .map(|i| {
                #[allow(clippy::cast_possible_truncation)]
                let idx = i as u32;
                if boundary.contains(&idx) {
                    return Vector3::zeros();
                }
                match neighbors.get(&idx) {
                    Some(ring) if !ring.is_empty() => {
                        let sum: Vector3<f32> =
                            ring.iter().map(|&n| vertices[n as usize].coords).sum();
                        #[allow(clippy::cast_precision_loss)]
                        let centroid = sum / ring.len() as f32;
                        (centroid - vertices[i].coords) * lambda
                    }
                    _ => Vector3::zeros(),
                }
            })
            .collect();

        for (v, d) in mesh.vertices.iter_mut().zip(&displacements) {
            max_displacement = max_displacement.max(d.norm());
            v.coords += d;
        }
    }
    Ok(max_displacement)
}

fn vertex_neighbors(mesh: &IndexedMesh) -> HashMap<u32, Vec<u32>> {
    let mut sets: HashMap<u32, HashSet<u32>> = HashMap::new();
    for face in &mesh.faces {
        for i in 0..3 {
            let ring = sets.entry(face[i]).or_default();
            ring.insert(face[(i + 1) % 3]);
            ring.insert(face[(i + 2) % 3]);
        }
    }
    sets.into_iter()
        .map(|(k, v)| {
            let mut ring: Vec<u32> = v.into_iter().collect();
            ring.sort_unstable();
            (k, ring)
        })
        .collect()
}

fn boundary_vertices(mesh: &IndexedMesh) -> HashSet<u32> {
    edge_face_counts(mesh)
        .into_iter()
        .filter(|&(_, count)| count == 1)
        .flat_map(|((a, b), _)| [a, b])
        .collect()
}
