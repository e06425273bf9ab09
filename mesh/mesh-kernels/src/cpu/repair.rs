//! Mesh repair for reconstructed scan surfaces.
//!
//! Steps, in order:
//!
//! 1. Remove degenerate triangles (repeated indices or tiny area)
//! 2. Weld coincident vertices
//! 3. Remove duplicate faces
//! 4. Drop faces that would put a third triangle on an edge
//! 5. Fill boundary loops with a centroid fan
//! 6. Remove unreferenced vertices

use std::fmt;

use hashbrown::{HashMap, HashSet};
use mesh_types::{edge_face_counts, edge_key, IndexedMesh, MeshTopology, Point3, Vector3};

/// Tolerances used by [`repair`].
#[derive(Debug, Clone, Copy)]
pub struct RepairTolerances {
    /// Triangles with area at or below this are removed.
    pub degenerate_area: f32,
    /// Vertices closer than this are welded.
    pub weld_epsilon: f32,
}

impl Default for RepairTolerances {
    fn default() -> Self {
        Self {
            degenerate_area: 1e-10,
            weld_epsilon: 1e-6,
        }
    }
}

/// What a repair pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairSummary {
    /// Degenerate triangles removed.
    pub degenerates_removed: usize,
    /// Vertices merged into another.
    pub vertices_welded: usize,
    /// Duplicate faces removed.
    pub duplicates_removed: usize,
    /// Faces removed to restore edge manifoldness.
    pub non_manifold_removed: usize,
    /// Boundary loops closed.
    pub holes_filled: usize,
    /// Unreferenced vertices removed.
    pub unreferenced_removed: usize,
}

impl fmt::Display for RepairSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Repair: {} degenerate, {} welded, {} duplicate, {} non-manifold, \
             {} holes filled, {} unreferenced",
            self.degenerates_removed,
            self.vertices_welded,
            self.duplicates_removed,
            self.non_manifold_removed,
            self.holes_filled,
            self.unreferenced_removed
        )
    }
}

/// Run every repair step on `mesh`.
pub fn repair(mesh: &mut IndexedMesh, tol: &RepairTolerances) -> RepairSummary {
    let mut summary = RepairSummary {
        degenerates_removed: remove_degenerate_triangles(mesh, tol.degenerate_area),
        vertices_welded: weld_vertices(mesh, tol.weld_epsilon),
        ..RepairSummary::default()
    };
    summary.degenerates_removed += remove_degenerate_triangles(mesh, tol.degenerate_area);
    summary.duplicates_removed = remove_duplicate_faces(mesh);
    summary.non_manifold_removed = remove_non_manifold_faces(mesh);
    summary.holes_filled = fill_holes(mesh);
    summary.unreferenced_removed = mesh.remove_unreferenced_vertices();
    summary
}

/// Remove faces with repeated or dangling indices, or area `<= area_threshold`.
pub fn remove_degenerate_triangles(mesh: &mut IndexedMesh, area_threshold: f32) -> usize {
    let before = mesh.faces.len();
    let vertices = &mesh.vertices;
    mesh.faces.retain(|&[a, b, c]| {
        if a == b || b == c || a == c {
            return false;
        }
        match (
            vertices.get(a as usize),
            vertices.get(b as usize),
            vertices.get(c as usize),
        ) {
            (Some(p0), Some(p1), Some(p2)) => {
                (p1 - p0).cross(&(p2 - p0)).norm() * 0.5 > area_threshold
            }
            _ => false,
        }
    });
    before - mesh.faces.len()
}

fn cell_of(p: &Point3<f32>, cell_size: f32) -> (i64, i64, i64) {
    #[allow(clippy::cast_possible_truncation)]
    let cell = (
        (p.x / cell_size).floor() as i64,
        (p.y / cell_size).floor() as i64,
        (p.z / cell_size).floor() as i64,
    );
    cell
}

/// Merge vertices closer than `epsilon` using a spatial hash.
///
/// Returns the number of vertices merged away. Faces are remapped;
/// merged vertices stay in the buffer until unreferenced ones are removed.
#[allow(clippy::cast_possible_truncation)]
pub fn weld_vertices(mesh: &mut IndexedMesh, epsilon: f32) -> usize {
    if mesh.vertices.is_empty() || epsilon <= 0.0 {
        return 0;
    }
    let cell_size = epsilon * 2.0;

    let mut hash: HashMap<(i64, i64, i64), Vec<u32>> = HashMap::new();
    for (i, v) in mesh.vertices.iter().enumerate() {
        hash.entry(cell_of(v, cell_size)).or_default().push(i as u32);
    }

    let mut remap: Vec<u32> = (0..mesh.vertices.len() as u32).collect();
    let mut merged = 0;
    for (i, v) in mesh.vertices.iter().enumerate() {
        let i = i as u32;
        if remap[i as usize] != i {
            continue;
        }
        let (cx, cy, cz) = cell_of(v, cell_size);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(candidates) = hash.get(&(cx + dx, cy + dy, cz + dz)) else {
                        continue;
                    };
                    for &other in candidates {
                        if other <= i || remap[other as usize] != other {
                            continue;
                        }
                        if (v - mesh.vertices[other as usize]).norm() < epsilon {
                            remap[other as usize] = i;
                            merged += 1;
                        }
                    }
                }
            }
        }
    }

    if merged > 0 {
        for face in &mut mesh.faces {
            for idx in face.iter_mut() {
                *idx = remap[*idx as usize];
            }
        }
    }
    merged
}

/// Remove faces using the same three vertices as an earlier face.
pub fn remove_duplicate_faces(mesh: &mut IndexedMesh) -> usize {
    let before = mesh.faces.len();
    let mut seen: HashSet<[u32; 3]> = HashSet::with_capacity(before);
    mesh.faces.retain(|face| {
        let mut key = *face;
        key.sort_unstable();
        seen.insert(key)
    });
    before - mesh.faces.len()
}

/// Keep faces in order, skipping any face that would give one of its edges
/// a third incident face.
pub fn remove_non_manifold_faces(mesh: &mut IndexedMesh) -> usize {
    let before = mesh.faces.len();
    let mut counts: HashMap<(u32, u32), u8> = HashMap::with_capacity(before * 3 / 2);
    mesh.faces.retain(|&[a, b, c]| {
        let edges = [edge_key(a, b), edge_key(b, c), edge_key(c, a)];
        if edges.iter().any(|e| counts.get(e).copied().unwrap_or(0) >= 2) {
            return false;
        }
        for e in edges {
            *counts.entry(e).or_insert(0) += 1;
        }
        true
    });
    before - mesh.faces.len()
}

/// Close every boundary loop. Loops of three edges get one triangle;
/// larger loops get a fan around a new centroid vertex.
///
/// Returns the number of loops filled.
pub fn fill_holes(mesh: &mut IndexedMesh) -> usize {
    let loops = boundary_loops(mesh);
    let mut filled = 0;
    for hole in loops {
        match hole.len() {
            0..=2 => continue,
            3 => mesh.faces.push([hole[0], hole[1], hole[2]]),
            n => {
                #[allow(clippy::cast_precision_loss)]
                let centroid = hole
                    .iter()
                    .map(|&i| mesh.vertices[i as usize].coords)
                    .sum::<Vector3<f32>>()
                    / n as f32;
                #[allow(clippy::cast_possible_truncation)]
                let c = mesh.vertices.len() as u32;
                mesh.vertices.push(Point3::from(centroid));
                for k in 0..n {
                    mesh.faces.push([hole[k], hole[(k + 1) % n], c]);
                }
            }
        }
        filled += 1;
    }
    filled
}

/// Boundary loops, each ordered so that filling faces wind consistently
/// with their neighbours.
fn boundary_loops(mesh: &IndexedMesh) -> Vec<Vec<u32>> {
    let counts = edge_face_counts(mesh);

    // A boundary half-edge u->v of an existing face is closed by a fill
    // face containing v->u.
    let mut next: HashMap<u32, Vec<u32>> = HashMap::new();
    for [a, b, c] in mesh.faces() {
        for (u, v) in [(a, b), (b, c), (c, a)] {
            if counts.get(&edge_key(u, v)) == Some(&1) {
                next.entry(v).or_default().push(u);
            }
        }
    }

    let mut starts: Vec<u32> = next.keys().copied().collect();
    starts.sort_unstable();

    let mut loops = Vec::new();
    for start in starts {
        while next.get(&start).is_some_and(|v| !v.is_empty()) {
            let mut path = vec![start];
            let mut current = start;
            let closed = loop {
                let Some(to) = next.get_mut(&current).and_then(Vec::pop) else {
                    break false;
                };
                if to == start {
                    break true;
                }
                path.push(to);
                current = to;
                if path.len() > mesh.vertices.len() {
                    break false;
                }
            };
            if closed {
                loops.push(path);
            }
        }
    }
    loops
}
