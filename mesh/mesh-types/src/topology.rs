//! Edge incidence analysis.

use hashbrown::HashMap;

use crate::MeshTopology;

/// Undirected edge key with the smaller vertex first.
#[must_use]
pub const fn edge_key(a: u32, b: u32) -> (u32, u32) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Count how many faces border every undirected edge.
#[must_use]
pub fn edge_face_counts<M: MeshTopology + ?Sized>(mesh: &M) -> HashMap<(u32, u32), u32> {
    let mut counts: HashMap<(u32, u32), u32> = HashMap::with_capacity(mesh.face_count() * 3 / 2);
    for [a, b, c] in mesh.faces() {
        for (u, v) in [(a, b), (b, c), (c, a)] {
            *counts.entry(edge_key(u, v)).or_insert(0) += 1;
        }
    }
    counts
}

/// Summary of how edges are shared between faces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeReport {
    /// Number of faces analysed.
    pub face_count: usize,
    /// Number of distinct undirected edges.
    pub edge_count: usize,
    /// Edges with exactly one incident face.
    pub boundary_edges: usize,
    /// Edges with three or more incident faces.
    pub non_manifold_edges: usize,
}

impl EdgeReport {
    /// Every edge has exactly two incident faces, and there is at least one face.
    #[must_use]
    pub const fn is_watertight(&self) -> bool {
        self.face_count > 0 && self.boundary_edges == 0 && self.non_manifold_edges == 0
    }

    /// No edge has more than two incident faces.
    #[must_use]
    pub const fn is_manifold(&self) -> bool {
        self.non_manifold_edges == 0
    }
}

/// Analyse the edges of a mesh.
///
/// # Example
///
/// ```
/// use mesh_types::{analyze_edges, unit_cube};
///
/// let report = analyze_edges(&unit_cube());
/// assert_eq!(report.edge_count, 18);
/// assert!(report.is_watertight());
/// ```
#[must_use]
pub fn analyze_edges<M: MeshTopology + ?Sized>(mesh: &M) -> EdgeReport {
    let counts = edge_face_counts(mesh);
    let mut report = EdgeReport {
        face_count: mesh.face_count(),
        edge_count: counts.len(),
        ..EdgeReport::default()
    };
    for &n in counts.values() {
        match n {
            1 => report.boundary_edges += 1,
            2 => {}
            _ => report.non_manifold_edges += 1,
        }
    }
    report
}
