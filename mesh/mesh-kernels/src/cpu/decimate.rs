//! Quadric error metric decimation.
//!
//! Edges are collapsed cheapest-first from a binary heap. Heap entries carry
//! the version stamps of both endpoints at push time; a stamp mismatch on
//! pop means the entry is stale and is skipped.
//!
//! A collapse is rejected when it breaks the link condition (which would
//! make the surface non-manifold) or flips any surviving face.

// Mesh indices fit in u32 and stamps never overflow in practice.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use hashbrown::HashSet;
use mesh_types::{IndexedMesh, Point3, Vector3};
use nalgebra::{Matrix3, Matrix4, Vector4};
use tracing::debug;

use crate::error::{KernelError, KernelResult};

const OPERATION: &str = "decimate_mesh";

/// Sum of squared distances to a set of planes, as `v^T Q v`.
#[derive(Debug, Clone, Copy)]
struct Quadric(Matrix4<f64>);

impl Quadric {
    fn zero() -> Self {
        Self(Matrix4::zeros())
    }

    /// Plane through `p` with unit normal `n`.
    fn from_plane(n: &Vector3<f64>, p: &Point3<f64>) -> Self {
        let plane = Vector4::new(n.x, n.y, n.z, -n.dot(&p.coords));
        Self(plane * plane.transpose())
    }

    fn add(&mut self, other: &Self) {
        self.0 += other.0;
    }

    fn error(&self, p: &Point3<f64>) -> f64 {
        let v = p.to_homogeneous();
        (v.transpose() * self.0 * v)[0].max(0.0)
    }

    /// Position minimising the error, if the system is well conditioned.
    fn minimizer(&self) -> Option<Point3<f64>> {
        let a: Matrix3<f64> = self.0.fixed_view::<3, 3>(0, 0).into_owned();
        if a.determinant().abs() < 1e-12 {
            return None;
        }
        let b = -self.0.fixed_view::<3, 1>(0, 3).into_owned();
        a.try_inverse().map(|inv| Point3::from(inv * b))
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    cost: f64,
    v1: u32,
    v2: u32,
    stamps: (u32, u32),
    target: Point3<f64>,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    // Reversed so the max-heap pops the cheapest collapse.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| (other.v1, other.v2).cmp(&(self.v1, self.v2)))
    }
}

struct Collapser {
    positions: Vec<Point3<f64>>,
    quadrics: Vec<Quadric>,
    stamps: Vec<u32>,
    vertex_alive: Vec<bool>,
    faces: Vec<[u32; 3]>,
    face_alive: Vec<bool>,
    vertex_faces: Vec<Vec<usize>>,
    active_faces: usize,
}

impl Collapser {
    fn new(mesh: &IndexedMesh) -> Self {
        let positions: Vec<Point3<f64>> = mesh.vertices.iter().map(|p| p.cast::<f64>()).collect();
        let mut quadrics = vec![Quadric::zero(); positions.len()];
        let mut vertex_faces = vec![Vec::new(); positions.len()];

        for (fi, face) in mesh.faces.iter().enumerate() {
            for &v in face {
                vertex_faces[v as usize].push(fi);
            }
            let [a, b, c] = face.map(|i| positions[i as usize]);
            let n = (b - a).cross(&(c - a));
            let len = n.norm();
            if len > 1e-20 {
                let q = Quadric::from_plane(&(n / len), &a);
                for &v in face {
                    quadrics[v as usize].add(&q);
                }
            }
        }

        Self {
            stamps: vec![0; positions.len()],
            vertex_alive: vec![true; positions.len()],
            face_alive: vec![true; mesh.faces.len()],
            active_faces: mesh.faces.len(),
            faces: mesh.faces.clone(),
            positions,
            quadrics,
            vertex_faces,
        }
    }

    fn live_faces(&self, v: u32) -> impl Iterator<Item = usize> + '_ {
        self.vertex_faces[v as usize]
            .iter()
            .copied()
            .filter(|&f| self.face_alive[f])
    }

    fn neighbors(&self, v: u32) -> HashSet<u32> {
        self.live_faces(v)
            .flat_map(|f| self.faces[f])
            .filter(|&u| u != v)
            .collect()
    }

    fn candidate(&self, v1: u32, v2: u32) -> Candidate {
        let mut q = self.quadrics[v1 as usize];
        q.add(&self.quadrics[v2 as usize]);
        let p1 = self.positions[v1 as usize];
        let p2 = self.positions[v2 as usize];

        let mid = nalgebra::center(&p1, &p2);
        // Nearly coplanar neighbourhoods give minimizers far off the surface.
        let reach = (p2 - p1).norm();
        let (target, cost) = q
            .minimizer()
            .filter(|p| (p - mid).norm() <= reach)
            .map_or_else(
            || {
                [p1, p2, mid]
                    .into_iter()
                    .map(|p| (p, q.error(&p)))
                    .min_by(|a, b| a.1.total_cmp(&b.1))
                    .unwrap_or((p1, 0.0))
            },
            |p| (p, q.error(&p)),
        );

        Candidate {
            cost,
            v1,
            v2,
            stamps: (self.stamps[v1 as usize], self.stamps[v2 as usize]),
            target,
        }
    }

    fn is_current(&self, c: &Candidate) -> bool {
        self.vertex_alive[c.v1 as usize]
            && self.vertex_alive[c.v2 as usize]
            && c.stamps == (self.stamps[c.v1 as usize], self.stamps[c.v2 as usize])
    }

    /// Common neighbours must be exactly the apexes of the faces on the edge.
    fn satisfies_link_condition(&self, v1: u32, v2: u32) -> bool {
        let shared_faces = self
            .live_faces(v1)
            .filter(|&f| self.faces[f].contains(&v2))
            .count();
        if shared_faces == 0 {
            return false;
        }
        let n1 = self.neighbors(v1);
        let common = self.neighbors(v2).iter().filter(|u| n1.contains(*u)).count();
        common == shared_faces
    }

    fn flips_any_face(&self, v1: u32, v2: u32, target: &Point3<f64>) -> bool {
        for v in [v1, v2] {
            for f in self.live_faces(v) {
                let face = self.faces[f];
                if face.contains(&v1) && face.contains(&v2) {
                    continue;
                }
                let before = face.map(|i| self.positions[i as usize]);
                let after = face.map(|i| {
                    if i == v {
                        *target
                    } else {
                        self.positions[i as usize]
                    }
                });
                let n0 = (before[1] - before[0]).cross(&(before[2] - before[0]));
                let n1 = (after[1] - after[0]).cross(&(after[2] - after[0]));
                if n1.norm_squared() < 1e-24 || n0.dot(&n1) <= 0.0 {
                    return true;
                }
            }
        }
        false
    }

    /// Merge `v2` into `v1` at `target`.
    fn collapse(&mut self, v1: u32, v2: u32, target: Point3<f64>) {
        self.positions[v1 as usize] = target;
        let q2 = self.quadrics[v2 as usize];
        self.quadrics[v1 as usize].add(&q2);
        self.vertex_alive[v2 as usize] = false;

        let moved = std::mem::take(&mut self.vertex_faces[v2 as usize]);
        for f in moved {
            if !self.face_alive[f] {
                continue;
            }
            if self.faces[f].contains(&v1) {
                self.face_alive[f] = false;
                self.active_faces -= 1;
            } else {
                for idx in &mut self.faces[f] {
                    if *idx == v2 {
                        *idx = v1;
                    }
                }
                self.vertex_faces[v1 as usize].push(f);
            }
        }
        self.stamps[v1 as usize] += 1;
        self.stamps[v2 as usize] += 1;
    }

    fn into_mesh(self) -> IndexedMesh {
        let vertices = self
            .positions
            .iter()
            .map(|p| Point3::new(p.x as f32, p.y as f32, p.z as f32))
            .collect();
        let faces = self
            .faces
            .into_iter()
            .zip(self.face_alive)
            .filter_map(|(f, alive)| alive.then_some(f))
            .collect();
        let mut mesh = IndexedMesh::from_parts(vertices, faces);
        mesh.remove_unreferenced_vertices();
        mesh
    }
}

/// Collapse edges until `max(1, round(faces * ratio))` faces remain, or no valid
/// collapse is left.
///
/// A ratio of 1 or more returns the mesh unchanged.
pub fn decimate(mesh: &IndexedMesh, ratio: f32) -> KernelResult<IndexedMesh> {
    if !(ratio.is_finite() && ratio > 0.0) {
        return Err(KernelError::invalid(
            OPERATION,
            format!("target ratio must be positive, got {ratio}"),
        ));
    }
    if ratio >= 1.0 || mesh.faces.is_empty() {
        return Ok(mesh.clone());
    }
    let target = ((mesh.faces.len() as f64 * f64::from(ratio)).round() as usize).max(1);

    let mut state = Collapser::new(mesh);
    let mut heap = BinaryHeap::new();
    let mut seen = HashSet::new();
    for face in &mesh.faces {
        for i in 0..3 {
            let (a, b) = (face[i], face[(i + 1) % 3]);
            if seen.insert(mesh_types::edge_key(a, b)) {
                heap.push(state.candidate(a, b));
            }
        }
    }

    let mut collapses = 0_usize;
    let mut rejected = 0_usize;
    while state.active_faces > target {
        let Some(c) = heap.pop() else {
            break;
        };
        if !state.is_current(&c) {
            continue;
        }
        if !state.satisfies_link_condition(c.v1, c.v2)
            || state.flips_any_face(c.v1, c.v2, &c.target)
        {
            rejected += 1;
            continue;
        }
        state.collapse(c.v1, c.v2, c.target);
        collapses += 1;
        for n in state.neighbors(c.v1) {
            heap.push(state.candidate(c.v1, n));
        }
    }

    debug!(
        original = mesh.faces.len(),
        target,
        remaining = state.active_faces,
        collapses,
        rejected,
        "Quadric decimation"
    );
    Ok(state.into_mesh())
}
