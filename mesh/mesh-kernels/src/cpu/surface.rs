//! Implicit surface reconstruction from oriented points.
//!
//! The signed distance at a lattice corner is the distance to the tangent
//! plane of the nearest oriented point (positive outside). The zero level
//! set is extracted with Surface Nets: one vertex per cell that straddles
//! the surface, placed at the mean of the interpolated edge crossings, and
//! one quad per sign-changing lattice edge joining the four cells around it.
//!
//! The outermost corner layer is forced outside, so the extracted surface
//! is always closed.

use mesh_types::{Aabb, IndexedMesh, OrientedCloud, Point3, Vector3};
use rayon::prelude::*;
use tracing::debug;

use super::spatial::PointIndex;
use crate::error::{KernelError, KernelResult};

/// Depth range honoured by the Poisson grid sizing.
const MIN_POISSON_DEPTH: u32 = 4;
const MAX_POISSON_DEPTH: u32 = 12;

/// Empty cells kept around the cloud on every side.
const MARGIN_CELLS: f32 = 2.0;

/// Cube corner offsets.
const CORNERS: [[usize; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [1, 1, 0],
    [0, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [1, 1, 1],
    [0, 1, 1],
];

/// Cube edges as pairs of corner indices.
const EDGES: [(usize, usize); 12] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 0),
    (4, 5),
    (5, 6),
    (6, 7),
    (7, 4),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

/// Sampling lattice: `cells` cubes of edge `voxel` per axis from `origin`.
#[derive(Debug, Clone, Copy)]
struct Grid {
    origin: Point3<f32>,
    voxel: f32,
    cells: [usize; 3],
}

impl Grid {
    /// Fit a lattice around `bounds`, coarsening the voxel if any axis would
    /// need more than `max_cells` cells.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn fit(bounds: &Aabb, voxel: f32, max_cells: usize) -> Self {
        let mut voxel = voxel;
        let longest = bounds.size().max() + 2.0 * MARGIN_CELLS * voxel;
        if longest / voxel > max_cells as f32 {
            voxel = longest / max_cells as f32;
        }
        let padded = bounds.expanded(MARGIN_CELLS * voxel);
        let size = padded.size();
        let cells = [size.x, size.y, size.z]
            .map(|s| ((s / voxel).ceil() as usize).clamp(2, max_cells.max(2)));
        Self {
            origin: padded.min,
            voxel,
            cells,
        }
    }

    fn corner_dims(&self) -> [usize; 3] {
        self.cells.map(|c| c + 1)
    }

    fn corner_index(&self, x: usize, y: usize, z: usize) -> usize {
        let [nx, ny, _] = self.corner_dims();
        (z * ny + y) * nx + x
    }

    fn cell_index(&self, x: usize, y: usize, z: usize) -> usize {
        let [nx, ny, _] = self.cells;
        (z * ny + y) * nx + x
    }

    #[allow(clippy::cast_precision_loss)]
    fn corner_position(&self, x: usize, y: usize, z: usize) -> Point3<f32> {
        self.origin + Vector3::new(x as f32, y as f32, z as f32) * self.voxel
    }
}

/// Voxel size for a Poisson depth: the bounding diagonal split into
/// `2^depth` steps, with depth clamped to a practical range.
pub fn poisson_voxel_size(bounds: &Aabb, depth: u32) -> f32 {
    let depth = depth.clamp(MIN_POISSON_DEPTH, MAX_POISSON_DEPTH);
    #[allow(clippy::cast_precision_loss)]
    let steps = (1u32 << depth) as f32;
    (bounds.diagonal() / steps).max(f32::EPSILON)
}

/// Reconstruct with the grid sized from a Poisson depth.
pub fn poisson(cloud: &OrientedCloud, depth: u32, max_cells: usize) -> KernelResult<IndexedMesh> {
    const OPERATION: &str = "poisson_reconstruction";
    if depth == 0 || depth > 16 {
        return Err(KernelError::invalid(
            OPERATION,
            format!("depth must be in 1..=16, got {depth}"),
        ));
    }
    if cloud.is_empty() {
        return Err(KernelError::EmptyInput {
            operation: OPERATION,
        });
    }
    let voxel = poisson_voxel_size(&cloud.bounds(), depth);
    extract(cloud, voxel, max_cells, OPERATION)
}

/// Reconstruct on a lattice with the given voxel size.
pub fn marching_cubes(
    cloud: &OrientedCloud,
    voxel_size: f32,
    max_cells: usize,
) -> KernelResult<IndexedMesh> {
    const OPERATION: &str = "marching_cubes_reconstruction";
    if !(voxel_size.is_finite() && voxel_size > 0.0) {
        return Err(KernelError::invalid(
            OPERATION,
            format!("voxel size must be positive and finite, got {voxel_size}"),
        ));
    }
    if cloud.is_empty() {
        return Err(KernelError::EmptyInput {
            operation: OPERATION,
        });
    }
    extract(cloud, voxel_size, max_cells, OPERATION)
}

fn extract(
    cloud: &OrientedCloud,
    voxel: f32,
    max_cells: usize,
    operation: &'static str,
) -> KernelResult<IndexedMesh> {
    let positions: Vec<Point3<f32>> = cloud.points.iter().map(|p| p.position).collect();
    let index = PointIndex::build(&positions, operation)?;
    let grid = Grid::fit(&cloud.bounds(), voxel, max_cells);
    let field = sample_field(&grid, cloud, &index);
    let mesh = surface_nets(&grid, &field);

    debug!(
        operation,
        voxel = grid.voxel,
        cells = ?grid.cells,
        vertices = mesh.vertices.len(),
        faces = mesh.faces.len(),
        "Extracted isosurface"
    );

    if mesh.faces.is_empty() {
        return Err(KernelError::failed(operation, "no surface crossing found"));
    }
    Ok(mesh)
}

/// Signed distance at every lattice corner; the outer layer is +1 voxel.
fn sample_field(grid: &Grid, cloud: &OrientedCloud, index: &PointIndex) -> Vec<f32> {
    let [nx, ny, nz] = grid.corner_dims();
    (0..nx * ny * nz)
        .into_par_iter()
        .map(|i| {
            let x = i % nx;
            let y = (i / nx) % ny;
            let z = i / (nx * ny);
            if x == 0 || y == 0 || z == 0 || x == nx - 1 || y == ny - 1 || z == nz - 1 {
                return grid.voxel;
            }
            let c = grid.corner_position(x, y, z);
            let nearest = &cloud.points[index.nearest_one(&c).index];
            nearest.normal.dot(&(c - nearest.position))
        })
        .collect()
}

fn surface_nets(grid: &Grid, field: &[f32]) -> IndexedMesh {
    let [cx, cy, cz] = grid.cells;
    let inside = |x: usize, y: usize, z: usize| field[grid.corner_index(x, y, z)] < 0.0;

    let mut mesh = IndexedMesh::new();
    let mut cell_vertex = vec![u32::MAX; cx * cy * cz];

    for z in 0..cz {
        for y in 0..cy {
            for x in 0..cx {
                let values =
                    CORNERS.map(|[dx, dy, dz]| field[grid.corner_index(x + dx, y + dy, z + dz)]);
                let negatives = values.iter().filter(|v| **v < 0.0).count();
                if negatives == 0 || negatives == 8 {
                    continue;
                }

                let mut acc = Vector3::zeros();
                let mut crossings = 0.0_f32;
                for (a, b) in EDGES {
                    let (fa, fb) = (values[a], values[b]);
                    if (fa < 0.0) == (fb < 0.0) {
                        continue;
                    }
                    let t = fa / (fa - fb);
                    let [ax, ay, az] = CORNERS[a];
                    let [bx, by, bz] = CORNERS[b];
                    let pa = grid.corner_position(x + ax, y + ay, z + az);
                    let pb = grid.corner_position(x + bx, y + by, z + bz);
                    acc += pa.coords.lerp(&pb.coords, t);
                    crossings += 1.0;
                }

                #[allow(clippy::cast_possible_truncation)]
                {
                    cell_vertex[grid.cell_index(x, y, z)] = mesh.vertices.len() as u32;
                }
                mesh.vertices.push(Point3::from(acc / crossings));
            }
        }
    }

    let cell = |x: usize, y: usize, z: usize| cell_vertex[grid.cell_index(x, y, z)];
    let mut quad = |q: [u32; 4], outward: bool| {
        if q.contains(&u32::MAX) {
            return;
        }
        let [a, b, c, d] = if outward { q } else { [q[0], q[3], q[2], q[1]] };
        mesh.faces.push([a, b, c]);
        mesh.faces.push([a, c, d]);
    };

    // Interior lattice edges only: boundary corners are all outside.
    for z in 1..cz {
        for y in 1..cy {
            for x in 0..cx {
                let (a, b) = (inside(x, y, z), inside(x + 1, y, z));
                if a != b {
                    let q = [
                        cell(x, y - 1, z - 1),
                        cell(x, y, z - 1),
                        cell(x, y, z),
                        cell(x, y - 1, z),
                    ];
                    quad(q, a);
                }
            }
        }
    }
    for z in 1..cz {
        for y in 0..cy {
            for x in 1..cx {
                let (a, b) = (inside(x, y, z), inside(x, y + 1, z));
                if a != b {
                    let q = [
                        cell(x - 1, y, z - 1),
                        cell(x - 1, y, z),
                        cell(x, y, z),
                        cell(x, y, z - 1),
                    ];
                    quad(q, a);
                }
            }
        }
    }
    for z in 0..cz {
        for y in 1..cy {
            for x in 1..cx {
                let (a, b) = (inside(x, y, z), inside(x, y, z + 1));
                if a != b {
                    let q = [
                        cell(x - 1, y - 1, z),
                        cell(x, y - 1, z),
                        cell(x, y, z),
                        cell(x - 1, y, z),
                    ];
                    quad(q, a);
                }
            }
        }
    }

    mesh
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use mesh_types::{analyze_edges, MeshTopology, OrientedPoint};

    fn oriented_sphere(n: usize, radius: f32) -> OrientedCloud {
        let golden = std::f32::consts::PI * (3.0 - 5.0_f32.sqrt());
        (0..n)
            .map(|i| {
                let y = 1.0 - 2.0 * (i as f32 + 0.5) / n as f32;
                let r = (1.0 - y * y).sqrt();
                let theta = golden * i as f32;
                let dir = Vector3::new(r * theta.cos(), y, r * theta.sin());
                OrientedPoint::new(Point3::from(dir * radius), dir)
            })
            .collect()
    }

    #[test]
    fn sphere_reconstructs_closed_outward_surface() {
        let cloud = oriented_sphere(600, 0.05);
        let mesh = marching_cubes(&cloud, 0.01, 200).unwrap();

        let report = analyze_edges(&mesh);
        assert_eq!(report.boundary_edges, 0);

        // Vertices lie near the sphere.
        for v in &mesh.vertices {
            let r = v.coords.norm();
            assert!((r - 0.05).abs() < 0.015, "vertex radius {r}");
        }

        // Normals face away from the center.
        let outward = mesh
            .triangles()
            .filter_map(|t| t.normal().map(|n| n.dot(&t.centroid().coords) > 0.0))
            .filter(|&o| o)
            .count();
        assert!(outward * 10 >= mesh.face_count() * 9);
    }

    #[test]
    fn poisson_depth_controls_voxel() {
        let bounds = Aabb::from_points([Point3::origin(), Point3::new(1.0, 0.0, 0.0)].iter());
        assert!((poisson_voxel_size(&bounds, 4) - 1.0 / 16.0).abs() < 1e-6);
        // Clamped to 12.
        assert_eq!(poisson_voxel_size(&bounds, 15), poisson_voxel_size(&bounds, 12));
    }

    #[test]
    fn grid_is_capped() {
        let bounds = Aabb::from_points([Point3::origin(), Point3::new(10.0, 1.0, 1.0)].iter());
        let grid = Grid::fit(&bounds, 0.001, 50);
        assert!(grid.cells.iter().all(|&c| c <= 50));
        assert!(grid.voxel > 0.001);
    }

    #[test]
    fn poisson_runs_on_sphere() {
        let cloud = oriented_sphere(400, 1.0);
        let mesh = poisson(&cloud, 5, 200).unwrap();
        assert!(!mesh.faces.is_empty());
    }

    #[test]
    fn rejects_invalid_parameters() {
        let cloud = oriented_sphere(50, 1.0);
        assert!(poisson(&cloud, 0, 200).is_err());
        assert!(marching_cubes(&cloud, -1.0, 200).is_err());
        assert!(matches!(
            marching_cubes(&OrientedCloud::new(), 0.1, 200),
            Err(KernelError::EmptyInput { .. })
        ));
    }
}
