//! Nearest-neighbour index over point positions.

use std::panic::{self, AssertUnwindSafe};

use kiddo::immutable::float::kdtree::ImmutableKdTree;
use kiddo::SquaredEuclidean;
use mesh_types::Point3;
use tracing::warn;

use crate::error::{KernelError, KernelResult};

/// Largest point set searched linearly when the k-d tree cannot be built.
pub const LINEAR_SCAN_LIMIT: usize = 20_000;

/// A static k-d tree built once per query set.
///
/// kiddo's immutable tree can panic during construction when many points
/// share coordinates on more than one axis (collinear scan runs). Such sets
/// fall back to a linear scan up to [`LINEAR_SCAN_LIMIT`] points.
pub struct PointIndex {
    search: Search,
    len: usize,
}

enum Search {
    Tree(ImmutableKdTree<f32, u64, 3, 32>),
    Linear(Vec<Point3<f32>>),
}

/// One neighbour returned by a query.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor {
    /// Index into the slice the tree was built from.
    pub index: usize,
    /// Squared Euclidean distance to the query.
    pub distance_sq: f32,
}

impl PointIndex {
    /// Build an index for the kernel named `operation`.
    ///
    /// # Errors
    ///
    /// [`KernelError::EmptyInput`] for an empty slice, and
    /// [`KernelError::Failed`] for a degenerate set too large to scan.
    pub fn build(points: &[Point3<f32>], operation: &'static str) -> KernelResult<Self> {
        if points.is_empty() {
            return Err(KernelError::EmptyInput { operation });
        }
        let coords: Vec<[f32; 3]> = points.iter().map(|p| [p.x, p.y, p.z]).collect();
        let built = panic::catch_unwind(AssertUnwindSafe(|| {
            ImmutableKdTree::new_from_slice(&coords)
        }));
        let search = match built {
            Ok(tree) => Search::Tree(tree),
            Err(_) if points.len() <= LINEAR_SCAN_LIMIT => {
                warn!(operation, points = points.len(), "k-d tree build failed, scanning linearly");
                Search::Linear(points.to_vec())
            }
            Err(_) => {
                return Err(KernelError::failed(
                    operation,
                    format!(
                        "cannot index {} points with shared coordinates",
                        points.len()
                    ),
                ));
            }
        };
        Ok(Self {
            search,
            len: points.len(),
        })
    }

    /// Up to `k` nearest points, closest first. Includes the query point
    /// itself when it is in the index.
    #[allow(clippy::cast_possible_truncation)]
    pub fn nearest_n(&self, query: &Point3<f32>, k: usize) -> Vec<Neighbor> {
        match &self.search {
            Search::Tree(tree) => {
                let k = k.min(self.len);
                tree.nearest_n::<SquaredEuclidean>(&[query.x, query.y, query.z], k)
                    .into_iter()
                    .map(|n| Neighbor {
                        index: n.item as usize,
                        distance_sq: n.distance,
                    })
                    .collect()
            }
            Search::Linear(points) => {
                let mut all: Vec<Neighbor> = points
                    .iter()
                    .enumerate()
                    .map(|(index, p)| Neighbor {
                        index,
                        distance_sq: nalgebra::distance_squared(p, query),
                    })
                    .collect();
                all.sort_by(|a, b| a.distance_sq.total_cmp(&b.distance_sq));
                all.truncate(k);
                all
            }
        }
    }

    /// The single nearest point.
    #[allow(clippy::cast_possible_truncation)]
    pub fn nearest_one(&self, query: &Point3<f32>) -> Neighbor {
        match &self.search {
            Search::Tree(tree) => {
                let n = tree.nearest_one::<SquaredEuclidean>(&[query.x, query.y, query.z]);
                Neighbor {
                    index: n.item as usize,
                    distance_sq: n.distance,
                }
            }
            Search::Linear(points) => points
                .iter()
                .enumerate()
                .map(|(index, p)| Neighbor {
                    index,
                    distance_sq: nalgebra::distance_squared(p, query),
                })
                .min_by(|a, b| a.distance_sq.total_cmp(&b.distance_sq))
                .unwrap_or(Neighbor {
                    index: 0,
                    distance_sq: f32::INFINITY,
                }),
        }
    }
}
