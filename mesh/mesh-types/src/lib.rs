//! Core point cloud and mesh types for CortenForge scanning.
//!
//! This crate provides the buffers exchanged between capture,
//! reconstruction and export:
//!
//! - [`PointCloud`] - world-space points (meters, `f32`)
//! - [`OrientedCloud`] - points with normals, interleaved
//! - [`SerializedMesh`] - the flat `[vCount, tCount, verts..., tris...]` mesh
//! - [`IndexedMesh`] - a working mesh for topology edits
//! - [`Triangle`] - a concrete triangle with vertex positions
//! - [`Aabb`] - axis-aligned bounding box
//! - [`analyze_edges`] - edge incidence and watertightness
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with no engine dependencies. It can be used in:
//! - CLI tools
//! - Mobile capture front-ends
//! - Servers running reconstruction off-device
//!
//! # Units
//!
//! Capture produces meters. Meshes are unit-agnostic until an exporter
//! writes them; calibration may rescale them to millimeters.
//!
//! # Example
//!
//! ```
//! use mesh_types::{unit_cube, MeshTopology, SerializedMesh};
//!
//! let mesh = SerializedMesh::from_indexed(&unit_cube()).unwrap();
//! assert_eq!(mesh.face_count(), 12);
//! assert!(mesh.is_watertight());
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod bounds;
mod cloud;
mod error;
mod mesh;
mod serialized;
mod topology;
mod traits;
mod triangle;

pub use bounds::Aabb;
pub use cloud::{OrientedCloud, OrientedPoint, PointCloud};
pub use error::{MeshError, MeshResult};
pub use mesh::{unit_cube, IndexedMesh};
pub use serialized::{SerializedMesh, MAX_EXACT_INDEX};
pub use topology::{analyze_edges, edge_face_counts, edge_key, EdgeReport};
pub use traits::MeshTopology;
pub use triangle::{Triangle, DEGENERATE_NORMAL_EPSILON};

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix4, Point3, Vector3};
