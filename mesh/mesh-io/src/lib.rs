//! Export and persistence for reconstructed scans.
//!
//! - **STL**: binary, written and read
//! - **OBJ**: ASCII, written
//! - **PLY**: binary little-endian or ASCII, written
//! - **STEP / CATIA**: converted by a remote service from an uploaded STL
//!
//! Writers accept anything implementing [`MeshTopology`](mesh_types::MeshTopology),
//! so both the flat [`SerializedMesh`](mesh_types::SerializedMesh) and
//! [`IndexedMesh`](mesh_types::IndexedMesh) can be exported directly.
//!
//! # Example
//!
//! ```no_run
//! use mesh_io::{export_mesh, ExportFormat};
//! use mesh_types::unit_cube;
//!
//! export_mesh(&unit_cube(), ExportFormat::Stl, "cube.stl").unwrap();
//! ```
//!
//! Raw scan buffers are kept with a [`ScanStore`]; [`FileScanStore`] writes
//! them as little-endian `f32` blobs under a directory.

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod error;
mod format;
mod obj;
mod ply;
mod remote;
mod stl;
mod store;

pub use error::{IoError, IoResult};
pub use format::{export_mesh, save_mesh, ExportFormat};
pub use obj::{save_obj, write_obj};
pub use ply::{save_ply, write_ply_ascii, write_ply_binary};
pub use remote::{
    ConversionService, ExportProgress, JobId, JobStatus, JobStatusResponse, PollPolicy,
    RemoteExporter,
};
pub use stl::{
    load_stl, parse_stl, read_stl_header, save_stl, stl_bytes, write_stl, StlHeader, HEADER_SIZE,
    HEADER_TEXT, TRIANGLE_SIZE,
};
pub use store::{FileScanStore, ScanStore};
