//! Persistence of raw scan buffers.
//!
//! A scan's accumulated points and reconstructed mesh are stored as opaque
//! blobs of little-endian `f32`, keyed by scan id. The point blob is the
//! flat `[x0, y0, z0, ...]` layout; the mesh blob is the serialized mesh
//! layout including its two count entries.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use mesh_types::{PointCloud, SerializedMesh};
use tracing::debug;

use crate::error::{IoError, IoResult};

/// Storage for scan buffers.
pub trait ScanStore {
    /// Store the point cloud for `scan_id`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob cannot be written.
    fn save_points(&self, scan_id: &str, cloud: &PointCloud) -> IoResult<()>;

    /// Load the point cloud for `scan_id`, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob exists but cannot be read or decoded.
    fn load_points(&self, scan_id: &str) -> IoResult<Option<PointCloud>>;

    /// Store the mesh for `scan_id`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob cannot be written.
    fn save_mesh(&self, scan_id: &str, mesh: &SerializedMesh) -> IoResult<()>;

    /// Load the mesh for `scan_id`, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob exists but cannot be read or decoded.
    fn load_mesh(&self, scan_id: &str) -> IoResult<Option<SerializedMesh>>;

    /// Remove everything stored for `scan_id`. Missing blobs are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing blob cannot be removed.
    fn delete(&self, scan_id: &str) -> IoResult<()>;
}

/// [`ScanStore`] backed by a directory: `{id}.points` and `{id}.mesh`.
#[derive(Debug, Clone)]
pub struct FileScanStore {
    root: PathBuf,
}

impl FileScanStore {
    /// Store blobs under `root`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> IoResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The storage directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, scan_id: &str, kind: &str) -> IoResult<PathBuf> {
        let valid = !scan_id.is_empty()
            && scan_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(IoError::invalid_content(format!("invalid scan id '{scan_id}'")));
        }
        Ok(self.root.join(format!("{scan_id}.{kind}")))
    }

    fn write_blob(path: &Path, values: &[f32]) -> IoResult<()> {
        let words: Vec<u32> = values.iter().map(|v| v.to_bits().to_le()).collect();
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, bytemuck::cast_slice::<u32, u8>(&words))?;
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), floats = values.len(), "Stored scan blob");
        Ok(())
    }

    fn read_blob(path: &Path) -> IoResult<Option<Vec<f32>>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if bytes.len() % 4 != 0 {
            return Err(IoError::invalid_content(format!(
                "{}: length {} is not a multiple of 4",
                path.display(),
                bytes.len()
            )));
        }
        let values = bytes
            .chunks_exact(4)
            .map(|c| f32::from_bits(u32::from_le(bytemuck::pod_read_unaligned(c))))
            .collect();
        Ok(Some(values))
    }
}

impl ScanStore for FileScanStore {
    fn save_points(&self, scan_id: &str, cloud: &PointCloud) -> IoResult<()> {
        let path = self.blob_path(scan_id, "points")?;
        Self::write_blob(&path, &cloud.to_flat())
    }

    fn load_points(&self, scan_id: &str) -> IoResult<Option<PointCloud>> {
        let path = self.blob_path(scan_id, "points")?;
        Self::read_blob(&path)?
            .map(|values| PointCloud::from_flat(&values).map_err(IoError::from))
            .transpose()
    }

    fn save_mesh(&self, scan_id: &str, mesh: &SerializedMesh) -> IoResult<()> {
        let path = self.blob_path(scan_id, "mesh")?;
        Self::write_blob(&path, mesh.as_slice())
    }

    fn load_mesh(&self, scan_id: &str) -> IoResult<Option<SerializedMesh>> {
        let path = self.blob_path(scan_id, "mesh")?;
        Self::read_blob(&path)?
            .map(|values| SerializedMesh::from_raw(values).map_err(IoError::from))
            .transpose()
    }

    fn delete(&self, scan_id: &str) -> IoResult<()> {
        for kind in ["points", "mesh"] {
            match fs::remove_file(self.blob_path(scan_id, kind)?) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
