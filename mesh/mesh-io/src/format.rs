//! Export formats and local export dispatch.

use std::fmt;
use std::path::Path;

use mesh_types::MeshTopology;
use tracing::info;

use crate::error::{IoError, IoResult};
use crate::{save_obj, save_ply, save_stl};

/// Formats a scan can be exported to.
///
/// STL, OBJ and PLY are written locally. STEP and CATIA need the remote
/// conversion service; see [`RemoteExporter`](crate::RemoteExporter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ExportFormat {
    /// Binary STL.
    Stl,
    /// Wavefront OBJ.
    Obj,
    /// Stanford PLY.
    Ply,
    /// STEP AP214 solid.
    Step,
    /// CATIA V5 part.
    Catia,
}

impl ExportFormat {
    /// Every format, local ones first.
    pub const ALL: [Self; 5] = [Self::Stl, Self::Obj, Self::Ply, Self::Step, Self::Catia];

    /// Canonical file extension, without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Stl => "stl",
            Self::Obj => "obj",
            Self::Ply => "ply",
            Self::Step => "step",
            Self::Catia => "CATPart",
        }
    }

    /// MIME type used when uploading or sharing the file.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Stl => "application/sla",
            Self::Obj => "text/plain",
            Self::Ply => "application/x-ply",
            Self::Step => "application/step",
            Self::Catia => "application/octet-stream",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Stl => "STL (Binary)",
            Self::Obj => "Wavefront OBJ",
            Self::Ply => "Stanford PLY",
            Self::Step => "STEP (AP214)",
            Self::Catia => "CATIA V5 Part",
        }
    }

    /// Whether the format can only be produced remotely.
    #[must_use]
    pub const fn requires_conversion(self) -> bool {
        matches!(self, Self::Step | Self::Catia)
    }

    /// Detect the format from a path's extension, case-insensitively.
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "stl" => Some(Self::Stl),
            "obj" => Some(Self::Obj),
            "ply" => Some(Self::Ply),
            "step" | "stp" => Some(Self::Step),
            "catpart" => Some(Self::Catia),
            _ => None,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Write `mesh` to `path` in a local format.
///
/// STL and PLY are written binary.
///
/// # Errors
///
/// Returns [`IoError::RequiresConversion`] for STEP and CATIA, and any
/// error from the format writer.
pub fn export_mesh<M, P>(mesh: &M, format: ExportFormat, path: P) -> IoResult<()>
where
    M: MeshTopology + ?Sized,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    match format {
        ExportFormat::Stl => save_stl(mesh, path)?,
        ExportFormat::Obj => save_obj(mesh, path)?,
        ExportFormat::Ply => save_ply(mesh, path, true)?,
        ExportFormat::Step | ExportFormat::Catia => {
            return Err(IoError::RequiresConversion { format });
        }
    }
    info!(
        format = format.extension(),
        path = %path.display(),
        triangles = mesh.face_count(),
        "Exported mesh"
    );
    Ok(())
}

/// Write `mesh` to `path`, choosing the format from the extension.
///
/// # Errors
///
/// Returns [`IoError::UnknownFormat`] for unrecognized extensions and
/// otherwise behaves like [`export_mesh`].
pub fn save_mesh<M, P>(mesh: &M, path: P) -> IoResult<()>
where
    M: MeshTopology + ?Sized,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let format = ExportFormat::from_path(path).ok_or_else(|| IoError::UnknownFormat {
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("(none)")
            .to_string(),
    })?;
    export_mesh(mesh, format, path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use mesh_types::{unit_cube, SerializedMesh};

    #[test]
    fn format_from_path() {
        assert_eq!(ExportFormat::from_path("model.STL"), Some(ExportFormat::Stl));
        assert_eq!(ExportFormat::from_path("/a/b/model.ply"), Some(ExportFormat::Ply));
        assert_eq!(ExportFormat::from_path("part.stp"), Some(ExportFormat::Step));
        assert_eq!(ExportFormat::from_path("part.CATPart"), Some(ExportFormat::Catia));
        assert_eq!(ExportFormat::from_path("model.xyz"), None);
        assert_eq!(ExportFormat::from_path("model"), None);
    }

    #[test]
    fn extension_round_trips_through_from_path() {
        for format in ExportFormat::ALL {
            let name = format!("scan.{}", format.extension());
            assert_eq!(ExportFormat::from_path(&name), Some(format));
        }
    }

    #[test]
    fn only_cad_formats_need_conversion() {
        let remote: Vec<_> = ExportFormat::ALL
            .into_iter()
            .filter(|f| f.requires_conversion())
            .collect();
        assert_eq!(remote, vec![ExportFormat::Step, ExportFormat::Catia]);
        assert_eq!(ExportFormat::Stl.mime_type(), "application/sla");
    }

    #[test]
    fn export_dispatches_local_formats() {
        let dir = tempfile::tempdir().unwrap();
        let mesh = SerializedMesh::from_indexed(&unit_cube()).unwrap();
        for format in [ExportFormat::Stl, ExportFormat::Obj, ExportFormat::Ply] {
            let path = dir.path().join(format!("cube.{}", format.extension()));
            export_mesh(&mesh, format, &path).unwrap();
            assert!(std::fs::metadata(&path).unwrap().len() > 0);
        }
    }

    #[test]
    fn cad_export_requires_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.step");
        let err = export_mesh(&unit_cube(), ExportFormat::Step, &path).unwrap_err();
        assert!(matches!(err, IoError::RequiresConversion { format: ExportFormat::Step }));
        assert!(!path.exists());
    }

    #[test]
    fn save_mesh_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_mesh(&unit_cube(), dir.path().join("cube.xyz")).unwrap_err();
        assert!(matches!(err, IoError::UnknownFormat { .. }));
    }
}
