//! Wavefront OBJ writer.
//!
//! Writes `v x y z` lines followed by `f a b c` lines with 1-based indices.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use mesh_types::MeshTopology;

use crate::error::{IoError, IoResult};

/// Write `mesh` as OBJ text.
///
/// # Errors
///
/// Returns an error if a vertex is missing or the writer fails.
pub fn write_obj<M, W>(mesh: &M, mut writer: W) -> IoResult<()>
where
    M: MeshTopology + ?Sized,
    W: Write,
{
    writeln!(writer, "# CortenForge mesh-scan")?;
    writeln!(
        writer,
        "# {} vertices, {} faces",
        mesh.vertex_count(),
        mesh.face_count()
    )?;
    for i in 0..mesh.vertex_count() {
        let v = mesh
            .vertex(i)
            .ok_or_else(|| IoError::invalid_content(format!("vertex {i} missing")))?;
        writeln!(writer, "v {} {} {}", v.x, v.y, v.z)?;
    }
    for [a, b, c] in mesh.faces() {
        writeln!(writer, "f {} {} {}", a + 1, b + 1, c + 1)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write `mesh` to an OBJ file.
///
/// # Errors
///
/// See [`write_obj`].
pub fn save_obj<M, P>(mesh: &M, path: P) -> IoResult<()>
where
    M: MeshTopology + ?Sized,
    P: AsRef<Path>,
{
    let file = File::create(path)?;
    write_obj(mesh, BufWriter::new(file))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use mesh_types::{unit_cube, SerializedMesh};

    #[test]
    fn triangle_text() {
        let mesh = SerializedMesh::from_raw(vec![
            3.0, 1.0, 0.0, 0.0, 0.0, 1.5, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 2.0,
        ])
        .unwrap();
        let mut out = Vec::new();
        write_obj(&mesh, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let body: Vec<&str> = text.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(body, vec!["v 0 0 0", "v 1.5 0 0", "v 0 1 0", "f 1 2 3"]);
    }

    #[test]
    fn cube_counts() {
        let mut out = Vec::new();
        write_obj(&unit_cube(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 8);
        assert_eq!(text.lines().filter(|l| l.starts_with("f ")).count(), 12);
        assert!(text.lines().all(|l| !l.starts_with("f 0")));
    }
}
