//! Stanford PLY writer.
//!
//! Vertices are `float x, y, z`; faces are `list uchar int vertex_indices`.
//! The binary variant is little-endian and written by hand; the ASCII
//! variant goes through `ply-rs`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use mesh_types::MeshTopology;
use ply_rs::ply::{
    Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType,
    ScalarType,
};
use ply_rs::writer::Writer;

use crate::error::{IoError, IoResult};

const COMMENT: &str = "CortenForge mesh-scan";

fn index_i32(i: u32) -> IoResult<i32> {
    i32::try_from(i).map_err(|_| IoError::TooLarge {
        format: "PLY",
        count: i as usize,
    })
}

/// Write `mesh` as binary little-endian PLY.
///
/// # Errors
///
/// Returns an error if a vertex is missing, an index exceeds `i32`, or the
/// writer fails.
pub fn write_ply_binary<M, W>(mesh: &M, mut writer: W) -> IoResult<()>
where
    M: MeshTopology + ?Sized,
    W: Write,
{
    writeln!(writer, "ply")?;
    writeln!(writer, "format binary_little_endian 1.0")?;
    writeln!(writer, "comment {COMMENT}")?;
    writeln!(writer, "element vertex {}", mesh.vertex_count())?;
    writeln!(writer, "property float x")?;
    writeln!(writer, "property float y")?;
    writeln!(writer, "property float z")?;
    writeln!(writer, "element face {}", mesh.face_count())?;
    writeln!(writer, "property list uchar int vertex_indices")?;
    writeln!(writer, "end_header")?;

    for i in 0..mesh.vertex_count() {
        let v = mesh
            .vertex(i)
            .ok_or_else(|| IoError::invalid_content(format!("vertex {i} missing")))?;
        for c in [v.x, v.y, v.z] {
            writer.write_all(&c.to_le_bytes())?;
        }
    }
    for face in mesh.faces() {
        writer.write_all(&[3u8])?;
        for i in face {
            writer.write_all(&index_i32(i)?.to_le_bytes())?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Write `mesh` as ASCII PLY.
///
/// # Errors
///
/// Returns an error if a vertex is missing, an index exceeds `i32`, or the
/// writer fails.
pub fn write_ply_ascii<M, W>(mesh: &M, mut writer: W) -> IoResult<()>
where
    M: MeshTopology + ?Sized,
    W: Write,
{
    let mut ply = Ply::<DefaultElement>::new();
    ply.header.encoding = Encoding::Ascii;
    ply.header.comments.push(COMMENT.to_string());

    let mut vertex_def = ElementDef::new("vertex".to_string());
    for axis in ["x", "y", "z"] {
        vertex_def.properties.add(PropertyDef::new(
            axis.to_string(),
            PropertyType::Scalar(ScalarType::Float),
        ));
    }
    vertex_def.count = mesh.vertex_count();
    ply.header.elements.add(vertex_def);

    let mut face_def = ElementDef::new("face".to_string());
    face_def.properties.add(PropertyDef::new(
        "vertex_indices".to_string(),
        PropertyType::List(ScalarType::UChar, ScalarType::Int),
    ));
    face_def.count = mesh.face_count();
    ply.header.elements.add(face_def);

    let mut vertices = Vec::with_capacity(mesh.vertex_count());
    for i in 0..mesh.vertex_count() {
        let v = mesh
            .vertex(i)
            .ok_or_else(|| IoError::invalid_content(format!("vertex {i} missing")))?;
        let mut element = DefaultElement::new();
        element.insert("x".to_string(), Property::Float(v.x));
        element.insert("y".to_string(), Property::Float(v.y));
        element.insert("z".to_string(), Property::Float(v.z));
        vertices.push(element);
    }
    ply.payload.insert("vertex".to_string(), vertices);

    let mut faces = Vec::with_capacity(mesh.face_count());
    for [a, b, c] in mesh.faces() {
        let mut element = DefaultElement::new();
        element.insert(
            "vertex_indices".to_string(),
            Property::ListInt(vec![index_i32(a)?, index_i32(b)?, index_i32(c)?]),
        );
        faces.push(element);
    }
    ply.payload.insert("face".to_string(), faces);

    Writer::new()
        .write_ply(&mut writer, &mut ply)
        .map_err(|e| IoError::invalid_content(format!("failed to write PLY: {e}")))?;
    writer.flush()?;
    Ok(())
}

/// Write `mesh` to a PLY file, binary or ASCII.
///
/// # Errors
///
/// See [`write_ply_binary`] and [`write_ply_ascii`].
pub fn save_ply<M, P>(mesh: &M, path: P, binary: bool) -> IoResult<()>
where
    M: MeshTopology + ?Sized,
    P: AsRef<Path>,
{
    let writer = BufWriter::new(File::create(path)?);
    if binary {
        write_ply_binary(mesh, writer)
    } else {
        write_ply_ascii(mesh, writer)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use mesh_types::unit_cube;

    fn header_end(bytes: &[u8]) -> usize {
        let marker = b"end_header\n";
        bytes
            .windows(marker.len())
            .position(|w| w == marker)
            .map(|p| p + marker.len())
            .unwrap()
    }

    #[test]
    fn binary_layout() {
        let mut out = Vec::new();
        write_ply_binary(&unit_cube(), &mut out).unwrap();
        let header = String::from_utf8_lossy(&out[..header_end(&out)]).into_owned();
        assert!(header.contains("format binary_little_endian 1.0"));
        assert!(header.contains("element vertex 8"));
        assert!(header.contains("element face 12"));

        let body = &out[header_end(&out)..];
        assert_eq!(body.len(), 8 * 12 + 12 * 13);
        // Second vertex is (1, 0, 0).
        assert_eq!(f32::from_le_bytes(body[12..16].try_into().unwrap()), 1.0);
        // First face record: count then three indices.
        let faces = &body[8 * 12..];
        assert_eq!(faces[0], 3);
        assert_eq!(i32::from_le_bytes(faces[5..9].try_into().unwrap()), 2);
    }

    #[test]
    fn ascii_is_text() {
        let mut out = Vec::new();
        write_ply_ascii(&unit_cube(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("ply\n"));
        assert!(text.contains("format ascii 1.0"));
        assert!(text.contains("element face 12"));
        assert!(text.lines().any(|l| l.trim() == "3 0 2 1"));
    }

    #[test]
    fn save_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.ply");
        save_ply(&unit_cube(), &path, false).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("end_header"));
    }
}
