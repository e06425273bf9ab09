//! Binary STL.
//!
//! # Layout
//!
//! ```text
//! UINT8[80]    – Header, product identifier padded with zeros
//! UINT32       – Number of triangles
//! foreach triangle
//!     REAL32[3] – Unit normal, zero for degenerate triangles
//!     REAL32[3] – Vertex 1
//!     REAL32[3] – Vertex 2
//!     REAL32[3] – Vertex 3
//!     UINT16    – Attribute byte count (0)
//! end
//! ```
//!
//! All numbers are little-endian.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use hashbrown::HashMap;
use mesh_types::{MeshTopology, Point3, SerializedMesh};

use crate::error::{IoError, IoResult};

/// STL binary header size in bytes.
pub const HEADER_SIZE: usize = 80;

/// Size of one triangle record (normal + 3 vertices + attribute).
pub const TRIANGLE_SIZE: usize = 50;

/// Identifier written at the start of every header.
pub const HEADER_TEXT: &[u8] = b"CortenForge mesh-scan";

/// Parsed fixed-size prefix of a binary STL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StlHeader {
    /// The raw 80-byte header.
    pub text: [u8; HEADER_SIZE],
    /// Declared triangle count.
    pub triangle_count: u32,
}

impl StlHeader {
    /// Header text up to the first zero byte, lossily decoded.
    #[must_use]
    pub fn label(&self) -> String {
        let end = self.text.iter().position(|&b| b == 0).unwrap_or(HEADER_SIZE);
        String::from_utf8_lossy(&self.text[..end]).into_owned()
    }
}

/// Read the header and triangle count from the start of `bytes`.
///
/// # Errors
///
/// Returns [`IoError::InvalidHeader`] if fewer than 84 bytes are given.
pub fn read_stl_header(bytes: &[u8]) -> IoResult<StlHeader> {
    let Some(prefix) = bytes.get(..HEADER_SIZE + 4) else {
        return Err(IoError::InvalidHeader {
            expected: HEADER_SIZE + 4,
            got: bytes.len(),
        });
    };
    let mut text = [0u8; HEADER_SIZE];
    text.copy_from_slice(&prefix[..HEADER_SIZE]);
    let triangle_count = u32::from_le_bytes([prefix[80], prefix[81], prefix[82], prefix[83]]);
    Ok(StlHeader {
        text,
        triangle_count,
    })
}

/// Write `mesh` as binary STL.
///
/// Normals are recomputed from the vertices as
/// `normalize((v1 - v0) x (v2 - v0))`.
///
/// # Errors
///
/// Returns an error if the mesh has more than `u32::MAX` triangles, a face
/// references a missing vertex, or the writer fails.
pub fn write_stl<M, W>(mesh: &M, mut writer: W) -> IoResult<()>
where
    M: MeshTopology + ?Sized,
    W: Write,
{
    let count = u32::try_from(mesh.face_count()).map_err(|_| IoError::TooLarge {
        format: "STL",
        count: mesh.face_count(),
    })?;

    let mut header = [0u8; HEADER_SIZE];
    header[..HEADER_TEXT.len()].copy_from_slice(HEADER_TEXT);
    writer.write_all(&header)?;
    writer.write_all(&count.to_le_bytes())?;

    let mut record = [0u8; TRIANGLE_SIZE];
    for i in 0..mesh.face_count() {
        let tri = mesh
            .triangle(i)
            .ok_or_else(|| {
                IoError::invalid_content(format!("face {i} references a missing vertex"))
            })?;
        let n = tri.unit_normal_or_zero();
        let values = [
            n.x, n.y, n.z, tri.v0.x, tri.v0.y, tri.v0.z, tri.v1.x, tri.v1.y, tri.v1.z, tri.v2.x,
            tri.v2.y, tri.v2.z,
        ];
        for (chunk, v) in record.chunks_exact_mut(4).zip(values) {
            chunk.copy_from_slice(&v.to_le_bytes());
        }
        // Attribute byte count stays zero.
        writer.write_all(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Serialize `mesh` to an in-memory binary STL.
///
/// # Errors
///
/// See [`write_stl`].
pub fn stl_bytes<M: MeshTopology + ?Sized>(mesh: &M) -> IoResult<Vec<u8>> {
    let mut out = Vec::with_capacity(HEADER_SIZE + 4 + mesh.face_count() * TRIANGLE_SIZE);
    write_stl(mesh, &mut out)?;
    Ok(out)
}

/// Write `mesh` to a binary STL file.
///
/// # Errors
///
/// See [`write_stl`].
pub fn save_stl<M, P>(mesh: &M, path: P) -> IoResult<()>
where
    M: MeshTopology + ?Sized,
    P: AsRef<Path>,
{
    let file = File::create(path)?;
    write_stl(mesh, BufWriter::new(file))
}

fn read_point(buf: &[u8]) -> Point3<f32> {
    let f = |i: usize| f32::from_le_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
    Point3::new(f(0), f(4), f(8))
}

/// Parse a binary STL, welding vertices with bit-identical coordinates.
///
/// Stored normals are ignored.
///
/// # Errors
///
/// Returns an error if the header is short or the body holds fewer
/// triangles than declared.
pub fn parse_stl(bytes: &[u8]) -> IoResult<SerializedMesh> {
    let header = read_stl_header(bytes)?;
    let body = &bytes[HEADER_SIZE + 4..];
    let available = body.len() / TRIANGLE_SIZE;
    if available < header.triangle_count as usize {
        #[allow(clippy::cast_possible_truncation)]
        let got = available as u32;
        return Err(IoError::InvalidFaceCount {
            expected: header.triangle_count,
            got,
        });
    }

    let mut vertices: Vec<Point3<f32>> = Vec::new();
    let mut lookup: HashMap<[u32; 3], u32> = HashMap::new();
    let mut triangles = Vec::with_capacity(header.triangle_count as usize);

    for record in body.chunks_exact(TRIANGLE_SIZE).take(header.triangle_count as usize) {
        let mut face = [0u32; 3];
        for (slot, offset) in face.iter_mut().zip([12, 24, 36]) {
            let p = read_point(&record[offset..offset + 12]);
            let key = [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()];
            *slot = *lookup.entry(key).or_insert_with(|| {
                vertices.push(p);
                #[allow(clippy::cast_possible_truncation)]
                let index = (vertices.len() - 1) as u32;
                index
            });
        }
        triangles.push(face);
    }

    Ok(SerializedMesh::from_parts(&vertices, &triangles)?)
}

/// Load a binary STL file.
///
/// # Errors
///
/// Returns [`IoError::FileNotFound`] for a missing file, or any
/// [`parse_stl`] error.
pub fn load_stl<P: AsRef<Path>>(path: P) -> IoResult<SerializedMesh> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| IoError::open(path, e))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    parse_stl(&bytes)
}
