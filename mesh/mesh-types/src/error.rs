//! Error types for mesh and point buffer construction.

use thiserror::Error;

/// Errors raised when a flat buffer violates its layout invariants.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeshError {
    /// The buffer is too short to hold the two count headers.
    #[error("serialized mesh too short: {len} floats, need at least 2")]
    MissingHeader {
        /// Actual buffer length.
        len: usize,
    },

    /// A count header is negative, fractional or not finite.
    #[error("invalid {field} header value: {value}")]
    InvalidCount {
        /// Which header ("vertex count" or "triangle count").
        field: &'static str,
        /// The offending value.
        value: f32,
    },

    /// Buffer length disagrees with the header counts.
    #[error("length mismatch: headers imply {expected} floats, got {actual}")]
    LengthMismatch {
        /// Length implied by the headers.
        expected: usize,
        /// Actual buffer length.
        actual: usize,
    },

    /// A triangle index is not an integral float.
    #[error("triangle {triangle} has non-integral index {value}")]
    NonIntegralIndex {
        /// Triangle number.
        triangle: usize,
        /// The offending value.
        value: f32,
    },

    /// A triangle index refers past the end of the vertex list.
    #[error("triangle {triangle} references vertex {index}, but mesh has {vertex_count} vertices")]
    IndexOutOfRange {
        /// Triangle number.
        triangle: usize,
        /// The offending index.
        index: u32,
        /// Number of vertices.
        vertex_count: usize,
    },

    /// A count or index would not be exactly representable as `f32`.
    #[error("{field} {count} exceeds the exact f32 integer range")]
    TooLarge {
        /// What overflowed ("vertex count", "triangle count").
        field: &'static str,
        /// The requested count.
        count: usize,
    },

    /// A flat point buffer is not a whole number of records.
    #[error("point buffer length {len} is not a multiple of {stride}")]
    RaggedBuffer {
        /// Buffer length.
        len: usize,
        /// Floats per record.
        stride: usize,
    },
}

/// Result type for mesh construction.
pub type MeshResult<T> = Result<T, MeshError>;
