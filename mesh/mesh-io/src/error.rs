//! Error types for mesh export, persistence and remote conversion.

use std::path::PathBuf;

use mesh_types::MeshError;
use thiserror::Error;

use crate::ExportFormat;

/// Result type for mesh I/O operations.
pub type IoResult<T> = Result<T, IoError>;

/// Errors that can occur during mesh I/O.
#[derive(Debug, Error)]
pub enum IoError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was not found.
        path: PathBuf,
    },

    /// Unknown file format (unrecognized extension).
    #[error("unknown file format: .{extension}")]
    UnknownFormat {
        /// The unrecognized extension.
        extension: String,
    },

    /// The format can only be produced by the remote conversion service.
    #[error("{format} export requires remote conversion")]
    RequiresConversion {
        /// The requested format.
        format: ExportFormat,
    },

    /// Invalid file content (parse error).
    #[error("invalid file content: {message}")]
    InvalidContent {
        /// Description of what was invalid.
        message: String,
    },

    /// Invalid header in binary STL.
    #[error("invalid STL header: expected {expected} bytes, got {got}")]
    InvalidHeader {
        /// Expected header size.
        expected: usize,
        /// Actual header size.
        got: usize,
    },

    /// Binary STL body shorter than its triangle count.
    #[error("truncated STL: header declares {expected} triangles, body holds {got}")]
    InvalidFaceCount {
        /// Triangle count from the header.
        expected: u32,
        /// Complete triangles present.
        got: u32,
    },

    /// A mesh with more triangles than the format can count.
    #[error("mesh too large for {format}: {count} triangles")]
    TooLarge {
        /// Format name.
        format: &'static str,
        /// Triangle count.
        count: usize,
    },

    /// The mesh buffer violated its layout.
    #[error("mesh layout error: {0}")]
    Mesh(#[from] MeshError),

    /// The conversion service rejected or failed the job.
    #[error("remote conversion failed: {message}")]
    Remote {
        /// Message from the service.
        message: String,
    },

    /// The conversion job did not finish within the polling budget.
    #[error("remote conversion timed out after {attempts} status checks")]
    Timeout {
        /// Status checks made.
        attempts: u32,
    },

    /// Job status JSON could not be parsed.
    #[error("invalid job status: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IoError {
    /// Create an `InvalidContent` error with the given message.
    #[must_use]
    pub fn invalid_content(message: impl Into<String>) -> Self {
        Self::InvalidContent {
            message: message.into(),
        }
    }

    /// Create a `Remote` error with the given message.
    #[must_use]
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Map a file-open error, turning `NotFound` into [`IoError::FileNotFound`].
    pub(crate) fn open(path: &std::path::Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            Self::Io(err)
        }
    }
}
