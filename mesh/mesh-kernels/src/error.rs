//! Error types for kernel operations.

use mesh_types::MeshError;
use thiserror::Error;

/// Errors that a numerical kernel can report.
#[derive(Debug, Error)]
pub enum KernelError {
    /// The operation needs a non-empty input.
    #[error("{operation}: input is empty")]
    EmptyInput {
        /// Kernel operation name.
        operation: &'static str,
    },

    /// A parameter is outside its valid range.
    #[error("{operation}: invalid parameter: {reason}")]
    InvalidParameter {
        /// Kernel operation name.
        operation: &'static str,
        /// What was wrong.
        reason: String,
    },

    /// The kernel produced or received a malformed mesh buffer.
    #[error("mesh layout error: {0}")]
    Mesh(#[from] MeshError),

    /// SVD computation failed during transform estimation.
    #[error("SVD computation failed during transform estimation")]
    SvdFailed,

    /// No valid correspondences found between the clouds.
    #[error("no valid correspondences found between point clouds")]
    NoCorrespondences,

    /// The backend could not be initialized.
    #[error("kernel runtime initialization failed: {0}")]
    Initialization(String),

    /// A backend-specific failure.
    #[error("{operation} failed: {reason}")]
    Failed {
        /// Kernel operation name.
        operation: &'static str,
        /// Backend message.
        reason: String,
    },
}

impl KernelError {
    /// Creates an invalid-parameter error.
    #[must_use]
    pub fn invalid(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            operation,
            reason: reason.into(),
        }
    }

    /// Creates a backend failure.
    #[must_use]
    pub fn failed(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Failed {
            operation,
            reason: reason.into(),
        }
    }
}

/// Result type for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_operation() {
        let err = KernelError::invalid("voxel_grid_filter", "voxel size must be positive");
        assert_eq!(
            err.to_string(),
            "voxel_grid_filter: invalid parameter: voxel size must be positive"
        );
        let err = KernelError::EmptyInput {
            operation: "repair_mesh",
        };
        assert_eq!(err.to_string(), "repair_mesh: input is empty");
    }

    #[test]
    fn mesh_error_converts() {
        let err: KernelError = MeshError::MissingHeader { len: 0 }.into();
        assert!(matches!(err, KernelError::Mesh(_)));
    }
}
