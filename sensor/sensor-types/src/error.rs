//! Error types for sensor frame access.

use thiserror::Error;

/// Errors that can occur when reading a depth frame.
#[derive(Debug, Error)]
pub enum SensorError {
    /// The frame's image data has not been produced yet.
    ///
    /// Depth sensors typically need a few frames after session start before
    /// depth is available. Callers treat this as "no data this frame".
    #[error("{image} image not yet available")]
    NotYetAvailable {
        /// Which image was requested ("depth" or "confidence").
        image: &'static str,
    },

    /// Buffer size mismatch (e.g., image buffer wrong size).
    #[error("buffer size mismatch: expected {expected}, got {actual}")]
    BufferSizeMismatch {
        /// Expected buffer size.
        expected: usize,
        /// Actual buffer size.
        actual: usize,
    },

    /// Two images that must be co-registered have different dimensions.
    #[error("dimension mismatch: depth {depth:?}, confidence {confidence:?}")]
    DimensionMismatch {
        /// Depth image `(width, height)`.
        depth: (u32, u32),
        /// Confidence image `(width, height)`.
        confidence: (u32, u32),
    },

    /// Invalid camera calibration (e.g., zero focal length).
    #[error("invalid intrinsics: {0}")]
    InvalidIntrinsics(String),
}

impl SensorError {
    /// Creates a buffer size mismatch error.
    #[must_use]
    pub const fn buffer_mismatch(expected: usize, actual: usize) -> Self {
        Self::BufferSizeMismatch { expected, actual }
    }

    /// Creates a not-yet-available error for the named image.
    #[must_use]
    pub const fn not_available(image: &'static str) -> Self {
        Self::NotYetAvailable { image }
    }
}

/// Result type for sensor operations.
pub type SensorResult<T> = Result<T, SensorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_buffer_mismatch() {
        let err = SensorError::buffer_mismatch(100, 50);
        let msg = format!("{err}");
        assert!(msg.contains("100"));
        assert!(msg.contains("50"));
    }

    #[test]
    fn error_not_available() {
        let err = SensorError::not_available("depth");
        assert_eq!(format!("{err}"), "depth image not yet available");
    }

    #[test]
    fn error_dimension_mismatch() {
        let err = SensorError::DimensionMismatch {
            depth: (4, 3),
            confidence: (2, 2),
        };
        let msg = format!("{err}");
        assert!(msg.contains("(4, 3)"));
        assert!(msg.contains("(2, 2)"));
    }
}
