//! Depth and confidence image views.
//!
//! Both images are single-plane, row-major and co-registered: pixel `(x, y)`
//! of the confidence image scores pixel `(x, y)` of the depth image.

use crate::error::{SensorError, SensorResult};

/// A borrowed single-plane image.
///
/// The view borrows its pixels from the frame that produced it, so the
/// frame's buffers stay locked exactly as long as a view is alive and are
/// released when it goes out of scope, on every code path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageView<'a, T> {
    width: u32,
    height: u32,
    data: &'a [T],
}

/// Depth image: millimeters as 16-bit unsigned integers.
pub type DepthImage<'a> = ImageView<'a, u16>;

/// Confidence image: 0 (no confidence) to 255 (full confidence).
pub type ConfidenceImage<'a> = ImageView<'a, u8>;

impl<'a, T: Copy> ImageView<'a, T> {
    /// Wraps a row-major pixel buffer.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::BufferSizeMismatch`] if `data.len()` is not
    /// `width * height`.
    pub fn new(width: u32, height: u32, data: &'a [T]) -> SensorResult<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(SensorError::buffer_mismatch(expected, data.len()));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Image width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)`.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Total pixel count.
    #[must_use]
    pub const fn pixel_count(&self) -> usize {
        self.data.len()
    }

    /// Raw row-major pixels.
    #[must_use]
    pub const fn as_slice(&self) -> &'a [T] {
        self.data
    }

    /// Gets the pixel at `(x, y)`, or `None` if out of bounds.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }
}

impl ImageView<'_, u16> {
    /// Depth at `(x, y)` in meters, or `None` if out of bounds.
    #[must_use]
    pub fn depth_m(&self, x: u32, y: u32) -> Option<f32> {
        self.get(x, y).map(|mm| f32::from(mm) / 1000.0)
    }
}

/// Decodes a little-endian 16-bit depth plane from raw bytes.
///
/// Sensor SDKs usually hand depth over as a byte buffer; a trailing odd byte
/// is reported as a size mismatch.
///
/// # Errors
///
/// Returns [`SensorError::BufferSizeMismatch`] for odd-length input.
pub fn decode_depth_le(bytes: &[u8]) -> SensorResult<Vec<u16>> {
    if bytes.len() % 2 != 0 {
        return Err(SensorError::buffer_mismatch(
            bytes.len() + 1,
            bytes.len(),
        ));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn view_rejects_wrong_size() {
        let data = [0u16; 5];
        let err = DepthImage::new(2, 3, &data).unwrap_err();
        assert!(matches!(
            err,
            SensorError::BufferSizeMismatch {
                expected: 6,
                actual: 5
            }
        ));
    }

    #[test]
    fn view_get_row_major() {
        let data = [1u8, 2, 3, 4, 5, 6];
        let img = ConfidenceImage::new(3, 2, &data).unwrap();
        assert_eq!(img.get(0, 0), Some(1));
        assert_eq!(img.get(2, 0), Some(3));
        assert_eq!(img.get(0, 1), Some(4));
        assert_eq!(img.get(3, 0), None);
        assert_eq!(img.get(0, 2), None);
        assert_eq!(img.dimensions(), (3, 2));
    }

    #[test]
    fn depth_in_meters() {
        let data = [1500u16];
        let img = DepthImage::new(1, 1, &data).unwrap();
        assert_relative_eq!(img.depth_m(0, 0).unwrap(), 1.5);
    }

    #[test]
    fn decode_little_endian() {
        let bytes = [0xE8, 0x03, 0x01, 0x00];
        assert_eq!(decode_depth_le(&bytes).unwrap(), vec![1000, 1]);
        assert!(decode_depth_le(&[0x00]).is_err());
    }
}
