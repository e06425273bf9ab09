//! Live scan quality estimate.
//!
//! A heuristic from point density and frame count, shown to the operator
//! while scanning so they know when to stop.

use std::fmt;

/// Coarse quality bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum QualityLevel {
    /// Score below the first threshold.
    #[default]
    Low,
    /// Usable for rough shapes.
    Medium,
    /// Enough for most parts.
    Good,
    /// Dense, well-covered scan.
    Excellent,
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::Good => "Good",
            Self::Excellent => "Excellent",
        })
    }
}

/// Constants of the quality heuristic.
///
/// ```text
/// density  = clamp(points / density_points)
/// frames   = clamp(frame_count / frame_target)
/// quality  = density_weight * density + frame_weight * frames
/// coverage = clamp(points / coverage_points)
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QualityModel {
    /// Points for full density score (default: 500 000).
    pub density_points: f32,
    /// Frames for full frame score (default: 100).
    pub frame_target: f32,
    /// Weight of the density score (default: 0.7).
    pub density_weight: f32,
    /// Weight of the frame score (default: 0.3).
    pub frame_weight: f32,
    /// Points for full coverage (default: 1 000 000).
    pub coverage_points: f32,
    /// Lower bounds of Medium, Good and Excellent (default: 0.2, 0.5, 0.8).
    pub thresholds: [f32; 3],
}

impl Default for QualityModel {
    fn default() -> Self {
        Self {
            density_points: 500_000.0,
            frame_target: 100.0,
            density_weight: 0.7,
            frame_weight: 0.3,
            coverage_points: 1_000_000.0,
            thresholds: [0.2, 0.5, 0.8],
        }
    }
}

impl QualityModel {
    /// Quality score in `[0, 1]`; zero before any frame.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn quality(&self, points: usize, frames: u32) -> f32 {
        if frames == 0 {
            return 0.0;
        }
        let density = ratio(points as f32, self.density_points);
        let frames = ratio(frames as f32, self.frame_target);
        self.density_weight
            .mul_add(density, self.frame_weight * frames)
            .clamp(0.0, 1.0)
    }

    /// Surface coverage estimate in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn coverage(&self, points: usize) -> f32 {
        ratio(points as f32, self.coverage_points)
    }

    /// Bucket for a quality score.
    #[must_use]
    pub fn level(&self, quality: f32) -> QualityLevel {
        let [medium, good, excellent] = self.thresholds;
        if quality < medium {
            QualityLevel::Low
        } else if quality < good {
            QualityLevel::Medium
        } else if quality < excellent {
            QualityLevel::Good
        } else {
            QualityLevel::Excellent
        }
    }
}

fn ratio(value: f32, full: f32) -> f32 {
    if full <= 0.0 {
        return 1.0;
    }
    (value / full).clamp(0.0, 1.0)
}
