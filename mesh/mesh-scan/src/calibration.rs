//! Two-point metric calibration.
//!
//! The operator picks two points on a reference object and enters the true
//! distance between them. The ratio of true to measured distance becomes the
//! pipeline's scale factor.

use mesh_types::Point3;

/// Smallest measured distance, in millimeters, that yields a scale.
pub const MIN_MEASURED_MM: f32 = 0.001;

/// Calibration inputs and the values derived from them.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CalibrationState {
    /// First reference point, world meters.
    pub point_a: Option<Point3<f32>>,
    /// Second reference point, world meters.
    pub point_b: Option<Point3<f32>>,
    /// `|B - A|` in millimeters; 0 while a point is missing.
    pub measured_distance_mm: f32,
    /// True distance entered by the operator, millimeters.
    pub known_distance_mm: f32,
    /// `known / measured`, or 1 when not calibrated.
    pub scale_factor: f32,
    /// Both distances are usable.
    pub is_calibrated: bool,
}

impl Default for CalibrationState {
    fn default() -> Self {
        Self {
            point_a: None,
            point_b: None,
            measured_distance_mm: 0.0,
            known_distance_mm: 0.0,
            scale_factor: 1.0,
            is_calibrated: false,
        }
    }
}

/// Collects calibration input and keeps [`CalibrationState`] consistent.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalibrationEstimator {
    state: CalibrationState,
}

impl CalibrationEstimator {
    /// An empty estimator (scale 1).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &CalibrationState {
        &self.state
    }

    /// Scale to apply to reconstructed meshes.
    #[must_use]
    pub const fn scale_factor(&self) -> f32 {
        self.state.scale_factor
    }

    /// Sets the first reference point.
    pub fn set_point_a(&mut self, point: Point3<f32>) {
        self.state.point_a = Some(point);
        self.recompute();
    }

    /// Sets the second reference point.
    pub fn set_point_b(&mut self, point: Point3<f32>) {
        self.state.point_b = Some(point);
        self.recompute();
    }

    /// Sets the true distance in millimeters.
    pub fn set_known_distance(&mut self, distance_mm: f32) {
        self.state.known_distance_mm = distance_mm;
        self.recompute();
    }

    /// Clears everything.
    pub fn reset(&mut self) {
        self.state = CalibrationState::default();
    }

    fn recompute(&mut self) {
        let s = &mut self.state;
        s.measured_distance_mm = match (s.point_a, s.point_b) {
            (Some(a), Some(b)) => nalgebra::distance(&a, &b) * 1000.0,
            _ => 0.0,
        };
        s.is_calibrated = s.measured_distance_mm > MIN_MEASURED_MM && s.known_distance_mm > 0.0;
        s.scale_factor = if s.is_calibrated {
            s.known_distance_mm / s.measured_distance_mm
        } else {
            1.0
        };
    }
}
