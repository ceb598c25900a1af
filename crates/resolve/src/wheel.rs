//! Wheel outcome resolution.
//!
//! The wheel rotates under a fixed pointer, so the winning segment is
//! the one whose arc currently sits under the pointer. Selecting it
//! requires *inverting* the wheel's accumulated rotation before
//! indexing:
//!
//! ```text
//! adjusted = normalize(360 - finalAngle + pointerOffset)
//! index    = floor(adjusted / segmentSize) mod segmentCount
//! ```
//!
//! The pointer offset defaults to half a segment width so the pointer
//! samples the *center* of the arc it overlaps rather than its leading
//! edge; a final angle landing exactly on a segment boundary then
//! resolves without flicker. Direction and offset are explicit
//! parameters, not per-call constants.

use thiserror::Error;

use crate::Outcome;

// ============================================================================
// Errors
// ============================================================================

/// Invalid wheel configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A wheel needs at least one segment.
    #[error("segment count must be at least 1")]
    NoSegments,
    /// Labels and colors must pair up one-to-one.
    #[error("layout mismatch: {labels} labels vs {colors} colors")]
    LabelColorMismatch { labels: usize, colors: usize },
}

// ============================================================================
// Angle Math
// ============================================================================

/// Normalize an angle in degrees into `[0, 360)`.
///
/// Handles negative and multi-revolution inputs.
pub fn normalize_degrees(angle: f64) -> f64 {
    angle.rem_euclid(360.0)
}

/// Default pointer offset: half a segment width, placing the pointer at
/// the center of the arc it overlaps.
///
/// Callers must validate `segment_count >= 1` first.
pub fn pointer_center_offset(segment_count: usize) -> f64 {
    180.0 / segment_count as f64
}

/// Core index computation. Caller guarantees `segment_count >= 1`.
fn segment_index(
    final_angle_degrees: f64,
    segment_count: usize,
    pointer_offset_degrees: f64,
) -> usize {
    let segment_size = 360.0 / segment_count as f64;
    let adjusted = normalize_degrees(
        360.0 - normalize_degrees(final_angle_degrees) + pointer_offset_degrees,
    );
    // `adjusted` is in [0, 360), but the quotient can round up to
    // `segment_count` right at a boundary.
    (adjusted / segment_size) as usize % segment_count
}

/// Map a wheel's final rotation angle to the winning segment index.
///
/// The angle is normalized into `[0, 360)`; the wheel is partitioned
/// into `segment_count` equal arcs starting at label index 0, proceeding
/// in the rotation direction used to accumulate `final_angle_degrees`.
///
/// # Errors
/// `ConfigError::NoSegments` if `segment_count` is zero.
pub fn resolve_wheel_segment(
    final_angle_degrees: f64,
    segment_count: usize,
    pointer_offset_degrees: f64,
) -> Result<usize, ConfigError> {
    if segment_count == 0 {
        return Err(ConfigError::NoSegments);
    }
    Ok(segment_index(
        final_angle_degrees,
        segment_count,
        pointer_offset_degrees,
    ))
}

// ============================================================================
// Wheel Layout
// ============================================================================

/// Ordered segment labels and matching colors.
///
/// Insertion order is significant: it fixes each segment's angular
/// bounds on the wheel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WheelLayout {
    labels: Vec<String>,
    colors: Vec<String>,
}

impl WheelLayout {
    /// Build a layout, validating `labels.len() == colors.len()` and
    /// at least one segment.
    pub fn new(labels: Vec<String>, colors: Vec<String>) -> Result<Self, ConfigError> {
        if labels.is_empty() {
            return Err(ConfigError::NoSegments);
        }
        if labels.len() != colors.len() {
            return Err(ConfigError::LabelColorMismatch {
                labels: labels.len(),
                colors: colors.len(),
            });
        }
        Ok(Self { labels, colors })
    }

    pub fn segment_count(&self) -> usize {
        self.labels.len()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn colors(&self) -> &[String] {
        &self.colors
    }

    /// Half a segment width for this layout.
    pub fn pointer_center_offset(&self) -> f64 {
        pointer_center_offset(self.labels.len())
    }

    /// Resolve a final rotation angle against this layout.
    ///
    /// `pointer_offset_degrees` of `None` uses the center-of-segment
    /// default.
    pub fn resolve(&self, final_angle_degrees: f64, pointer_offset_degrees: Option<f64>) -> Outcome {
        let offset = pointer_offset_degrees.unwrap_or_else(|| self.pointer_center_offset());
        let index = segment_index(final_angle_degrees, self.labels.len(), offset);
        Outcome::Segment {
            index,
            label: self.labels[index].clone(),
        }
    }
}

// ============================================================================
// Spin Tuning
// ============================================================================

/// Trigger magnitude to animation parameters.
///
/// The trigger magnitude (swipe strength) is clamped into
/// `[min_magnitude, max_magnitude]` and then drives how long and how
/// far the wheel spins. All constants are externally supplied
/// configuration; the defaults are the conventional values.
#[derive(Debug, Clone, PartialEq)]
pub struct SpinTuning {
    pub base_duration_ms: u64,
    pub duration_per_magnitude_ms: u64,
    pub base_rotations: u32,
    pub rotations_per_magnitude: f64,
    pub min_magnitude: f64,
    pub max_magnitude: f64,
}

impl Default for SpinTuning {
    fn default() -> Self {
        Self {
            // duration = 3000ms + magnitude * 500ms
            base_duration_ms: 3_000,
            duration_per_magnitude_ms: 500,
            // rotations = 5 + floor(magnitude * 3)
            base_rotations: 5,
            rotations_per_magnitude: 3.0,
            min_magnitude: 1.0,
            max_magnitude: 10.0,
        }
    }
}

impl SpinTuning {
    /// Clamp a raw trigger magnitude into the configured range.
    ///
    /// Non-finite input collapses to the minimum.
    pub fn clamp_magnitude(&self, magnitude: f64) -> f64 {
        if !magnitude.is_finite() {
            return self.min_magnitude;
        }
        magnitude.clamp(self.min_magnitude, self.max_magnitude)
    }

    /// Derive the animation plan for a trigger magnitude.
    pub fn plan(&self, magnitude: f64) -> SpinPlan {
        let m = self.clamp_magnitude(magnitude);
        SpinPlan {
            duration_ms: self.base_duration_ms
                + (m * self.duration_per_magnitude_ms as f64) as u64,
            rotations: self.base_rotations + (m * self.rotations_per_magnitude) as u32,
        }
    }
}

/// Animation parameters for one spin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpinPlan {
    pub duration_ms: u64,
    pub rotations: u32,
}

// ============================================================================
// Tests
// ============================================================================
