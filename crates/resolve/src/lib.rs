//! Partyhub Outcome Resolution
//!
//! This crate turns terminal simulation geometry into discrete game
//! results: a wheel's final rotation angle into a winning segment index,
//! and a die's resting orientation into a face value. It is the
//! authoritative mapping both the host display and the triggering
//! controller must agree on.
//!
//! # Architecture Constraints
//!
//! Everything in this crate MUST be pure:
//! - No I/O, no clocks, no ambient randomness
//! - Identical inputs always yield identical outputs
//!
//! The animation and physics that produce the terminal geometry live
//! outside this crate entirely; so does message delivery.

#![deny(unsafe_code)]

pub mod die;
pub mod wheel;

pub use die::{
    is_settled, resolve_die_face, FaceId, FaceNormals, GeometryError, SETTLE_SPEED_EPSILON,
};
pub use wheel::{
    normalize_degrees, pointer_center_offset, resolve_wheel_segment, ConfigError, SpinPlan,
    SpinTuning, WheelLayout,
};

/// Discrete result of a settled round.
///
/// Immutable once computed; derived purely from terminal geometry plus
/// the configured segment/face tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Winning wheel segment.
    Segment { index: usize, label: String },
    /// Upward-facing die pip value.
    Face(FaceId),
}

impl Outcome {
    /// Human-readable form for display surfaces.
    pub fn display_label(&self) -> String {
        match self {
            Outcome::Segment { label, .. } => label.clone(),
            Outcome::Face(value) => value.to_string(),
        }
    }
}
