//! Die outcome resolution.
//!
//! Models a rigid cube settling under gravity: for each known face,
//! the face's reference outward normal (a unit vector fixed in the
//! die's local frame) is rotated into world space by the resting
//! orientation, and the face whose rotated normal points most nearly
//! upward is read as the result.
//!
//! Which physical cube face carries which printed pip value is a static
//! asset-layout decision, independent of physics, so the face table is
//! supplied by the caller rather than derived.

use glam::{Quat, Vec3};
use thiserror::Error;

/// Printed pip value of a die face.
pub type FaceId = u8;

/// Both linear and angular speed must drop below this before the
/// physics loop reports the die as settled.
pub const SETTLE_SPEED_EPSILON: f32 = 0.1;

/// Acceptable deviation of an orientation quaternion from unit length.
const UNIT_TOLERANCE: f32 = 1e-4;

/// A later face must beat the current best dot product by more than
/// this, so floating-point ties go to the first-declared face.
const TIE_TOLERANCE: f32 = 1e-6;

/// Degenerate physics state.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GeometryError {
    #[error("face-normal table is empty")]
    NoFaces,
    #[error("orientation quaternion is not unit length (|q| = {length})")]
    NonUnitOrientation { length: f32 },
}

/// Ordered face-to-pip table: each entry pairs a printed pip value with
/// that face's outward normal in the die's local frame.
///
/// Declaration order is significant: it breaks ties when two rotated
/// normals point equally upward.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceNormals {
    faces: Vec<(FaceId, Vec3)>,
}

impl FaceNormals {
    /// Build a table from `(pip, local normal)` pairs.
    ///
    /// # Errors
    /// `GeometryError::NoFaces` if the table is empty.
    pub fn new(faces: Vec<(FaceId, Vec3)>) -> Result<Self, GeometryError> {
        if faces.is_empty() {
            return Err(GeometryError::NoFaces);
        }
        Ok(Self { faces })
    }

    /// The conventional cube texture layout:
    /// `+Z -> 5, +X -> 1, -Y -> 4, +Y -> 3, -X -> 2, -Z -> 6`.
    pub fn standard() -> Self {
        Self {
            faces: vec![
                (5, Vec3::Z),
                (1, Vec3::X),
                (4, Vec3::NEG_Y),
                (3, Vec3::Y),
                (2, Vec3::NEG_X),
                (6, Vec3::NEG_Z),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(FaceId, Vec3)> {
        self.faces.iter()
    }
}

/// True once the physics loop may stop stepping: both velocities are
/// below [`SETTLE_SPEED_EPSILON`].
pub fn is_settled(linear_velocity: Vec3, angular_velocity: Vec3) -> bool {
    linear_velocity.length() < SETTLE_SPEED_EPSILON
        && angular_velocity.length() < SETTLE_SPEED_EPSILON
}

/// Read the upward-facing pip value from a resting orientation.
///
/// Each declared normal is rotated into world space by `orientation`;
/// the face with the largest dot product against world up `(0, 1, 0)`
/// wins. Ties within floating-point tolerance go to the first-declared
/// face.
///
/// # Errors
/// `GeometryError::NonUnitOrientation` if `orientation` is not unit
/// length within tolerance.
pub fn resolve_die_face(orientation: Quat, faces: &FaceNormals) -> Result<FaceId, GeometryError> {
    let length = orientation.length();
    if (length - 1.0).abs() > UNIT_TOLERANCE {
        return Err(GeometryError::NonUnitOrientation { length });
    }

    // `FaceNormals` is non-empty by construction.
    let (first_pip, first_normal) = faces.faces[0];
    let mut best_pip = first_pip;
    let mut best_dot = (orientation * first_normal).dot(Vec3::Y);

    for &(pip, normal) in &faces.faces[1..] {
        let dot = (orientation * normal).dot(Vec3::Y);
        if dot > best_dot + TIE_TOLERANCE {
            best_pip = pip;
            best_dot = dot;
        }
    }

    Ok(best_pip)
}

// ============================================================================
// Tests
// ============================================================================
