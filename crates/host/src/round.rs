//! Round lifecycle state machine.
//!
//! One round is one trigger-to-outcome cycle:
//!
//! ```text
//! Idle -> Armed -> Resolving -> Settled -> Idle
//! ```
//!
//! - `Idle -> Armed` on a valid trigger; the owner and clamped
//!   magnitude are fixed here and never change.
//! - `Armed -> Resolving` once the external animation/physics starts;
//!   this exists purely so a second trigger cannot be accepted
//!   mid-animation.
//! - `Resolving -> Settled` when the simulation reports terminal
//!   geometry; the outcome resolver runs synchronously here.
//! - `Settled -> Idle` is an explicit step taken only after delivery,
//!   so the at-most-one-active-round discipline holds until recipients
//!   have actually observed the result.
//!
//! The session mutates the machine from a single event loop, so the
//! current state is the only guard needed against re-entrant triggers.

use glam::Quat;
use partyhub_resolve::{
    resolve_die_face, FaceNormals, GeometryError, Outcome, SpinPlan, SpinTuning, WheelLayout,
};
use partyhub_wire::ParticipantId;
use thiserror::Error;
use tracing::debug;

/// Who a round belongs to; fixed at arm time and drives delivery
/// targeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOwner {
    /// Host-initiated round (desktop spin button or single-player
    /// mode).
    Host,
    Participant(ParticipantId),
}

/// Mini-game the session is hosting; fixes how terminal geometry is
/// read.
#[derive(Debug, Clone, PartialEq)]
pub enum GameSetup {
    Wheel {
        layout: WheelLayout,
        /// `None` uses the center-of-segment default.
        pointer_offset_degrees: Option<f64>,
    },
    Dice {
        faces: FaceNormals,
    },
}

/// Terminal geometry reported by the external simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FinalGeometry {
    /// Cumulative wheel rotation in degrees when the animation stopped.
    WheelAngleDegrees(f64),
    /// Resting orientation of the die once velocities settled.
    DieOrientation(Quat),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoundState {
    Idle,
    Armed { owner: RoundOwner, magnitude: f64 },
    Resolving { owner: RoundOwner, magnitude: f64 },
    Settled { owner: RoundOwner, outcome: Outcome },
}

/// A trigger arrived while a round was already armed or resolving.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("a round is already in progress")]
pub struct TriggerRejected;

/// Why a settle call could not produce an outcome.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SettleError {
    #[error("no round is resolving")]
    NotResolving,
    #[error("terminal geometry does not match the configured mini-game")]
    GeometryMismatch,
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// The round state machine.
pub struct RoundMachine {
    state: RoundState,
}

impl RoundMachine {
    pub fn new() -> Self {
        Self {
            state: RoundState::Idle,
        }
    }

    pub fn state(&self) -> &RoundState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, RoundState::Idle)
    }

    pub fn owner(&self) -> Option<&RoundOwner> {
        match &self.state {
            RoundState::Idle => None,
            RoundState::Armed { owner, .. }
            | RoundState::Resolving { owner, .. }
            | RoundState::Settled { owner, .. } => Some(owner),
        }
    }

    /// `Idle -> Armed`. The raw magnitude is clamped by `tuning` before
    /// being stored or planned with.
    pub fn arm(
        &mut self,
        owner: RoundOwner,
        magnitude: f64,
        tuning: &SpinTuning,
    ) -> Result<SpinPlan, TriggerRejected> {
        if !self.is_idle() {
            return Err(TriggerRejected);
        }
        let magnitude = tuning.clamp_magnitude(magnitude);
        let plan = tuning.plan(magnitude);
        debug!(?owner, magnitude, "round armed");
        self.state = RoundState::Armed { owner, magnitude };
        Ok(plan)
    }

    /// `Armed -> Resolving`. Returns false in any other state.
    pub fn begin_resolving(&mut self) -> bool {
        let RoundState::Armed { owner, magnitude } = &self.state else {
            return false;
        };
        self.state = RoundState::Resolving {
            owner: owner.clone(),
            magnitude: *magnitude,
        };
        true
    }

    /// `Resolving -> Settled`: run the resolver against the reported
    /// geometry and store the outcome.
    pub fn settle(
        &mut self,
        geometry: FinalGeometry,
        game: &GameSetup,
    ) -> Result<(RoundOwner, Outcome), SettleError> {
        let RoundState::Resolving { owner, .. } = &self.state else {
            return Err(SettleError::NotResolving);
        };

        let outcome = match (geometry, game) {
            (
                FinalGeometry::WheelAngleDegrees(angle),
                GameSetup::Wheel {
                    layout,
                    pointer_offset_degrees,
                },
            ) => layout.resolve(angle, *pointer_offset_degrees),
            (FinalGeometry::DieOrientation(orientation), GameSetup::Dice { faces }) => {
                Outcome::Face(resolve_die_face(orientation, faces)?)
            }
            _ => return Err(SettleError::GeometryMismatch),
        };

        let owner = owner.clone();
        debug!(?owner, ?outcome, "round settled");
        self.state = RoundState::Settled {
            owner: owner.clone(),
            outcome: outcome.clone(),
        };
        Ok((owner, outcome))
    }

    /// `Settled -> Idle`, once delivery has completed.
    pub fn complete(&mut self) -> Option<(RoundOwner, Outcome)> {
        let RoundState::Settled { owner, outcome } = &self.state else {
            return None;
        };
        let completed = (owner.clone(), outcome.clone());
        self.state = RoundState::Idle;
        Some(completed)
    }

    /// Discard an in-flight round owned by a departed participant.
    ///
    /// Acts only on `Armed`/`Resolving`: a settled round has already
    /// been resolved and is completed through delivery instead.
    pub fn abandon_if_owned_by(&mut self, id: &str) -> bool {
        match &self.state {
            RoundState::Armed { owner, .. } | RoundState::Resolving { owner, .. }
                if *owner == RoundOwner::Participant(id.to_string()) =>
            {
                debug!(%id, "in-flight round abandoned: owner departed");
                self.state = RoundState::Idle;
                true
            }
            _ => false,
        }
    }
}

impl Default for RoundMachine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn wheel_game() -> GameSetup {
        GameSetup::Wheel {
            layout: WheelLayout::new(
                ["A", "B", "C", "D"].map(String::from).to_vec(),
                ["#1", "#2", "#3", "#4"].map(String::from).to_vec(),
            )
            .unwrap(),
            pointer_offset_degrees: Some(45.0),
        }
    }

    fn owner(id: &str) -> RoundOwner {
        RoundOwner::Participant(id.to_string())
    }

    #[test]
    fn test_full_round_cycle() {
        let tuning = SpinTuning::default();
        let mut machine = RoundMachine::new();

        let plan = machine.arm(owner("p1"), 4.0, &tuning).unwrap();
        assert_eq!(plan.duration_ms, 5_000);
        assert_eq!(plan.rotations, 17);

        assert!(machine.begin_resolving());

        let (settled_owner, outcome) = machine
            .settle(FinalGeometry::WheelAngleDegrees(90.0), &wheel_game())
            .unwrap();
        assert_eq!(settled_owner, owner("p1"));
        assert_eq!(
            outcome,
            Outcome::Segment {
                index: 3,
                label: "D".to_string()
            }
        );

        assert!(machine.complete().is_some());
        assert!(machine.is_idle());
    }

    /// Two back-to-back triggers: the second is rejected while the
    /// first round is anywhere short of Idle.
    #[test]
    fn test_second_trigger_rejected_until_complete() {
        let tuning = SpinTuning::default();
        let mut machine = RoundMachine::new();

        machine.arm(owner("p1"), 4.0, &tuning).unwrap();
        assert_eq!(machine.arm(owner("p2"), 9.0, &tuning), Err(TriggerRejected));

        machine.begin_resolving();
        assert_eq!(machine.arm(owner("p2"), 9.0, &tuning), Err(TriggerRejected));

        machine
            .settle(FinalGeometry::WheelAngleDegrees(10.0), &wheel_game())
            .unwrap();
        assert_eq!(machine.arm(owner("p2"), 9.0, &tuning), Err(TriggerRejected));

        machine.complete();
        assert!(machine.arm(owner("p2"), 9.0, &tuning).is_ok());
    }

    #[test]
    fn test_owner_fixed_at_arm() {
        let tuning = SpinTuning::default();
        let mut machine = RoundMachine::new();
        machine.arm(RoundOwner::Host, 2.0, &tuning).unwrap();
        machine.begin_resolving();
        let (settled_owner, _) = machine
            .settle(FinalGeometry::WheelAngleDegrees(0.0), &wheel_game())
            .unwrap();
        assert_eq!(settled_owner, RoundOwner::Host);
    }

    #[test]
    fn test_magnitude_clamped_on_arm() {
        let tuning = SpinTuning::default();
        let mut machine = RoundMachine::new();
        machine.arm(owner("p1"), 42.0, &tuning).unwrap();
        let RoundState::Armed { magnitude, .. } = machine.state() else {
            panic!("expected armed state");
        };
        assert_eq!(*magnitude, 10.0);
    }

    #[test]
    fn test_settle_requires_resolving() {
        let mut machine = RoundMachine::new();
        assert_eq!(
            machine.settle(FinalGeometry::WheelAngleDegrees(0.0), &wheel_game()),
            Err(SettleError::NotResolving)
        );
    }

    #[test]
    fn test_geometry_mismatch_rejected() {
        let tuning = SpinTuning::default();
        let mut machine = RoundMachine::new();
        machine.arm(owner("p1"), 3.0, &tuning).unwrap();
        machine.begin_resolving();

        assert_eq!(
            machine.settle(FinalGeometry::DieOrientation(Quat::IDENTITY), &wheel_game()),
            Err(SettleError::GeometryMismatch)
        );
        // The round survives the bad report and can still settle.
        assert!(machine
            .settle(FinalGeometry::WheelAngleDegrees(45.0), &wheel_game())
            .is_ok());
    }

    #[test]
    fn test_die_round_settles_with_face() {
        let tuning = SpinTuning::default();
        let game = GameSetup::Dice {
            faces: FaceNormals::standard(),
        };
        let mut machine = RoundMachine::new();
        machine.arm(owner("p1"), 5.0, &tuning).unwrap();
        machine.begin_resolving();

        let (_, outcome) = machine
            .settle(FinalGeometry::DieOrientation(Quat::IDENTITY), &game)
            .unwrap();
        assert_eq!(outcome, Outcome::Face(3));
    }

    #[test]
    fn test_abandon_discards_owned_round() {
        let tuning = SpinTuning::default();
        let mut machine = RoundMachine::new();
        machine.arm(owner("p1"), 4.0, &tuning).unwrap();
        machine.begin_resolving();

        assert!(!machine.abandon_if_owned_by("p2"));
        assert!(machine.abandon_if_owned_by("p1"));
        assert!(machine.is_idle());
    }

    #[test]
    fn test_abandon_ignores_host_round() {
        let tuning = SpinTuning::default();
        let mut machine = RoundMachine::new();
        machine.arm(RoundOwner::Host, 4.0, &tuning).unwrap();
        assert!(!machine.abandon_if_owned_by("p1"));
        assert!(!machine.is_idle());
    }
}
