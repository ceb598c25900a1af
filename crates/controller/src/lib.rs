//! Partyhub Controller Session
//!
//! The phone-side counterpart of `partyhub-host`: a small state machine
//! that joins a hosting session, converts swipe gestures into trigger
//! messages, and surfaces host announcements to the UI.
//!
//! Like the host engine, this crate never touches the transport. The
//! embedder dials the host with the session token, then feeds
//! `link_opened` / `link_closed` / `handle_inbound` as the link reports
//! events, and polls `check_timeout` so a handshake that never opens is
//! reported as failed instead of hanging.

#![deny(unsafe_code)]

use partyhub_wire::{Envelope, Kind, OutcomeProto};
use prost::Message;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

/// A dial attempt that has not opened within this window is abandoned.
pub const CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Minimum upward travel for a gesture to count as a swipe.
pub const MIN_SWIPE_DISTANCE_PX: f64 = 50.0;

/// Controller configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub connect_timeout_ms: u64,
    pub min_swipe_distance_px: f64,
    /// Random variation of +/- this much is mixed into each swipe
    /// magnitude so identical gestures do not land identically.
    pub magnitude_jitter: f64,
    pub min_magnitude: f64,
    pub max_magnitude: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: CONNECT_TIMEOUT_MS,
            min_swipe_distance_px: MIN_SWIPE_DISTANCE_PX,
            magnitude_jitter: 0.5,
            min_magnitude: 1.0,
            max_magnitude: 10.0,
        }
    }
}

/// Where the controller is in its session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Dialing the host; waiting for the link to open.
    Connecting { since_ms: u64 },
    /// Link open and join sent; waiting for the game to start.
    Lobby,
    /// Host announced game start; gestures are live.
    InGame,
    /// The handshake gave up or the link dropped.
    Disconnected,
}

/// Host announcement surfaced to the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    GameStarted,
    GameStopped,
    RoundStarted,
    RoundResult(OutcomeProto),
    /// Frame did not decode; ignored.
    DroppedMalformed,
    /// A controller-to-host kind (or an empty result) arrived; ignored.
    DroppedUnexpectedKind,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControllerError {
    #[error("display name must not be empty")]
    EmptyDisplayName,
    #[error("connect attempt timed out after {0} ms")]
    ConnectTimeout(u64),
}

/// Phone-side session state machine.
#[derive(Debug)]
pub struct Controller {
    id: String,
    display_name: String,
    config: ControllerConfig,
    phase: Phase,
}

impl Controller {
    /// Begin a connect attempt to a host. The display name is required
    /// up front: the join message cannot be formed without it.
    pub fn connect(
        id: impl Into<String>,
        display_name: &str,
        config: ControllerConfig,
        now_ms: u64,
    ) -> Result<Self, ControllerError> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(ControllerError::EmptyDisplayName);
        }
        Ok(Self {
            id: id.into(),
            display_name: display_name.to_string(),
            config,
            phase: Phase::Connecting { since_ms: now_ms },
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Fail a handshake that has outlived the connect timeout. Polled
    /// by the embedder's timer while dialing.
    pub fn check_timeout(&mut self, now_ms: u64) -> Result<(), ControllerError> {
        let Phase::Connecting { since_ms } = self.phase else {
            return Ok(());
        };
        if now_ms.saturating_sub(since_ms) > self.config.connect_timeout_ms {
            warn!(id = %self.id, "connect attempt timed out");
            self.phase = Phase::Disconnected;
            return Err(ControllerError::ConnectTimeout(
                self.config.connect_timeout_ms,
            ));
        }
        Ok(())
    }

    /// The link opened: emit the join handshake.
    pub fn link_opened(&mut self) -> Option<Envelope> {
        match self.phase {
            Phase::Connecting { .. } => {
                debug!(id = %self.id, "link open; sending join");
                self.phase = Phase::Lobby;
                Some(Envelope::join(self.id.clone(), self.display_name.clone()))
            }
            _ => {
                warn!(id = %self.id, "unexpected link open ignored");
                None
            }
        }
    }

    pub fn link_closed(&mut self) {
        debug!(id = %self.id, "link closed");
        self.phase = Phase::Disconnected;
    }

    /// Periodic liveness piggyback; only meaningful while joined.
    pub fn heartbeat(&self) -> Option<Envelope> {
        match self.phase {
            Phase::Lobby | Phase::InGame => Some(Envelope::heartbeat()),
            _ => None,
        }
    }

    /// Convert a touch gesture into a trigger message.
    ///
    /// `delta_y_px` is end minus start, so an upward swipe is negative.
    /// Gestures shorter than the swipe threshold, or arriving while the
    /// game is not live, produce nothing. The magnitude is the swipe
    /// speed in px/ms, jittered and clamped into the configured range.
    pub fn swipe<R: Rng>(
        &mut self,
        rng: &mut R,
        delta_y_px: f64,
        elapsed_ms: u64,
    ) -> Option<Envelope> {
        if self.phase != Phase::InGame {
            return None;
        }
        if delta_y_px >= -self.config.min_swipe_distance_px {
            return None;
        }
        let speed = delta_y_px.abs() / elapsed_ms.max(1) as f64;
        let jitter = rng.random_range(-self.config.magnitude_jitter..=self.config.magnitude_jitter);
        let magnitude =
            (speed + jitter).clamp(self.config.min_magnitude, self.config.max_magnitude);
        debug!(id = %self.id, magnitude, "swipe detected");
        Some(Envelope::trigger(magnitude))
    }

    /// Route one inbound frame from the host.
    pub fn handle_inbound(&mut self, frame: &[u8]) -> ControllerEvent {
        let envelope = match Envelope::decode(frame) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(id = %self.id, %err, "malformed frame dropped");
                return ControllerEvent::DroppedMalformed;
            }
        };
        match envelope.kind {
            Some(Kind::GameStarted(_)) => {
                self.phase = Phase::InGame;
                ControllerEvent::GameStarted
            }
            Some(Kind::GameStopped(_)) => {
                if self.phase == Phase::InGame {
                    self.phase = Phase::Lobby;
                }
                ControllerEvent::GameStopped
            }
            Some(Kind::RoundStarted(_)) => ControllerEvent::RoundStarted,
            Some(Kind::RoundResult(result)) => match result.outcome {
                Some(outcome) => ControllerEvent::RoundResult(outcome),
                None => ControllerEvent::DroppedUnexpectedKind,
            },
            Some(Kind::Join(_) | Kind::Trigger(_) | Kind::Heartbeat(_)) | None => {
                warn!(id = %self.id, "unexpected message kind dropped");
                ControllerEvent::DroppedUnexpectedKind
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn connected_controller() -> Controller {
        let mut controller =
            Controller::connect("phone-1", "Ana", ControllerConfig::default(), 0).unwrap();
        controller.link_opened();
        controller
    }

    fn in_game_controller() -> Controller {
        let mut controller = connected_controller();
        let frame = Envelope::game_started().encode_to_vec();
        assert_eq!(
            controller.handle_inbound(&frame),
            ControllerEvent::GameStarted
        );
        controller
    }

    #[test]
    fn test_empty_display_name_rejected() {
        assert_eq!(
            Controller::connect("phone-1", "  ", ControllerConfig::default(), 0).unwrap_err(),
            ControllerError::EmptyDisplayName
        );
    }

    #[test]
    fn test_connect_timeout_reported() {
        let mut controller =
            Controller::connect("phone-1", "Ana", ControllerConfig::default(), 0).unwrap();

        assert!(controller.check_timeout(CONNECT_TIMEOUT_MS).is_ok());
        assert_eq!(
            controller.check_timeout(CONNECT_TIMEOUT_MS + 1).unwrap_err(),
            ControllerError::ConnectTimeout(CONNECT_TIMEOUT_MS)
        );
        assert_eq!(controller.phase(), Phase::Disconnected);
    }

    #[test]
    fn test_link_open_sends_join() {
        let mut controller =
            Controller::connect("phone-1", "  Ana  ", ControllerConfig::default(), 0).unwrap();

        let envelope = controller.link_opened().expect("join should be emitted");
        let Some(Kind::Join(join)) = envelope.kind else {
            panic!("expected join kind");
        };
        assert_eq!(join.participant_id, "phone-1");
        assert_eq!(join.display_name, "Ana");
        assert_eq!(controller.phase(), Phase::Lobby);

        // Once open, the timeout no longer applies.
        assert!(controller.check_timeout(1_000_000).is_ok());
    }

    #[test]
    fn test_swipe_requires_live_game() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut controller = connected_controller();
        assert!(controller.swipe(&mut rng, -200.0, 40).is_none());
    }

    #[test]
    fn test_short_swipe_ignored() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut controller = in_game_controller();
        assert!(controller.swipe(&mut rng, -40.0, 40).is_none());
        // Downward gestures never trigger.
        assert!(controller.swipe(&mut rng, 200.0, 40).is_none());
    }

    #[test]
    fn test_swipe_magnitude_from_speed() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut controller = in_game_controller();

        // 200px over 40ms: speed 5.0, jitter within +/- 0.5.
        let envelope = controller.swipe(&mut rng, -200.0, 40).unwrap();
        let Some(Kind::Trigger(trigger)) = envelope.kind else {
            panic!("expected trigger kind");
        };
        assert!((4.5..=5.5).contains(&trigger.magnitude));
    }

    #[test]
    fn test_violent_swipe_clamps_to_max() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut controller = in_game_controller();

        let envelope = controller.swipe(&mut rng, -2000.0, 10).unwrap();
        let Some(Kind::Trigger(trigger)) = envelope.kind else {
            panic!("expected trigger kind");
        };
        assert_eq!(trigger.magnitude, 10.0);
    }

    #[test]
    fn test_zero_elapsed_swipe_does_not_divide_by_zero() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut controller = in_game_controller();
        let envelope = controller.swipe(&mut rng, -60.0, 0).unwrap();
        let Some(Kind::Trigger(trigger)) = envelope.kind else {
            panic!("expected trigger kind");
        };
        assert!(trigger.magnitude.is_finite());
    }

    #[test]
    fn test_round_result_surfaced() {
        let mut controller = in_game_controller();
        let frame = Envelope {
            kind: Some(Kind::RoundResult(partyhub_wire::RoundResult {
                outcome: Some(OutcomeProto::SegmentLabel("push-ups".to_string())),
            })),
        }
        .encode_to_vec();
        assert_eq!(
            controller.handle_inbound(&frame),
            ControllerEvent::RoundResult(OutcomeProto::SegmentLabel("push-ups".to_string()))
        );
    }

    #[test]
    fn test_game_stop_returns_to_lobby() {
        let mut controller = in_game_controller();
        let frame = Envelope::game_stopped().encode_to_vec();
        assert_eq!(
            controller.handle_inbound(&frame),
            ControllerEvent::GameStopped
        );
        assert_eq!(controller.phase(), Phase::Lobby);
    }

    #[test]
    fn test_unexpected_kind_dropped() {
        let mut controller = connected_controller();
        let frame = Envelope::trigger(4.0).encode_to_vec();
        assert_eq!(
            controller.handle_inbound(&frame),
            ControllerEvent::DroppedUnexpectedKind
        );
    }

    #[test]
    fn test_malformed_frame_dropped() {
        let mut controller = connected_controller();
        assert_eq!(
            controller.handle_inbound(&[0xff, 0xff]),
            ControllerEvent::DroppedMalformed
        );
    }

    #[test]
    fn test_heartbeat_only_while_joined() {
        let mut controller =
            Controller::connect("phone-1", "Ana", ControllerConfig::default(), 0).unwrap();
        assert!(controller.heartbeat().is_none());

        controller.link_opened();
        assert!(controller.heartbeat().is_some());

        controller.link_closed();
        assert!(controller.heartbeat().is_none());
    }
}
