//! Partyhub Wire Protocol Types
//!
//! This crate defines the shared Protobuf message types exchanged
//! between the session host and its controllers over a peer link. Both
//! host and controller binaries MUST depend on this crate so the two
//! ends can never drift apart.
//!
//! # Message Categories
//!
//! - **Controller -> host**: `Join`, `Trigger`, `Heartbeat`
//! - **Host -> controller**: `GameStarted`, `GameStopped`,
//!   `RoundStarted`, `RoundResult`
//!
//! Every frame on the wire is one [`Envelope`]; the `kind` oneof is the
//! discriminator. A decoded envelope whose `kind` is `None` carried a
//! tag this build does not recognize; the routing layer drops it
//! without disturbing session state.
//!
//! Result targeting (one recipient vs. broadcast) is a host-side
//! delivery decision expressed by which links a frame is written to; it
//! does not appear in the message itself.

#![deny(unsafe_code)]

use prost::{Message, Oneof};

/// Transport identity of a controller.
pub type ParticipantId = String;

// ============================================================================
// Controller -> Host Messages
// ============================================================================

/// Join handshake: the first message a controller sends once its link
/// opens.
#[derive(Clone, PartialEq, Message)]
pub struct Join {
    /// Transport identity of the joining controller.
    ///
    /// Note: the host binds the sender from the link the frame arrived
    /// on; this field is informational and never trusted over the link
    /// identity.
    #[prost(string, tag = "1")]
    pub participant_id: String,

    /// Player-entered display name. Must be non-empty (after trimming)
    /// for the join to be accepted.
    #[prost(string, tag = "2")]
    pub display_name: String,
}

/// A randomizing gesture requesting a new round.
#[derive(Clone, PartialEq, Message)]
pub struct Trigger {
    /// Gesture strength. The host clamps this into its configured
    /// magnitude range before use.
    #[prost(double, tag = "1")]
    pub magnitude: f64,
}

/// Periodic liveness piggyback.
#[derive(Clone, PartialEq, Message)]
pub struct Heartbeat {}

// ============================================================================
// Host -> Controller Messages
// ============================================================================

/// The host opened the game: gestures are now live.
#[derive(Clone, PartialEq, Message)]
pub struct GameStarted {}

/// The host closed the game.
#[derive(Clone, PartialEq, Message)]
pub struct GameStopped {}

/// A round was armed; an animation is about to run on the host display.
#[derive(Clone, PartialEq, Message)]
pub struct RoundStarted {}

/// The settled outcome of a round.
#[derive(Clone, PartialEq, Message)]
pub struct RoundResult {
    #[prost(oneof = "OutcomeProto", tags = "1, 2")]
    pub outcome: Option<OutcomeProto>,
}

/// Wire form of a settled outcome.
#[derive(Clone, PartialEq, Oneof)]
pub enum OutcomeProto {
    /// Winning wheel segment label.
    #[prost(string, tag = "1")]
    SegmentLabel(String),
    /// Upward-facing die pip value.
    #[prost(uint32, tag = "2")]
    FaceValue(u32),
}

// ============================================================================
// Envelope
// ============================================================================

/// One frame on the wire.
#[derive(Clone, PartialEq, Message)]
pub struct Envelope {
    #[prost(oneof = "Kind", tags = "1, 2, 3, 4, 5, 6, 7")]
    pub kind: Option<Kind>,
}

/// Envelope discriminator.
#[derive(Clone, PartialEq, Oneof)]
pub enum Kind {
    #[prost(message, tag = "1")]
    Join(Join),
    #[prost(message, tag = "2")]
    Trigger(Trigger),
    #[prost(message, tag = "3")]
    Heartbeat(Heartbeat),
    #[prost(message, tag = "4")]
    GameStarted(GameStarted),
    #[prost(message, tag = "5")]
    GameStopped(GameStopped),
    #[prost(message, tag = "6")]
    RoundStarted(RoundStarted),
    #[prost(message, tag = "7")]
    RoundResult(RoundResult),
}

impl Envelope {
    pub fn join(participant_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            kind: Some(Kind::Join(Join {
                participant_id: participant_id.into(),
                display_name: display_name.into(),
            })),
        }
    }

    pub fn trigger(magnitude: f64) -> Self {
        Self {
            kind: Some(Kind::Trigger(Trigger { magnitude })),
        }
    }

    pub fn heartbeat() -> Self {
        Self {
            kind: Some(Kind::Heartbeat(Heartbeat {})),
        }
    }

    pub fn game_started() -> Self {
        Self {
            kind: Some(Kind::GameStarted(GameStarted {})),
        }
    }

    pub fn game_stopped() -> Self {
        Self {
            kind: Some(Kind::GameStopped(GameStopped {})),
        }
    }

    pub fn round_started() -> Self {
        Self {
            kind: Some(Kind::RoundStarted(RoundStarted {})),
        }
    }

    pub fn round_result(outcome: &partyhub_resolve::Outcome) -> Self {
        Self {
            kind: Some(Kind::RoundResult(RoundResult {
                outcome: Some(outcome.into()),
            })),
        }
    }
}

// ============================================================================
// Conversion Traits
// ============================================================================

impl From<&partyhub_resolve::Outcome> for OutcomeProto {
    fn from(outcome: &partyhub_resolve::Outcome) -> Self {
        match outcome {
            partyhub_resolve::Outcome::Segment { label, .. } => {
                OutcomeProto::SegmentLabel(label.clone())
            }
            partyhub_resolve::Outcome::Face(value) => OutcomeProto::FaceValue(u32::from(*value)),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_roundtrip() {
        let msg = Envelope::join("peer-abc", "Mint");
        let encoded = msg.encode_to_vec();
        let decoded = Envelope::decode(encoded.as_slice()).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_trigger_roundtrip() {
        let msg = Envelope::trigger(7.25);
        let decoded = Envelope::decode(msg.encode_to_vec().as_slice()).unwrap();
        let Some(Kind::Trigger(trigger)) = decoded.kind else {
            panic!("expected trigger kind");
        };
        assert_eq!(trigger.magnitude, 7.25);
    }

    #[test]
    fn test_round_result_carries_segment_label() {
        let outcome = partyhub_resolve::Outcome::Segment {
            index: 2,
            label: "push-ups".to_string(),
        };
        let msg = Envelope::round_result(&outcome);
        let decoded = Envelope::decode(msg.encode_to_vec().as_slice()).unwrap();
        let Some(Kind::RoundResult(result)) = decoded.kind else {
            panic!("expected round result kind");
        };
        assert_eq!(
            result.outcome,
            Some(OutcomeProto::SegmentLabel("push-ups".to_string()))
        );
    }

    #[test]
    fn test_round_result_carries_face_value() {
        let msg = Envelope::round_result(&partyhub_resolve::Outcome::Face(6));
        let decoded = Envelope::decode(msg.encode_to_vec().as_slice()).unwrap();
        let Some(Kind::RoundResult(result)) = decoded.kind else {
            panic!("expected round result kind");
        };
        assert_eq!(result.outcome, Some(OutcomeProto::FaceValue(6)));
    }

    /// A frame from a newer protocol revision decodes to `kind: None`
    /// rather than failing, so the router can drop it cleanly.
    #[test]
    fn test_unknown_kind_decodes_to_none() {
        #[derive(Clone, PartialEq, Message)]
        struct FutureEnvelope {
            #[prost(string, tag = "99")]
            payload: String,
        }

        let future = FutureEnvelope {
            payload: "from the future".to_string(),
        };
        let decoded = Envelope::decode(future.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.kind, None);
    }
}
