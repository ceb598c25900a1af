//! Partyhub Host Session
//!
//! The host-side session engine for a party-game hub: one device hosts
//! and displays a mini-game (spinning challenge wheel or physics die),
//! phones join over direct peer links and trigger rounds with swipe
//! gestures. This crate owns:
//!
//! - The participant registry (join/leave/liveness)
//! - The round state machine and its at-most-one-active-round guard
//! - Inbound message routing and the drop-don't-crash policy
//! - Outbound delivery targeting (owner-only, broadcast, or local-only)
//!
//! # Architecture
//!
//! Everything here runs on a single event loop. The transport and the
//! wheel/die simulation are external collaborators: the transport feeds
//! `link_opened` / `handle_inbound` / `link_closed`, the simulation
//! feeds `simulation_started` / `settle`, and a periodic timer feeds
//! `sweep`. No call suspends, so the round machine's current state is
//! the only guard needed against re-entrant triggers.
//!
//! Malformed or ill-timed traffic is dropped with a logged
//! [`RouteResult`] and never unwinds the session. The one fatal
//! condition, the transport failing to establish the host identity at
//! all, happens before a session exists and is the embedder's to
//! surface.

#![deny(unsafe_code)]

pub mod link;
pub mod registry;
pub mod round;

use std::collections::VecDeque;

use partyhub_resolve::{Outcome, SpinPlan};
use partyhub_wire::{Envelope, Kind, ParticipantId};
use prost::Message;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use link::{Link, LinkError};
pub use registry::{JoinOutcome, Participant, Registry};
pub use round::{
    FinalGeometry, GameSetup, RoundMachine, RoundOwner, RoundState, SettleError, TriggerRejected,
};

// ============================================================================
// Defaults
// ============================================================================

/// A pending join handshake that has not completed within this window
/// is cancelled.
pub const JOIN_TIMEOUT_MS: u64 = 5_000;

/// A participant silent for longer than this is treated as gone, even
/// if the transport never reported closure.
pub const HEARTBEAT_TIMEOUT_MS: u64 = 10_000;

/// Default trigger magnitude for host-initiated rounds.
pub const HOST_MAGNITUDE: f64 = 4.0;

/// Host session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub join_timeout_ms: u64,
    pub heartbeat_timeout_ms: u64,
    pub host_magnitude: f64,
    pub tuning: partyhub_resolve::SpinTuning,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            join_timeout_ms: JOIN_TIMEOUT_MS,
            heartbeat_timeout_ms: HEARTBEAT_TIMEOUT_MS,
            host_magnitude: HOST_MAGNITUDE,
            tuning: partyhub_resolve::SpinTuning::default(),
        }
    }
}

// ============================================================================
// Routing & Delivery Results
// ============================================================================

/// Fate of one inbound frame.
///
/// Dropped variants leave session state untouched: the sender learns of
/// a dropped trigger only by never receiving a round result.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteResult {
    /// Join accepted; the sender is now a participant.
    Joined { display_name: String },
    /// Join ignored: the id is already registered and the original
    /// entry is untouched.
    DuplicateJoinIgnored,
    /// Dropped: display name empty after trimming.
    DroppedEmptyName,
    /// Trigger accepted; a round is armed for the sender.
    Armed(SpinPlan),
    /// Dropped: a round is already armed or resolving.
    DroppedRoundBusy,
    /// Dropped: trigger magnitude was NaN or infinite.
    DroppedNonFiniteMagnitude,
    /// Dropped: the sender has not completed a join handshake.
    DroppedNotJoined,
    /// Dropped: the game has not been started.
    DroppedGameNotStarted,
    /// Heartbeat recorded.
    HeartbeatAccepted,
    /// Dropped: the frame did not decode.
    DroppedMalformed,
    /// Dropped: the envelope carried no recognized kind.
    DroppedUnknownKind,
    /// Dropped: a host-to-controller kind arrived inbound.
    DroppedHostOnlyKind,
}

impl RouteResult {
    pub fn is_accepted(&self) -> bool {
        matches!(
            self,
            Self::Joined { .. } | Self::Armed(_) | Self::HeartbeatAccepted
        )
    }
}

/// How a settled outcome was delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Host-owned round with no controllers connected; display only,
    /// nothing on the wire.
    LocalOnly,
    /// Host-owned round fanned out to every connected controller.
    Broadcast { recipients: usize },
    /// Sent to the single owning controller.
    Owner(ParticipantId),
    /// The owning controller was gone at delivery time; the outcome is
    /// still reported locally.
    OwnerGone(ParticipantId),
}

/// A follow-up round armed from the spin-for-everyone queue.
#[derive(Debug, Clone, PartialEq)]
pub struct NextRound {
    pub owner: RoundOwner,
    pub plan: SpinPlan,
}

/// A completed round, as returned by [`HostSession::settle`].
#[derive(Debug, Clone, PartialEq)]
pub struct SettledRound {
    pub owner: RoundOwner,
    pub outcome: Outcome,
    pub delivery: Delivery,
    /// The next queued round, already armed and announced.
    pub next: Option<NextRound>,
}

/// What a link closure changed.
#[derive(Debug, Clone, PartialEq)]
pub struct Departure {
    pub was_participant: bool,
    /// An in-flight round owned by the departed peer was discarded.
    pub round_abandoned: bool,
    pub next: Option<NextRound>,
}

/// What a liveness sweep changed.
#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
    /// Pending handshakes cancelled for exceeding the join timeout.
    pub join_timeouts: Vec<ParticipantId>,
    /// Participants evicted for exceeding the heartbeat timeout.
    pub evicted: Vec<ParticipantId>,
    pub round_abandoned: bool,
    pub next: Option<NextRound>,
}

/// Host-initiated operations that cannot proceed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    #[error("game has not been started")]
    GameNotStarted,
    #[error("a round is already in progress")]
    RoundBusy,
    #[error(transparent)]
    Settle(#[from] SettleError),
}

// ============================================================================
// Host Session
// ============================================================================

/// A link that opened but has not completed the join handshake.
struct PendingJoin<L> {
    id: ParticipantId,
    link: L,
    opened_at_ms: u64,
}

/// Host-side session state.
///
/// One instance per hosting session, created once the transport has
/// established the host identity and torn down with it.
pub struct HostSession<L: Link> {
    host_id: String,
    config: SessionConfig,
    game: GameSetup,
    registry: Registry<L>,
    pending: Vec<PendingJoin<L>>,
    round: RoundMachine,
    game_started: bool,
    /// Remaining owners for a spin-for-everyone run.
    queue: VecDeque<ParticipantId>,
    queue_magnitude: f64,
}

impl<L: Link> HostSession<L> {
    pub fn new(host_id: impl Into<String>, game: GameSetup, config: SessionConfig) -> Self {
        let queue_magnitude = config.host_magnitude;
        Self {
            host_id: host_id.into(),
            config,
            game,
            registry: Registry::new(),
            pending: Vec::new(),
            round: RoundMachine::new(),
            game_started: false,
            queue: VecDeque::new(),
            queue_magnitude,
        }
    }

    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    pub fn is_started(&self) -> bool {
        self.game_started
    }

    pub fn game(&self) -> &GameSetup {
        &self.game
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn round_state(&self) -> &RoundState {
        self.round.state()
    }

    pub fn participant_count(&self) -> usize {
        self.registry.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// `(id, display_name)` pairs in join order, for the players-online
    /// listing.
    pub fn participants(&self) -> impl Iterator<Item = (&str, &str)> {
        self.registry
            .all()
            .iter()
            .map(|p| (p.id.as_str(), p.display_name.as_str()))
    }

    // ------------------------------------------------------------------------
    // Transport events
    // ------------------------------------------------------------------------

    /// The transport opened a link from `id`. The peer becomes a
    /// participant only once a valid `Join` arrives; until then the
    /// handshake is pending and subject to the join timeout.
    pub fn link_opened(&mut self, id: impl Into<String>, link: L, now_ms: u64) {
        let id = id.into();
        if self.registry.contains(&id) || self.pending.iter().any(|p| p.id == id) {
            warn!(%id, "link ignored: id already known");
            return;
        }
        debug!(%id, "link opened; awaiting join");
        self.pending.push(PendingJoin {
            id,
            link,
            opened_at_ms: now_ms,
        });
    }

    /// The transport reported closure or error for `id`: unilateral
    /// departure. An in-flight round owned by the peer is discarded
    /// rather than delivered to a vanished recipient.
    pub fn link_closed(&mut self, id: &str) -> Departure {
        self.pending.retain(|p| p.id != id);
        let was_participant = self.registry.remove(id).is_some();
        if was_participant {
            info!(%id, "participant departed");
        }
        self.queue.retain(|queued| queued != id);
        let round_abandoned = self.round.abandon_if_owned_by(id);
        let next = if round_abandoned {
            self.advance_queue()
        } else {
            None
        };
        Departure {
            was_participant,
            round_abandoned,
            next,
        }
    }

    /// Route one inbound frame from `from`.
    pub fn handle_inbound(&mut self, from: &str, frame: &[u8], now_ms: u64) -> RouteResult {
        let envelope = match Envelope::decode(frame) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(%from, %err, "malformed frame dropped");
                return RouteResult::DroppedMalformed;
            }
        };

        // Any inbound traffic proves liveness.
        self.registry.touch(from, now_ms);

        match envelope.kind {
            Some(Kind::Join(join)) => self.route_join(from, &join, now_ms),
            Some(Kind::Trigger(trigger)) => self.route_trigger(from, trigger.magnitude),
            Some(Kind::Heartbeat(_)) => {
                if self.registry.contains(from) {
                    RouteResult::HeartbeatAccepted
                } else {
                    debug!(%from, "heartbeat dropped: sender never joined");
                    RouteResult::DroppedNotJoined
                }
            }
            Some(
                Kind::GameStarted(_)
                | Kind::GameStopped(_)
                | Kind::RoundStarted(_)
                | Kind::RoundResult(_),
            ) => {
                warn!(%from, "host-only message kind received; dropped");
                RouteResult::DroppedHostOnlyKind
            }
            None => {
                warn!(%from, "unrecognized message kind dropped");
                RouteResult::DroppedUnknownKind
            }
        }
    }

    /// Cancel overdue pending handshakes and evict silent participants.
    /// Driven by a periodic timer.
    pub fn sweep(&mut self, now_ms: u64) -> Sweep {
        let join_timeout = self.config.join_timeout_ms;
        let mut join_timeouts = Vec::new();
        self.pending.retain(|pending| {
            if now_ms.saturating_sub(pending.opened_at_ms) > join_timeout {
                warn!(id = %pending.id, "join handshake timed out");
                join_timeouts.push(pending.id.clone());
                false
            } else {
                true
            }
        });

        let evicted: Vec<ParticipantId> = self
            .registry
            .evict_stale(now_ms, self.config.heartbeat_timeout_ms)
            .into_iter()
            .map(|p| p.id)
            .collect();

        let mut round_abandoned = false;
        for id in &evicted {
            self.queue.retain(|queued| queued != id);
            round_abandoned |= self.round.abandon_if_owned_by(id);
        }
        let next = if round_abandoned {
            self.advance_queue()
        } else {
            None
        };

        Sweep {
            join_timeouts,
            evicted,
            round_abandoned,
            next,
        }
    }

    // ------------------------------------------------------------------------
    // Host actions
    // ------------------------------------------------------------------------

    /// Open the game: gestures become live and every controller is
    /// notified. Returns the number of controllers reached.
    pub fn start_game(&mut self) -> usize {
        self.game_started = true;
        info!("game started");
        self.broadcast(&Envelope::game_started())
    }

    pub fn stop_game(&mut self) -> usize {
        self.game_started = false;
        info!("game stopped");
        self.broadcast(&Envelope::game_stopped())
    }

    /// Arm a host-owned round (desktop spin button / single-player
    /// mode).
    pub fn host_trigger(&mut self, magnitude: f64) -> Result<SpinPlan, SessionError> {
        if !self.game_started {
            return Err(SessionError::GameNotStarted);
        }
        let plan = self
            .round
            .arm(RoundOwner::Host, magnitude, &self.config.tuning)
            .map_err(|TriggerRejected| SessionError::RoundBusy)?;
        self.broadcast(&Envelope::round_started());
        Ok(plan)
    }

    /// Run one round per joined participant, sequentially, each
    /// delivered only to its owner. Returns the first armed round, or
    /// `None` when nobody is connected; subsequent rounds arm
    /// automatically as each settle completes.
    pub fn spin_for_everyone(&mut self, magnitude: f64) -> Result<Option<NextRound>, SessionError> {
        if !self.game_started {
            return Err(SessionError::GameNotStarted);
        }
        if !self.round.is_idle() {
            return Err(SessionError::RoundBusy);
        }
        self.queue = self.registry.ids().into();
        self.queue_magnitude = self.config.tuning.clamp_magnitude(magnitude);
        Ok(self.advance_queue())
    }

    // ------------------------------------------------------------------------
    // Simulation events
    // ------------------------------------------------------------------------

    /// The external animation/physics began running for the armed
    /// round; blocks further triggers until settle.
    pub fn simulation_started(&mut self) -> bool {
        self.round.begin_resolving()
    }

    /// The simulation reported terminal geometry: resolve the outcome,
    /// deliver it, and return the round to idle.
    pub fn settle(&mut self, geometry: FinalGeometry) -> Result<SettledRound, SessionError> {
        // A settle arriving before simulation_started() is accepted;
        // the armed state already blocks re-entrant triggers.
        if matches!(self.round.state(), RoundState::Armed { .. }) {
            self.round.begin_resolving();
        }
        let (owner, outcome) = self.round.settle(geometry, &self.game)?;

        let frame = Envelope::round_result(&outcome);
        let delivery = match &owner {
            RoundOwner::Host => {
                if self.registry.is_empty() {
                    Delivery::LocalOnly
                } else {
                    let recipients = self.broadcast(&frame);
                    Delivery::Broadcast { recipients }
                }
            }
            RoundOwner::Participant(id) => {
                let id = id.clone();
                match self.registry.get_mut(&id) {
                    Some(participant) => {
                        let bytes = frame.encode_to_vec();
                        match participant.link.send(&bytes) {
                            Ok(()) => Delivery::Owner(id),
                            Err(err) => {
                                warn!(%id, %err, "result delivery failed; dropping participant");
                                self.drop_participant(&id);
                                Delivery::OwnerGone(id)
                            }
                        }
                    }
                    None => Delivery::OwnerGone(id),
                }
            }
        };

        // Delivery is done; only now does the round return to idle.
        self.round.complete();
        let next = self.advance_queue();

        info!(?owner, outcome = %outcome.display_label(), "round settled");
        Ok(SettledRound {
            owner,
            outcome,
            delivery,
            next,
        })
    }

    // ------------------------------------------------------------------------
    // Internal
    // ------------------------------------------------------------------------

    fn route_join(&mut self, from: &str, join: &partyhub_wire::Join, now_ms: u64) -> RouteResult {
        let name = join.display_name.trim();
        if name.is_empty() {
            warn!(%from, "join dropped: empty display name");
            return RouteResult::DroppedEmptyName;
        }
        if self.registry.contains(from) {
            warn!(%from, "duplicate join ignored");
            return RouteResult::DuplicateJoinIgnored;
        }
        // The sender is bound from the link the frame arrived on; the
        // id inside the message is never trusted over it.
        let Some(position) = self.pending.iter().position(|p| p.id == from) else {
            warn!(%from, "join dropped: no announced link for sender");
            return RouteResult::DroppedNotJoined;
        };
        let pending = self.pending.remove(position);
        match self.registry.join(pending.id, name, pending.link, now_ms) {
            JoinOutcome::Joined => RouteResult::Joined {
                display_name: name.to_string(),
            },
            JoinOutcome::DuplicateIgnored => RouteResult::DuplicateJoinIgnored,
            JoinOutcome::RejectedEmptyName => RouteResult::DroppedEmptyName,
        }
    }

    fn route_trigger(&mut self, from: &str, magnitude: f64) -> RouteResult {
        if !self.registry.contains(from) {
            debug!(%from, "trigger dropped: sender never joined");
            return RouteResult::DroppedNotJoined;
        }
        if !self.game_started {
            debug!(%from, "trigger dropped: game not started");
            return RouteResult::DroppedGameNotStarted;
        }
        if !magnitude.is_finite() {
            warn!(%from, "trigger dropped: non-finite magnitude");
            return RouteResult::DroppedNonFiniteMagnitude;
        }
        match self.round.arm(
            RoundOwner::Participant(from.to_string()),
            magnitude,
            &self.config.tuning,
        ) {
            Ok(plan) => {
                self.broadcast(&Envelope::round_started());
                if self.round.is_idle() {
                    // The owner's link died while fanning out the
                    // start notice.
                    return RouteResult::DroppedNotJoined;
                }
                RouteResult::Armed(plan)
            }
            Err(TriggerRejected) => {
                debug!(%from, "trigger dropped: round busy");
                RouteResult::DroppedRoundBusy
            }
        }
    }

    /// Arm the next queued spin-for-everyone round, skipping owners who
    /// departed while waiting.
    fn advance_queue(&mut self) -> Option<NextRound> {
        loop {
            let id = self.queue.pop_front()?;
            if !self.registry.contains(&id) {
                continue;
            }
            let owner = RoundOwner::Participant(id.clone());
            match self
                .round
                .arm(owner.clone(), self.queue_magnitude, &self.config.tuning)
            {
                Ok(plan) => {
                    self.broadcast(&Envelope::round_started());
                    if self.round.is_idle() {
                        // Owner died during the fan-out; try the next.
                        continue;
                    }
                    return Some(NextRound { owner, plan });
                }
                Err(TriggerRejected) => {
                    // A round is still live; keep the id for later.
                    self.queue.push_front(id);
                    return None;
                }
            }
        }
    }

    /// Encode once and write byte-identical frames to every
    /// participant. Failed sends drop the recipient.
    fn broadcast(&mut self, envelope: &Envelope) -> usize {
        let frame = envelope.encode_to_vec();
        let mut sent = 0;
        let mut failed: Vec<ParticipantId> = Vec::new();
        for participant in self.registry.iter_mut() {
            match participant.link.send(&frame) {
                Ok(()) => sent += 1,
                Err(err) => {
                    warn!(id = %participant.id, %err, "send failed; dropping participant");
                    failed.push(participant.id.clone());
                }
            }
        }
        for id in failed {
            self.drop_participant(&id);
        }
        sent
    }

    fn drop_participant(&mut self, id: &str) {
        self.registry.remove(id);
        self.queue.retain(|queued| queued != id);
        self.round.abandon_if_owned_by(id);
    }
}

// ============================================================================
// Tests
// ============================================================================
