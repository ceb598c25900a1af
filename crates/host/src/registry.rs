//! Connected-controller registry.
//!
//! Tracks each joined controller's identity, display name, link handle,
//! and liveness in insertion order (the order drives the "players
//! online" listing). Ids are unique within a session: a second join
//! with an id already present is ignored, never a replacement.

use partyhub_wire::ParticipantId;
use tracing::{info, warn};

use crate::link::Link;

/// A joined controller.
#[derive(Debug)]
pub struct Participant<L> {
    pub id: ParticipantId,
    pub display_name: String,
    pub link: L,
    /// Host-clock timestamp of the last inbound traffic from this
    /// controller.
    pub last_seen_ms: u64,
}

/// Outcome of a join attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    /// The id is already registered; the original entry is untouched
    /// and the offered link is dropped.
    DuplicateIgnored,
    /// Display name was empty after trimming.
    RejectedEmptyName,
}

/// Insertion-ordered participant registry.
pub struct Registry<L> {
    participants: Vec<Participant<L>>,
}

impl<L: Link> Registry<L> {
    pub fn new() -> Self {
        Self {
            participants: Vec::new(),
        }
    }

    /// Register a controller under `id`.
    pub fn join(
        &mut self,
        id: ParticipantId,
        display_name: &str,
        link: L,
        now_ms: u64,
    ) -> JoinOutcome {
        let name = display_name.trim();
        if name.is_empty() {
            warn!(%id, "join rejected: empty display name");
            return JoinOutcome::RejectedEmptyName;
        }
        if self.contains(&id) {
            warn!(%id, "duplicate join ignored");
            return JoinOutcome::DuplicateIgnored;
        }
        info!(%id, display_name = %name, "participant joined");
        self.participants.push(Participant {
            id,
            display_name: name.to_string(),
            link,
            last_seen_ms: now_ms,
        });
        JoinOutcome::Joined
    }

    /// Remove a participant. Idempotent: removing an absent id is a
    /// no-op returning `None`.
    pub fn remove(&mut self, id: &str) -> Option<Participant<L>> {
        let position = self.participants.iter().position(|p| p.id == id)?;
        Some(self.participants.remove(position))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.participants.iter().any(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Participant<L>> {
        self.participants.iter_mut().find(|p| p.id == id)
    }

    /// Refresh a participant's liveness timestamp.
    pub fn touch(&mut self, id: &str, now_ms: u64) -> bool {
        match self.get_mut(id) {
            Some(participant) => {
                participant.last_seen_ms = now_ms;
                true
            }
            None => false,
        }
    }

    /// All participants in insertion order.
    pub fn all(&self) -> &[Participant<L>] {
        &self.participants
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Participant<L>> {
        self.participants.iter_mut()
    }

    pub fn ids(&self) -> Vec<ParticipantId> {
        self.participants.iter().map(|p| p.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Remove every participant not heard from within `timeout_ms`,
    /// returning them in insertion order.
    pub fn evict_stale(&mut self, now_ms: u64, timeout_ms: u64) -> Vec<Participant<L>> {
        let mut evicted = Vec::new();
        let mut index = 0;
        while index < self.participants.len() {
            if now_ms.saturating_sub(self.participants[index].last_seen_ms) > timeout_ms {
                let participant = self.participants.remove(index);
                warn!(id = %participant.id, "participant evicted: heartbeat timeout");
                evicted.push(participant);
            } else {
                index += 1;
            }
        }
        evicted
    }
}

impl<L: Link> Default for Registry<L> {
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
    use crate::link::LinkError;

    struct NullLink;

    impl Link for NullLink {
        fn send(&mut self, _frame: &[u8]) -> Result<(), LinkError> {
            Ok(())
        }
    }

    #[test]
    fn test_join_and_listing_order() {
        let mut registry = Registry::new();
        registry.join("p1".to_string(), "Ana", NullLink, 0);
        registry.join("p2".to_string(), "Ben", NullLink, 0);
        registry.join("p3".to_string(), "Cho", NullLink, 0);

        let names: Vec<_> = registry
            .all()
            .iter()
            .map(|p| p.display_name.as_str())
            .collect();
        assert_eq!(names, ["Ana", "Ben", "Cho"]);
    }

    /// Joining the same id twice with a different display name leaves
    /// the original entry untouched.
    #[test]
    fn test_duplicate_join_ignored() {
        let mut registry = Registry::new();
        assert_eq!(
            registry.join("p1".to_string(), "Ana", NullLink, 0),
            JoinOutcome::Joined
        );
        assert_eq!(
            registry.join("p1".to_string(), "Impostor", NullLink, 5),
            JoinOutcome::DuplicateIgnored
        );

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.all()[0].display_name, "Ana");
        assert_eq!(registry.all()[0].last_seen_ms, 0);
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut registry = Registry::new();
        assert_eq!(
            registry.join("p1".to_string(), "   ", NullLink, 0),
            JoinOutcome::RejectedEmptyName
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_display_name_is_trimmed() {
        let mut registry = Registry::new();
        registry.join("p1".to_string(), "  Ana  ", NullLink, 0);
        assert_eq!(registry.all()[0].display_name, "Ana");
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut registry = Registry::new();
        registry.join("p1".to_string(), "Ana", NullLink, 0);

        assert!(registry.remove("p1").is_some());
        assert!(registry.remove("p1").is_none());
        assert!(registry.remove("never-joined").is_none());
    }

    #[test]
    fn test_eviction_keeps_fresh_participants() {
        let mut registry = Registry::new();
        registry.join("p1".to_string(), "Ana", NullLink, 0);
        registry.join("p2".to_string(), "Ben", NullLink, 0);
        registry.touch("p2", 9_000);

        let evicted = registry.evict_stale(10_500, 10_000);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id, "p1");
        assert!(registry.contains("p2"));
    }
}
