//! Peer link abstraction.
//!
//! The transport (signaling, NAT traversal, channel setup) lives
//! entirely outside this crate. Once it has an open, ordered, reliable
//! channel to a controller, it hands the session a handle implementing
//! [`Link`]. The transport's data/close/error callbacks become explicit
//! calls into the session (`handle_inbound`, `link_closed`), so all
//! protocol state is mutated from a single event loop.

use thiserror::Error;

/// Failure to write to a peer link.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("link send failed: {reason}")]
pub struct LinkError {
    pub reason: String,
}

impl LinkError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// An open, ordered, reliable point-to-point channel to one controller.
///
/// `frame` is an encoded [`partyhub_wire::Envelope`]; the session
/// encodes once and writes the same bytes to every recipient of a
/// broadcast. A failed send is treated as that participant's departure.
pub trait Link {
    fn send(&mut self, frame: &[u8]) -> Result<(), LinkError>;
}
