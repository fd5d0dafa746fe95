//! Transport seam.

use crate::peer::PeerId;

/// Outgoing message sink provided by the host's transport.
///
/// `send` is a non-blocking enqueue; the transport guarantees reliable,
/// in-order delivery per peer. Delta updates depend on that ordering: a
/// delta references bytes the peer must already hold.
pub trait Transport {
    /// Enqueues an encoded message for one peer.
    fn send(&mut self, peer: PeerId, bytes: &[u8]);
}

/// A transport that records everything it is asked to send.
///
/// Useful in tests and offline tooling; messages can be inspected or
/// replayed into another engine.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Vec<(PeerId, Vec<u8>)>,
}

impl RecordingTransport {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded sends without clearing them.
    #[must_use]
    pub fn sent(&self) -> &[(PeerId, Vec<u8>)] {
        &self.sent
    }

    /// Takes and clears the recorded sends.
    pub fn take(&mut self) -> Vec<(PeerId, Vec<u8>)> {
        std::mem::take(&mut self.sent)
    }

    /// Returns `true` if nothing was sent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, peer: PeerId, bytes: &[u8]) {
        self.sent.push((peer, bytes.to_vec()));
    }
}
