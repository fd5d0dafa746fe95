//! Scene replication engine.
//!
//! [`SyncManager`] drives bidirectional replication of a [`scene::Scene`]
//! across a reliable message transport at a bounded tick rate. It observes
//! the scene's origin-tagged change events, tracks per-peer dirty state and
//! delta baselines, batches changes into typed wire messages on each flush,
//! and applies incoming messages under role-specific authority rules:
//!
//! - A **server** replicates local changes to every authenticated peer,
//!   accepts changes from authenticated peers, re-broadcasts them to all
//!   *other* peers, and resolves entity id collisions.
//! - A **client** tracks a single server, trusts everything it sends, and
//!   applies it with `Network` origin so nothing echoes back.
//!
//! The engine is single-threaded and purely in-memory; multiple engines can
//! coexist in one process, which is how the loopback tests and simulations
//! are built.

mod config;
mod engine;
mod peer;
mod transport;

pub use config::{SyncConfig, DEFAULT_UPDATE_PERIOD, MIN_UPDATE_PERIOD};
pub use engine::{SyncManager, SyncRole, SERVER_PEER};
pub use peer::{Peer, PeerDirectory, PeerId};
pub use transport::{RecordingTransport, Transport};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_api_exports() {
        let _ = SyncRole::Server;
        let _ = SyncConfig::default();
        let _ = PeerId(1);
        let _ = SERVER_PEER;
        let _ = RecordingTransport::new();
        let _ = DEFAULT_UPDATE_PERIOD;
        let _ = MIN_UPDATE_PERIOD;
    }
}
