//! Outbound message seam.
//!
//! The actual transport (socket, channel, relay) is a host concern; the
//! manager only needs somewhere to push whole frames. `MemoryHub` is the
//! in-process implementation used by tests and the loopback demo.

use std::collections::BTreeMap;
use std::collections::VecDeque;

/// Identifies a connected peer. The authority is peer 0 by convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u32);

/// The single authoritative peer every remote talks to.
pub const AUTHORITY: PeerId = PeerId(0);

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "peer{}", self.0)
    }
}

/// Where outbound frames go. Implementations must not block the tick.
pub trait MessageSink {
    fn send(&mut self, peer: PeerId, frame: Vec<u8>);

    fn peers(&self) -> Vec<PeerId>;

    fn broadcast(&mut self, frame: Vec<u8>) {
        for peer in self.peers() {
            self.send(peer, frame.clone());
        }
    }

    fn broadcast_except(&mut self, skip: PeerId, frame: Vec<u8>) {
        for peer in self.peers() {
            if peer != skip {
                self.send(peer, frame.clone());
            }
        }
    }
}

/// In-memory per-peer frame queues.
#[derive(Debug, Default)]
pub struct MemoryHub {
    queues: BTreeMap<PeerId, VecDeque<Vec<u8>>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer so broadcasts reach it.
    pub fn add_peer(&mut self, peer: PeerId) {
        self.queues.entry(peer).or_default();
    }

    /// Take every frame queued for `peer`, in send order.
    pub fn drain(&mut self, peer: PeerId) -> Vec<Vec<u8>> {
        self.queues
            .get_mut(&peer)
            .map(|q| q.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn pending(&self, peer: PeerId) -> usize {
        self.queues.get(&peer).map(|q| q.len()).unwrap_or(0)
    }
}

impl MessageSink for MemoryHub {
    fn send(&mut self, peer: PeerId, frame: Vec<u8>) {
        self.queues.entry(peer).or_default().push_back(frame);
    }

    fn peers(&self) -> Vec<PeerId> {
        self.queues.keys().copied().collect()
    }
}

/// A sink that drops everything; for hosts running without any peers.
#[derive(Debug, Default)]
pub struct NullSink;

impl MessageSink for NullSink {
    fn send(&mut self, _peer: PeerId, _frame: Vec<u8>) {}

    fn peers(&self) -> Vec<PeerId> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_and_drain_preserves_order() {
        let mut hub = MemoryHub::new();
        hub.add_peer(PeerId(1));
        hub.send(PeerId(1), vec![1]);
        hub.send(PeerId(1), vec![2]);

        let frames = hub.drain(PeerId(1));
        assert_eq!(frames, vec![vec![1], vec![2]]);
        assert_eq!(hub.pending(PeerId(1)), 0);
    }

    #[test]
    fn broadcast_reaches_all_peers() {
        let mut hub = MemoryHub::new();
        hub.add_peer(PeerId(1));
        hub.add_peer(PeerId(2));
        hub.broadcast(vec![9]);

        assert_eq!(hub.pending(PeerId(1)), 1);
        assert_eq!(hub.pending(PeerId(2)), 1);
    }

    #[test]
    fn broadcast_except_skips_origin() {
        let mut hub = MemoryHub::new();
        hub.add_peer(PeerId(1));
        hub.add_peer(PeerId(2));
        hub.add_peer(PeerId(3));
        hub.broadcast_except(PeerId(2), vec![9]);

        assert_eq!(hub.pending(PeerId(1)), 1);
        assert_eq!(hub.pending(PeerId(2)), 0);
        assert_eq!(hub.pending(PeerId(3)), 1);
    }

    #[test]
    fn drain_unknown_peer_is_empty() {
        let mut hub = MemoryHub::new();
        assert!(hub.drain(PeerId(9)).is_empty());
    }
}
