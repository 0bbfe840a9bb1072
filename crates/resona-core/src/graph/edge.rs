//! Per-channel connections between nodes.

use super::node::NodeId;

/// Stable handle to a connection in an [`AudioGraph`](super::AudioGraph).
///
/// Like [`NodeId`], ids are assigned at insertion and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub(crate) u32);

impl ConnectionId {
    /// Raw index value.
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// One directed edge: a single output channel of `from` feeding a single
/// input channel of `to`. Fan-in on a destination channel sums; fan-out
/// from a source channel copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Connection {
    pub from: NodeId,
    pub from_channel: usize,
    pub to: NodeId,
    pub to_channel: usize,
}
