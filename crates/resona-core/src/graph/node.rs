//! Node identity and the processing trait.

use alloc::boxed::Box;

use crate::buffer::AudioBuffer;

/// Stable handle to a node in an [`AudioGraph`](super::AudioGraph).
///
/// Ids are assigned at insertion and never reused within a graph, so a
/// stale handle after `remove_node` fails cleanly instead of aliasing a
/// newer node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Raw index value, mainly useful for logging.
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Error returned by a node's `process` call.
///
/// Carries a static reason string so reporting stays allocation-free on
/// the audio thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeError {
    reason: &'static str,
}

impl NodeError {
    /// A process failure with a static description.
    pub const fn new(reason: &'static str) -> Self {
        Self { reason }
    }

    /// The failure description.
    pub fn reason(&self) -> &'static str {
        self.reason
    }
}

impl core::fmt::Display for NodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.reason)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for NodeError {}

/// A unit of audio processing placed in the graph.
///
/// During a render the node receives one scratch [`AudioBuffer`]: its
/// input channels (`0..inputs`) arrive pre-summed from every inbound
/// connection, and it must leave its output in channels `0..outputs` of
/// the same buffer. `frames` is the valid frame count for this call and
/// may be smaller than the buffer's capacity.
///
/// Implementations run on the audio thread and must not allocate, block,
/// or lock.
pub trait ProcessNode: Send {
    /// Process one block in place.
    fn process(&mut self, buffer: &mut AudioBuffer, frames: usize) -> Result<(), NodeError>;

    /// Drop accumulated state (delay lines, filter memory).
    fn reset(&mut self) {}

    /// Called when the graph's sample rate is set or changes.
    fn set_sample_rate(&mut self, _sample_rate: f32) {}
}

/// What a node is, topology-wise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeKind {
    /// Boundary node fed from the device input before the program runs.
    Input,
    /// Boundary node read into the device output after the program runs.
    Output,
    /// Ordinary processing node.
    Process,
}

/// Per-node record in the graph's slot vector.
pub(crate) struct NodeData {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Input channel count (0 for sources and the input boundary).
    pub inputs: usize,
    /// Output channel count.
    pub outputs: usize,
    /// The processor, present while the node is resident in the graph.
    /// Taken by `compile` and handed back by `reclaim`; `None` while a
    /// live program owns it.
    pub processor: Option<Box<dyn ProcessNode>>,
}
