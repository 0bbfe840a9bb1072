//! Graph construction, validation, and compilation.

use alloc::boxed::Box;
use alloc::collections::BinaryHeap;
use alloc::vec;
use alloc::vec::Vec;
use core::cmp::Reverse;

use super::edge::{Connection, ConnectionId};
use super::node::{NodeData, NodeId, NodeKind, ProcessNode};
use super::program::{ProgramNode, RenderProgram, RenderStep};
use crate::buffer::AudioBuffer;

/// Errors produced while editing or compiling a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphError {
    /// The referenced node does not exist (or was removed).
    NodeNotFound(NodeId),
    /// The referenced connection does not exist (or was removed).
    ConnectionNotFound(ConnectionId),
    /// A connection endpoint names a channel the node does not have.
    ChannelOutOfRange { node: NodeId, channel: usize },
    /// The connection would close a cycle.
    WouldCycle,
    /// An identical connection already exists.
    DuplicateConnection,
    /// Connections may not terminate at the input boundary or originate
    /// at the output boundary.
    InvalidEndpoint,
    /// The graph already has a boundary node of this direction.
    BoundaryExists,
    /// Compilation requires both an input and an output boundary node.
    MissingBoundary,
    /// The node's processor is still owned by a live program; reclaim it
    /// before compiling again.
    NodeInFlight(NodeId),
}

impl core::fmt::Display for GraphError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NodeNotFound(id) => write!(f, "{id} not found"),
            Self::ConnectionNotFound(id) => write!(f, "{id} not found"),
            Self::ChannelOutOfRange { node, channel } => {
                write!(f, "channel {channel} out of range for {node}")
            }
            Self::WouldCycle => f.write_str("connection would create a cycle"),
            Self::DuplicateConnection => f.write_str("connection already exists"),
            Self::InvalidEndpoint => f.write_str("invalid boundary endpoint"),
            Self::BoundaryExists => f.write_str("boundary node already present"),
            Self::MissingBoundary => f.write_str("graph needs an input and an output node"),
            Self::NodeInFlight(id) => write!(f, "{id} is owned by a live program"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for GraphError {}

/// An editable audio processing graph.
///
/// Lives on the edit thread. Mutations (`add_node`, `connect`, ...) only
/// touch topology; nothing is heard until [`compile`](Self::compile)
/// produces a fresh [`RenderProgram`] and it is swapped onto the audio
/// thread.
///
/// Nodes and connections sit in slot vectors: ids are indices, removal
/// leaves a hole, and slots are never reused, so stale handles fail
/// instead of aliasing newer entries.
pub struct AudioGraph {
    nodes: Vec<Option<NodeData>>,
    connections: Vec<Option<Connection>>,
    sample_rate: f32,
    dirty: bool,
}

impl AudioGraph {
    /// Creates an empty graph at the given sample rate.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            nodes: Vec::new(),
            connections: Vec::new(),
            sample_rate,
            dirty: false,
        }
    }

    /// Current sample rate.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Updates the sample rate and informs every resident processor.
    ///
    /// Processors out in a live program pick the new rate up when the
    /// graph is recompiled and they are handed back through `reclaim`.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for entry in self.nodes.iter_mut().flatten() {
            if let Some(processor) = entry.processor.as_mut() {
                processor.set_sample_rate(sample_rate);
            }
        }
        self.dirty = true;
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.iter().flatten().count()
    }

    /// Whether the topology changed since the last successful compile.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Adds the input boundary node with `channels` output channels.
    pub fn add_input(&mut self, channels: usize) -> Result<NodeId, GraphError> {
        if self.find_boundary(NodeKind::Input).is_some() {
            return Err(GraphError::BoundaryExists);
        }
        Ok(self.push_node(NodeKind::Input, 0, channels, None))
    }

    /// Adds the output boundary node with `channels` input channels.
    pub fn add_output(&mut self, channels: usize) -> Result<NodeId, GraphError> {
        if self.find_boundary(NodeKind::Output).is_some() {
            return Err(GraphError::BoundaryExists);
        }
        Ok(self.push_node(NodeKind::Output, channels, 0, None))
    }

    /// Adds a processing node with the given channel counts.
    ///
    /// The processor immediately learns the graph's sample rate. A node
    /// with zero inputs is a source; its slot arrives cleared each block.
    pub fn add_node(
        &mut self,
        mut processor: Box<dyn ProcessNode>,
        inputs: usize,
        outputs: usize,
    ) -> NodeId {
        processor.set_sample_rate(self.sample_rate);
        self.push_node(NodeKind::Process, inputs, outputs, Some(processor))
    }

    /// Removes a node and every connection touching it.
    ///
    /// Returns the processor if it was resident; `None` for boundary
    /// nodes or processors currently out in a live program.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Option<Box<dyn ProcessNode>>, GraphError> {
        let slot = self
            .nodes
            .get_mut(id.0 as usize)
            .and_then(Option::take)
            .ok_or(GraphError::NodeNotFound(id))?;
        for conn in &mut self.connections {
            if conn.is_some_and(|c| c.from == id || c.to == id) {
                *conn = None;
            }
        }
        self.dirty = true;
        Ok(slot.processor)
    }

    /// Connects one output channel of `from` to one input channel of `to`.
    ///
    /// Multiple connections into the same destination channel sum;
    /// multiple connections out of the same source channel copy. Rejects
    /// duplicates and anything that would close a cycle.
    pub fn connect(
        &mut self,
        from: NodeId,
        from_channel: usize,
        to: NodeId,
        to_channel: usize,
    ) -> Result<ConnectionId, GraphError> {
        let src = self.node(from)?;
        let dst = self.node(to)?;
        if src.kind == NodeKind::Output || dst.kind == NodeKind::Input {
            return Err(GraphError::InvalidEndpoint);
        }
        if from_channel >= src.outputs {
            return Err(GraphError::ChannelOutOfRange { node: from, channel: from_channel });
        }
        if to_channel >= dst.inputs {
            return Err(GraphError::ChannelOutOfRange { node: to, channel: to_channel });
        }
        let candidate = Connection { from, from_channel, to, to_channel };
        if self.connections.iter().flatten().any(|c| *c == candidate) {
            return Err(GraphError::DuplicateConnection);
        }
        if from == to || self.can_reach(to, from) {
            return Err(GraphError::WouldCycle);
        }
        let id = ConnectionId(self.connections.len() as u32);
        self.connections.push(Some(candidate));
        self.dirty = true;
        Ok(id)
    }

    /// Removes a connection.
    pub fn disconnect(&mut self, id: ConnectionId) -> Result<(), GraphError> {
        self.connections
            .get_mut(id.0 as usize)
            .and_then(Option::take)
            .ok_or(GraphError::ConnectionNotFound(id))?;
        self.dirty = true;
        Ok(())
    }

    /// Hands a retired program's processors back to their nodes.
    ///
    /// Processors whose node was removed while the program was live are
    /// dropped here, off the audio thread.
    pub fn reclaim(&mut self, program: RenderProgram) {
        for entry in program.into_nodes() {
            if let Some(Some(node)) = self.nodes.get_mut(entry.id.0 as usize) {
                if node.processor.is_none() {
                    node.processor = Some(entry.processor);
                }
            }
        }
    }

    /// Compiles the current topology into a [`RenderProgram`] sized for
    /// blocks of up to `max_frames` frames.
    ///
    /// Node processors move into the program; the graph keeps topology
    /// only until the program comes back through [`reclaim`](Self::reclaim).
    /// Step order follows a topological sort with ties broken by node
    /// insertion order, so identical topologies always compile to the
    /// identical program.
    pub fn compile(&mut self, max_frames: usize) -> Result<RenderProgram, GraphError> {
        assert!(max_frames > 0);
        let input = self.find_boundary(NodeKind::Input).ok_or(GraphError::MissingBoundary)?;
        let output = self.find_boundary(NodeKind::Output).ok_or(GraphError::MissingBoundary)?;
        for entry in self.nodes.iter().flatten() {
            if entry.kind == NodeKind::Process && entry.processor.is_none() {
                return Err(GraphError::NodeInFlight(entry.id));
            }
        }

        let order = self.topo_order();
        let raw = self.emit_raw_steps(&order);
        let (assignment, slot_count) = assign_slots(&raw, self.nodes.len());

        let slot_channels = self
            .nodes
            .iter()
            .flatten()
            .map(|n| n.inputs.max(n.outputs))
            .max()
            .unwrap_or(1)
            .max(1);

        let mut nodes = Vec::new();
        let mut steps = Vec::with_capacity(raw.len());
        for step in raw {
            steps.push(match step {
                RenderStep::WriteInput { slot } => RenderStep::WriteInput { slot: assignment[slot] },
                RenderStep::Clear { slot } => RenderStep::Clear { slot: assignment[slot] },
                RenderStep::Mix { src_slot, src_channel, dst_slot, dst_channel } => RenderStep::Mix {
                    src_slot: assignment[src_slot],
                    src_channel,
                    dst_slot: assignment[dst_slot],
                    dst_channel,
                },
                RenderStep::Process { node, slot } => {
                    let entry = self.nodes[node].as_mut().filter(|n| n.kind == NodeKind::Process);
                    let entry = entry.ok_or(GraphError::NodeNotFound(NodeId(node as u32)))?;
                    let processor = entry.processor.take().ok_or(GraphError::NodeInFlight(entry.id))?;
                    nodes.push(ProgramNode { id: entry.id, processor });
                    RenderStep::Process { node: nodes.len() - 1, slot: assignment[slot] }
                }
                RenderStep::ReadOutput { slot } => RenderStep::ReadOutput { slot: assignment[slot] },
            });
        }

        let slots = (0..slot_count)
            .map(|_| AudioBuffer::new(slot_channels, max_frames))
            .collect();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            nodes = nodes.len(),
            steps = steps.len(),
            slots = slot_count,
            "compiled render program"
        );

        self.dirty = false;
        Ok(RenderProgram {
            steps,
            slots,
            nodes,
            max_frames,
            input_channels: self.nodes[input.0 as usize].as_ref().map_or(0, |n| n.outputs),
            output_channels: self.nodes[output.0 as usize].as_ref().map_or(0, |n| n.inputs),
        })
    }

    fn push_node(
        &mut self,
        kind: NodeKind,
        inputs: usize,
        outputs: usize,
        processor: Option<Box<dyn ProcessNode>>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(NodeData { id, kind, inputs, outputs, processor }));
        self.dirty = true;
        id
    }

    fn node(&self, id: NodeId) -> Result<&NodeData, GraphError> {
        self.nodes
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(GraphError::NodeNotFound(id))
    }

    fn find_boundary(&self, kind: NodeKind) -> Option<NodeId> {
        self.nodes
            .iter()
            .flatten()
            .find(|n| n.kind == kind)
            .map(|n| n.id)
    }

    /// Depth-first reachability over directed connections.
    fn can_reach(&self, from: NodeId, to: NodeId) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if core::mem::replace(&mut visited[current.0 as usize], true) {
                continue;
            }
            for conn in self.connections.iter().flatten() {
                if conn.from == current {
                    stack.push(conn.to);
                }
            }
        }
        false
    }

    /// Kahn's algorithm with a min-heap ready set: among nodes whose
    /// producers have all been placed, the lowest insertion id goes first.
    fn topo_order(&self) -> Vec<NodeId> {
        let mut indegree = vec![0usize; self.nodes.len()];
        for conn in self.connections.iter().flatten() {
            indegree[conn.to.0 as usize] += 1;
        }

        let mut ready = BinaryHeap::new();
        let mut live = 0;
        for entry in self.nodes.iter().flatten() {
            live += 1;
            if indegree[entry.id.0 as usize] == 0 {
                ready.push(Reverse(entry.id.0));
            }
        }

        let mut order = Vec::with_capacity(live);
        while let Some(Reverse(index)) = ready.pop() {
            let id = NodeId(index);
            order.push(id);
            for conn in self.connections.iter().flatten() {
                if conn.from == id {
                    let target = conn.to.0 as usize;
                    indegree[target] -= 1;
                    if indegree[target] == 0 {
                        ready.push(Reverse(conn.to.0));
                    }
                }
            }
        }
        // connect() rejects cycles, so every live node gets placed.
        debug_assert_eq!(order.len(), live);
        order
    }

    /// Emits the step list with virtual buffers (`slot` = node index).
    fn emit_raw_steps(&self, order: &[NodeId]) -> Vec<RenderStep> {
        let mut raw = Vec::new();
        for &id in order {
            let vbuf = id.0 as usize;
            let Some(entry) = self.nodes[vbuf].as_ref() else { continue };
            match entry.kind {
                NodeKind::Input => raw.push(RenderStep::WriteInput { slot: vbuf }),
                NodeKind::Process | NodeKind::Output => {
                    raw.push(RenderStep::Clear { slot: vbuf });
                    for conn in self.connections.iter().flatten() {
                        if conn.to == id {
                            raw.push(RenderStep::Mix {
                                src_slot: conn.from.0 as usize,
                                src_channel: conn.from_channel,
                                dst_slot: vbuf,
                                dst_channel: conn.to_channel,
                            });
                        }
                    }
                    if entry.kind == NodeKind::Process {
                        raw.push(RenderStep::Process { node: vbuf, slot: vbuf });
                    } else {
                        raw.push(RenderStep::ReadOutput { slot: vbuf });
                    }
                }
            }
        }
        raw
    }
}

/// Maps virtual buffers to physical slots by liveness.
///
/// A virtual buffer is live from its first touching step to its last;
/// once its final reader has run, its physical slot goes back on the free
/// list for the next buffer that starts. Returns the per-vbuf assignment
/// and the number of physical slots used.
fn assign_slots(raw: &[RenderStep], vbuf_count: usize) -> (Vec<usize>, usize) {
    const UNUSED: usize = usize::MAX;
    let mut first = vec![UNUSED; vbuf_count];
    let mut last = vec![0usize; vbuf_count];
    let mut touch = |vbuf: usize, step: usize| {
        if first[vbuf] == UNUSED {
            first[vbuf] = step;
        }
        last[vbuf] = step;
    };
    for (index, step) in raw.iter().enumerate() {
        match *step {
            RenderStep::WriteInput { slot }
            | RenderStep::Clear { slot }
            | RenderStep::Process { slot, .. }
            | RenderStep::ReadOutput { slot } => touch(slot, index),
            RenderStep::Mix { src_slot, dst_slot, .. } => {
                touch(src_slot, index);
                touch(dst_slot, index);
            }
        }
    }

    let mut by_start: Vec<usize> = (0..vbuf_count).filter(|&v| first[v] != UNUSED).collect();
    by_start.sort_unstable_by_key(|&v| first[v]);

    let mut assignment = vec![UNUSED; vbuf_count];
    let mut expiring: BinaryHeap<Reverse<(usize, usize)>> = BinaryHeap::new();
    let mut free: Vec<usize> = Vec::new();
    let mut slot_count = 0;
    for vbuf in by_start {
        while let Some(&Reverse((end, slot))) = expiring.peek() {
            if end < first[vbuf] {
                expiring.pop();
                free.push(slot);
            } else {
                break;
            }
        }
        let slot = free.pop().unwrap_or_else(|| {
            slot_count += 1;
            slot_count - 1
        });
        assignment[vbuf] = slot;
        expiring.push(Reverse((last[vbuf], slot)));
    }
    (assignment, slot_count)
}
