//! The compiled rendering program.

use alloc::boxed::Box;
use alloc::vec::Vec;

use super::node::{NodeError, NodeId, ProcessNode};
use crate::buffer::AudioBuffer;

/// One instruction in a compiled program.
///
/// `slot` indices refer to the program's buffer pool; `node` indices refer
/// to its processor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStep {
    /// Copy the external input into a slot, zeroing channels the input
    /// does not cover.
    WriteInput { slot: usize },
    /// Zero a slot ahead of fan-in summing.
    Clear { slot: usize },
    /// Accumulate one source channel into one destination channel.
    Mix {
        src_slot: usize,
        src_channel: usize,
        dst_slot: usize,
        dst_channel: usize,
    },
    /// Run a node's processor in place on its slot.
    Process { node: usize, slot: usize },
    /// Copy a slot into the external output.
    ReadOutput { slot: usize },
}

/// A processor moved out of the graph for the lifetime of one program.
pub(crate) struct ProgramNode {
    pub id: NodeId,
    pub processor: Box<dyn ProcessNode>,
}

/// Error surfaced when a render call fails.
///
/// The output for the failed call is zero-filled before this is returned,
/// so a glitching node produces silence rather than stale samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderError {
    /// The node whose `process` call failed.
    pub node: NodeId,
    /// The node's own error.
    pub error: NodeError,
}

impl core::fmt::Display for RenderError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} failed: {}", self.node, self.error)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RenderError {}

/// An immutable, linearized snapshot of an [`AudioGraph`](super::AudioGraph).
///
/// Owns everything a render call touches: the step list, a pool of
/// pre-sized buffer slots, and the node processors themselves. Once built
/// it is handed to the audio thread whole; [`render`](Self::render) does
/// no allocation, locking, or topology work.
pub struct RenderProgram {
    pub(crate) steps: Vec<RenderStep>,
    pub(crate) slots: Vec<AudioBuffer>,
    pub(crate) nodes: Vec<ProgramNode>,
    pub(crate) max_frames: usize,
    pub(crate) input_channels: usize,
    pub(crate) output_channels: usize,
}

impl RenderProgram {
    /// Largest frame count a render call may pass.
    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    /// Channel count of the graph's input boundary node.
    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    /// Channel count of the graph's output boundary node.
    pub fn output_channels(&self) -> usize {
        self.output_channels
    }

    /// Number of physical buffer slots the program allocated.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// The compiled step list, in execution order.
    pub fn steps(&self) -> &[RenderStep] {
        &self.steps
    }

    /// Resets every processor in the program.
    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            node.processor.reset();
        }
    }

    /// Executes the program for `frames` frames.
    ///
    /// `frames` must not exceed [`max_frames`](Self::max_frames), and
    /// `input`/`output` must each hold at least `frames` frames. Channels
    /// beyond what `input` provides render as silence; channels of
    /// `output` beyond the graph's output node are left untouched.
    ///
    /// On a node failure the first `frames` frames of every `output`
    /// channel are zeroed and the failure is returned.
    pub fn render(
        &mut self,
        input: &AudioBuffer,
        output: &mut AudioBuffer,
        frames: usize,
    ) -> Result<(), RenderError> {
        assert!(frames <= self.max_frames, "render call exceeds compiled frame capacity");
        assert!(input.frames() >= frames && output.frames() >= frames);

        if let Err(failure) = self.run_steps(input, output, frames) {
            for channel in 0..output.channels() {
                output.clear_range(channel, 0, frames);
            }
            return Err(failure);
        }
        Ok(())
    }

    fn run_steps(
        &mut self,
        input: &AudioBuffer,
        output: &mut AudioBuffer,
        frames: usize,
    ) -> Result<(), RenderError> {
        for step in &self.steps {
            match *step {
                RenderStep::WriteInput { slot } => {
                    let dst = &mut self.slots[slot];
                    let shared = self.input_channels.min(input.channels());
                    for channel in 0..shared {
                        dst.copy_from(channel, 0, input, channel, 0, frames);
                    }
                    for channel in shared..dst.channels() {
                        dst.clear_range(channel, 0, frames);
                    }
                }
                RenderStep::Clear { slot } => {
                    let dst = &mut self.slots[slot];
                    for channel in 0..dst.channels() {
                        dst.clear_range(channel, 0, frames);
                    }
                }
                RenderStep::Mix {
                    src_slot,
                    src_channel,
                    dst_slot,
                    dst_channel,
                } => {
                    // Liveness assignment keeps a producer and its consumer
                    // in distinct slots.
                    debug_assert_ne!(src_slot, dst_slot);
                    let (dst, src) = slot_pair_mut(&mut self.slots, dst_slot, src_slot);
                    dst.add_from(dst_channel, src, src_channel, frames);
                }
                RenderStep::Process { node, slot } => {
                    let entry = &mut self.nodes[node];
                    entry
                        .processor
                        .process(&mut self.slots[slot], frames)
                        .map_err(|error| RenderError { node: entry.id, error })?;
                }
                RenderStep::ReadOutput { slot } => {
                    let src = &self.slots[slot];
                    let shared = self.output_channels.min(output.channels());
                    for channel in 0..shared {
                        output.copy_from(channel, 0, src, channel, 0, frames);
                    }
                }
            }
        }
        Ok(())
    }

    /// Tears the program down into its processor table for reclamation.
    pub(crate) fn into_nodes(self) -> Vec<ProgramNode> {
        self.nodes
    }
}

/// Disjoint mutable/shared borrows of two distinct slots.
fn slot_pair_mut(slots: &mut [AudioBuffer], dst: usize, src: usize) -> (&mut AudioBuffer, &AudioBuffer) {
    if dst < src {
        let (lo, hi) = slots.split_at_mut(src);
        (&mut lo[dst], &hi[0])
    } else {
        let (lo, hi) = slots.split_at_mut(dst);
        (&mut hi[0], &lo[src])
    }
}
