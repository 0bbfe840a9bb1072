//! Audio graph and rendering builder.
//!
//! The graph module turns a set of processing nodes and per-channel
//! connections into a linear rendering program executed once per audio
//! callback:
//!
//! - [`AudioGraph`] — owned by the edit (dispatcher) thread. Holds topology
//!   (nodes, connections), performs mutations, runs
//!   [`compile()`](AudioGraph::compile). Never touched by the audio thread.
//! - [`RenderProgram`] — the compiled snapshot: a flat [`Vec<RenderStep>`]
//!   plus a buffer-slot pool and the node processors themselves. Handed to
//!   the audio thread whole; handed back for reclamation when replaced, so
//!   node state survives rebuilds.
//!
//! # Compilation
//!
//! Building is two-phase. First a topological ordering (Kahn's algorithm,
//! ties broken by node-insertion order) places every node after all of its
//! producers. Then buffer-slot assignment walks the ordered steps doing
//! liveness analysis: a slot is live from the step that writes it to the
//! last step that reads it, after which it is free for reuse. A long linear
//! chain runs in two slots (ping-pong); the slot count never exceeds the
//! maximum number of simultaneously live node outputs.
//!
//! # Execution
//!
//! [`RenderProgram::render`] runs with a per-call frame count up to the
//! compiled maximum, summing fan-in connections into each node's slot
//! before the node executes. It never allocates and never locks. A node
//! failure fails the whole call: the output is zero-filled (silence over
//! garbage) and the error is returned for asynchronous surfacing.
//!
//! Cycles are rejected at [`connect()`](AudioGraph::connect) time — there
//! is no implicit delay-line feedback.

mod builder;
mod edge;
mod node;
mod program;

pub use builder::{AudioGraph, GraphError};
pub use edge::ConnectionId;
pub use node::{NodeError, NodeId, ProcessNode};
pub use program::{RenderError, RenderProgram, RenderStep};
