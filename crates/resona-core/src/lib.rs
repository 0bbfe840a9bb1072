//! Resona Core - real-time audio graph engine
//!
//! This crate provides the processing half of the Resona engine: an
//! editable audio-node graph compiled into a flat rendering program, plus
//! the buffer, vector-math, format-conversion, and ring-buffer primitives
//! the program runs on. Everything on the render path is allocation-free
//! and lock-free.
//!
//! # Core Abstractions
//!
//! ## Graph
//!
//! - [`AudioGraph`] - Editable topology of nodes and per-channel connections
//! - [`ProcessNode`] - Trait implemented by every processing node
//! - [`RenderProgram`] - Compiled, linearized snapshot run by the audio thread
//! - [`RenderStep`] - One instruction of a compiled program
//!
//! ## Buffers
//!
//! - [`AudioBuffer`] - Planar multi-channel f32 storage with a clear flag
//! - [`BufferView`] - Borrowed read view of a frame range
//! - [`ChannelMask`] / [`AudioBus`] - Channel-layout bookkeeping for busses
//!
//! ## Sample I/O
//!
//! - [`convert`] - Bit-exact conversion between f32 and packed integer
//!   formats, interleaved or planar
//! - [`SpscRing`] - Wait-free single-producer single-consumer ring buffer
//!
//! ## Vector Math
//!
//! - [`ops`] - SIMD slice kernels (add, multiply, sum of squares) that are
//!   bit-exact with their scalar equivalents
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible (with `alloc`). Disable the default
//! `std` feature:
//!
//! ```toml
//! [dependencies]
//! resona-core = { version = "0.1", default-features = false }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use resona_core::{AudioBuffer, AudioGraph};
//!
//! let mut graph = AudioGraph::new(48_000.0);
//! let input = graph.add_input(2)?;
//! let output = graph.add_output(2)?;
//! let reverb = graph.add_node(Box::new(my_reverb), 2, 2);
//! graph.connect(input, 0, reverb, 0)?;
//! graph.connect(input, 1, reverb, 1)?;
//! graph.connect(reverb, 0, output, 0)?;
//! graph.connect(reverb, 1, output, 1)?;
//!
//! // Off the audio thread:
//! let mut program = graph.compile(512)?;
//!
//! // On the audio thread, once per callback:
//! program.render(&device_in, &mut device_out, frames)?;
//! ```
//!
//! # Design Principles
//!
//! - **Real-time safe**: compile allocates, render never does
//! - **Deterministic**: identical topologies compile to identical programs
//! - **Silence over garbage**: a failed render zeroes the block

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod buffer;
pub mod channels;
pub mod convert;
pub mod graph;
pub mod ops;
pub mod ring;

// Re-export main types at crate root
pub use buffer::{AudioBuffer, BufferView, Channel, ChannelMut};
pub use channels::{AudioBus, BusDirection, ChannelMask};
pub use convert::{SampleFormat, SampleLayout};
pub use graph::{
    AudioGraph, ConnectionId, GraphError, NodeError, NodeId, ProcessNode, RenderError,
    RenderProgram, RenderStep,
};
pub use ring::{RingItem, SpscRing};
