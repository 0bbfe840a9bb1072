//! Device, file, and threading layer for the Resona audio engine.
//!
//! This crate provides:
//!
//! - **Threading**: [`Dispatcher`] for single-owner state actors and
//!   [`AsyncUpdater`] for coalesced audio-to-control notifications
//! - **Engine**: [`AudioEngine`] ties an editable graph to a live render
//!   callback with allocation-free program swaps
//! - **Real-time output**: [`OutputStream`] for driving the engine from a
//!   system audio device
//! - **File I/O**: [`WavFileReader`] and [`write_wav`] for WAV files, with
//!   [`StreamingReader`] for ring-buffered playback from a loader thread
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use resona_io::{AudioEngine, OutputStream, StreamFormat};
//!
//! let format = StreamFormat::default();
//! let (engine, callback) = AudioEngine::new(format.sample_rate as f32, 512, 2, 2)?;
//!
//! engine.edit(|graph| {
//!     let out = graph.add_output(2)?;
//!     let player = graph.add_node(Box::new(my_player), 0, 2);
//!     graph.connect(player, 0, out, 0)?;
//!     graph.connect(player, 1, out, 1)
//! })?;
//! engine.commit()?;
//!
//! let _stream = OutputStream::start(callback, format)?;
//! ```

mod callback;
mod device;
mod dispatcher;
mod engine;
mod file;

pub use callback::RenderCallback;
pub use device::{AudioDevice, OutputStream, StreamFormat, default_output_device, list_output_devices};
pub use dispatcher::{AsyncUpdater, Dispatcher, DispatcherHandle};
pub use engine::AudioEngine;
pub use file::{AudioFileReader, FileSpec, StreamingReader, WavFileReader, write_wav};

/// Error types for engine and I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Graph edit or compile error.
    #[error("graph error: {0}")]
    Graph(#[from] resona_core::GraphError),

    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// Audio stream setup or runtime error.
    #[error("audio stream error: {0}")]
    Stream(String),

    /// No audio device available on the system.
    #[error("no audio device available")]
    NoDevice,

    /// The requested sample format is not supported.
    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// A compiled program is still waiting to be picked up by the audio
    /// thread; try committing again after the next callback.
    #[error("previous program swap still pending")]
    SwapPending,

    /// The dispatcher thread is gone.
    #[error("dispatcher is shut down")]
    DispatcherGone,

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for engine and I/O operations.
pub type Result<T> = std::result::Result<T, Error>;
