//! The control-side engine: graph edits and program swaps.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use resona_core::{AudioGraph, GraphError, RenderProgram};

use crate::callback::RenderCallback;
use crate::dispatcher::Dispatcher;
use crate::{Error, Result};

/// Owns the editable graph and feeds compiled programs to the callback.
///
/// The graph itself lives on a dedicated dispatcher thread; edits are
/// closures executed there. [`commit`](Self::commit) compiles and hands
/// the audio thread a whole new [`RenderProgram`] through a bounded
/// channel, and takes the previous one back the same way, so node state is
/// reclaimed instead of dropped on the audio thread.
pub struct AudioEngine {
    dispatcher: Dispatcher<AudioGraph>,
    to_audio: Sender<RenderProgram>,
    retired: Receiver<RenderProgram>,
    dropouts: Arc<AtomicUsize>,
    release: Arc<AtomicBool>,
    max_frames: usize,
}

impl AudioEngine {
    /// Creates an engine and its paired audio-thread callback.
    ///
    /// `max_frames` is the largest block a device callback may deliver in
    /// one slice; `input_channels`/`output_channels` size the callback's
    /// staging buffers.
    pub fn new(
        sample_rate: f32,
        max_frames: usize,
        input_channels: usize,
        output_channels: usize,
    ) -> Result<(Self, RenderCallback)> {
        let dispatcher = Dispatcher::spawn("resona-engine", AudioGraph::new(sample_rate))?;
        let (to_audio, incoming) = bounded(1);
        let (retired_tx, retired) = bounded(1);
        let dropouts = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(AtomicBool::new(false));
        let callback = RenderCallback::new(
            incoming,
            retired_tx,
            Arc::clone(&dropouts),
            Arc::clone(&release),
            max_frames,
            input_channels,
            output_channels,
        );
        Ok((
            Self {
                dispatcher,
                to_audio,
                retired,
                dropouts,
                release,
                max_frames,
            },
            callback,
        ))
    }

    /// Runs a closure against the graph on its owning thread.
    ///
    /// Returns whatever the closure returns; graph errors inside the
    /// closure are the closure's to propagate.
    pub fn edit<R: Send + 'static>(
        &self,
        edit: impl FnOnce(&mut AudioGraph) -> R + Send + 'static,
    ) -> Result<R> {
        self.dispatcher.call(edit)
    }

    /// Compiles the current topology and swaps it onto the audio thread.
    ///
    /// Reclaims any retired program first, so processors keep their state
    /// across recompiles. While a live program still holds the processors
    /// this fails with [`Error::SwapPending`] and asks the audio thread to
    /// give the program up; it parks the program at its next block (and
    /// renders silence until the successor arrives), after which the
    /// retried commit goes through.
    pub fn commit(&self) -> Result<()> {
        self.drain_retired()?;
        let max_frames = self.max_frames;
        let program = match self.dispatcher.call(move |graph| graph.compile(max_frames))? {
            Ok(program) => program,
            Err(GraphError::NodeInFlight(_)) => {
                self.release.store(true, Ordering::Release);
                return Err(Error::SwapPending);
            }
            Err(err) => return Err(err.into()),
        };
        match self.to_audio.try_send(program) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(program) | TrySendError::Disconnected(program)) => {
                // Hand the processors straight back; losing them would
                // leave the graph permanently in-flight.
                self.dispatcher.call(move |graph| graph.reclaim(program))?;
                Err(Error::SwapPending)
            }
        }
    }

    /// Hands any program the audio thread has retired back to the graph.
    pub fn drain_retired(&self) -> Result<()> {
        while let Ok(old) = self.retired.try_recv() {
            self.dispatcher.call(move |graph| graph.reclaim(old))?;
        }
        Ok(())
    }

    /// Number of blocks the audio thread failed to render.
    pub fn dropout_count(&self) -> usize {
        self.dropouts.load(Ordering::Relaxed)
    }

    /// The frame capacity programs are compiled for.
    pub fn max_frames(&self) -> usize {
        self.max_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resona_core::{AudioBuffer, NodeError, ProcessNode};
    use resona_core::convert::{SampleFormat, SampleLayout};

    struct Constant(f32);

    impl ProcessNode for Constant {
        fn process(
            &mut self,
            buffer: &mut AudioBuffer,
            frames: usize,
        ) -> std::result::Result<(), NodeError> {
            let value = self.0;
            for sample in &mut buffer.channel_mut(0).samples_mut()[..frames] {
                *sample = value;
            }
            Ok(())
        }
    }

    struct Failing;

    impl ProcessNode for Failing {
        fn process(
            &mut self,
            _buffer: &mut AudioBuffer,
            _frames: usize,
        ) -> std::result::Result<(), NodeError> {
            Err(NodeError::new("device fault"))
        }
    }

    fn tone_engine(level: f32) -> (AudioEngine, RenderCallback) {
        let (engine, callback) = AudioEngine::new(48_000.0, 8, 1, 1).unwrap();
        engine
            .edit(move |graph| {
                graph.add_input(1)?;
                let output = graph.add_output(1)?;
                let source = graph.add_node(Box::new(Constant(level)), 0, 1);
                graph.connect(source, 0, output, 0).map(|_| ())
            })
            .unwrap()
            .unwrap();
        (engine, callback)
    }

    #[test]
    fn silence_until_first_commit() {
        let (_engine, mut callback) = tone_engine(0.5);
        let mut out = [1.0f32; 16];
        callback.process_interleaved(None, &mut out, 1);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn commit_delivers_a_program() {
        let (engine, mut callback) = tone_engine(0.5);
        engine.commit().unwrap();
        let mut out = [0.0f32; 16];
        callback.process_interleaved(None, &mut out, 1);
        assert!(out.iter().all(|&s| s == 0.5));
    }

    #[test]
    fn large_blocks_are_sliced_to_max_frames() {
        // Engine compiled for 8-frame slices, device asks for 64.
        let (engine, mut callback) = tone_engine(0.25);
        engine.commit().unwrap();
        let mut out = [0.0f32; 64];
        callback.process_interleaved(None, &mut out, 1);
        assert!(out.iter().all(|&s| s == 0.25));
    }

    #[test]
    fn recompile_swaps_and_reclaims() {
        let (engine, mut callback) = tone_engine(0.5);
        engine.commit().unwrap();

        let mut out = [0.0f32; 8];
        callback.process_interleaved(None, &mut out, 1);
        assert!(out.iter().all(|&s| s == 0.5));

        // The live program still owns the processors, so the first
        // attempt asks the audio thread to release them.
        engine
            .edit(|graph| graph.set_sample_rate(44_100.0))
            .unwrap();
        assert!(matches!(engine.commit(), Err(Error::SwapPending)));

        // The next block parks the program and renders silence.
        out.fill(1.0);
        callback.process_interleaved(None, &mut out, 1);
        assert!(out.iter().all(|&s| s == 0.0));

        // Retried commit reclaims the parked program and goes through.
        engine.commit().unwrap();
        callback.process_interleaved(None, &mut out, 1);
        assert!(out.iter().all(|&s| s == 0.5));
    }

    #[test]
    fn render_failure_counts_dropouts_and_silences() {
        let (engine, mut callback) = AudioEngine::new(48_000.0, 8, 1, 1).unwrap();
        engine
            .edit(|graph| {
                graph.add_input(1)?;
                let output = graph.add_output(1)?;
                let broken = graph.add_node(Box::new(Failing), 0, 1);
                graph.connect(broken, 0, output, 0).map(|_| ())
            })
            .unwrap()
            .unwrap();
        engine.commit().unwrap();

        let mut out = [1.0f32; 16];
        callback.process_interleaved(None, &mut out, 1);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(engine.dropout_count(), 2);
        assert_eq!(callback.dropout_count(), 2);
    }

    #[test]
    fn raw_output_in_device_format() {
        let (engine, mut callback) = tone_engine(0.5);
        engine.commit().unwrap();

        let mut bytes = [0u8; 8 * 2];
        callback.process_raw(None, &mut bytes, SampleFormat::Int16, SampleLayout::Interleaved, 1);
        let expected = ((0.5f32 * 32767.0) as i16).to_le_bytes();
        for frame in bytes.chunks(2) {
            assert_eq!(frame, expected);
        }
    }
}
