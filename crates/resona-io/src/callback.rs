//! Audio-thread entry points.
//!
//! [`RenderCallback`] is the object that lives inside the device callback.
//! Everything it does per block is allocation-free: it polls for a newly
//! compiled program, de-interleaves the device input into staging, runs
//! the program, and interleaves the result back out. Retired programs are
//! handed back whole so their teardown happens on the control side.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use resona_core::convert::{self, SampleFormat, SampleLayout};
use resona_core::{AudioBuffer, RenderProgram};

/// Runs compiled programs against device buffers.
///
/// Constructed by [`AudioEngine::new`](crate::AudioEngine::new) and moved
/// into the device callback. Until the first program arrives (and after a
/// render failure) it produces silence.
pub struct RenderCallback {
    incoming: Receiver<RenderProgram>,
    retired: Sender<RenderProgram>,
    program: Option<RenderProgram>,
    /// A retired program the control side has not yet drained.
    parked: Option<RenderProgram>,
    input: AudioBuffer,
    output: AudioBuffer,
    dropouts: Arc<AtomicUsize>,
    /// Set by the control side when it needs the live program's
    /// processors back to recompile.
    release: Arc<AtomicBool>,
    max_frames: usize,
}

impl RenderCallback {
    pub(crate) fn new(
        incoming: Receiver<RenderProgram>,
        retired: Sender<RenderProgram>,
        dropouts: Arc<AtomicUsize>,
        release: Arc<AtomicBool>,
        max_frames: usize,
        input_channels: usize,
        output_channels: usize,
    ) -> Self {
        Self {
            incoming,
            retired,
            program: None,
            parked: None,
            input: AudioBuffer::new(input_channels.max(1), max_frames),
            output: AudioBuffer::new(output_channels.max(1), max_frames),
            dropouts: Arc::clone(&dropouts),
            release,
            max_frames,
        }
    }

    /// Largest block the staging buffers can hold in one pass; larger
    /// device buffers are processed in slices of this size.
    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    /// Picks up a newly compiled program and retires the old one.
    ///
    /// Runs at the top of every block. A retired program that cannot be
    /// handed back yet is parked, and no further swap happens until the
    /// control side drains it; dropping it here would free memory on the
    /// audio thread.
    fn poll_swap(&mut self) {
        if let Some(old) = self.parked.take() {
            if let Err(TrySendError::Full(old) | TrySendError::Disconnected(old)) =
                self.retired.try_send(old)
            {
                self.parked = Some(old);
                return;
            }
        }
        if let Ok(next) = self.incoming.try_recv() {
            self.release.store(false, Ordering::Release);
            if let Some(old) = self.program.replace(next) {
                if let Err(TrySendError::Full(old) | TrySendError::Disconnected(old)) =
                    self.retired.try_send(old)
                {
                    self.parked = Some(old);
                }
            }
        } else if self.release.load(Ordering::Acquire) {
            // The control side wants the processors back to recompile;
            // give the program up and render silence until its successor
            // arrives.
            match self.program.take() {
                Some(current) => match self.retired.try_send(current) {
                    Ok(()) => self.release.store(false, Ordering::Release),
                    Err(TrySendError::Full(current) | TrySendError::Disconnected(current)) => {
                        self.program = Some(current);
                    }
                },
                None => self.release.store(false, Ordering::Release),
            }
        }
    }

    /// Renders one device callback's worth of interleaved f32 audio.
    ///
    /// `output.len()` must be a multiple of `channels`. `input`, when
    /// present, must cover the same frame count. Device channels beyond
    /// the staging layout are not addressable; `channels` must not exceed
    /// what the callback was built with.
    pub fn process_interleaved(
        &mut self,
        input: Option<&[f32]>,
        output: &mut [f32],
        channels: usize,
    ) {
        assert!(channels > 0 && channels <= self.output.channels());
        debug_assert_eq!(output.len() % channels, 0);
        self.poll_swap();

        if self.program.is_none() {
            output.fill(0.0);
            return;
        }

        let total_frames = output.len() / channels;
        let mut done = 0;
        while done < total_frames {
            let frames = (total_frames - done).min(self.max_frames);
            self.stage_input_interleaved(input, channels, done, frames);
            self.run_block(frames);

            let out_channels = self.output.channels();
            for f in 0..frames {
                for c in 0..channels {
                    let sample = if c < out_channels {
                        self.output.channel(c).samples()[f]
                    } else {
                        0.0
                    };
                    output[(done + f) * channels + c] = sample;
                }
            }
            done += frames;
        }
    }

    /// Renders into a packed byte buffer in the device's native format.
    ///
    /// Frame count is derived from `output.len()`, `format`, and
    /// `channels`; `input` (same format and layout) is optional.
    pub fn process_raw(
        &mut self,
        input: Option<&[u8]>,
        output: &mut [u8],
        format: SampleFormat,
        layout: SampleLayout,
        channels: usize,
    ) {
        assert!(channels > 0 && channels <= self.output.channels());
        let stride = channels * format.bytes_per_sample();
        debug_assert_eq!(output.len() % stride, 0);
        self.poll_swap();

        if self.program.is_none() {
            output.fill(0);
            return;
        }

        let total_frames = output.len() / stride;
        // A planar block cannot be sliced frame-wise; it must fit whole.
        assert!(layout == SampleLayout::Interleaved || total_frames <= self.max_frames);
        let mut done = 0;
        while done < total_frames {
            let frames = (total_frames - done).min(self.max_frames);
            let at = done * stride;

            match input {
                Some(bytes) => {
                    assert!(channels <= self.input.channels());
                    convert::read_from(&bytes[at..], &mut self.input, format, layout, 0, channels, frames);
                    for c in channels..self.input.channels() {
                        self.input.clear_range(c, 0, frames);
                    }
                }
                None => self.input.clear(),
            }
            self.run_block(frames);
            convert::write_to(
                &self.output,
                &mut output[at..at + frames * stride],
                format,
                layout,
                0,
                channels,
                frames,
            );
            done += frames;
        }
    }

    /// Blocks the underlying graph failed to render since startup.
    pub fn dropout_count(&self) -> usize {
        self.dropouts.load(Ordering::Relaxed)
    }

    fn stage_input_interleaved(
        &mut self,
        input: Option<&[f32]>,
        channels: usize,
        offset: usize,
        frames: usize,
    ) {
        match input {
            Some(samples) => {
                let in_channels = channels.min(self.input.channels());
                for c in 0..in_channels {
                    let mut dst = self.input.channel_mut(c);
                    let run = dst.samples_mut();
                    for f in 0..frames {
                        run[f] = samples[(offset + f) * channels + c];
                    }
                }
                for c in in_channels..self.input.channels() {
                    self.input.clear_range(c, 0, frames);
                }
            }
            None => self.input.clear(),
        }
    }

    fn run_block(&mut self, frames: usize) {
        // Stale frames past the program's output channels must not leak.
        self.output.clear();
        if let Some(program) = self.program.as_mut() {
            if program.render(&self.input, &mut self.output, frames).is_err() {
                self.dropouts.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
