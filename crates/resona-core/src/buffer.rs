//! Multi-channel audio buffers and channel views.
//!
//! An [`AudioBuffer`] owns `channels × frames` f32 storage as one contiguous
//! pool sliced per channel. A fresh buffer is logically silent and flagged
//! clear; obtaining a write view drops the flag so later readers know the
//! content is real. [`Channel`] and [`ChannelMut`] are non-owning slices
//! (offset + frame count) into a buffer — the unit the vector ops act on.
//!
//! Buffers are created once and resized in place via
//! [`set_size`](AudioBuffer::set_size); the render path only ever borrows
//! views, so no allocation happens per block.

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

/// Read-only view of a contiguous run of samples in one channel.
#[derive(Clone, Copy)]
pub struct Channel<'a> {
    samples: &'a [f32],
}

impl<'a> Channel<'a> {
    /// Wraps a raw sample slice.
    #[inline]
    pub fn new(samples: &'a [f32]) -> Self {
        Self { samples }
    }

    /// Number of frames in the view.
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the view covers no frames.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the underlying samples.
    #[inline]
    pub fn samples(&self) -> &'a [f32] {
        self.samples
    }

    /// Returns a sub-range of this view.
    ///
    /// # Panics
    ///
    /// Panics if `offset + frames` exceeds the view length.
    pub fn slice(&self, offset: usize, frames: usize) -> Channel<'a> {
        Channel {
            samples: &self.samples[offset..offset + frames],
        }
    }
}

/// Mutable view of a contiguous run of samples in one channel.
pub struct ChannelMut<'a> {
    samples: &'a mut [f32],
}

impl<'a> ChannelMut<'a> {
    /// Wraps a raw mutable sample slice.
    #[inline]
    pub fn new(samples: &'a mut [f32]) -> Self {
        Self { samples }
    }

    /// Number of frames in the view.
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the view covers no frames.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the underlying samples mutably.
    #[inline]
    pub fn samples_mut(&mut self) -> &mut [f32] {
        self.samples
    }

    /// Reborrows as a read-only view.
    #[inline]
    pub fn as_read(&self) -> Channel<'_> {
        Channel {
            samples: self.samples,
        }
    }
}

/// Read-only view over a channel/frame sub-range of an [`AudioBuffer`].
pub struct BufferView<'a> {
    source: &'a AudioBuffer,
    start_channel: usize,
    channels: usize,
    frame_offset: usize,
    frames: usize,
}

impl BufferView<'_> {
    /// Number of channels in the view.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of frames in the view.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Returns a channel view relative to the sub-range.
    pub fn channel(&self, index: usize) -> Channel<'_> {
        assert!(index < self.channels, "channel {index} out of range");
        self.source
            .channel(self.start_channel + index)
            .slice(self.frame_offset, self.frames)
    }
}

/// Owning multi-channel float sample buffer.
///
/// Storage is a single contiguous pool of `channels × frames` samples,
/// sliced per channel. The `is_clear` flag tracks whether the content is
/// logically all-zero; any write access clears it.
pub struct AudioBuffer {
    data: Vec<f32>,
    channels: usize,
    frames: usize,
    is_clear: bool,
}

impl AudioBuffer {
    /// Allocates a zeroed buffer of `channels × frames` samples.
    ///
    /// Zero channels or frames is valid and yields an empty buffer.
    pub fn new(channels: usize, frames: usize) -> Self {
        Self {
            data: vec![0.0; channels * frames],
            channels,
            frames,
            is_clear: true,
        }
    }

    /// Number of channels.
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of frames per channel.
    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Total sample count (`channels × frames`).
    #[inline]
    pub fn len(&self) -> usize {
        self.channels * self.frames
    }

    /// Returns true if the buffer holds no samples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the content is logically all-zero.
    ///
    /// A clear buffer must not be read as data until a write touches it.
    #[inline]
    pub fn is_clear(&self) -> bool {
        self.is_clear
    }

    /// Marks the buffer as holding real content without writing.
    ///
    /// Used when an external producer fills the pool through a write view
    /// it obtained earlier.
    pub fn mark_dirty(&mut self) {
        self.is_clear = false;
    }

    /// Returns a read view of one full channel.
    ///
    /// # Panics
    ///
    /// Panics if `index >= channels()`.
    #[inline]
    pub fn channel(&self, index: usize) -> Channel<'_> {
        let start = index * self.frames;
        Channel::new(&self.data[start..start + self.frames])
    }

    /// Returns a write view of one full channel, dropping the clear flag.
    ///
    /// # Panics
    ///
    /// Panics if `index >= channels()`.
    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> ChannelMut<'_> {
        self.is_clear = false;
        let start = index * self.frames;
        ChannelMut::new(&mut self.data[start..start + self.frames])
    }

    /// Returns write views of two distinct channels at once.
    ///
    /// # Panics
    ///
    /// Panics if the indices are equal or out of range.
    pub fn channel_pair_mut(&mut self, a: usize, b: usize) -> (ChannelMut<'_>, ChannelMut<'_>) {
        assert_ne!(a, b, "channel_pair_mut needs distinct channels");
        self.is_clear = false;
        let frames = self.frames;
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let (head, tail) = self.data.split_at_mut(hi * frames);
        let lo_view = ChannelMut::new(&mut head[lo * frames..lo * frames + frames]);
        let hi_view = ChannelMut::new(&mut tail[..frames]);
        if a < b { (lo_view, hi_view) } else { (hi_view, lo_view) }
    }

    /// Returns a read view over a channel/frame sub-range.
    ///
    /// Returns `None` when the requested channels or frames exceed the
    /// source. Callers on the edit path should treat that as a programming
    /// error and assert on it.
    pub fn view(
        &self,
        start_channel: usize,
        channels: usize,
        frame_offset: usize,
        frames: usize,
    ) -> Option<BufferView<'_>> {
        if start_channel + channels > self.channels || frame_offset + frames > self.frames {
            return None;
        }
        Some(BufferView {
            source: self,
            start_channel,
            channels,
            frame_offset,
            frames,
        })
    }

    /// Zeroes the whole buffer and restores the clear flag.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
        self.is_clear = true;
    }

    /// Zeroes a frame range of one channel. Zero-length ranges are no-ops.
    pub fn clear_range(&mut self, channel: usize, offset: usize, frames: usize) {
        if frames == 0 {
            return;
        }
        self.is_clear = false;
        let start = channel * self.frames + offset;
        self.data[start..start + frames].fill(0.0);
    }

    /// Resizes the buffer in place.
    ///
    /// With `keep` false the old content is discarded: the pool is resized
    /// (reusing the existing allocation when `avoid_reallocating` and
    /// capacity suffices) and left unspecified. With `keep` true, as much
    /// old content as fits is preserved channel-wise, and the newly exposed
    /// region is zeroed when `clear_extra` is set.
    pub fn set_size(
        &mut self,
        channels: usize,
        frames: usize,
        keep: bool,
        clear_extra: bool,
        avoid_reallocating: bool,
    ) {
        let new_len = channels * frames;

        if !keep {
            if avoid_reallocating && self.data.capacity() >= new_len {
                self.data.resize(new_len, 0.0);
            } else {
                self.data = vec![0.0; new_len];
                self.is_clear = true;
            }
            self.channels = channels;
            self.frames = frames;
            if clear_extra {
                self.data.fill(0.0);
                self.is_clear = true;
            }
            return;
        }

        let old_channels = self.channels;
        let old_frames = self.frames;
        let copy_frames = old_frames.min(frames);
        let copy_channels = old_channels.min(channels);

        // Grow first so every destination range exists, then remap channel
        // runs in an order that never overwrites a source not yet moved.
        let scratch_len = new_len.max(old_channels * old_frames);
        self.data.resize(scratch_len, 0.0);

        if frames >= old_frames {
            // Channels move toward higher addresses: walk backwards.
            for c in (0..copy_channels).rev() {
                self.data
                    .copy_within(c * old_frames..c * old_frames + copy_frames, c * frames);
            }
        } else {
            for c in 0..copy_channels {
                self.data
                    .copy_within(c * old_frames..c * old_frames + copy_frames, c * frames);
            }
        }

        self.data.truncate(new_len);
        self.channels = channels;
        self.frames = frames;

        if clear_extra {
            for c in 0..copy_channels {
                let start = c * frames + copy_frames;
                self.data[start..(c + 1) * frames].fill(0.0);
            }
            for c in copy_channels..channels {
                self.data[c * frames..(c + 1) * frames].fill(0.0);
            }
        }
    }

    /// Copies a frame range from another buffer's channel into one of ours.
    ///
    /// Zero-length copies are no-ops.
    pub fn copy_from(
        &mut self,
        dst_channel: usize,
        dst_offset: usize,
        src: &AudioBuffer,
        src_channel: usize,
        src_offset: usize,
        frames: usize,
    ) {
        if frames == 0 {
            return;
        }
        self.is_clear = false;
        let dst_start = dst_channel * self.frames + dst_offset;
        let src_run = src.channel(src_channel).slice(src_offset, frames);
        self.data[dst_start..dst_start + frames].copy_from_slice(src_run.samples());
    }

    /// Copies a frame range within one channel of this buffer.
    ///
    /// Overlapping ranges are handled with a non-destructive copy order.
    pub fn copy_within_channel(
        &mut self,
        channel: usize,
        src_offset: usize,
        dst_offset: usize,
        frames: usize,
    ) {
        if frames == 0 {
            return;
        }
        self.is_clear = false;
        let base = channel * self.frames;
        self.data
            .copy_within(base + src_offset..base + src_offset + frames, base + dst_offset);
    }

    /// Accumulates a frame range from another buffer's channel into ours.
    pub fn add_from(
        &mut self,
        dst_channel: usize,
        src: &AudioBuffer,
        src_channel: usize,
        frames: usize,
    ) {
        if frames == 0 {
            return;
        }
        self.is_clear = false;
        let dst_start = dst_channel * self.frames;
        let src_start = src_channel * src.frames;
        crate::ops::add_assign(
            &mut self.data[dst_start..dst_start + frames],
            &src.data[src_start..src_start + frames],
        );
    }

    /// Multiplies a frame range of one channel by a gain.
    pub fn apply_gain(&mut self, channel: usize, offset: usize, frames: usize, gain: f32) {
        if frames == 0 {
            return;
        }
        self.is_clear = false;
        let start = channel * self.frames + offset;
        crate::ops::mul_scalar(&mut self.data[start..start + frames], gain);
    }

    /// Multiplies the whole buffer by a gain.
    pub fn apply_gain_all(&mut self, gain: f32) {
        if self.data.is_empty() {
            return;
        }
        self.is_clear = false;
        crate::ops::mul_scalar(&mut self.data, gain);
    }

    /// Builds the union of an input and an output channel set.
    ///
    /// The merged buffer has `max(input_channels, output_channels)` channels
    /// over the output's frame count. Channels `0..min` carry the output's
    /// content. When the input set is larger, its extra channels are
    /// appended after the shared ones; when the output set is larger, the
    /// extra channels are appended zeroed.
    pub fn merge(
        input: Option<&AudioBuffer>,
        output: &AudioBuffer,
        input_channels: usize,
        output_channels: usize,
    ) -> AudioBuffer {
        let total = input_channels.max(output_channels);
        let frames = output.frames();
        let mut merged = AudioBuffer::new(total, frames);
        let shared = input_channels.min(output_channels);

        for c in 0..shared.min(output.channels()) {
            merged.copy_from(c, 0, output, c, 0, frames);
        }
        if input_channels > output_channels
            && let Some(input) = input
        {
            let frames = frames.min(input.frames());
            for c in output_channels..input_channels.min(input.channels()) {
                merged.copy_from(c, 0, input, c, 0, frames);
            }
        }
        // Extra output channels stay zeroed by construction.
        merged
    }
}
