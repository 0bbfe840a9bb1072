//! Bit-exact sample-format conversion at the I/O boundary.
//!
//! The engine is float32 internally; devices and files speak 16/24/32-bit
//! integer or 32-bit float, interleaved or planar. [`write_to`] scales
//! internal samples by the format's maximum integer magnitude and
//! truncates; [`read_from`] divides by the same magnitude. 24-bit samples
//! are packed as three little-endian bytes.
//!
//! Both directions take a channel subset and an explicit frame count, so a
//! device callback with a partial channel set or an undersized final block
//! converts correctly. Unsupported bit depths are rejected when the format
//! is negotiated ([`SampleFormat::from_spec`]), never in the render path.

use crate::buffer::AudioBuffer;

/// External sample encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleFormat {
    /// 16-bit signed integer PCM.
    Int16,
    /// 24-bit signed integer PCM, 3 bytes little-endian.
    Int24,
    /// 32-bit signed integer PCM.
    Int32,
    /// 32-bit IEEE float, little-endian bits.
    Float32,
}

impl SampleFormat {
    /// Maps a negotiated `(bits_per_sample, is_float)` pair to a format.
    ///
    /// Returns `None` for unsupported depths — callers must treat that as a
    /// configuration error at setup time.
    pub fn from_spec(bits_per_sample: u16, is_float: bool) -> Option<Self> {
        match (bits_per_sample, is_float) {
            (16, false) => Some(Self::Int16),
            (24, false) => Some(Self::Int24),
            (32, false) => Some(Self::Int32),
            (32, true) => Some(Self::Float32),
            _ => None,
        }
    }

    /// Size of one encoded sample in bytes.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::Int16 => 2,
            Self::Int24 => 3,
            Self::Int32 | Self::Float32 => 4,
        }
    }
}

/// Memory layout of the external sample block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleLayout {
    /// Frame-major: `c0f0 c1f0 c0f1 c1f1 ...`
    Interleaved,
    /// Channel-major: all of channel 0, then all of channel 1, ...
    Planar,
}

impl SampleLayout {
    /// Byte offset of `(channel, frame)` within a `channels × frames` block.
    #[inline]
    fn offset(self, channel: usize, frame: usize, channels: usize, frames: usize, bps: usize) -> usize {
        match self {
            Self::Interleaved => (frame * channels + channel) * bps,
            Self::Planar => (channel * frames + frame) * bps,
        }
    }
}

const I16_MAX: f32 = 32767.0;
const I24_MAX: f32 = 8_388_607.0;
const I32_MAX: f64 = 2_147_483_647.0;

#[inline]
fn encode(sample: f32, format: SampleFormat, out: &mut [u8]) {
    match format {
        SampleFormat::Int16 => {
            let v = (sample * I16_MAX) as i16;
            out[..2].copy_from_slice(&v.to_le_bytes());
        }
        SampleFormat::Int24 => {
            let v = (sample * I24_MAX) as i32;
            out[..3].copy_from_slice(&v.to_le_bytes()[..3]);
        }
        SampleFormat::Int32 => {
            let v = (f64::from(sample) * I32_MAX) as i32;
            out[..4].copy_from_slice(&v.to_le_bytes());
        }
        SampleFormat::Float32 => {
            out[..4].copy_from_slice(&sample.to_le_bytes());
        }
    }
}

#[inline]
fn decode(format: SampleFormat, bytes: &[u8]) -> f32 {
    match format {
        SampleFormat::Int16 => {
            let v = i16::from_le_bytes([bytes[0], bytes[1]]);
            f32::from(v) / I16_MAX
        }
        SampleFormat::Int24 => {
            // Sign-extend from the high byte.
            let v = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]) << 8 >> 8;
            v as f32 / I24_MAX
        }
        SampleFormat::Int32 => {
            let v = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            (f64::from(v) / I32_MAX) as f32
        }
        SampleFormat::Float32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
    }
}

/// Normalizes an integer sample of the given format to float.
///
/// Integer formats divide by their maximum magnitude; `Float32` falls
/// back to the 32-bit integer range since it has no native integer form.
#[inline]
pub fn int_to_float(value: i32, format: SampleFormat) -> f32 {
    match format {
        SampleFormat::Int16 => value as f32 / I16_MAX,
        SampleFormat::Int24 => value as f32 / I24_MAX,
        SampleFormat::Int32 | SampleFormat::Float32 => (f64::from(value) / I32_MAX) as f32,
    }
}

/// Scales a float sample to the format's integer range, truncating.
#[inline]
pub fn float_to_int(sample: f32, format: SampleFormat) -> i32 {
    match format {
        SampleFormat::Int16 => (sample * I16_MAX) as i32,
        SampleFormat::Int24 => (sample * I24_MAX) as i32,
        SampleFormat::Int32 | SampleFormat::Float32 => (f64::from(sample) * I32_MAX) as i32,
    }
}

/// Writes internal float samples into an external representation.
///
/// Converts `frames` frames of buffer channels
/// `start_channel..start_channel + num_channels` into `dst`, which must
/// hold at least `num_channels × frames` encoded samples.
///
/// # Panics
///
/// Panics if the channel subset or frame count exceeds the buffer, or if
/// `dst` is too small — both are programming errors at the boundary.
pub fn write_to(
    buffer: &AudioBuffer,
    dst: &mut [u8],
    format: SampleFormat,
    layout: SampleLayout,
    start_channel: usize,
    num_channels: usize,
    frames: usize,
) {
    assert!(start_channel + num_channels <= buffer.channels());
    assert!(frames <= buffer.frames());
    let bps = format.bytes_per_sample();
    assert!(dst.len() >= num_channels * frames * bps);

    for c in 0..num_channels {
        let channel = buffer.channel(start_channel + c);
        let samples = channel.samples();
        for f in 0..frames {
            let at = layout.offset(c, f, num_channels, frames, bps);
            encode(samples[f], format, &mut dst[at..at + bps]);
        }
    }
}

/// Reads an external representation into internal float samples.
///
/// The inverse of [`write_to`]: fills `frames` frames of buffer channels
/// `start_channel..start_channel + num_channels` from `src`.
///
/// # Panics
///
/// Panics under the same boundary conditions as [`write_to`].
pub fn read_from(
    src: &[u8],
    buffer: &mut AudioBuffer,
    format: SampleFormat,
    layout: SampleLayout,
    start_channel: usize,
    num_channels: usize,
    frames: usize,
) {
    assert!(start_channel + num_channels <= buffer.channels());
    assert!(frames <= buffer.frames());
    let bps = format.bytes_per_sample();
    assert!(src.len() >= num_channels * frames * bps);

    for c in 0..num_channels {
        let mut channel = buffer.channel_mut(start_channel + c);
        let samples = channel.samples_mut();
        for f in 0..frames {
            let at = layout.offset(c, f, num_channels, frames, bps);
            samples[f] = decode(format, &src[at..at + bps]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn buffer_with(channels: usize, samples: &[f32]) -> AudioBuffer {
        let frames = samples.len();
        let mut buf = AudioBuffer::new(channels, frames);
        for c in 0..channels {
            buf.channel_mut(c).samples_mut().copy_from_slice(samples);
        }
        buf
    }

    #[test]
    fn from_spec_rejects_unsupported_depths() {
        assert_eq!(SampleFormat::from_spec(16, false), Some(SampleFormat::Int16));
        assert_eq!(SampleFormat::from_spec(32, true), Some(SampleFormat::Float32));
        assert_eq!(SampleFormat::from_spec(8, false), None);
        assert_eq!(SampleFormat::from_spec(64, true), None);
        assert_eq!(SampleFormat::from_spec(16, true), None);
    }

    #[test]
    fn int24_packs_three_le_bytes() {
        let buf = buffer_with(1, &[0.5, -1.0, 0.0]);
        let mut bytes = [0u8; 9];
        write_to(&buf, &mut bytes, SampleFormat::Int24, SampleLayout::Planar, 0, 1, 3);

        let v = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]) << 8 >> 8;
        assert_eq!(v, (0.5f32 * 8_388_607.0) as i32);
        let v = i32::from_le_bytes([bytes[3], bytes[4], bytes[5], 0]) << 8 >> 8;
        assert_eq!(v, -8_388_607);
        assert_eq!(&bytes[6..9], &[0, 0, 0]);
    }

    #[test]
    fn interleaved_vs_planar_layout() {
        let mut buf = AudioBuffer::new(2, 2);
        buf.channel_mut(0).samples_mut().copy_from_slice(&[0.25, 0.5]);
        buf.channel_mut(1).samples_mut().copy_from_slice(&[-0.25, -0.5]);

        let mut inter = [0u8; 16];
        write_to(&buf, &mut inter, SampleFormat::Float32, SampleLayout::Interleaved, 0, 2, 2);
        let mut planar = [0u8; 16];
        write_to(&buf, &mut planar, SampleFormat::Float32, SampleLayout::Planar, 0, 2, 2);

        let read = |b: &[u8]| f32::from_le_bytes([b[0], b[1], b[2], b[3]]);
        // Interleaved: c0f0 c1f0 c0f1 c1f1.
        assert_eq!(read(&inter[0..]), 0.25);
        assert_eq!(read(&inter[4..]), -0.25);
        assert_eq!(read(&inter[8..]), 0.5);
        // Planar: c0f0 c0f1 c1f0 c1f1.
        assert_eq!(read(&planar[4..]), 0.5);
        assert_eq!(read(&planar[8..]), -0.25);
    }

    #[test]
    fn channel_subset_and_partial_frames() {
        // Convert only channels 1..3 of a 4-channel buffer and only the
        // first 3 of 8 frames — the undersized-final-block case.
        let mut buf = AudioBuffer::new(4, 8);
        for c in 0..4 {
            for (i, s) in buf.channel_mut(c).samples_mut().iter_mut().enumerate() {
                *s = (c as f32 + 1.0) * 0.1 + i as f32 * 0.001;
            }
        }
        let mut bytes = vec![0u8; 2 * 3 * 2];
        write_to(&buf, &mut bytes, SampleFormat::Int16, SampleLayout::Interleaved, 1, 2, 3);

        let mut round = AudioBuffer::new(4, 8);
        read_from(&bytes, &mut round, SampleFormat::Int16, SampleLayout::Interleaved, 1, 2, 3);

        for c in 1..3 {
            for f in 0..3 {
                let want = buf.channel(c).samples()[f];
                let got = round.channel(c).samples()[f];
                assert!((want - got).abs() <= 1.0 / 32767.0, "c{c} f{f}");
            }
        }
        // Untouched channels stay silent.
        assert!(round.channel(0).samples().iter().all(|&s| s == 0.0));
        assert!(round.channel(3).samples().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn value_helpers_match_byte_path() {
        assert_eq!(float_to_int(0.5, SampleFormat::Int16), (0.5f32 * 32767.0) as i32);
        assert_eq!(int_to_float(16384, SampleFormat::Int16), 16384.0 / 32767.0);
        assert_eq!(float_to_int(-1.0, SampleFormat::Int24), -8_388_607);
        let full = float_to_int(1.0, SampleFormat::Int32);
        assert_eq!(full, i32::MAX);
        assert_eq!(int_to_float(full, SampleFormat::Int32), 1.0);
    }

    #[test]
    fn float32_round_trip_is_lossless() {
        let samples = [0.0f32, 1.0, -1.0, 0.123456, -0.987654];
        let buf = buffer_with(1, &samples);
        let mut bytes = vec![0u8; samples.len() * 4];
        write_to(&buf, &mut bytes, SampleFormat::Float32, SampleLayout::Planar, 0, 1, samples.len());
        let mut round = AudioBuffer::new(1, samples.len());
        read_from(&bytes, &mut round, SampleFormat::Float32, SampleLayout::Planar, 0, 1, samples.len());
        for (i, &s) in samples.iter().enumerate() {
            assert_eq!(round.channel(0).samples()[i].to_bits(), s.to_bits());
        }
    }

    proptest! {
        #[test]
        fn int16_round_trip_within_one_lsb(samples in proptest::collection::vec(-1.0f32..=1.0, 1..64)) {
            let buf = buffer_with(1, &samples);
            let mut bytes = vec![0u8; samples.len() * 2];
            write_to(&buf, &mut bytes, SampleFormat::Int16, SampleLayout::Planar, 0, 1, samples.len());
            let mut round = AudioBuffer::new(1, samples.len());
            read_from(&bytes, &mut round, SampleFormat::Int16, SampleLayout::Planar, 0, 1, samples.len());
            for (i, &s) in samples.iter().enumerate() {
                let got = round.channel(0).samples()[i];
                prop_assert!((got - s).abs() <= 1.0 / 32767.0);
            }
        }

        #[test]
        fn int24_round_trip_tighter_than_int16(samples in proptest::collection::vec(-1.0f32..=1.0, 1..64)) {
            let buf = buffer_with(1, &samples);
            let mut bytes = vec![0u8; samples.len() * 3];
            write_to(&buf, &mut bytes, SampleFormat::Int24, SampleLayout::Interleaved, 0, 1, samples.len());
            let mut round = AudioBuffer::new(1, samples.len());
            read_from(&bytes, &mut round, SampleFormat::Int24, SampleLayout::Interleaved, 0, 1, samples.len());
            for (i, &s) in samples.iter().enumerate() {
                let got = round.channel(0).samples()[i];
                prop_assert!((got - s).abs() <= 1.0 / 8_388_607.0);
            }
        }
    }
}
