//! Audio file reading and writing.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use hound::{WavReader, WavWriter};
use resona_core::convert::{self, SampleFormat};
use resona_core::{AudioBuffer, SpscRing};

use crate::{Error, Result};

/// Decoded file format details.
#[derive(Debug, Clone, Copy)]
pub struct FileSpec {
    /// Number of audio channels.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bit depth per sample.
    pub bits_per_sample: u16,
    /// Total frames (samples per channel) in the file.
    pub num_frames: u64,
    /// The engine-side sample format the file decodes through.
    pub format: SampleFormat,
}

/// A source of planar float audio read incrementally from a file.
///
/// Implementations decode into the engine's internal representation;
/// `read` fills the leading channels of `dest` and returns how many
/// frames it produced, `0` at end of file.
pub trait AudioFileReader: Send {
    /// The file's format details.
    fn spec(&self) -> FileSpec;

    /// Decodes up to `frames` frames into `dest`, planar.
    fn read(&mut self, dest: &mut AudioBuffer, frames: usize) -> Result<usize>;

    /// Repositions the next read to an absolute frame.
    fn seek(&mut self, frame: u64) -> Result<()>;
}

/// WAV file reader backed by hound.
pub struct WavFileReader {
    reader: WavReader<BufReader<File>>,
    spec: FileSpec,
}

impl WavFileReader {
    /// Opens a WAV file and validates its format.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = WavReader::open(path)?;
        let wav_spec = reader.spec();
        let is_float = wav_spec.sample_format == hound::SampleFormat::Float;
        let format = SampleFormat::from_spec(wav_spec.bits_per_sample, is_float).ok_or_else(|| {
            Error::UnsupportedFormat(format!(
                "{}-bit {}",
                wav_spec.bits_per_sample,
                if is_float { "float" } else { "int" }
            ))
        })?;
        let spec = FileSpec {
            channels: wav_spec.channels,
            sample_rate: wav_spec.sample_rate,
            bits_per_sample: wav_spec.bits_per_sample,
            num_frames: u64::from(reader.duration()),
            format,
        };
        Ok(Self { reader, spec })
    }
}

impl AudioFileReader for WavFileReader {
    fn spec(&self) -> FileSpec {
        self.spec
    }

    fn read(&mut self, dest: &mut AudioBuffer, frames: usize) -> Result<usize> {
        let channels = self.spec.channels as usize;
        assert!(dest.channels() >= channels && dest.frames() >= frames);
        let format = self.spec.format;

        let mut frames_read = 0;
        if format == SampleFormat::Float32 {
            let mut samples = self.reader.samples::<f32>();
            'frames: for f in 0..frames {
                for c in 0..channels {
                    let Some(sample) = samples.next() else { break 'frames };
                    dest.channel_mut(c).samples_mut()[f] = sample?;
                }
                frames_read += 1;
            }
        } else {
            let mut samples = self.reader.samples::<i32>();
            'frames: for f in 0..frames {
                for c in 0..channels {
                    let Some(sample) = samples.next() else { break 'frames };
                    dest.channel_mut(c).samples_mut()[f] = convert::int_to_float(sample?, format);
                }
                frames_read += 1;
            }
        }
        Ok(frames_read)
    }

    fn seek(&mut self, frame: u64) -> Result<()> {
        self.reader.seek(frame as u32)?;
        Ok(())
    }
}

/// Writes a buffer to a WAV file.
///
/// `bits_per_sample` of 32 writes IEEE float; 16 and 24 write PCM through
/// the engine's truncating integer conversion.
pub fn write_wav<P: AsRef<Path>>(
    path: P,
    buffer: &AudioBuffer,
    sample_rate: u32,
    bits_per_sample: u16,
) -> Result<()> {
    let is_float = bits_per_sample == 32;
    let format = SampleFormat::from_spec(bits_per_sample, is_float)
        .ok_or_else(|| Error::UnsupportedFormat(format!("{bits_per_sample}-bit")))?;
    let spec = hound::WavSpec {
        channels: buffer.channels() as u16,
        sample_rate,
        bits_per_sample,
        sample_format: if is_float {
            hound::SampleFormat::Float
        } else {
            hound::SampleFormat::Int
        },
    };

    let mut writer = WavWriter::create(path, spec)?;
    for f in 0..buffer.frames() {
        for c in 0..buffer.channels() {
            let sample = buffer.channel(c).samples()[f];
            if is_float {
                writer.write_sample(sample)?;
            } else {
                writer.write_sample(convert::float_to_int(sample, format))?;
            }
        }
    }
    writer.finalize()?;
    Ok(())
}

/// Frames the loader thread decodes per pass.
const STREAM_CHUNK_FRAMES: usize = 512;

/// Plays a file through a lock-free ring from a background loader thread.
///
/// The loader decodes ahead into an [`SpscRing`] of interleaved samples;
/// the consumer side ([`read_frames`](Self::read_frames)) is wait-free and
/// safe to call from the audio thread. Dropping the reader stops the
/// loader.
pub struct StreamingReader {
    ring: Arc<SpscRing<f32>>,
    spec: FileSpec,
    done: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    scratch: Vec<f32>,
    thread: Option<JoinHandle<()>>,
}

impl StreamingReader {
    /// Starts streaming from `reader` with `capacity_frames` of lookahead.
    pub fn start(mut reader: Box<dyn AudioFileReader>, capacity_frames: usize) -> Result<Self> {
        assert!(capacity_frames > 0);
        let spec = reader.spec();
        let channels = spec.channels as usize;
        let ring = Arc::new(SpscRing::new(capacity_frames * channels));
        let done = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));

        let thread = {
            let ring = Arc::clone(&ring);
            let done = Arc::clone(&done);
            let stop = Arc::clone(&stop);
            thread::Builder::new().name("resona-stream".into()).spawn(move || {
                let chunk = STREAM_CHUNK_FRAMES.min(capacity_frames);
                let mut staging = AudioBuffer::new(channels, chunk);
                let mut interleaved = vec![0.0f32; chunk * channels];
                while !stop.load(Ordering::Acquire) {
                    let writable = (ring.available_write() / channels).min(chunk);
                    if writable == 0 {
                        thread::sleep(Duration::from_millis(1));
                        continue;
                    }
                    let got = match reader.read(&mut staging, writable) {
                        Ok(got) => got,
                        Err(err) => {
                            tracing::warn!(error = %err, "streaming read failed");
                            break;
                        }
                    };
                    if got == 0 {
                        break;
                    }
                    for f in 0..got {
                        for c in 0..channels {
                            interleaved[f * channels + c] = staging.channel(c).samples()[f];
                        }
                    }
                    ring.write(&interleaved[..got * channels]);
                }
                done.store(true, Ordering::Release);
            })?
        };

        Ok(Self {
            ring,
            spec,
            done,
            stop,
            scratch: vec![0.0; capacity_frames * channels],
            thread: Some(thread),
        })
    }

    /// The file's format details.
    pub fn spec(&self) -> FileSpec {
        self.spec
    }

    /// Whole frames currently buffered.
    pub fn available_frames(&self) -> usize {
        self.ring.available_read() / self.spec.channels as usize
    }

    /// Whether the loader is finished and the ring fully drained.
    pub fn finished(&self) -> bool {
        self.done.load(Ordering::Acquire) && self.ring.available_read() == 0
    }

    /// Moves up to `frames` buffered frames into `dest`, planar.
    ///
    /// Wait-free; returns the number of frames delivered, which is zero
    /// when the ring is empty (an underrun while the loader catches up, or
    /// the end of the file).
    pub fn read_frames(&mut self, dest: &mut AudioBuffer, frames: usize) -> usize {
        let channels = self.spec.channels as usize;
        assert!(dest.channels() >= channels && dest.frames() >= frames);
        let take = frames.min(self.available_frames());
        if take == 0 {
            return 0;
        }
        let samples = take * channels;
        let ok = self.ring.read(&mut self.scratch[..samples]);
        debug_assert!(ok);
        for c in 0..channels {
            let mut channel = dest.channel_mut(c);
            let run = channel.samples_mut();
            for f in 0..take {
                run[f] = self.scratch[f * channels + c];
            }
        }
        take
    }
}

impl Drop for StreamingReader {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_buffer(channels: usize, frames: usize) -> AudioBuffer {
        let mut buffer = AudioBuffer::new(channels, frames);
        for c in 0..channels {
            for (i, sample) in buffer.channel_mut(c).samples_mut().iter_mut().enumerate() {
                *sample = (i as f32 + c as f32 * 1000.0) / 10_000.0;
            }
        }
        buffer
    }

    #[test]
    fn float_wav_round_trip_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp.wav");
        let original = ramp_buffer(2, 300);
        write_wav(&path, &original, 48_000, 32).unwrap();

        let mut reader = WavFileReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 48_000);
        assert_eq!(spec.num_frames, 300);
        assert_eq!(spec.format, SampleFormat::Float32);

        let mut decoded = AudioBuffer::new(2, 300);
        assert_eq!(reader.read(&mut decoded, 300).unwrap(), 300);
        for c in 0..2 {
            assert_eq!(decoded.channel(c).samples(), original.channel(c).samples());
        }
        // EOF.
        assert_eq!(reader.read(&mut decoded, 10).unwrap(), 0);
    }

    #[test]
    fn int16_wav_round_trip_within_one_lsb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pcm.wav");
        let original = ramp_buffer(1, 128);
        write_wav(&path, &original, 44_100, 16).unwrap();

        let mut reader = WavFileReader::open(&path).unwrap();
        let mut decoded = AudioBuffer::new(1, 128);
        assert_eq!(reader.read(&mut decoded, 128).unwrap(), 128);
        for (got, want) in decoded
            .channel(0)
            .samples()
            .iter()
            .zip(original.channel(0).samples())
        {
            assert!((got - want).abs() <= 1.0 / 32767.0);
        }
    }

    #[test]
    fn chunked_reads_and_seek() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.wav");
        let original = ramp_buffer(1, 100);
        write_wav(&path, &original, 48_000, 32).unwrap();

        let mut reader = WavFileReader::open(&path).unwrap();
        let mut chunk = AudioBuffer::new(1, 32);
        let mut total = 0;
        loop {
            let got = reader.read(&mut chunk, 32).unwrap();
            if got == 0 {
                break;
            }
            total += got;
        }
        assert_eq!(total, 100);

        reader.seek(90).unwrap();
        let got = reader.read(&mut chunk, 32).unwrap();
        assert_eq!(got, 10);
        assert_eq!(chunk.channel(0).samples()[0], original.channel(0).samples()[90]);
    }

    #[test]
    fn unsupported_bit_depth_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("8bit.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 8,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for i in 0..16i8 {
            writer.write_sample(i).unwrap();
        }
        writer.finalize().unwrap();

        assert!(matches!(
            WavFileReader::open(&path),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn streaming_reader_delivers_the_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.wav");
        let original = ramp_buffer(2, 2000);
        write_wav(&path, &original, 48_000, 32).unwrap();

        let reader = WavFileReader::open(&path).unwrap();
        // Lookahead much smaller than the file forces refills.
        let mut streaming = StreamingReader::start(Box::new(reader), 256).unwrap();
        assert_eq!(streaming.spec().channels, 2);

        let mut collected = AudioBuffer::new(2, 2000);
        let mut block = AudioBuffer::new(2, 64);
        let mut at = 0;
        while !streaming.finished() {
            let got = streaming.read_frames(&mut block, 64);
            if got == 0 {
                thread::sleep(Duration::from_millis(1));
                continue;
            }
            for c in 0..2 {
                collected.copy_from(c, at, &block, c, 0, got);
            }
            at += got;
        }
        assert_eq!(at, 2000);
        for c in 0..2 {
            assert_eq!(collected.channel(c).samples(), original.channel(c).samples());
        }
    }
}
