//! Real-time audio output via cpal.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat as CpalFormat, Stream};
use resona_core::convert::{self, SampleFormat};

use crate::callback::RenderCallback;
use crate::{Error, Result};

/// Extract device name via `description()` (cpal 0.17+).
pub(crate) fn device_name(device: &Device) -> std::result::Result<String, cpal::DeviceNameError> {
    device.description().map(|d| d.name().to_string())
}

/// Audio output device information.
#[derive(Debug, Clone)]
pub struct AudioDevice {
    /// Human-readable device name.
    pub name: String,
    /// Output channel count of the default configuration.
    pub channels: u16,
    /// Default sample rate in Hz.
    pub default_sample_rate: u32,
}

/// Negotiated stream parameters.
#[derive(Debug, Clone, Copy)]
pub struct StreamFormat {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
}

impl Default for StreamFormat {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
        }
    }
}

/// List all available output devices.
pub fn list_output_devices() -> Result<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let mut devices = Vec::new();
    if let Ok(outputs) = host.output_devices() {
        for device in outputs {
            if let (Ok(name), Ok(config)) = (device_name(&device), device.default_output_config()) {
                devices.push(AudioDevice {
                    name,
                    channels: config.channels(),
                    default_sample_rate: config.sample_rate(),
                });
            }
        }
    }
    Ok(devices)
}

/// Get the default output device info.
pub fn default_output_device() -> Result<AudioDevice> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(Error::NoDevice)?;
    let config = device
        .default_output_config()
        .map_err(|e| Error::Stream(e.to_string()))?;
    Ok(AudioDevice {
        name: device_name(&device).map_err(|e| Error::Stream(e.to_string()))?,
        channels: config.channels(),
        default_sample_rate: config.sample_rate(),
    })
}

/// A running output stream driving a [`RenderCallback`].
///
/// Playback stops when the stream is dropped.
pub struct OutputStream {
    _stream: Stream,
    format: StreamFormat,
}

impl OutputStream {
    /// Opens the default output device and starts rendering.
    ///
    /// Uses the device's default configuration; `f32` and `i16` device
    /// formats are supported. The callback's output staging must cover
    /// the device's channel count.
    pub fn start(callback: RenderCallback) -> Result<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(Error::NoDevice)?;
        Self::start_on(&device, callback)
    }

    fn start_on(device: &Device, mut callback: RenderCallback) -> Result<Self> {
        let config = device
            .default_output_config()
            .map_err(|e| Error::Stream(e.to_string()))?;
        let format = StreamFormat {
            sample_rate: config.sample_rate(),
            channels: config.channels(),
        };
        let channels = format.channels as usize;
        let sample_format = config.sample_format();

        let err_fn = |err: cpal::StreamError| {
            tracing::error!(error = %err, "output stream error");
        };

        let stream = match sample_format {
            CpalFormat::F32 => device
                .build_output_stream(
                    &config.into(),
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        callback.process_interleaved(None, data, channels);
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| Error::Stream(e.to_string()))?,
            CpalFormat::I16 => {
                let mut scratch: Vec<f32> = Vec::new();
                device
                    .build_output_stream(
                        &config.into(),
                        move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                            if scratch.len() < data.len() {
                                scratch.resize(data.len(), 0.0);
                            }
                            let run = &mut scratch[..data.len()];
                            callback.process_interleaved(None, run, channels);
                            for (out, &sample) in data.iter_mut().zip(run.iter()) {
                                *out = convert::float_to_int(sample, SampleFormat::Int16) as i16;
                            }
                        },
                        err_fn,
                        None,
                    )
                    .map_err(|e| Error::Stream(e.to_string()))?
            }
            other => return Err(Error::UnsupportedFormat(format!("{other:?}"))),
        };

        stream.play().map_err(|e| Error::Stream(e.to_string()))?;
        tracing::info!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            "output stream started"
        );
        Ok(Self {
            _stream: stream,
            format,
        })
    }

    /// The negotiated device format.
    pub fn format(&self) -> StreamFormat {
        self.format
    }
}
