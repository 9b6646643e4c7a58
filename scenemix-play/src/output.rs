//! Audio output using cpal
//!
//! Binds a [`StreamRenderer`](crate::stream::StreamRenderer) to an output
//! device. The driver callback hands us an interleaved buffer; the renderer
//! fills it from the active timeline. Device selection falls back to the
//! default output when a requested device is missing.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, StreamConfig};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::stream::StreamRenderer;

/// Audio output manager.
pub struct AudioOutput {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<cpal::Stream>,
}

impl AudioOutput {
    /// List available output device names.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();
        debug!("found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open an output device.
    ///
    /// `device_name: None` selects the default device. The configuration
    /// prefers stereo f32 at `sample_rate` with a fixed buffer of
    /// `chunk_size` frames; falls back to the device default config when no
    /// exact match exists.
    pub fn new(device_name: Option<&str>, sample_rate: u32, chunk_size: u32) -> Result<Self> {
        let host = cpal::default_host();

        let device = match device_name {
            Some(name) => {
                let mut devices = host.output_devices().map_err(|e| {
                    Error::AudioOutput(format!("failed to enumerate devices: {}", e))
                })?;
                match devices.find(|d| d.name().ok().as_deref() == Some(name)) {
                    Some(dev) => {
                        info!("using requested audio device: {}", name);
                        dev
                    }
                    None => {
                        warn!("device '{}' not found, falling back to default", name);
                        host.default_output_device().ok_or_else(|| {
                            Error::AudioOutput(format!(
                                "device '{}' not found and no default device available",
                                name
                            ))
                        })?
                    }
                }
            }
            None => host
                .default_output_device()
                .ok_or_else(|| Error::AudioOutput("no default output device".to_string()))?,
        };

        let (mut config, sample_format) = Self::best_config(&device, sample_rate)?;
        config.buffer_size = cpal::BufferSize::Fixed(chunk_size);

        debug!(
            "audio config: rate={}, channels={}, format={:?}, chunk={}",
            config.sample_rate.0, config.channels, sample_format, chunk_size
        );

        Ok(Self {
            device,
            config,
            sample_format,
            stream: None,
        })
    }

    /// Pick a stereo f32 config at the wanted rate, or the device default.
    fn best_config(device: &Device, sample_rate: u32) -> Result<(StreamConfig, SampleFormat)> {
        let mut supported = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("failed to get device configs: {}", e)))?;

        let preferred = supported.find(|c| {
            c.channels() == 2
                && c.min_sample_rate().0 <= sample_rate
                && c.max_sample_rate().0 >= sample_rate
                && c.sample_format() == SampleFormat::F32
        });
        if let Some(config) = preferred {
            let sample_format = config.sample_format();
            let config = config
                .with_sample_rate(cpal::SampleRate(sample_rate))
                .config();
            return Ok((config, sample_format));
        }

        let config = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("failed to get default config: {}", e)))?;
        let sample_format = config.sample_format();
        Ok((config.config(), sample_format))
    }

    /// Start the driver stream, pulling chunks through `renderer`.
    pub fn start(&mut self, renderer: StreamRenderer) -> Result<()> {
        info!("starting audio stream");
        let channels = self.config.channels as usize;

        let err_fn = |err| {
            error!("audio stream error: {}", err);
        };

        let stream = match self.sample_format {
            SampleFormat::F32 => self
                .device
                .build_output_stream(
                    &self.config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        renderer.render(data, channels);
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| Error::AudioOutput(format!("failed to build stream: {}", e)))?,
            SampleFormat::I16 => {
                // Render to a reusable float buffer, then quantize.
                let mut scratch: Vec<f32> = Vec::new();
                self.device
                    .build_output_stream(
                        &self.config,
                        move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                            scratch.resize(data.len(), 0.0);
                            renderer.render(&mut scratch, channels);
                            for (d, &s) in data.iter_mut().zip(&scratch) {
                                *d = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                            }
                        },
                        err_fn,
                        None,
                    )
                    .map_err(|e| Error::AudioOutput(format!("failed to build stream: {}", e)))?
            }
            format => {
                return Err(Error::AudioOutput(format!(
                    "unsupported sample format: {:?}",
                    format
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("failed to start stream: {}", e)))?;
        self.stream = Some(stream);

        info!("audio stream started");
        Ok(())
    }

    /// Stop and drop the driver stream.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            stream
                .pause()
                .map_err(|e| Error::AudioOutput(format!("failed to pause stream: {}", e)))?;
        }
        Ok(())
    }

    pub fn device_name(&self) -> String {
        self.device.name().unwrap_or_else(|_| "unknown".to_string())
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_devices_does_not_panic() {
        // Runs headless on CI; enumeration may legitimately fail there.
        let _ = AudioOutput::list_devices();
    }
}
