//! CPAL output stream driving the [`AudioEngine`]
//!
//! The stream callback owns the engine outright; the control thread keeps
//! the [`EngineHandle`]. Nothing on the callback path locks or allocates:
//! the engine renders into pre-allocated planar buffers which are then
//! interleaved into the device's channel layout.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};

use super::config::AudioConfig;
use super::device::find_output_device;
use super::error::{AudioError, AudioResult};
use crate::engine::{AudioEngine, EngineHandle};
use crate::synth::SynthSettings;
use crate::types::MAX_BLOCK_SIZE;

/// Keeps the output stream alive. Drop it to stop audio.
pub struct AudioHandle {
    _stream: Stream,
    device_name: String,
    sample_rate: u32,
    channels: u16,
}

impl AudioHandle {
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

/// Open the configured output device and start streaming the engine
///
/// `preferred_rate` is used when the device supports it, otherwise the
/// device's maximum rate. The engine runs at whatever rate the stream gets.
pub fn start_output(
    config: &AudioConfig,
    preferred_rate: u32,
    synth: SynthSettings,
) -> AudioResult<(AudioHandle, EngineHandle)> {
    let device = find_output_device(config.device_name.as_deref())?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let stream_config = output_config(&device, config, preferred_rate)?;
    let sample_rate = stream_config.sample_rate.0;
    let channels = stream_config.channels;

    log::info!(
        "Audio config: {} channels, {}Hz, buffer {:?} (~{:.1}ms latency)",
        channels,
        sample_rate,
        config.buffer_size,
        config.buffer_size.latency_ms(sample_rate)
    );

    let (engine, handle) = AudioEngine::new(sample_rate, synth);
    let stream = build_stream(&device, &stream_config, engine)?;
    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    log::info!("Audio stream started");

    Ok((
        AudioHandle {
            _stream: stream,
            device_name,
            sample_rate,
            channels,
        },
        handle,
    ))
}

/// Pick an f32 configuration with at least two channels
fn output_config(device: &cpal::Device, config: &AudioConfig, preferred_rate: u32) -> AudioResult<StreamConfig> {
    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .filter(|c| c.sample_format() == SampleFormat::F32 && c.channels() >= 2)
        .collect();

    let in_range = |c: &cpal::SupportedStreamConfigRange| {
        preferred_rate >= c.min_sample_rate().0 && preferred_rate <= c.max_sample_rate().0
    };

    let (range, rate) = match supported.iter().find(|c| in_range(c)) {
        Some(range) => (range, cpal::SampleRate(preferred_rate)),
        None => {
            let range = supported
                .first()
                .ok_or_else(|| AudioError::UnsupportedFormat("no f32 stereo output".to_string()))?;
            log::warn!(
                "Audio device doesn't support {}Hz, falling back to {}Hz",
                preferred_rate,
                range.max_sample_rate().0
            );
            (range, range.max_sample_rate())
        }
    };

    let mut stream_config = range.clone().with_sample_rate(rate).config();
    if let Some(frames) = config.buffer_size.as_frames() {
        stream_config.buffer_size = cpal::BufferSize::Fixed(frames);
    }
    Ok(stream_config)
}

fn build_stream(device: &cpal::Device, config: &StreamConfig, mut engine: AudioEngine) -> AudioResult<Stream> {
    let channels = config.channels as usize;
    let mut left = vec![0.0_f32; MAX_BLOCK_SIZE];
    let mut right = vec![0.0_f32; MAX_BLOCK_SIZE];

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                for chunk in data.chunks_mut(MAX_BLOCK_SIZE * channels) {
                    let frames = chunk.len() / channels;
                    let (block_left, block_right) = (&mut left[..frames], &mut right[..frames]);
                    engine.process(block_left, block_right);
                    interleave(block_left, block_right, chunk, channels);
                }
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}

/// Write a planar stereo block into an interleaved buffer; channels past
/// the second are silent
fn interleave(left: &[f32], right: &[f32], out: &mut [f32], channels: usize) {
    for (i, frame) in out.chunks_mut(channels).enumerate() {
        frame.fill(0.0);
        if let (Some(&l), Some(&r)) = (left.get(i), right.get(i)) {
            frame[0] = l;
            if channels > 1 {
                frame[1] = r;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleave_stereo() {
        let mut out = vec![9.0; 6];
        interleave(&[0.1, 0.2, 0.3], &[-0.1, -0.2, -0.3], &mut out, 2);
        assert_eq!(out, vec![0.1, -0.1, 0.2, -0.2, 0.3, -0.3]);
    }

    #[test]
    fn test_interleave_extra_channels_silent() {
        let mut out = vec![9.0; 8];
        interleave(&[0.5, 0.25], &[0.4, 0.2], &mut out, 4);
        assert_eq!(out, vec![0.5, 0.4, 0.0, 0.0, 0.25, 0.2, 0.0, 0.0]);
    }
}
