//! Encoder collaborator for offline bounce
//!
//! The bounce loop hands finished stereo blocks to an [`AudioSink`] in
//! position order. [`WavSink`] writes them to a WAV file through hound.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use thiserror::Error;

use crate::types::Sample;

/// Format requested from a sink when it is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Unsupported bit depth: {0} (expected 16, 24 or 32)")]
    UnsupportedBitDepth(u16),

    #[error("Unsupported channel count: {0}")]
    UnsupportedChannels(u16),

    #[error("Could not create output: {0}")]
    Create(String),

    #[error("Could not write output: {0}")]
    Write(String),
}

/// Receives rendered audio in position order
pub trait AudioSink: Send {
    /// Append one block. `left` and `right` have the same length.
    fn write(&mut self, left: &[Sample], right: &[Sample]) -> Result<(), SinkError>;

    /// Flush and close the output
    fn finalize(self: Box<Self>) -> Result<(), SinkError>;
}

/// WAV file sink: 16/24-bit integer PCM or 32-bit float
pub struct WavSink {
    writer: WavWriter<BufWriter<File>>,
    spec: SinkSpec,
}

impl WavSink {
    pub fn create(path: &Path, spec: SinkSpec) -> Result<Self, SinkError> {
        let sample_format = match spec.bit_depth {
            16 | 24 => SampleFormat::Int,
            32 => SampleFormat::Float,
            other => return Err(SinkError::UnsupportedBitDepth(other)),
        };
        if spec.channels == 0 {
            return Err(SinkError::UnsupportedChannels(spec.channels));
        }

        let wav_spec = WavSpec {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bit_depth,
            sample_format,
        };
        let writer = WavWriter::create(path, wav_spec)
            .map_err(|e| SinkError::Create(format!("{}: {}", path.display(), e)))?;

        log::debug!(
            "WAV sink created: {:?} ({}Hz, {} channels, {}-bit)",
            path,
            spec.sample_rate,
            spec.channels,
            spec.bit_depth
        );
        Ok(Self { writer, spec })
    }

    fn write_frame(&mut self, left: Sample, right: Sample) -> Result<(), hound::Error> {
        if self.spec.channels == 1 {
            return self.write_sample((left + right) * 0.5);
        }
        self.write_sample(left)?;
        self.write_sample(right)?;
        // Channels beyond the stereo pair are silent
        for _ in 2..self.spec.channels {
            self.write_sample(0.0)?;
        }
        Ok(())
    }

    fn write_sample(&mut self, sample: Sample) -> Result<(), hound::Error> {
        let sample = sample.clamp(-1.0, 1.0);
        match self.spec.bit_depth {
            16 => self.writer.write_sample((sample * i16::MAX as f32) as i16),
            24 => self.writer.write_sample((sample * 8_388_607.0) as i32),
            _ => self.writer.write_sample(sample),
        }
    }
}

impl AudioSink for WavSink {
    fn write(&mut self, left: &[Sample], right: &[Sample]) -> Result<(), SinkError> {
        for (&l, &r) in left.iter().zip(right) {
            self.write_frame(l, r)
                .map_err(|e| SinkError::Write(e.to_string()))?;
        }
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<(), SinkError> {
        self.writer
            .finalize()
            .map_err(|e| SinkError::Write(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(bit_depth: u16, channels: u16) -> SinkSpec {
        SinkSpec {
            sample_rate: 44100,
            channels,
            bit_depth,
        }
    }

    #[test]
    fn test_writes_24_bit_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");

        let mut sink: Box<dyn AudioSink> = Box::new(WavSink::create(&path, spec(24, 2)).unwrap());
        sink.write(&[0.5, -1.0, 2.0], &[0.25, 0.0, -2.0]).unwrap();
        sink.finalize().unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().bits_per_sample, 24);
        assert_eq!(reader.spec().channels, 2);
        let samples: Vec<i32> = reader.samples::<i32>().map(Result::unwrap).collect();
        assert_eq!(samples, vec![4_194_303, 2_097_151, -8_388_607, 0, 8_388_607, -8_388_607]);
    }

    #[test]
    fn test_writes_float_and_mono_downmix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");

        let mut sink: Box<dyn AudioSink> = Box::new(WavSink::create(&path, spec(32, 1)).unwrap());
        sink.write(&[0.5, 0.2], &[0.25, -0.2]).unwrap();
        sink.finalize().unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let samples: Vec<f32> = reader.samples::<f32>().map(Result::unwrap).collect();
        assert_eq!(samples.len(), 2);
        assert!((samples[0] - 0.375).abs() < 1e-6);
        assert!(samples[1].abs() < 1e-6);
    }

    #[test]
    fn test_extra_channels_are_silent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quad.wav");

        let mut sink: Box<dyn AudioSink> = Box::new(WavSink::create(&path, spec(16, 4)).unwrap());
        sink.write(&[1.0], &[-1.0]).unwrap();
        sink.finalize().unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let samples: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(samples, vec![i16::MAX, -i16::MAX, 0, 0]);
    }

    #[test]
    fn test_rejects_unsupported_bit_depth() {
        let dir = tempfile::tempdir().unwrap();
        let result = WavSink::create(&dir.path().join("x.wav"), spec(12, 2));
        assert!(matches!(result, Err(SinkError::UnsupportedBitDepth(12))));
    }

    #[test]
    fn test_create_fails_for_missing_directory() {
        let result = WavSink::create(Path::new("/nonexistent/dir/out.wav"), spec(16, 2));
        assert!(matches!(result, Err(SinkError::Create(_))));
    }
}
