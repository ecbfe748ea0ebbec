//! Mono sample source played by every voice

use std::f32::consts::PI;

use crate::asset::AudioBuffer;
use crate::types::Sample;

/// Fundamental of the built-in tone (A3)
const DEFAULT_TONE_HZ: f32 = 220.0;

/// (frequency multiple, weight) pairs of the built-in tone.
/// The 4.2x partial is deliberately inharmonic.
const DEFAULT_TONE_PARTIALS: [(f32, f32); 5] = [(1.0, 0.6), (2.0, 0.3), (3.0, 0.2), (4.0, 0.1), (4.2, 0.05)];

/// Decay rate of the built-in tone, per second
const DEFAULT_TONE_DECAY: f32 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct MonoSample {
    data: Vec<Sample>,
    sample_rate: u32,
}

impl MonoSample {
    pub fn new(data: Vec<Sample>, sample_rate: u32) -> Self {
        Self { data, sample_rate }
    }

    /// Down-mix a decoded buffer by averaging each frame across channels
    pub fn from_buffer(buffer: &AudioBuffer) -> Self {
        let num_channels = buffer.num_channels();
        let scale = 1.0 / num_channels as f32;
        let data = (0..buffer.len())
            .map(|frame| {
                (0..num_channels)
                    .filter_map(|c| buffer.channel(c))
                    .map(|channel| channel[frame])
                    .sum::<f32>()
                    * scale
            })
            .collect();
        Self::new(data, buffer.sample_rate())
    }

    /// One second of a decaying 220 Hz tone with a few harmonics
    pub fn default_tone(sample_rate: u32) -> Self {
        let sr = sample_rate.max(1) as f32;
        let data = (0..sample_rate.max(1))
            .map(|i| {
                let t = i as f32 / sr;
                let envelope = (-t * DEFAULT_TONE_DECAY).exp();
                let tone: f32 = DEFAULT_TONE_PARTIALS
                    .iter()
                    .map(|&(multiple, weight)| (2.0 * PI * DEFAULT_TONE_HZ * multiple * t).sin() * weight)
                    .sum();
                tone * envelope
            })
            .collect();
        Self::new(data, sample_rate)
    }

    #[inline]
    pub fn data(&self) -> &[Sample] {
        &self.data
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Linear interpolation at a fractional position; zero past the end
    #[inline]
    pub fn interpolate(&self, position: f64) -> Sample {
        let index = position as usize;
        let frac = (position - index as f64) as f32;
        let s1 = self.data.get(index).copied().unwrap_or(0.0);
        let s2 = self.data.get(index + 1).copied().unwrap_or(0.0);
        s1 + frac * (s2 - s1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_averages_channels() {
        let buffer = AudioBuffer::new(48000, vec![vec![1.0, 0.0], vec![0.0, -1.0]]).unwrap();
        let sample = MonoSample::from_buffer(&buffer);
        assert_eq!(sample.data(), &[0.5, -0.5]);
        assert_eq!(sample.sample_rate(), 48000);
    }

    #[test]
    fn test_default_tone_is_one_second_and_decays() {
        let tone = MonoSample::default_tone(44100);
        assert_eq!(tone.len(), 44100);
        assert_eq!(tone.data()[0], 0.0);

        let early = tone.data()[..4410].iter().fold(0.0_f32, |a, s| a.max(s.abs()));
        let late = tone.data()[39690..].iter().fold(0.0_f32, |a, s| a.max(s.abs()));
        assert!(early > 0.3);
        assert!(late < early * 0.5);
    }

    #[test]
    fn test_interpolation() {
        let sample = MonoSample::new(vec![0.0, 1.0, 0.5], 44100);
        assert_eq!(sample.interpolate(0.0), 0.0);
        assert!((sample.interpolate(0.5) - 0.5).abs() < 1e-6);
        assert!((sample.interpolate(1.5) - 0.75).abs() < 1e-6);
        // Last defined sample interpolates towards zero
        assert!((sample.interpolate(2.5) - 0.25).abs() < 1e-6);
        assert_eq!(sample.interpolate(10.0), 0.0);
    }
}
