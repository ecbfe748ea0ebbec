//! Decoded audio assets
//!
//! An [`AudioBuffer`] is the immutable, planar result of decoding a file.
//! Once built it is only ever read: track slots publish it to the audio
//! thread and clips share it through `Arc`.

mod decode;
mod error;
mod store;

pub use decode::{AudioDecoder, SymphoniaDecoder};
pub use error::{AssetError, AssetResult};
pub use store::AssetStore;

use crate::types::Sample;

/// Planar decoded audio
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<Sample>>,
    len: usize,
}

impl AudioBuffer {
    /// Build a buffer from per-channel sample vectors
    ///
    /// Fails when no channel is given or the channels differ in length.
    pub fn new(sample_rate: u32, channels: Vec<Vec<Sample>>) -> AssetResult<Self> {
        let len = match channels.first() {
            Some(first) => first.len(),
            None => return Err(AssetError::NoChannels),
        };

        if let Some((index, channel)) = channels.iter().enumerate().find(|(_, c)| c.len() != len) {
            return Err(AssetError::ChannelLengthMismatch {
                channel: index,
                expected: len,
                actual: channel.len(),
            });
        }

        Ok(Self {
            sample_rate,
            channels,
            len,
        })
    }

    /// Build a buffer from interleaved frames
    ///
    /// Fails when the sample count is not a whole number of frames.
    pub fn from_interleaved(
        sample_rate: u32,
        num_channels: usize,
        interleaved: &[Sample],
    ) -> AssetResult<Self> {
        if num_channels == 0 {
            return Err(AssetError::NoChannels);
        }
        if interleaved.len() % num_channels != 0 {
            return Err(AssetError::PartialFrame {
                samples: interleaved.len(),
                channels: num_channels,
            });
        }
        let frames = interleaved.len() / num_channels;
        let mut channels = vec![Vec::with_capacity(frames); num_channels];
        for frame in interleaved.chunks_exact(num_channels) {
            for (channel, &sample) in channels.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }
        Self::new(sample_rate, channels)
    }

    /// A zeroed buffer
    pub fn silence(sample_rate: u32, num_channels: usize, len: usize) -> Self {
        Self {
            sample_rate,
            channels: vec![vec![0.0; len]; num_channels.max(1)],
            len,
        }
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Length in frames
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Samples of one channel, `None` if the index is out of range
    #[inline]
    pub fn channel(&self, index: usize) -> Option<&[Sample]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Left and right source channels; mono assets return channel 0 twice
    #[inline]
    pub fn stereo_pair(&self) -> (&[Sample], &[Sample]) {
        let left = &self.channels[0];
        let right = self.channels.get(1).unwrap_or(left);
        (left, right)
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_channel_list() {
        assert!(matches!(
            AudioBuffer::new(44100, Vec::new()),
            Err(AssetError::NoChannels)
        ));
    }

    #[test]
    fn test_rejects_ragged_channels() {
        let result = AudioBuffer::new(44100, vec![vec![0.0; 4], vec![0.0; 3]]);
        assert!(matches!(
            result,
            Err(AssetError::ChannelLengthMismatch {
                channel: 1,
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_from_interleaved_splits_channels() {
        let buffer = AudioBuffer::from_interleaved(48000, 2, &[0.1, 0.2, 0.3, 0.4]).unwrap();
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.channel(0).unwrap(), &[0.1, 0.3]);
        assert_eq!(buffer.channel(1).unwrap(), &[0.2, 0.4]);
        assert_eq!(buffer.sample_rate(), 48000);
    }

    #[test]
    fn test_from_interleaved_rejects_partial_frame() {
        let result = AudioBuffer::from_interleaved(48000, 2, &[0.1, 0.2, 0.3]);
        assert!(matches!(
            result,
            Err(AssetError::PartialFrame {
                samples: 3,
                channels: 2
            })
        ));
        assert!(matches!(
            AudioBuffer::from_interleaved(48000, 3, &[]),
            Ok(ref buffer) if buffer.is_empty()
        ));
    }

    #[test]
    fn test_mono_stereo_pair_duplicates_channel_zero() {
        let buffer = AudioBuffer::new(44100, vec![vec![0.5, -0.5]]).unwrap();
        let (left, right) = buffer.stereo_pair();
        assert_eq!(left, right);
        assert!((buffer.duration_secs() - 2.0 / 44100.0).abs() < 1e-12);
    }
}
