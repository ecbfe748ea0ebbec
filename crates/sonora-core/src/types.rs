//! Common types for Sonora
//!
//! Sample positions, engine-wide constants and the pre-allocated stereo
//! block that every render path writes into.

/// Default sample rate used throughout Sonora
pub const SAMPLE_RATE: u32 = 44100;

/// Largest block any render path processes in one call.
/// Buffers are pre-allocated to this size so the audio thread never grows them.
pub const MAX_BLOCK_SIZE: usize = 8192;

/// Audio sample type (32-bit float for processing)
pub type Sample = f32;

/// Integer offset of an audio frame from a timeline or asset origin
pub type SampleCount = i64;

/// Convert decibels to a linear gain factor
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// A pair of planar channel buffers
///
/// Allocated once at `MAX_BLOCK_SIZE` capacity; `clear` only changes the
/// logical length and zeroes it, so reuse on the audio thread is
/// allocation-free.
#[derive(Debug, Clone)]
pub struct StereoBlock {
    left: Vec<Sample>,
    right: Vec<Sample>,
    len: usize,
}

impl StereoBlock {
    /// Create a block with room for `capacity` frames
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            left: vec![0.0; capacity],
            right: vec![0.0; capacity],
            len: 0,
        }
    }

    /// Zero the first `len` frames and make them the active region.
    /// `len` is clamped to the allocated capacity.
    pub fn clear(&mut self, len: usize) {
        let len = len.min(self.left.len());
        self.left[..len].fill(0.0);
        self.right[..len].fill(0.0);
        self.len = len;
    }

    /// Number of active frames
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Allocated frame capacity
    #[inline]
    pub fn capacity(&self) -> usize {
        self.left.len()
    }

    #[inline]
    pub fn left(&self) -> &[Sample] {
        &self.left[..self.len]
    }

    #[inline]
    pub fn right(&self) -> &[Sample] {
        &self.right[..self.len]
    }

    /// Mutable access to both active channels at once
    #[inline]
    pub fn channels_mut(&mut self) -> (&mut [Sample], &mut [Sample]) {
        (&mut self.left[..self.len], &mut self.right[..self.len])
    }

    /// Peak absolute value across both channels
    pub fn peak(&self) -> f32 {
        self.left()
            .iter()
            .chain(self.right())
            .fold(0.0_f32, |acc, s| acc.max(s.abs()))
    }
}

impl Default for StereoBlock {
    fn default() -> Self {
        Self::with_capacity(MAX_BLOCK_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_to_linear() {
        assert!((db_to_linear(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_linear(-6.0) - 0.501_187).abs() < 1e-5);
        assert!((db_to_linear(20.0) - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_block_clear_clamps_to_capacity() {
        let mut block = StereoBlock::with_capacity(16);
        block.clear(64);
        assert_eq!(block.len(), 16);
        assert!(block.left().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_block_reuse_zeroes_previous_content() {
        let mut block = StereoBlock::with_capacity(8);
        block.clear(8);
        {
            let (l, r) = block.channels_mut();
            l.fill(0.5);
            r.fill(-0.75);
        }
        assert!((block.peak() - 0.75).abs() < 1e-6);

        block.clear(4);
        assert_eq!(block.len(), 4);
        assert_eq!(block.peak(), 0.0);
    }
}
