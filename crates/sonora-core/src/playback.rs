//! Single-track playback slot
//!
//! One writer (the control thread) publishes decoded buffers; one reader (the
//! audio thread) mixes the current buffer into its output every block.
//!
//! The buffer reference lives in a `basedrop::SharedCell`. Publishing swaps
//! the pointer and waits for readers that are mid-`get`, and the retired
//! buffer is finally freed on the GC thread once the audio thread drops its
//! last reference. Gain and mute are plain atomics with no ordering
//! relationship to the buffer.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use basedrop::{Shared, SharedCell};

use crate::asset::{AssetResult, AudioBuffer, AudioDecoder};
use crate::engine::gc::gc_handle;
use crate::types::{Sample, SampleCount};

/// Lock-free track slot shared between control and audio threads
pub struct TrackPlayback {
    data: SharedCell<Option<AudioBuffer>>,
    /// Linear gain stored as `f32` bits
    gain: AtomicU32,
    muted: AtomicBool,
}

impl TrackPlayback {
    pub fn new() -> Self {
        Self {
            data: SharedCell::new(Shared::new(&gc_handle(), None)),
            gain: AtomicU32::new(1.0_f32.to_bits()),
            muted: AtomicBool::new(false),
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Control thread
    // ─────────────────────────────────────────────────────────────

    /// Publish a new buffer, replacing the current one
    pub fn load(&self, buffer: AudioBuffer) {
        log::info!(
            "Track load: {} frames, {} channels, {}Hz",
            buffer.len(),
            buffer.num_channels(),
            buffer.sample_rate()
        );
        self.publish(Some(buffer));
    }

    /// Decode `path` and publish the result
    ///
    /// On failure nothing is published and the previous buffer stays live.
    pub fn load_file(&self, path: &Path, decoder: &dyn AudioDecoder) -> AssetResult<()> {
        match decoder.decode(path) {
            Ok(buffer) => {
                self.load(buffer);
                Ok(())
            }
            Err(e) => {
                log::warn!("Track load failed for {:?}: {}", path, e);
                Err(e)
            }
        }
    }

    /// Clear the slot to "no data"
    pub fn unload(&self) {
        log::info!("Track unload");
        self.publish(None);
    }

    fn publish(&self, buffer: Option<AudioBuffer>) {
        // `replace` returns only once no reader is mid-`get` on the old pointer;
        // any reader still holding it keeps it alive until its own drop
        let retired = self.data.replace(Shared::new(&gc_handle(), buffer));
        drop(retired);
    }

    pub fn set_gain(&self, gain: f32) {
        self.gain.store(gain.to_bits(), Ordering::Relaxed);
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    // ─────────────────────────────────────────────────────────────
    // Lock-free getters
    // ─────────────────────────────────────────────────────────────

    #[inline]
    pub fn gain(&self) -> f32 {
        f32::from_bits(self.gain.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    /// Length of the current buffer in frames (0 when empty)
    pub fn len(&self) -> usize {
        self.with_buffer(|b| b.map_or(0, AudioBuffer::len))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample rate of the current buffer (0 when empty)
    pub fn sample_rate(&self) -> u32 {
        self.with_buffer(|b| b.map_or(0, AudioBuffer::sample_rate))
    }

    /// Channel count of the current buffer (0 when empty)
    pub fn num_channels(&self) -> usize {
        self.with_buffer(|b| b.map_or(0, AudioBuffer::num_channels))
    }

    pub fn is_loaded(&self) -> bool {
        self.with_buffer(|b| b.is_some())
    }

    fn with_buffer<R>(&self, f: impl FnOnce(Option<&AudioBuffer>) -> R) -> R {
        let snapshot = self.data.get();
        f(Option::as_ref(&*snapshot))
    }

    // ─────────────────────────────────────────────────────────────
    // Audio thread
    // ─────────────────────────────────────────────────────────────

    /// Add this track into `left`/`right` starting at `transport_position`
    ///
    /// Realtime safe: no allocation, no locking. Frames whose absolute
    /// position falls outside the buffer are left untouched.
    pub fn process(&self, left: &mut [Sample], right: &mut [Sample], transport_position: SampleCount) {
        if self.is_muted() {
            return;
        }

        // Holding `snapshot` pins this buffer for the whole block
        let snapshot = self.data.get();
        let Some(buffer) = Option::as_ref(&*snapshot) else {
            return;
        };
        if buffer.is_empty() {
            return;
        }

        let gain = self.gain();
        let num_samples = left.len().min(right.len()) as SampleCount;
        let length = buffer.len() as SampleCount;

        // Block-relative range whose absolute positions land in [0, length)
        let first = (-transport_position).clamp(0, num_samples);
        let last = (length - transport_position).clamp(0, num_samples);
        if first >= last {
            return;
        }

        let (src_left, src_right) = buffer.stereo_pair();
        for i in first..last {
            let pos = (transport_position + i) as usize;
            let i = i as usize;
            left[i] += src_left[pos] * gain;
            right[i] += src_right[pos] * gain;
        }
    }
}

impl Default for TrackPlayback {
    fn default() -> Self {
        Self::new()
    }
}
