//! Lock-free transport shared between control and audio threads

use std::sync::atomic::{AtomicI64, AtomicU16, AtomicU32, AtomicU64, AtomicU8, Ordering};

use crate::types::{SampleCount, SAMPLE_RATE};

/// Tempo range
pub const MIN_BPM: f64 = 20.0;
pub const MAX_BPM: f64 = 999.0;
pub const DEFAULT_BPM: f64 = 120.0;

/// 4/4
pub const DEFAULT_TIME_SIGNATURE: (u8, u8) = (4, 4);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl TransportState {
    fn as_u8(self) -> u8 {
        match self {
            TransportState::Stopped => 0,
            TransportState::Playing => 1,
            TransportState::Paused => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => TransportState::Playing,
            2 => TransportState::Paused,
            _ => TransportState::Stopped,
        }
    }
}

/// Play state, position, tempo, time signature and sample rate
///
/// Every field is an atomic so the UI can read the playhead without locking
/// while the audio thread advances it.
pub struct Transport {
    state: AtomicU8,
    position: AtomicI64,
    /// f64 bits
    bpm: AtomicU64,
    /// numerator << 8 | denominator
    time_signature: AtomicU16,
    sample_rate: AtomicU32,
}

#[inline]
fn pack_time_signature((numerator, denominator): (u8, u8)) -> u16 {
    (numerator as u16) << 8 | denominator as u16
}

impl Transport {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            state: AtomicU8::new(TransportState::Stopped.as_u8()),
            position: AtomicI64::new(0),
            bpm: AtomicU64::new(DEFAULT_BPM.to_bits()),
            time_signature: AtomicU16::new(pack_time_signature(DEFAULT_TIME_SIGNATURE)),
            sample_rate: AtomicU32::new(sample_rate.max(1)),
        }
    }

    #[inline]
    pub fn state(&self) -> TransportState {
        TransportState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.state() == TransportState::Playing
    }

    pub fn play(&self) {
        self.state.store(TransportState::Playing.as_u8(), Ordering::Release);
    }

    /// Stop advancing, keep the position
    pub fn pause(&self) {
        self.state.store(TransportState::Paused.as_u8(), Ordering::Release);
    }

    /// Stop and return to the start
    pub fn stop(&self) {
        self.state.store(TransportState::Stopped.as_u8(), Ordering::Release);
        self.position.store(0, Ordering::Release);
    }

    /// Move the playhead; negative positions clamp to 0
    pub fn seek(&self, position: SampleCount) {
        self.position.store(position.max(0), Ordering::Release);
    }

    #[inline]
    pub fn position(&self) -> SampleCount {
        self.position.load(Ordering::Acquire)
    }

    /// Advance by `samples` if playing; returns whether the playhead moved
    pub fn advance(&self, samples: SampleCount) -> bool {
        if !self.is_playing() || samples <= 0 {
            return false;
        }
        self.position.fetch_add(samples, Ordering::AcqRel);
        true
    }

    pub fn bpm(&self) -> f64 {
        f64::from_bits(self.bpm.load(Ordering::Relaxed))
    }

    /// Set the tempo, clamped to `MIN_BPM..=MAX_BPM`
    pub fn set_bpm(&self, bpm: f64) {
        let bpm = if bpm.is_finite() { bpm.clamp(MIN_BPM, MAX_BPM) } else { DEFAULT_BPM };
        self.bpm.store(bpm.to_bits(), Ordering::Relaxed);
    }

    /// `(beats per bar, note value of one beat)`
    pub fn time_signature(&self) -> (u8, u8) {
        let packed = self.time_signature.load(Ordering::Relaxed);
        ((packed >> 8) as u8, packed as u8)
    }

    /// Set the time signature; both parts are at least 1
    ///
    /// Only the numerator affects bar counting. A beat is always one tempo
    /// beat, whatever the denominator.
    pub fn set_time_signature(&self, numerator: u8, denominator: u8) {
        let packed = pack_time_signature((numerator.max(1), denominator.max(1)));
        self.time_signature.store(packed, Ordering::Relaxed);
    }

    /// Position of beat `beat` within its bar, 0 being the downbeat
    pub fn beat_in_bar(&self, beat: i64) -> u32 {
        let (numerator, _) = self.time_signature();
        beat.rem_euclid(numerator as i64) as u32
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    pub fn set_sample_rate(&self, sample_rate: u32) {
        self.sample_rate.store(sample_rate.max(1), Ordering::Relaxed);
    }

    /// Samples per beat at the current tempo
    pub fn samples_per_beat(&self) -> f64 {
        self.sample_rate() as f64 * 60.0 / self.bpm()
    }

    pub fn samples_to_beats(&self, samples: SampleCount) -> f64 {
        samples as f64 / self.samples_per_beat()
    }

    /// Beats to samples, rounded to the nearest sample
    pub fn beats_to_samples(&self, beats: f64) -> SampleCount {
        (beats * self.samples_per_beat()).round() as SampleCount
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(SAMPLE_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let transport = Transport::default();
        assert_eq!(transport.state(), TransportState::Stopped);
        assert_eq!(transport.position(), 0);
        assert_eq!(transport.bpm(), DEFAULT_BPM);
        assert_eq!(transport.time_signature(), (4, 4));
        assert_eq!(transport.sample_rate(), 44100);
    }

    #[test]
    fn test_advance_only_while_playing() {
        let transport = Transport::default();
        assert!(!transport.advance(512));
        assert_eq!(transport.position(), 0);

        transport.play();
        assert!(transport.advance(512));
        assert!(transport.advance(512));
        assert_eq!(transport.position(), 1024);

        transport.pause();
        assert!(!transport.advance(512));
        assert_eq!(transport.position(), 1024);
        assert_eq!(transport.state(), TransportState::Paused);
    }

    #[test]
    fn test_stop_resets_position() {
        let transport = Transport::default();
        transport.play();
        transport.advance(1000);
        transport.stop();
        assert_eq!(transport.position(), 0);
        assert!(!transport.is_playing());
    }

    #[test]
    fn test_seek_clamps_negative() {
        let transport = Transport::default();
        transport.seek(5000);
        assert_eq!(transport.position(), 5000);
        transport.seek(-10);
        assert_eq!(transport.position(), 0);
    }

    #[test]
    fn test_bpm_clamping() {
        let transport = Transport::default();
        transport.set_bpm(140.0);
        assert_eq!(transport.bpm(), 140.0);
        transport.set_bpm(5.0);
        assert_eq!(transport.bpm(), MIN_BPM);
        transport.set_bpm(5000.0);
        assert_eq!(transport.bpm(), MAX_BPM);
        transport.set_bpm(f64::NAN);
        assert_eq!(transport.bpm(), DEFAULT_BPM);
    }

    #[test]
    fn test_beat_conversion() {
        let transport = Transport::new(48000);
        transport.set_bpm(120.0);
        // 120 BPM at 48 kHz: 24000 samples per beat
        assert_eq!(transport.beats_to_samples(1.0), 24000);
        assert_eq!(transport.beats_to_samples(4.5), 108_000);
        assert!((transport.samples_to_beats(36000) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_time_signature() {
        let transport = Transport::default();
        transport.set_time_signature(7, 8);
        assert_eq!(transport.time_signature(), (7, 8));
        assert_eq!(transport.beat_in_bar(0), 0);
        assert_eq!(transport.beat_in_bar(6), 6);
        assert_eq!(transport.beat_in_bar(7), 0);
        assert_eq!(transport.beat_in_bar(-1), 6);

        transport.set_time_signature(0, 0);
        assert_eq!(transport.time_signature(), (1, 1));
        assert_eq!(transport.beat_in_bar(5), 0);
    }
}
