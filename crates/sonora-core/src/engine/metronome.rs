//! Metronome click mixed into the live output while the transport plays
//!
//! A click starts on the first sample of every beat. The first beat of each
//! bar is pitched higher than the others. Clicks are short decaying sines
//! added on top of whatever the block already holds.

use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use super::transport::Transport;
use crate::types::{Sample, SampleCount};

/// Click length in samples
pub const CLICK_LENGTH: u32 = 2000;
/// Click pitch on the first beat of a bar
pub const DOWNBEAT_FREQUENCY: f64 = 1200.0;
/// Click pitch on every other beat
pub const BEAT_FREQUENCY: f64 = 800.0;
pub const DEFAULT_METRONOME_GAIN: f32 = 0.5;

/// Metronome settings shared by the control and audio threads
pub struct MetronomeControls {
    enabled: AtomicBool,
    /// f32 bits
    gain: AtomicU32,
}

impl MetronomeControls {
    /// Disabled, at the default gain
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            gain: AtomicU32::new(DEFAULT_METRONOME_GAIN.to_bits()),
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    #[inline]
    pub fn gain(&self) -> f32 {
        f32::from_bits(self.gain.load(Ordering::Relaxed))
    }

    /// Linear click gain, clamped to [0, 1]
    pub fn set_gain(&self, gain: f32) {
        let gain = if gain.is_finite() { gain.clamp(0.0, 1.0) } else { DEFAULT_METRONOME_GAIN };
        self.gain.store(gain.to_bits(), Ordering::Relaxed);
    }
}

impl Default for MetronomeControls {
    fn default() -> Self {
        Self::new()
    }
}

/// Index of the beat that starts exactly at `position`, if any
#[inline]
fn beat_onset(position: SampleCount, samples_per_beat: f64) -> Option<i64> {
    let beat = (position as f64 / samples_per_beat).floor() as i64;
    let previous = ((position - 1) as f64 / samples_per_beat).floor() as i64;
    (beat != previous).then_some(beat)
}

/// Audio-thread click generator
pub struct Metronome {
    controls: Arc<MetronomeControls>,
    /// Samples left in the sounding click
    remaining: u32,
    /// Radians per sample of the sounding click
    step: f64,
    phase: f64,
}

impl Metronome {
    pub fn new(controls: Arc<MetronomeControls>) -> Self {
        Self {
            controls,
            remaining: 0,
            step: 0.0,
            phase: 0.0,
        }
    }

    pub fn controls(&self) -> &Arc<MetronomeControls> {
        &self.controls
    }

    #[inline]
    pub fn is_clicking(&self) -> bool {
        self.remaining > 0
    }

    /// Cut any sounding click
    pub fn reset(&mut self) {
        self.remaining = 0;
        self.phase = 0.0;
    }

    /// Add the clicks of the block starting at `position` into `left`/`right`
    ///
    /// Silent, and any sounding click is cut, while the transport is not
    /// playing or the metronome is disabled.
    pub fn process(
        &mut self,
        left: &mut [Sample],
        right: &mut [Sample],
        transport: &Transport,
        position: SampleCount,
    ) {
        if !transport.is_playing() || !self.controls.is_enabled() {
            self.reset();
            return;
        }

        let gain = self.controls.gain();
        let samples_per_beat = transport.samples_per_beat();
        let sample_rate = transport.sample_rate() as f64;
        let len = left.len().min(right.len());

        for i in 0..len {
            if let Some(beat) = beat_onset(position + i as SampleCount, samples_per_beat) {
                let frequency = if transport.beat_in_bar(beat) == 0 {
                    DOWNBEAT_FREQUENCY
                } else {
                    BEAT_FREQUENCY
                };
                self.step = TAU * frequency / sample_rate;
                self.phase = 0.0;
                self.remaining = CLICK_LENGTH;
            }
            if self.remaining == 0 {
                continue;
            }

            let envelope = self.remaining as f32 / CLICK_LENGTH as f32;
            let click = self.phase.sin() as f32 * gain * envelope * envelope;
            left[i] += click;
            right[i] += click;
            self.phase += self.step;
            self.remaining -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 120 BPM at 44.1 kHz: 22050 samples per beat
    const BEAT: usize = 22050;

    fn playing_transport() -> Transport {
        let transport = Transport::new(44100);
        transport.set_bpm(120.0);
        transport.play();
        transport
    }

    fn enabled_metronome() -> Metronome {
        let controls = Arc::new(MetronomeControls::new());
        controls.set_enabled(true);
        Metronome::new(controls)
    }

    fn run(metronome: &mut Metronome, transport: &Transport, position: SampleCount, len: usize) -> Vec<f32> {
        let mut left = vec![0.0; len];
        let mut right = vec![0.0; len];
        metronome.process(&mut left, &mut right, transport, position);
        assert_eq!(left, right);
        left
    }

    /// Expected value `n` samples into a click at `frequency`
    fn click_at(n: u32, frequency: f64) -> f32 {
        let envelope = (CLICK_LENGTH - n) as f32 / CLICK_LENGTH as f32;
        (TAU * frequency / 44100.0 * n as f64).sin() as f32 * DEFAULT_METRONOME_GAIN * envelope * envelope
    }

    #[test]
    fn test_beat_onset() {
        assert_eq!(beat_onset(0, 100.0), Some(0));
        assert_eq!(beat_onset(1, 100.0), None);
        assert_eq!(beat_onset(99, 100.0), None);
        assert_eq!(beat_onset(100, 100.0), Some(1));
        // Fractional beat length: onset on the first sample past the boundary
        assert_eq!(beat_onset(101, 100.5), Some(1));
        assert_eq!(beat_onset(100, 100.5), None);
    }

    #[test]
    fn test_clicks_start_on_beat_boundaries() {
        let transport = playing_transport();
        let mut metronome = enabled_metronome();
        let out = run(&mut metronome, &transport, 0, BEAT * 2 + 100);

        for onset in [0, BEAT, BEAT * 2] {
            assert!(out[onset + 1].abs() > 1e-3, "no click at {}", onset);
            let end = (onset + CLICK_LENGTH as usize).min(out.len());
            assert!(out[onset..end].iter().any(|s| s.abs() > 0.1));
        }
        // Silent between clicks
        assert!(out[CLICK_LENGTH as usize..BEAT].iter().all(|&s| s == 0.0));
        assert!(out[BEAT + CLICK_LENGTH as usize..BEAT * 2].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_downbeat_is_accented() {
        let transport = playing_transport();
        transport.set_time_signature(3, 4);
        let mut metronome = enabled_metronome();
        let out = run(&mut metronome, &transport, 0, BEAT * 4 + 10);

        for n in [1, 10, 100] {
            assert!((out[n as usize] - click_at(n, DOWNBEAT_FREQUENCY)).abs() < 1e-5);
            assert!((out[BEAT + n as usize] - click_at(n, BEAT_FREQUENCY)).abs() < 1e-5);
            assert!((out[BEAT * 2 + n as usize] - click_at(n, BEAT_FREQUENCY)).abs() < 1e-5);
            // Beat 3 opens the second bar
            assert!((out[BEAT * 3 + n as usize] - click_at(n, DOWNBEAT_FREQUENCY)).abs() < 1e-5);
        }
    }

    #[test]
    fn test_click_continues_across_blocks() {
        let transport = playing_transport();
        let mut whole = enabled_metronome();
        let expected = run(&mut whole, &transport, 0, 4096);

        let mut blocks = enabled_metronome();
        let mut stitched = Vec::new();
        for block in 0..8 {
            stitched.extend(run(&mut blocks, &transport, block * 512, 512));
        }
        for (got, want) in stitched.iter().zip(&expected) {
            assert!((got - want).abs() < 1e-6);
        }
    }

    #[test]
    fn test_starting_mid_beat_waits_for_next_beat() {
        let transport = playing_transport();
        let mut metronome = enabled_metronome();
        let out = run(&mut metronome, &transport, 1000, BEAT);

        let next = BEAT - 1000;
        assert!(out[..next].iter().all(|&s| s == 0.0));
        assert!(out[next + 1].abs() > 1e-3);
    }

    #[test]
    fn test_silent_while_stopped_or_disabled() {
        let transport = Transport::new(44100);
        let mut metronome = enabled_metronome();
        assert!(run(&mut metronome, &transport, 0, 4096).iter().all(|&s| s == 0.0));

        transport.play();
        transport.pause();
        assert!(run(&mut metronome, &transport, 0, 4096).iter().all(|&s| s == 0.0));

        transport.play();
        metronome.controls().set_enabled(false);
        assert!(run(&mut metronome, &transport, 0, 4096).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_stop_cuts_sounding_click() {
        let transport = playing_transport();
        let mut metronome = enabled_metronome();
        run(&mut metronome, &transport, 0, 100);
        assert!(metronome.is_clicking());

        transport.stop();
        run(&mut metronome, &transport, 100, 100);
        assert!(!metronome.is_clicking());
    }

    #[test]
    fn test_gain_controls() {
        let controls = MetronomeControls::new();
        assert!(!controls.is_enabled());
        assert_eq!(controls.gain(), DEFAULT_METRONOME_GAIN);
        controls.set_gain(2.0);
        assert_eq!(controls.gain(), 1.0);
        controls.set_gain(-1.0);
        assert_eq!(controls.gain(), 0.0);
        controls.set_gain(f32::NAN);
        assert_eq!(controls.gain(), DEFAULT_METRONOME_GAIN);
    }
}
