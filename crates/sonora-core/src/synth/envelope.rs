//! ADSR envelope state machine
//!
//! Each phase carries its own progress counter, so "where in the envelope is
//! this voice" is always unambiguous and comparable between voices.
//!
//! A ramp of `n` samples emits `n` levels ending exactly on its target, and
//! the phase changes on that same sample.

use super::SynthSettings;

/// Current envelope phase and the samples spent in it
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum EnvelopePhase {
    /// Silent; initial state and terminal state until retriggered
    #[default]
    Idle,
    Attack { elapsed: u32 },
    Decay { elapsed: u32 },
    Sustain { held: u32 },
    Release { start_level: f32, elapsed: u32 },
}

impl EnvelopePhase {
    /// Samples spent in the current phase
    pub fn progress(&self) -> u32 {
        match *self {
            EnvelopePhase::Idle => 0,
            EnvelopePhase::Attack { elapsed }
            | EnvelopePhase::Decay { elapsed }
            | EnvelopePhase::Release { elapsed, .. } => elapsed,
            EnvelopePhase::Sustain { held } => held,
        }
    }
}

/// Envelope timings converted to samples for one sample rate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeTimes {
    pub attack: u32,
    pub decay: u32,
    pub sustain_level: f32,
    pub release: u32,
}

impl EnvelopeTimes {
    pub fn new(settings: &SynthSettings, sample_rate: u32) -> Self {
        // At least one sample per ramp keeps every division defined
        let to_samples = |secs: f32| ((secs.max(0.0) * sample_rate as f32).round() as u32).max(1);
        Self {
            attack: to_samples(settings.attack_secs),
            decay: to_samples(settings.decay_secs),
            sustain_level: settings.sustain_level.clamp(0.0, 1.0),
            release: to_samples(settings.release_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Envelope {
    phase: EnvelopePhase,
    level: f32,
}

impl Envelope {
    #[inline]
    pub fn phase(&self) -> EnvelopePhase {
        self.phase
    }

    /// Level produced by the most recent `next_level` call
    #[inline]
    pub fn level(&self) -> f32 {
        self.level
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.phase == EnvelopePhase::Idle
    }

    /// Restart from the beginning of the attack ramp
    pub fn trigger(&mut self) {
        self.phase = EnvelopePhase::Attack { elapsed: 0 };
        self.level = 0.0;
    }

    /// Ramp down from whatever level the envelope is at now
    pub fn release(&mut self) {
        if !self.is_idle() {
            self.phase = EnvelopePhase::Release {
                start_level: self.level,
                elapsed: 0,
            };
        }
    }

    pub fn reset(&mut self) {
        self.phase = EnvelopePhase::Idle;
        self.level = 0.0;
    }

    /// Produce one sample of envelope and advance the state machine
    pub fn next_level(&mut self, times: &EnvelopeTimes) -> f32 {
        match self.phase {
            EnvelopePhase::Idle => {
                self.level = 0.0;
            }
            EnvelopePhase::Attack { elapsed } => {
                let elapsed = elapsed + 1;
                self.level = (elapsed as f32 / times.attack as f32).min(1.0);
                self.phase = if elapsed >= times.attack {
                    EnvelopePhase::Decay { elapsed: 0 }
                } else {
                    EnvelopePhase::Attack { elapsed }
                };
            }
            EnvelopePhase::Decay { elapsed } => {
                let elapsed = elapsed + 1;
                let t = (elapsed as f32 / times.decay as f32).min(1.0);
                self.level = 1.0 - (1.0 - times.sustain_level) * t;
                self.phase = if elapsed >= times.decay {
                    EnvelopePhase::Sustain { held: 0 }
                } else {
                    EnvelopePhase::Decay { elapsed }
                };
            }
            EnvelopePhase::Sustain { held } => {
                self.level = times.sustain_level;
                self.phase = EnvelopePhase::Sustain {
                    held: held.saturating_add(1),
                };
            }
            EnvelopePhase::Release {
                start_level,
                elapsed,
            } => {
                let elapsed = elapsed + 1;
                if elapsed >= times.release {
                    self.level = 0.0;
                    self.phase = EnvelopePhase::Idle;
                } else {
                    self.level = start_level * (1.0 - elapsed as f32 / times.release as f32);
                    self.phase = EnvelopePhase::Release { start_level, elapsed };
                }
            }
        }
        self.level
    }
}
