//! Polyphonic sample-playback synthesizer
//!
//! A fixed pool of [`VOICE_COUNT`] voices plays one shared mono sample,
//! resampled by linear interpolation at `2^((note - 69) / 12)`. Voices are
//! never allocated after construction: a repeated note retriggers its voice
//! and a full pool steals the voice that has spent the fewest samples in its
//! current envelope phase.
//!
//! Everything on [`Synth`] except construction and `set_sample` is meant for
//! the audio thread. The control thread talks to it through a
//! [`NoteSender`].

mod envelope;
mod queue;
mod sample;

pub use envelope::{Envelope, EnvelopePhase, EnvelopeTimes};
pub use queue::{note_queue, NoteEvent, NoteReceiver, NoteSender, NOTE_QUEUE_CAPACITY};
pub use sample::MonoSample;

use basedrop::Shared;
use serde::{Deserialize, Serialize};

use crate::engine::gc::gc_handle;
use crate::types::Sample;

/// Size of the voice pool
pub const VOICE_COUNT: usize = 16;

/// Note number that plays the sample at its recorded pitch
pub const REFERENCE_NOTE: u8 = 69;

/// Engine-wide synth parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthSettings {
    pub attack_secs: f32,
    pub decay_secs: f32,
    /// Level held during sustain (0.0 - 1.0)
    pub sustain_level: f32,
    pub release_secs: f32,
    /// Fixed output scalar applied to every voice
    pub headroom: f32,
}

impl Default for SynthSettings {
    fn default() -> Self {
        Self {
            attack_secs: 0.01,
            decay_secs: 0.1,
            sustain_level: 0.7,
            release_secs: 0.3,
            headroom: 0.5,
        }
    }
}

/// Resampling ratio for a note relative to [`REFERENCE_NOTE`]
#[inline]
pub fn pitch_ratio(note: u8) -> f64 {
    2.0_f64.powf((note as f64 - REFERENCE_NOTE as f64) / 12.0)
}

#[derive(Default)]
struct Voice {
    active: bool,
    note: u8,
    velocity: f32,
    /// Fractional read position into `sample`
    position: f64,
    phase_inc: f64,
    envelope: Envelope,
    sample: Option<Shared<MonoSample>>,
}

/// Read-only view of one voice, for inspection and metering
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceInfo {
    pub index: usize,
    pub note: u8,
    pub velocity: f32,
    pub pitch_ratio: f64,
    pub phase: EnvelopePhase,
}

pub struct Synth {
    voices: [Voice; VOICE_COUNT],
    /// Voice index for each note currently held
    note_map: [Option<u8>; 256],
    sample: Shared<MonoSample>,
    times: EnvelopeTimes,
    headroom: f32,
    sample_rate: u32,
}

impl Synth {
    /// Synth playing the built-in tone
    pub fn new(sample_rate: u32, settings: SynthSettings) -> Self {
        let sample = Shared::new(&gc_handle(), MonoSample::default_tone(sample_rate));
        Self::with_sample(sample_rate, settings, sample)
    }

    pub fn with_sample(sample_rate: u32, settings: SynthSettings, sample: Shared<MonoSample>) -> Self {
        Self {
            voices: std::array::from_fn(|_| Voice::default()),
            note_map: [None; 256],
            sample,
            times: EnvelopeTimes::new(&settings, sample_rate),
            headroom: settings.headroom,
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Replace the sample used by subsequent notes
    ///
    /// Sounding voices finish on the sample they started with.
    pub fn set_sample(&mut self, sample: Shared<MonoSample>) {
        self.sample = sample;
    }

    pub fn sample(&self) -> &MonoSample {
        &self.sample
    }

    // ─────────────────────────────────────────────────────────────
    // Note handling
    // ─────────────────────────────────────────────────────────────

    /// Apply everything pending on the note queue
    pub fn drain(&mut self, receiver: &mut NoteReceiver) {
        while let Some(event) = receiver.pop() {
            self.handle_event(event);
        }
    }

    pub fn handle_event(&mut self, event: NoteEvent) {
        match event {
            NoteEvent::On { note, velocity } => self.note_on(note, velocity),
            NoteEvent::Off { note } => self.note_off(note),
            NoteEvent::AllOff => self.all_notes_off(),
        }
    }

    pub fn note_on(&mut self, note: u8, velocity: f32) {
        let velocity = velocity.clamp(0.0, 1.0);

        if let Some(index) = self.mapped_voice(note) {
            let voice = &mut self.voices[index];
            voice.velocity = velocity;
            voice.position = 0.0;
            voice.envelope.trigger();
            return;
        }

        let index = self.free_voice().unwrap_or_else(|| self.steal_voice());

        // Detach whatever note the voice was playing before
        let old_note = self.voices[index].note as usize;
        if self.note_map[old_note] == Some(index as u8) {
            self.note_map[old_note] = None;
        }

        let voice = &mut self.voices[index];
        voice.active = true;
        voice.note = note;
        voice.velocity = velocity;
        voice.position = 0.0;
        voice.phase_inc = pitch_ratio(note);
        voice.sample = Some(self.sample.clone());
        voice.envelope.trigger();

        self.note_map[note as usize] = Some(index as u8);
    }

    /// Move the note's voice into release. The voice keeps sounding until
    /// its envelope reaches zero.
    pub fn note_off(&mut self, note: u8) {
        if let Some(index) = self.note_map[note as usize].take() {
            self.voices[index as usize].envelope.release();
        }
    }

    pub fn all_notes_off(&mut self) {
        self.note_map = [None; 256];
        for voice in self.voices.iter_mut().filter(|v| v.active) {
            voice.envelope.release();
        }
    }

    /// Silence and free every voice immediately
    pub fn reset(&mut self) {
        self.note_map = [None; 256];
        for voice in &mut self.voices {
            voice.active = false;
            voice.envelope.reset();
            voice.sample = None;
        }
    }

    fn mapped_voice(&self, note: u8) -> Option<usize> {
        let index = self.note_map[note as usize]? as usize;
        let voice = &self.voices[index];
        (voice.active && voice.note == note).then_some(index)
    }

    fn free_voice(&self) -> Option<usize> {
        self.voices.iter().position(|v| !v.active)
    }

    /// Active voice with the least progress in its envelope phase.
    /// Ties go to the lowest index.
    fn steal_voice(&self) -> usize {
        self.voices
            .iter()
            .enumerate()
            .min_by_key(|(_, v)| v.envelope.phase().progress())
            .map_or(0, |(index, _)| index)
    }

    // ─────────────────────────────────────────────────────────────
    // Rendering
    // ─────────────────────────────────────────────────────────────

    /// Add all active voices into `left` and `right`
    pub fn render(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        let num_samples = left.len().min(right.len());
        let gain_scale = self.headroom;
        let times = self.times;

        for (index, voice) in self.voices.iter_mut().enumerate() {
            if !voice.active {
                continue;
            }

            let Some(sample) = voice.sample.as_ref().filter(|s| !s.is_empty()) else {
                voice.active = false;
                voice.envelope.reset();
                continue;
            };
            let length = sample.len() as f64;

            for i in 0..num_samples {
                let value = sample.interpolate(voice.position);
                let level = voice.envelope.next_level(&times);
                let out = value * voice.velocity * level * gain_scale;
                left[i] += out;
                right[i] += out;

                voice.position += voice.phase_inc;
                if voice.position >= length {
                    voice.position %= length;
                }

                if voice.envelope.is_idle() {
                    voice.active = false;
                    break;
                }
            }

            if !voice.active {
                voice.sample = None;
                let slot = &mut self.note_map[voice.note as usize];
                if *slot == Some(index as u8) {
                    *slot = None;
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Inspection
    // ─────────────────────────────────────────────────────────────

    pub fn active_voice_count(&self) -> usize {
        self.voices.iter().filter(|v| v.active).count()
    }

    /// Voice currently mapped to `note`
    pub fn voice_for_note(&self, note: u8) -> Option<VoiceInfo> {
        self.mapped_voice(note).map(|index| self.voice_info(index))
    }

    /// All active voices in pool order
    pub fn active_voices(&self) -> impl Iterator<Item = VoiceInfo> + '_ {
        (0..VOICE_COUNT)
            .filter(|&i| self.voices[i].active)
            .map(|i| self.voice_info(i))
    }

    fn voice_info(&self, index: usize) -> VoiceInfo {
        let voice = &self.voices[index];
        VoiceInfo {
            index,
            note: voice.note,
            velocity: voice.velocity,
            pitch_ratio: voice.phase_inc,
            phase: voice.envelope.phase(),
        }
    }
}
