//! Timeline model consumed by the renderers
//!
//! A [`Session`] is built and edited by the caller between render passes and
//! handed to the mixer as a read-only snapshot. Clips share their decoded
//! asset through `Arc`, so copying a session for publication is cheap.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::asset::AudioBuffer;
use crate::automation::ParameterId;
use crate::types::{SampleCount, SAMPLE_RATE};

/// Placement of an audio asset on a track
#[derive(Debug, Clone)]
pub struct Clip {
    pub asset: Arc<AudioBuffer>,
    /// Timeline position of the clip's first sample
    pub timeline_start: SampleCount,
    /// Offset into the asset where playback begins
    pub source_start: SampleCount,
    /// Number of asset samples the clip plays
    pub source_length: SampleCount,
    pub fade_in: SampleCount,
    pub fade_out: SampleCount,
    pub gain_db: f32,
}

impl Clip {
    /// Clip playing the whole asset from timeline position 0
    pub fn new(asset: Arc<AudioBuffer>) -> Self {
        let source_length = asset.len() as SampleCount;
        Self {
            asset,
            timeline_start: 0,
            source_start: 0,
            source_length,
            fade_in: 0,
            fade_out: 0,
            gain_db: 0.0,
        }
    }

    pub fn at(mut self, timeline_start: SampleCount) -> Self {
        self.timeline_start = timeline_start;
        self
    }

    pub fn with_source(mut self, source_start: SampleCount, source_length: SampleCount) -> Self {
        self.source_start = source_start;
        self.source_length = source_length;
        self
    }

    pub fn with_fades(mut self, fade_in: SampleCount, fade_out: SampleCount) -> Self {
        self.fade_in = fade_in;
        self.fade_out = fade_out;
        self
    }

    pub fn with_gain_db(mut self, gain_db: f32) -> Self {
        self.gain_db = gain_db;
        self
    }

    /// Timeline position one past the clip's last sample
    #[inline]
    pub fn end(&self) -> SampleCount {
        self.timeline_start + self.source_length
    }
}

/// One note inside a MIDI clip, positioned relative to the clip start
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MidiNote {
    pub note: u8,
    #[serde(default = "default_velocity")]
    pub velocity: f32,
    pub start: SampleCount,
    pub length: SampleCount,
}

fn default_velocity() -> f32 {
    1.0
}

impl MidiNote {
    pub fn new(note: u8, velocity: f32, start: SampleCount, length: SampleCount) -> Self {
        Self {
            note,
            velocity,
            start,
            length,
        }
    }

    /// Clip-relative position of the note-off
    #[inline]
    pub fn end(&self) -> SampleCount {
        self.start + self.length
    }
}

/// Notes played by the synth, placed on a track
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MidiClip {
    pub timeline_start: SampleCount,
    pub notes: Vec<MidiNote>,
}

impl MidiClip {
    pub fn new(timeline_start: SampleCount, notes: Vec<MidiNote>) -> Self {
        Self {
            timeline_start,
            notes,
        }
    }

    /// Timeline position of the last note-off (clip start when empty)
    pub fn end(&self) -> SampleCount {
        self.timeline_start + self.notes.iter().map(MidiNote::end).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct Track {
    pub name: String,
    pub clips: Vec<Clip>,
    pub midi_clips: Vec<MidiClip>,
    pub gain_db: f32,
    /// Stereo position, -1.0 (left) to 1.0 (right)
    pub pan: f32,
    pub muted: bool,
    pub solo: bool,
    /// Lane overriding `gain_db` while one is registered
    pub gain_automation: Option<ParameterId>,
    /// Lane overriding `pan` while one is registered
    pub pan_automation: Option<ParameterId>,
}

impl Track {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clips: Vec::new(),
            midi_clips: Vec::new(),
            gain_db: 0.0,
            pan: 0.0,
            muted: false,
            solo: false,
            gain_automation: None,
            pan_automation: None,
        }
    }

    pub fn with_clip(mut self, clip: Clip) -> Self {
        self.clips.push(clip);
        self
    }

    pub fn with_midi_clip(mut self, clip: MidiClip) -> Self {
        self.midi_clips.push(clip);
        self
    }

    pub fn set_pan(&mut self, pan: f32) {
        self.pan = pan.clamp(-1.0, 1.0);
    }

    /// Latest clip end over audio and MIDI clips (0 when empty)
    pub fn end(&self) -> SampleCount {
        let audio = self.clips.iter().map(Clip::end);
        let midi = self.midi_clips.iter().map(MidiClip::end);
        audio.chain(midi).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub tracks: Vec<Track>,
    pub master_gain_db: f32,
    pub master_pan: f32,
    pub sample_rate: u32,
    pub master_gain_automation: Option<ParameterId>,
    pub master_pan_automation: Option<ParameterId>,
}

impl Session {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            tracks: Vec::new(),
            master_gain_db: 0.0,
            master_pan: 0.0,
            sample_rate,
            master_gain_automation: None,
            master_pan_automation: None,
        }
    }

    /// Append a track, returning its index
    pub fn add_track(&mut self, track: Track) -> usize {
        self.tracks.push(track);
        self.tracks.len() - 1
    }

    pub fn remove_track(&mut self, index: usize) -> Option<Track> {
        (index < self.tracks.len()).then(|| self.tracks.remove(index))
    }

    /// Move a track to a new index, shifting the others
    pub fn move_track(&mut self, from: usize, to: usize) -> bool {
        if from >= self.tracks.len() || to >= self.tracks.len() {
            return false;
        }
        let track = self.tracks.remove(from);
        self.tracks.insert(to, track);
        true
    }

    pub fn has_solo(&self) -> bool {
        self.tracks.iter().any(|t| t.solo)
    }

    /// Tracks that reach the mix: never muted ones, and only soloed ones
    /// while any track is soloed
    pub fn audible_tracks(&self) -> impl Iterator<Item = &Track> {
        let any_solo = self.has_solo();
        self.tracks
            .iter()
            .filter(move |t| !t.muted && (!any_solo || t.solo))
    }

    /// Latest clip end over all tracks (0 for an empty session)
    pub fn end_sample(&self) -> SampleCount {
        self.tracks.iter().map(Track::end).max().unwrap_or(0)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SAMPLE_RATE)
    }
}
