//! Bounce job files
//!
//! A job describes one offline render: output path, format, the tracks with
//! their clips and notes, and automation lanes as point lists. Relative
//! file paths resolve against the directory holding the job file.
//!
//! ```yaml
//! output: mix.wav
//! render:
//!   bit_depth: 16
//! tracks:
//!   - name: drums
//!     gain_db: -3.0
//!     clips:
//!       - file: drums.wav
//!         start: 44100
//!   - name: keys
//!     pan_automation: keys/pan
//!     midi_clips:
//!       - start: 0
//!         notes:
//!           - { note: 60, start: 0, length: 22050 }
//! automation:
//!   keys/pan:
//!     - { position: 0, value: -1.0 }
//!     - { position: 88200, value: 1.0 }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::EngineConfig;
use crate::asset::AssetStore;
use crate::automation::{AutomationData, AutomationPoint, AutomationSnapshot, ParameterId};
use crate::render::BounceSettings;
use crate::session::{Clip, MidiClip, MidiNote, Session, Track};
use crate::types::SampleCount;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BounceJob {
    pub output: PathBuf,
    /// Format and range; taken from the engine config when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render: Option<BounceSettings>,
    #[serde(default)]
    pub master: MasterJob,
    #[serde(default)]
    pub tracks: Vec<TrackJob>,
    #[serde(default)]
    pub automation: BTreeMap<ParameterId, Vec<AutomationPoint>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterJob {
    pub gain_db: f32,
    pub pan: f32,
    pub gain_automation: Option<ParameterId>,
    pub pan_automation: Option<ParameterId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackJob {
    pub name: String,
    #[serde(default)]
    pub gain_db: f32,
    #[serde(default)]
    pub pan: f32,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub solo: bool,
    #[serde(default)]
    pub gain_automation: Option<ParameterId>,
    #[serde(default)]
    pub pan_automation: Option<ParameterId>,
    #[serde(default)]
    pub clips: Vec<ClipJob>,
    #[serde(default)]
    pub midi_clips: Vec<MidiClipJob>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipJob {
    pub file: PathBuf,
    /// Timeline position
    #[serde(default)]
    pub start: SampleCount,
    #[serde(default)]
    pub source_start: SampleCount,
    /// Defaults to the rest of the file after `source_start`
    #[serde(default)]
    pub source_length: Option<SampleCount>,
    #[serde(default)]
    pub fade_in: SampleCount,
    #[serde(default)]
    pub fade_out: SampleCount,
    #[serde(default)]
    pub gain_db: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiClipJob {
    #[serde(default)]
    pub start: SampleCount,
    #[serde(default)]
    pub notes: Vec<MidiNote>,
}

impl BounceJob {
    /// Parse a job file; unlike engine config, errors are not papered over
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read job file: {:?}", path))?;
        serde_yaml::from_str(&contents).with_context(|| format!("Failed to parse job file: {:?}", path))
    }

    pub fn settings(&self, engine: &EngineConfig) -> BounceSettings {
        self.render.unwrap_or_else(|| engine.bounce_settings())
    }

    pub fn automation(&self) -> AutomationSnapshot {
        AutomationSnapshot::from_data(&AutomationData {
            lanes: self.automation.clone(),
        })
    }

    pub fn output_path(&self, base_dir: &Path) -> PathBuf {
        resolve(base_dir, &self.output)
    }

    /// Decode every referenced file through `store` and assemble the session
    pub fn build_session(&self, store: &AssetStore, base_dir: &Path, sample_rate: u32) -> Result<Session> {
        let mut session = Session::new(sample_rate);
        session.master_gain_db = self.master.gain_db;
        session.master_pan = self.master.pan.clamp(-1.0, 1.0);
        session.master_gain_automation = self.master.gain_automation.clone();
        session.master_pan_automation = self.master.pan_automation.clone();

        for track_job in &self.tracks {
            let mut track = Track::new(track_job.name.clone());
            track.gain_db = track_job.gain_db;
            track.set_pan(track_job.pan);
            track.muted = track_job.muted;
            track.solo = track_job.solo;
            track.gain_automation = track_job.gain_automation.clone();
            track.pan_automation = track_job.pan_automation.clone();

            for clip_job in &track_job.clips {
                track.clips.push(clip_job.build(store, base_dir, sample_rate)?);
            }
            for midi in &track_job.midi_clips {
                track.midi_clips.push(MidiClip::new(midi.start, midi.notes.clone()));
            }

            session.add_track(track);
        }

        log::info!(
            "Job session: {} tracks, ends at sample {}",
            session.tracks.len(),
            session.end_sample()
        );
        Ok(session)
    }
}

impl ClipJob {
    fn build(&self, store: &AssetStore, base_dir: &Path, sample_rate: u32) -> Result<Clip> {
        let path = resolve(base_dir, &self.file);
        let asset: Arc<_> = store
            .load(&path)
            .with_context(|| format!("Failed to load clip {:?}", path))?;

        if asset.sample_rate() != sample_rate {
            log::warn!(
                "{:?} is {}Hz but the bounce runs at {}Hz; it will play at the wrong speed",
                path,
                asset.sample_rate(),
                sample_rate
            );
        }

        let source_start = self.source_start.max(0);
        let available = (asset.len() as SampleCount - source_start).max(0);
        let source_length = self.source_length.unwrap_or(available);

        Ok(Clip::new(asset)
            .at(self.start)
            .with_source(source_start, source_length)
            .with_fades(self.fade_in, self.fade_out)
            .with_gain_db(self.gain_db))
    }
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
