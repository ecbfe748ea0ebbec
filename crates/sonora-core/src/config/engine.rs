//! Engine-wide settings

use serde::{Deserialize, Serialize};

use crate::audio::AudioConfig;
use crate::render::BounceSettings;
use crate::synth::SynthSettings;
use crate::types::{MAX_BLOCK_SIZE, SAMPLE_RATE};

/// Top-level engine configuration, stored as `engine.yaml`
///
/// Every field has a default, so partial files are fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: u32,
    /// Render block size in frames
    pub block_size: usize,
    pub audio: AudioConfig,
    pub synth: SynthSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            block_size: 512,
            audio: AudioConfig::default(),
            synth: SynthSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Bounce settings inheriting rate, block size and synth from this config
    pub fn bounce_settings(&self) -> BounceSettings {
        BounceSettings {
            sample_rate: self.sample_rate,
            block_size: self.block_size.clamp(1, MAX_BLOCK_SIZE),
            synth: self.synth,
            ..BounceSettings::default()
        }
    }
}
