//! Audio output configuration

use serde::{Deserialize, Serialize};

/// Buffer size used when none is requested (frames)
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Smallest fixed buffer size accepted (frames)
pub const MIN_BUFFER_SIZE: u32 = 64;

/// Preferred buffer size for the output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BufferSize {
    /// Let the device choose
    #[default]
    Default,
    /// Request a specific size in frames (clamped, may still be adjusted by the device)
    Fixed(u32),
}

impl BufferSize {
    /// Buffer size in frames, or `None` for the device default
    pub fn as_frames(&self) -> Option<u32> {
        match self {
            BufferSize::Default => None,
            BufferSize::Fixed(frames) => {
                Some((*frames).clamp(MIN_BUFFER_SIZE, crate::types::MAX_BLOCK_SIZE as u32))
            }
        }
    }

    /// Output latency in milliseconds at `sample_rate`
    pub fn latency_ms(&self, sample_rate: u32) -> f32 {
        let frames = self.as_frames().unwrap_or(DEFAULT_BUFFER_SIZE);
        frames as f32 / sample_rate as f32 * 1000.0
    }
}

/// Configuration for the output device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device name (None = system default)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,

    pub buffer_size: BufferSize,
}

impl AudioConfig {
    pub fn with_device(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    pub fn with_buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_size = BufferSize::Fixed(frames);
        self
    }
}
