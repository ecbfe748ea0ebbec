//! Device output through CPAL
//!
//! ```ignore
//! use sonora_core::audio::{start_output, AudioConfig};
//!
//! let (audio, mut engine) = start_output(&AudioConfig::default(), 44100, Default::default())?;
//! engine.publish_session(session);
//! engine.play();
//! ```

mod config;
mod cpal_backend;
mod device;
mod error;

pub use config::{AudioConfig, BufferSize, DEFAULT_BUFFER_SIZE, MIN_BUFFER_SIZE};
pub use cpal_backend::{start_output, AudioHandle};
pub use device::{find_output_device, output_device_names};
pub use error::{AudioError, AudioResult};
