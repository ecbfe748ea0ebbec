//! Configuration: engine settings, bounce job files and YAML I/O
//!
//! ```ignore
//! use sonora_core::config::{default_config_path, load_config, EngineConfig};
//!
//! let config: EngineConfig = load_config(&default_config_path());
//! ```

mod engine;
mod io;
mod job;
mod paths;

pub use engine::EngineConfig;
pub use io::{load_config, save_config};
pub use job::{BounceJob, ClipJob, MasterJob, MidiClipJob, TrackJob};
pub use paths::{default_config_dir, default_config_path};
