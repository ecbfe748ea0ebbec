//! Sonora Core - timeline mixing, sampler synth and offline bounce

pub mod asset;
pub mod audio;
pub mod automation;
pub mod config;
pub mod engine;
pub mod playback;
pub mod render;
pub mod session;
pub mod synth;
pub mod types;

pub use types::*;
