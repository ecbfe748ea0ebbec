//! Audio output error types

use thiserror::Error;

/// Errors that can occur while opening the output device
#[derive(Error, Debug)]
pub enum AudioError {
    /// No output device on the default host
    #[error("No audio output device available")]
    NoDevice,

    /// Named device not found
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    /// Failed to enumerate devices or read their configuration
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// The device offers no f32 stereo configuration
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// Failed to build audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
