//! Asset error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building or decoding an audio asset
#[derive(Error, Debug)]
pub enum AssetError {
    /// A buffer needs at least one channel
    #[error("Audio buffer has no channels")]
    NoChannels,

    /// Planar channels must all be the same length
    #[error("Channel {channel} has {actual} samples, expected {expected}")]
    ChannelLengthMismatch {
        channel: usize,
        expected: usize,
        actual: usize,
    },

    /// Interleaved input must hold whole frames
    #[error("{samples} interleaved samples do not split into {channels}-channel frames")]
    PartialFrame { samples: usize, channels: usize },

    /// The file could not be opened
    #[error("Failed to open audio file {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The container or codec is not supported
    #[error("Unsupported audio file {path:?}: {reason}")]
    Unsupported { path: PathBuf, reason: String },

    /// Decoding started but failed
    #[error("Failed to decode {path:?}: {reason}")]
    Decode { path: PathBuf, reason: String },
}

/// Result type for asset operations
pub type AssetResult<T> = Result<T, AssetError>;
