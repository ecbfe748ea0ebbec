//! Decode collaborator
//!
//! The engine only needs planar `f32` frames and a sample rate. Anything that
//! can produce those from a path implements [`AudioDecoder`]; the default
//! implementation is backed by symphonia.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::{AssetError, AssetResult, AudioBuffer};

/// Turns a file into an [`AudioBuffer`]
pub trait AudioDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> AssetResult<AudioBuffer>;
}

/// Symphonia-backed decoder (WAV, FLAC, MP3 and the other default formats)
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl AudioDecoder for SymphoniaDecoder {
    fn decode(&self, path: &Path) -> AssetResult<AudioBuffer> {
        log::debug!("Decoding {:?}", path);

        let file = File::open(path).map_err(|source| AssetError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let unsupported = |reason: String| AssetError::Unsupported {
            path: path.to_path_buf(),
            reason,
        };

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| unsupported(e.to_string()))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| unsupported("no audio track found".to_string()))?;

        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| unsupported("unknown sample rate".to_string()))?;
        // Codec parameters may omit the layout; the first decoded packet is authoritative
        let mut num_channels = track
            .codec_params
            .channels
            .map(|c| c.count())
            .unwrap_or(2);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| unsupported(e.to_string()))?;

        let mut interleaved: Vec<f32> = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(e) => {
                    return Err(AssetError::Decode {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    });
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                // Corrupt packets are skipped, everything else is fatal
                Err(SymphoniaError::DecodeError(e)) => {
                    log::warn!("Skipping undecodable packet in {:?}: {}", path, e);
                    continue;
                }
                Err(e) => {
                    return Err(AssetError::Decode {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    });
                }
            };

            num_channels = decoded.spec().channels.count();
            let needs_alloc = sample_buf
                .as_ref()
                .map_or(true, |buf| buf.capacity() < decoded.capacity() * num_channels);
            if needs_alloc {
                sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, *decoded.spec()));
            }

            if let Some(buf) = sample_buf.as_mut() {
                buf.copy_interleaved_ref(decoded);
                interleaved.extend_from_slice(buf.samples());
            }
        }

        let buffer = AudioBuffer::from_interleaved(sample_rate, num_channels, &interleaved)?;
        log::info!(
            "Decoded {:?}: {} frames, {} channels, {}Hz",
            path,
            buffer.len(),
            buffer.num_channels(),
            buffer.sample_rate()
        );
        Ok(buffer)
    }
}
