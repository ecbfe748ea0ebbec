//! Rendering: block mixing, MIDI-driven session rendering and offline bounce
//!
//! [`mix`] is the position-pure core shared by every path. Live playback and
//! bounce both go through [`SessionRenderer`], which adds the synth for MIDI
//! clips before the master stage.

pub mod bounce;
pub mod mix;
mod session;
pub mod sink;

pub use bounce::{
    auto_end, bounce, resolve_range, BounceError, BounceOutcome, BounceProgress, BounceResult,
    BounceSettings, BounceWorker, TAIL_SECONDS,
};
pub use mix::{apply_master, mix_tracks, pan_gains, render_block};
pub use session::SessionRenderer;
pub use sink::{AudioSink, SinkError, SinkSpec, WavSink};
