//! Realtime engine: transport, command queue, deferred reclamation, the
//! metronome and the live audio engine that ties them together

mod command;
mod engine;
pub mod gc;
mod metronome;
mod transport;

pub use command::{command_channel, EngineCommand, COMMAND_QUEUE_CAPACITY};
pub use engine::{AudioEngine, EngineHandle, LevelMeters};
pub use metronome::{
    Metronome, MetronomeControls, BEAT_FREQUENCY, CLICK_LENGTH, DEFAULT_METRONOME_GAIN, DOWNBEAT_FREQUENCY,
};
pub use transport::{
    Transport, TransportState, DEFAULT_BPM, DEFAULT_TIME_SIGNATURE, MAX_BPM, MIN_BPM,
};
