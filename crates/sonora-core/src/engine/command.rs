//! Lock-free command queue from the control thread to the audio thread
//!
//! Commands are pushed into an `rtrb` ring buffer and applied by the audio
//! thread at the start of the next block. Pushing never blocks; a full
//! queue is reported back to the sender.

use basedrop::Shared;

use crate::synth::MonoSample;
use crate::types::SampleCount;

/// Commands applied by the audio thread at block boundaries
pub enum EngineCommand {
    /// Start or resume playback
    Play,
    /// Stop advancing, keep the position
    Pause,
    /// Stop, return to 0 and release sounding notes
    Stop,
    /// Move the playhead
    Seek { position: SampleCount },
    /// Change the tempo
    SetTempo { bpm: f64 },
    /// Change the time signature
    SetTimeSignature { numerator: u8, denominator: u8 },
    /// Replace the sample the live synth plays
    ///
    /// The previous sample is dropped through the collector, never on the
    /// audio thread.
    SetSynthSample { sample: Shared<MonoSample> },
}

/// Capacity of the command queue
pub const COMMAND_QUEUE_CAPACITY: usize = 64;

/// Create a new command channel (producer/consumer pair)
///
/// The producer is owned by the control thread, the consumer by the audio
/// thread.
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_channel_creation() {
        let (mut tx, mut rx) = command_channel();
        tx.push(EngineCommand::Seek { position: 4410 }).unwrap();

        let cmd = rx.pop().unwrap();
        assert!(matches!(cmd, EngineCommand::Seek { position: 4410 }));
    }

    #[test]
    fn test_command_channel_empty() {
        let (_tx, mut rx) = command_channel();
        assert!(rx.pop().is_err());
    }

    #[test]
    fn test_full_queue_rejects_push() {
        let (mut tx, _rx) = command_channel();
        for _ in 0..COMMAND_QUEUE_CAPACITY {
            tx.push(EngineCommand::Play).unwrap();
        }
        assert!(tx.push(EngineCommand::Pause).is_err());
    }

    #[test]
    fn test_command_size() {
        let size = std::mem::size_of::<EngineCommand>();
        assert!(size <= 16, "EngineCommand is {} bytes, expected <= 16", size);
    }
}
