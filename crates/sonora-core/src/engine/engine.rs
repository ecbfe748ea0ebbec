//! Live engine: transport-driven session playback plus the live synth
//!
//! [`AudioEngine`] lives on the audio thread and is driven by the output
//! callback. [`EngineHandle`] stays on the control thread. They share only
//! lock-free state: two `rtrb` queues, the atomic transport, meters and
//! metronome controls, and `SharedCell`s for the session and automation
//! snapshots.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use basedrop::{Shared, SharedCell};

use super::command::{command_channel, EngineCommand};
use super::gc::gc_handle;
use super::metronome::{Metronome, MetronomeControls};
use super::transport::Transport;
use crate::automation::{AutomationManager, AutomationReader};
use crate::playback::TrackPlayback;
use crate::render::SessionRenderer;
use crate::session::Session;
use crate::synth::{note_queue, MonoSample, NoteReceiver, NoteSender, Synth, SynthSettings};
use crate::types::{Sample, SampleCount, MAX_BLOCK_SIZE};

/// Peak levels of the last processed block
pub struct LevelMeters {
    /// f32 bits
    left: AtomicU32,
    right: AtomicU32,
}

impl LevelMeters {
    pub fn new() -> Self {
        Self {
            left: AtomicU32::new(0),
            right: AtomicU32::new(0),
        }
    }

    #[inline]
    pub fn peak_left(&self) -> f32 {
        f32::from_bits(self.left.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn peak_right(&self) -> f32 {
        f32::from_bits(self.right.load(Ordering::Relaxed))
    }

    fn record(&self, left: &[Sample], right: &[Sample]) {
        let peak = |buf: &[Sample]| buf.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()));
        self.left.store(peak(left).to_bits(), Ordering::Relaxed);
        self.right.store(peak(right).to_bits(), Ordering::Relaxed);
    }
}

impl Default for LevelMeters {
    fn default() -> Self {
        Self::new()
    }
}

/// Audio-thread half of the engine
pub struct AudioEngine {
    commands: rtrb::Consumer<EngineCommand>,
    notes: NoteReceiver,
    transport: Arc<Transport>,
    session: Arc<SharedCell<Option<Session>>>,
    automation: AutomationReader,
    preview: Arc<TrackPlayback>,
    meters: Arc<LevelMeters>,
    /// Plays the MIDI clips of the published session
    renderer: SessionRenderer,
    /// Plays notes arriving on the note queue
    live_synth: Synth,
    metronome: Metronome,
}

impl AudioEngine {
    /// Create the engine and its control handle
    pub fn new(sample_rate: u32, synth_settings: SynthSettings) -> (Self, EngineHandle) {
        let (command_tx, command_rx) = command_channel();
        let (note_tx, note_rx) = note_queue();
        let transport = Arc::new(Transport::new(sample_rate));
        let session = Arc::new(SharedCell::new(Shared::new(&gc_handle(), None)));
        let automation = Arc::new(AutomationManager::new());
        let preview = Arc::new(TrackPlayback::new());
        let meters = Arc::new(LevelMeters::new());
        let metronome = Arc::new(MetronomeControls::new());

        let engine = Self {
            commands: command_rx,
            notes: note_rx,
            transport: Arc::clone(&transport),
            session: Arc::clone(&session),
            automation: automation.reader(),
            preview: Arc::clone(&preview),
            meters: Arc::clone(&meters),
            renderer: SessionRenderer::new(sample_rate, synth_settings),
            live_synth: Synth::new(sample_rate, synth_settings),
            metronome: Metronome::new(Arc::clone(&metronome)),
        };

        let handle = EngineHandle {
            commands: command_tx,
            notes: note_tx,
            transport,
            session,
            automation,
            preview,
            meters,
            metronome,
            sample_rate,
        };

        log::info!("Audio engine created at {}Hz", sample_rate);
        (engine, handle)
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Fill `left`/`right` with the next block, overwriting them
    ///
    /// Real-time safe: no allocation, no locks. Buffers longer than
    /// `MAX_BLOCK_SIZE` are processed in chunks.
    pub fn process(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        let len = left.len().min(right.len());
        let chunks = left[..len]
            .chunks_mut(MAX_BLOCK_SIZE)
            .zip(right[..len].chunks_mut(MAX_BLOCK_SIZE));
        for (left, right) in chunks {
            self.process_block(left, right);
        }
    }

    fn process_block(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        self.apply_commands();
        self.live_synth.drain(&mut self.notes);

        let position = self.transport.position();
        let playing = self.transport.is_playing();

        let session = self.session.get();
        match Option::as_ref(&*session) {
            Some(session) if playing => {
                let automation = self.automation.snapshot();
                self.renderer.render(session, Some(&*automation), position, left, right);
            }
            _ => {
                left.fill(0.0);
                right.fill(0.0);
            }
        }

        if playing {
            self.preview.process(left, right, position);
        }
        self.metronome.process(left, right, &self.transport, position);
        self.live_synth.render(left, right);

        self.meters.record(left, right);
        self.transport.advance(left.len() as SampleCount);
    }

    fn apply_commands(&mut self) {
        while let Ok(cmd) = self.commands.pop() {
            match cmd {
                EngineCommand::Play => self.transport.play(),
                EngineCommand::Pause => {
                    self.transport.pause();
                    self.renderer.release_all();
                }
                EngineCommand::Stop => {
                    self.transport.stop();
                    self.renderer.release_all();
                    self.live_synth.all_notes_off();
                }
                EngineCommand::Seek { position } => self.transport.seek(position),
                EngineCommand::SetTempo { bpm } => self.transport.set_bpm(bpm),
                EngineCommand::SetTimeSignature { numerator, denominator } => {
                    self.transport.set_time_signature(numerator, denominator)
                }
                EngineCommand::SetSynthSample { sample } => {
                    self.renderer.synth_mut().set_sample(sample.clone());
                    self.live_synth.set_sample(sample);
                }
            }
        }
    }
}

/// Control-thread half of the engine
///
/// Queue-backed methods return `false` when the queue is full; the command
/// is dropped and nothing waits on the audio thread.
pub struct EngineHandle {
    commands: rtrb::Producer<EngineCommand>,
    notes: NoteSender,
    transport: Arc<Transport>,
    session: Arc<SharedCell<Option<Session>>>,
    automation: Arc<AutomationManager>,
    preview: Arc<TrackPlayback>,
    meters: Arc<LevelMeters>,
    metronome: Arc<MetronomeControls>,
    sample_rate: u32,
}

impl EngineHandle {
    fn send(&mut self, cmd: EngineCommand) -> bool {
        let sent = self.commands.push(cmd).is_ok();
        if !sent {
            log::warn!("Engine command queue full, command dropped");
        }
        sent
    }

    pub fn play(&mut self) -> bool {
        self.send(EngineCommand::Play)
    }

    pub fn pause(&mut self) -> bool {
        self.send(EngineCommand::Pause)
    }

    pub fn stop(&mut self) -> bool {
        self.send(EngineCommand::Stop)
    }

    pub fn seek(&mut self, position: SampleCount) -> bool {
        self.send(EngineCommand::Seek { position })
    }

    /// Tempo in BPM, clamped by the transport
    pub fn set_tempo(&mut self, bpm: f64) -> bool {
        self.send(EngineCommand::SetTempo { bpm })
    }

    pub fn set_time_signature(&mut self, numerator: u8, denominator: u8) -> bool {
        self.send(EngineCommand::SetTimeSignature { numerator, denominator })
    }

    /// Takes effect from the next block
    pub fn set_metronome_enabled(&self, enabled: bool) {
        log::debug!("Metronome {}", if enabled { "on" } else { "off" });
        self.metronome.set_enabled(enabled);
    }

    pub fn set_metronome_gain(&self, gain: f32) {
        self.metronome.set_gain(gain);
    }

    pub fn metronome(&self) -> &Arc<MetronomeControls> {
        &self.metronome
    }

    pub fn note_on(&mut self, note: u8, velocity: f32) -> bool {
        self.notes.note_on(note, velocity)
    }

    pub fn note_off(&mut self, note: u8) -> bool {
        self.notes.note_off(note)
    }

    pub fn all_notes_off(&mut self) -> bool {
        self.notes.all_notes_off()
    }

    /// Swap the sample played by both the live synth and session MIDI clips
    pub fn set_synth_sample(&mut self, sample: MonoSample) -> bool {
        log::info!(
            "Synth sample: {} frames at {}Hz",
            sample.len(),
            sample.sample_rate()
        );
        self.send(EngineCommand::SetSynthSample {
            sample: Shared::new(&gc_handle(), sample),
        })
    }

    /// Publish a session for playback, replacing the current one
    pub fn publish_session(&self, session: Session) {
        if session.sample_rate != self.sample_rate {
            log::warn!(
                "Session sample rate {}Hz differs from engine rate {}Hz, playing without conversion",
                session.sample_rate,
                self.sample_rate
            );
        }
        log::info!("Publishing session with {} tracks", session.tracks.len());
        self.session.set(Shared::new(&gc_handle(), Some(session)));
    }

    pub fn clear_session(&self) {
        self.session.set(Shared::new(&gc_handle(), None));
    }

    pub fn has_session(&self) -> bool {
        self.session.get().is_some()
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    pub fn automation(&self) -> &Arc<AutomationManager> {
        &self.automation
    }

    /// Single-file preview slot mixed on top of the session while playing
    pub fn preview(&self) -> &Arc<TrackPlayback> {
        &self.preview
    }

    pub fn meters(&self) -> &Arc<LevelMeters> {
        &self.meters
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
