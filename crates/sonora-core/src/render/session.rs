//! Stateful session renderer: audio mix plus synth-driven MIDI clips

use super::mix::{apply_master, mix_tracks};
use crate::automation::AutomationSnapshot;
use crate::session::{MidiNote, Session};
use crate::synth::{Synth, SynthSettings};
use crate::types::{Sample, SampleCount};

/// Renders a session block by block, including MIDI clips
///
/// MIDI events are block-granular: a note starts in the block containing its
/// start position and is released in the block containing its end. When
/// consecutive calls are not contiguous (seek, loop, first block) every
/// sounding note is released first.
pub struct SessionRenderer {
    synth: Synth,
    /// Position the next contiguous block would start at
    next_position: Option<SampleCount>,
}

impl SessionRenderer {
    pub fn new(sample_rate: u32, settings: SynthSettings) -> Self {
        Self::with_synth(Synth::new(sample_rate, settings))
    }

    pub fn with_synth(synth: Synth) -> Self {
        Self {
            synth,
            next_position: None,
        }
    }

    pub fn synth(&self) -> &Synth {
        &self.synth
    }

    pub fn synth_mut(&mut self) -> &mut Synth {
        &mut self.synth
    }

    /// Release every sounding note and forget the playback position
    pub fn release_all(&mut self) {
        self.synth.all_notes_off();
        self.next_position = None;
    }

    /// Render the block starting at `position` into `left`/`right`, overwriting them
    pub fn render(
        &mut self,
        session: &Session,
        automation: Option<&AutomationSnapshot>,
        position: SampleCount,
        left: &mut [Sample],
        right: &mut [Sample],
    ) {
        let len = left.len().min(right.len());
        let (left, right) = (&mut left[..len], &mut right[..len]);
        left.fill(0.0);
        right.fill(0.0);

        if self.next_position != Some(position) {
            self.synth.all_notes_off();
        }

        mix_tracks(session, automation, position, left, right);
        self.schedule_notes(session, position, len as SampleCount);
        self.synth.render(left, right);
        apply_master(session, automation, position, left, right);

        self.next_position = Some(position + len as SampleCount);
    }

    fn schedule_notes(&mut self, session: &Session, position: SampleCount, len: SampleCount) {
        let block_end = position + len;
        let in_block = |pos: SampleCount| pos >= position && pos < block_end;

        let notes = || {
            session.audible_tracks().flat_map(|track| {
                track.midi_clips.iter().flat_map(|clip| {
                    clip.notes.iter().map(move |note| (clip.timeline_start, note))
                })
            })
        };
        let absolute = |start: SampleCount, note: &MidiNote| (start + note.start, start + note.end());

        // Releases of earlier notes go first so a repeated pitch starting in
        // this block is not cut by its predecessor's note-off
        for (clip_start, note) in notes() {
            let (on, off) = absolute(clip_start, note);
            if on < position && in_block(off) {
                self.synth.note_off(note.note);
            }
        }
        for (clip_start, note) in notes() {
            let (on, _) = absolute(clip_start, note);
            if in_block(on) {
                self.synth.note_on(note.note, note.velocity);
            }
        }
        for (clip_start, note) in notes() {
            let (on, off) = absolute(clip_start, note);
            if in_block(on) && in_block(off) {
                self.synth.note_off(note.note);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AudioBuffer;
    use crate::render::mix::render_block;
    use crate::session::{Clip, MidiClip, Track};
    use std::sync::Arc;

    fn keys_session(notes: Vec<MidiNote>) -> Session {
        let mut session = Session::new(44100);
        session.add_track(Track::new("keys").with_midi_clip(MidiClip::new(0, notes)));
        session
    }

    fn render(renderer: &mut SessionRenderer, session: &Session, position: SampleCount, len: usize) -> Vec<f32> {
        let mut left = vec![0.0; len];
        let mut right = vec![0.0; len];
        renderer.render(session, None, position, &mut left, &mut right);
        left
    }

    #[test]
    fn test_audio_only_matches_pure_mix() {
        let asset = Arc::new(AudioBuffer::new(44100, vec![(0..512).map(|i| i as f32 / 512.0).collect()]).unwrap());
        let mut session = Session::new(44100);
        session.add_track(Track::new("a").with_clip(Clip::new(asset).at(100)));
        session.master_gain_db = -3.0;

        let mut renderer = SessionRenderer::new(44100, SynthSettings::default());
        let rendered = render(&mut renderer, &session, 0, 1024);

        let mut left = vec![0.0; 1024];
        let mut right = vec![0.0; 1024];
        render_block(&session, None, 0, &mut left, &mut right);
        assert_eq!(rendered, left);
    }

    #[test]
    fn test_note_starts_in_its_block() {
        let session = keys_session(vec![MidiNote::new(69, 1.0, 1000, 50_000)]);
        let mut renderer = SessionRenderer::new(44100, SynthSettings::default());

        render(&mut renderer, &session, 0, 512);
        assert_eq!(renderer.synth().active_voice_count(), 0);

        let block = render(&mut renderer, &session, 512, 512);
        assert_eq!(renderer.synth().active_voice_count(), 1);
        assert!(block.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn test_note_released_in_end_block() {
        let session = keys_session(vec![MidiNote::new(60, 1.0, 0, 600)]);
        let mut renderer = SessionRenderer::new(44100, SynthSettings::default());

        render(&mut renderer, &session, 0, 512);
        assert!(renderer.synth().voice_for_note(60).is_some());

        render(&mut renderer, &session, 512, 512);
        assert!(renderer.synth().voice_for_note(60).is_none());
        assert_eq!(renderer.synth().active_voice_count(), 1); // still releasing
    }

    #[test]
    fn test_muted_track_sends_no_notes() {
        let mut session = keys_session(vec![MidiNote::new(60, 1.0, 0, 600)]);
        session.tracks[0].muted = true;
        let mut renderer = SessionRenderer::new(44100, SynthSettings::default());

        let block = render(&mut renderer, &session, 0, 512);
        assert_eq!(renderer.synth().active_voice_count(), 0);
        assert!(block.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_repeated_pitch_is_not_cut_by_previous_note_off() {
        let session = keys_session(vec![MidiNote::new(64, 1.0, 0, 600), MidiNote::new(64, 1.0, 600, 5000)]);
        let mut renderer = SessionRenderer::new(44100, SynthSettings::default());

        render(&mut renderer, &session, 0, 512);
        render(&mut renderer, &session, 512, 512);
        // The second note holds its own voice while the first one releases
        assert!(renderer.synth().voice_for_note(64).is_some());
        assert_eq!(renderer.synth().active_voice_count(), 2);
    }

    #[test]
    fn test_jump_releases_sounding_notes() {
        let session = keys_session(vec![MidiNote::new(60, 1.0, 0, 100_000)]);
        let mut renderer = SessionRenderer::new(44100, SynthSettings::default());

        render(&mut renderer, &session, 0, 256);
        assert!(renderer.synth().voice_for_note(60).is_some());

        render(&mut renderer, &session, 40_000, 256);
        assert!(renderer.synth().voice_for_note(60).is_none());
    }

    #[test]
    fn test_fresh_renderers_agree() {
        let session = keys_session(vec![MidiNote::new(57, 0.8, 10, 3000), MidiNote::new(64, 0.6, 700, 900)]);
        let mut a = SessionRenderer::new(44100, SynthSettings::default());
        let mut b = SessionRenderer::new(44100, SynthSettings::default());

        for block in 0..8 {
            let pos = block * 512;
            assert_eq!(render(&mut a, &session, pos, 512), render(&mut b, &session, pos, 512));
        }
    }
}
