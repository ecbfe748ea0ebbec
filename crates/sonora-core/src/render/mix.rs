//! Deterministic block mixer
//!
//! Every function here is a pure function of its inputs: the same session,
//! automation snapshot, position and block length always produce the same
//! samples. That is what makes offline bounces reproducible.
//!
//! Per block:
//! 1. pick the audible tracks (mute always wins, solo restricts)
//! 2. add every clip overlapping the block, shaped by its fades and scaled by
//!    track gain x clip gain, panned with the equal-power law
//! 3. apply master gain and master pan in place
//!
//! Both pan stages use the equal-power coefficients from [`pan_gains`] at every
//! position, so a centred track and centred master each sit at -3 dB per
//! channel.

use std::f32::consts::FRAC_PI_2;

use crate::automation::AutomationSnapshot;
use crate::session::{Clip, Session, Track};
use crate::types::{db_to_linear, Sample, SampleCount};

/// Equal-power pan coefficients `(left, right)` for `pan` in [-1, 1]
#[inline]
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let theta = (pan.clamp(-1.0, 1.0) + 1.0) * 0.5 * FRAC_PI_2;
    (theta.cos(), theta.sin())
}

/// Linear fade multiplier at `offset` samples into the clip
///
/// Fade-out is measured against the clip's source length.
#[inline]
fn fade_gain(clip: &Clip, offset: SampleCount) -> f32 {
    let mut envelope = 1.0;
    if clip.fade_in > 0 && offset < clip.fade_in {
        envelope *= offset as f32 / clip.fade_in as f32;
    }
    if clip.fade_out > 0 && offset >= clip.source_length - clip.fade_out {
        envelope *= (clip.source_length - offset) as f32 / clip.fade_out as f32;
    }
    envelope
}

/// Automated value for `id` at `position`, if a lane is bound and registered
#[inline]
fn automated(
    automation: Option<&AutomationSnapshot>,
    id: Option<&str>,
    position: SampleCount,
) -> Option<f32> {
    automation?.lane_value(id?, position)
}

/// Track gain (dB) and pan in effect for the block starting at `position`
pub(crate) fn track_params(
    track: &Track,
    automation: Option<&AutomationSnapshot>,
    position: SampleCount,
) -> (f32, f32) {
    let gain_db = automated(automation, track.gain_automation.as_deref(), position)
        .unwrap_or(track.gain_db);
    let pan = automated(automation, track.pan_automation.as_deref(), position)
        .unwrap_or(track.pan)
        .clamp(-1.0, 1.0);
    (gain_db, pan)
}

/// Add one clip into the block
fn mix_clip(
    clip: &Clip,
    track_gain: f32,
    (pan_left, pan_right): (f32, f32),
    position: SampleCount,
    left: &mut [Sample],
    right: &mut [Sample],
) {
    let block_end = position + left.len() as SampleCount;
    let first = clip.timeline_start.max(position);
    let last = clip.end().min(block_end);
    if first >= last {
        return;
    }

    let asset = &clip.asset;
    if asset.is_empty() {
        return;
    }
    let asset_len = asset.len() as SampleCount;
    let (src_left, src_right) = asset.stereo_pair();
    let gain = track_gain * db_to_linear(clip.gain_db);

    for pos in first..last {
        let offset = pos - clip.timeline_start;
        let src = clip.source_start + offset;
        if src < 0 || src >= asset_len {
            continue;
        }

        let g = gain * fade_gain(clip, offset);
        let i = (pos - position) as usize;
        let src = src as usize;
        left[i] += src_left[src] * g * pan_left;
        right[i] += src_right[src] * g * pan_right;
    }
}

/// Add every audible track's clips into `left`/`right` (steps 1 and 2)
///
/// Output is summed into the existing contents.
pub fn mix_tracks(
    session: &Session,
    automation: Option<&AutomationSnapshot>,
    position: SampleCount,
    left: &mut [Sample],
    right: &mut [Sample],
) {
    let len = left.len().min(right.len());
    let (left, right) = (&mut left[..len], &mut right[..len]);

    for track in session.audible_tracks() {
        let (gain_db, pan) = track_params(track, automation, position);
        let track_gain = db_to_linear(gain_db);
        let pans = pan_gains(pan);

        for clip in &track.clips {
            mix_clip(clip, track_gain, pans, position, left, right);
        }
    }
}

/// Master gain and pan, in place (step 3)
pub fn apply_master(
    session: &Session,
    automation: Option<&AutomationSnapshot>,
    position: SampleCount,
    left: &mut [Sample],
    right: &mut [Sample],
) {
    let gain_db = automated(automation, session.master_gain_automation.as_deref(), position)
        .unwrap_or(session.master_gain_db);
    let pan = automated(automation, session.master_pan_automation.as_deref(), position)
        .unwrap_or(session.master_pan)
        .clamp(-1.0, 1.0);

    let gain = db_to_linear(gain_db);
    let (pan_left, pan_right) = pan_gains(pan);
    let (gain_left, gain_right) = (gain * pan_left, gain * pan_right);
    if gain_left == 1.0 && gain_right == 1.0 {
        return;
    }

    for sample in left.iter_mut() {
        *sample *= gain_left;
    }
    for sample in right.iter_mut() {
        *sample *= gain_right;
    }
}

/// Render the audio clips of `session` for the block starting at `position`
///
/// Overwrites `left`/`right`. Identical inputs give identical output.
pub fn render_block(
    session: &Session,
    automation: Option<&AutomationSnapshot>,
    position: SampleCount,
    left: &mut [Sample],
    right: &mut [Sample],
) {
    left.fill(0.0);
    right.fill(0.0);
    mix_tracks(session, automation, position, left, right);
    apply_master(session, automation, position, left, right);
}
