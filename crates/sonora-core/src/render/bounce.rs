//! Offline bounce
//!
//! Runs the session renderer over a sample range and streams the blocks to
//! an [`AudioSink`]. The caller observes the run through progress reports:
//! zero or more `Rendering(fraction)` followed by exactly one terminal
//! report (`Complete`, `Cancelled` or `Failed`).
//!
//! Cancellation is cooperative. The flag is checked before every block, so
//! no block is written after the cancellation has been observed.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{unbounded, Receiver};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::session::SessionRenderer;
use super::sink::{AudioSink, SinkError, SinkSpec, WavSink};
use crate::automation::AutomationSnapshot;
use crate::session::Session;
use crate::synth::SynthSettings;
use crate::types::{SampleCount, StereoBlock, MAX_BLOCK_SIZE, SAMPLE_RATE};

/// Silence appended after the last clip when the end is auto-detected
pub const TAIL_SECONDS: SampleCount = 1;

/// Bounce output format and range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BounceSettings {
    pub sample_rate: u32,
    /// 16, 24 or 32 (float)
    pub bit_depth: u16,
    pub channels: u16,
    /// Frames per render block, clamped to `MAX_BLOCK_SIZE`
    pub block_size: usize,
    pub start_sample: SampleCount,
    /// `None` renders to the last clip end plus [`TAIL_SECONDS`]
    pub end_sample: Option<SampleCount>,
    pub synth: SynthSettings,
}

impl Default for BounceSettings {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            bit_depth: 24,
            channels: 2,
            block_size: 512,
            start_sample: 0,
            end_sample: None,
            synth: SynthSettings::default(),
        }
    }
}

impl BounceSettings {
    fn sink_spec(&self) -> SinkSpec {
        SinkSpec {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bit_depth: self.bit_depth,
        }
    }
}

/// Progress report sent after every block and once at the end
#[derive(Debug, Clone, PartialEq)]
pub enum BounceProgress {
    /// Fraction of the range rendered so far (0.0 - 1.0)
    Rendering(f64),
    /// Finished; everything was written and the sink finalized
    Complete,
    /// Stopped by the cancel flag
    Cancelled,
    /// Stopped by an error
    Failed(String),
}

impl BounceProgress {
    /// Rendered fraction; `Complete` reports 1.0
    pub fn fraction(&self) -> Option<f64> {
        match self {
            BounceProgress::Rendering(fraction) => Some(*fraction),
            BounceProgress::Complete => Some(1.0),
            BounceProgress::Cancelled | BounceProgress::Failed(_) => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BounceProgress::Rendering(_))
    }
}

/// How a bounce that did not error ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BounceOutcome {
    Completed { samples: SampleCount },
    Cancelled { samples_rendered: SampleCount },
}

impl BounceOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, BounceOutcome::Completed { .. })
    }
}

#[derive(Error, Debug)]
pub enum BounceError {
    #[error("Nothing to render: end {end} is not after start {start}")]
    EmptyRange { start: SampleCount, end: SampleCount },

    #[error("Could not create output: {0}")]
    SinkCreate(#[source] SinkError),

    #[error("Could not write output: {0}")]
    SinkWrite(#[source] SinkError),

    #[error("Could not finalize output: {0}")]
    SinkFinalize(#[source] SinkError),

    #[error("Could not spawn bounce worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Bounce worker panicked")]
    WorkerPanicked,
}

/// Result type for bounce operations
pub type BounceResult<T> = Result<T, BounceError>;

/// Last clip end plus the tail
pub fn auto_end(session: &Session, sample_rate: u32) -> SampleCount {
    session.end_sample() + sample_rate as SampleCount * TAIL_SECONDS
}

/// Start and end of the bounce; fails when the range is empty
pub fn resolve_range(session: &Session, settings: &BounceSettings) -> BounceResult<(SampleCount, SampleCount)> {
    let start = settings.start_sample;
    let end = settings
        .end_sample
        .unwrap_or_else(|| auto_end(session, settings.sample_rate));
    if end <= start {
        return Err(BounceError::EmptyRange { start, end });
    }
    Ok((start, end))
}

/// Render `session` to the sink produced by `create_sink`
///
/// Every outcome, including the precondition failures, is reported exactly
/// once through `progress` as a terminal report. Cancellation returns
/// `Ok(BounceOutcome::Cancelled)`; a partially written output is left for
/// the caller to deal with.
pub fn bounce<F>(
    session: &Session,
    automation: Option<&AutomationSnapshot>,
    settings: &BounceSettings,
    create_sink: F,
    progress: &mut dyn FnMut(BounceProgress),
    cancel: &AtomicBool,
) -> BounceResult<BounceOutcome>
where
    F: FnOnce(&SinkSpec) -> Result<Box<dyn AudioSink>, SinkError>,
{
    let (start, end) = match resolve_range(session, settings) {
        Ok(range) => range,
        Err(e) => return fail(progress, e),
    };

    let mut sink = match create_sink(&settings.sink_spec()) {
        Ok(sink) => sink,
        Err(e) => return fail(progress, BounceError::SinkCreate(e)),
    };

    let total = end - start;
    log::info!(
        "Bounce: rendering {}..{} ({} samples, {}Hz, {}-bit)",
        start,
        end,
        total,
        settings.sample_rate,
        settings.bit_depth
    );

    let block_size = settings.block_size.clamp(1, MAX_BLOCK_SIZE);
    let mut block = StereoBlock::with_capacity(block_size);
    let mut renderer = SessionRenderer::new(settings.sample_rate, settings.synth);
    let mut position = start;

    while position < end {
        if cancel.load(Ordering::Relaxed) {
            let rendered = position - start;
            log::info!("Bounce cancelled after {} of {} samples", rendered, total);
            progress(BounceProgress::Cancelled);
            return Ok(BounceOutcome::Cancelled {
                samples_rendered: rendered,
            });
        }

        let len = (end - position).min(block_size as SampleCount);
        block.clear(len as usize);
        let (left, right) = block.channels_mut();
        renderer.render(session, automation, position, left, right);

        if let Err(e) = sink.write(block.left(), block.right()) {
            return fail(progress, BounceError::SinkWrite(e));
        }

        position += len;
        progress(BounceProgress::Rendering((position - start) as f64 / total as f64));
    }

    if let Err(e) = sink.finalize() {
        return fail(progress, BounceError::SinkFinalize(e));
    }

    log::info!("Bounce complete: {} samples", total);
    progress(BounceProgress::Complete);
    Ok(BounceOutcome::Completed { samples: total })
}

/// Report `error` as the terminal progress and return it
fn fail(progress: &mut dyn FnMut(BounceProgress), error: BounceError) -> BounceResult<BounceOutcome> {
    log::error!("Bounce failed: {}", error);
    progress(BounceProgress::Failed(error.to_string()));
    Err(error)
}

/// A bounce running on its own thread
///
/// Progress arrives on [`BounceWorker::progress`]; the final report is
/// always terminal.
pub struct BounceWorker {
    cancel_flag: Arc<AtomicBool>,
    progress: Receiver<BounceProgress>,
    handle: JoinHandle<BounceResult<BounceOutcome>>,
}

impl BounceWorker {
    /// Bounce to a WAV file at `output`
    pub fn spawn_to_file(
        session: Arc<Session>,
        automation: Option<AutomationSnapshot>,
        settings: BounceSettings,
        output: PathBuf,
    ) -> BounceResult<Self> {
        Self::spawn(session, automation, settings, move |spec| {
            WavSink::create(&output, *spec).map(|sink| Box::new(sink) as Box<dyn AudioSink>)
        })
    }

    pub fn spawn<F>(
        session: Arc<Session>,
        automation: Option<AutomationSnapshot>,
        settings: BounceSettings,
        create_sink: F,
    ) -> BounceResult<Self>
    where
        F: FnOnce(&SinkSpec) -> Result<Box<dyn AudioSink>, SinkError> + Send + 'static,
    {
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let (progress_tx, progress_rx) = unbounded();

        let handle = {
            let cancel_flag = Arc::clone(&cancel_flag);
            thread::Builder::new()
                .name("bounce-worker".to_string())
                .spawn(move || {
                    let mut report = |p: BounceProgress| {
                        // The receiver may already be gone; the bounce still finishes
                        let _ = progress_tx.send(p);
                    };
                    bounce(
                        &session,
                        automation.as_ref(),
                        &settings,
                        create_sink,
                        &mut report,
                        &cancel_flag,
                    )
                })
                .map_err(BounceError::Spawn)?
        };

        Ok(Self {
            cancel_flag,
            progress: progress_rx,
            handle,
        })
    }

    pub fn progress(&self) -> &Receiver<BounceProgress> {
        &self.progress
    }

    /// Ask the worker to stop before its next block
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker and return its result
    pub fn join(self) -> BounceResult<BounceOutcome> {
        self.handle.join().map_err(|_| BounceError::WorkerPanicked)?
    }
}
