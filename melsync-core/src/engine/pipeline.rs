//! Blocking stage composition for one pipeline run.
//!
//! ## Stages (strictly sequential per run)
//!
//! ```text
//! 1. Load       bytes / path → RawAudioBuffer
//! 2. Normalize  RawAudioBuffer → NormalizedAudio (mono, target rate)
//! 3. Chunk      NormalizedAudio → Vec<AudioFrame> (zero-padded tail)
//! 4. Featurize  AudioFrame → MelTile, in frame order
//! ```
//!
//! Each stage fully consumes its input before the next one starts. Any
//! failure aborts the run and is returned tagged with its `Stage`; no partial
//! tile sequence ever escapes.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serde::Serialize;
use tracing::{error, info, info_span};

use crate::{
    audio::{self, RawAudioBuffer},
    buffering,
    config::PipelineConfig,
    error::{MelsyncError, Result, Stage},
    features::{self, Featurizer, MelTile},
};

/// Lock-free counters shared by every run of one `Pipeline`.
pub struct PipelineDiagnostics {
    pub runs_started: AtomicUsize,
    pub runs_failed: AtomicUsize,
    pub runs_cancelled: AtomicUsize,
    pub samples_normalized: AtomicUsize,
    pub frames_chunked: AtomicUsize,
    pub frames_padded: AtomicUsize,
    pub tiles_emitted: AtomicUsize,
}

impl Default for PipelineDiagnostics {
    fn default() -> Self {
        Self {
            runs_started: AtomicUsize::new(0),
            runs_failed: AtomicUsize::new(0),
            runs_cancelled: AtomicUsize::new(0),
            samples_normalized: AtomicUsize::new(0),
            frames_chunked: AtomicUsize::new(0),
            frames_padded: AtomicUsize::new(0),
            tiles_emitted: AtomicUsize::new(0),
        }
    }
}

impl PipelineDiagnostics {
    pub fn reset(&self) {
        self.runs_started.store(0, Ordering::Relaxed);
        self.runs_failed.store(0, Ordering::Relaxed);
        self.runs_cancelled.store(0, Ordering::Relaxed);
        self.samples_normalized.store(0, Ordering::Relaxed);
        self.frames_chunked.store(0, Ordering::Relaxed);
        self.frames_padded.store(0, Ordering::Relaxed);
        self.tiles_emitted.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            runs_cancelled: self.runs_cancelled.load(Ordering::Relaxed),
            samples_normalized: self.samples_normalized.load(Ordering::Relaxed),
            frames_chunked: self.frames_chunked.load(Ordering::Relaxed),
            frames_padded: self.frames_padded.load(Ordering::Relaxed),
            tiles_emitted: self.tiles_emitted.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub runs_started: usize,
    pub runs_failed: usize,
    pub runs_cancelled: usize,
    pub samples_normalized: usize,
    pub frames_chunked: usize,
    pub frames_padded: usize,
    pub tiles_emitted: usize,
}

/// Where a run's audio comes from.
pub enum Source<'a> {
    Bytes(&'a [u8]),
    File(&'a Path),
    Decoded(RawAudioBuffer),
}

/// Everything one run needs, borrowed from the owning `Pipeline`.
pub struct RunContext<'a> {
    pub run_id: u64,
    pub config: &'a PipelineConfig,
    pub featurizer: &'a Featurizer,
    pub running: Option<&'a AtomicBool>,
    pub diagnostics: &'a PipelineDiagnostics,
}

/// Run all four stages for one source.
pub fn run(ctx: RunContext<'_>, source: Source<'_>) -> Result<Vec<MelTile>> {
    let span = info_span!("pipeline_run", run_id = ctx.run_id);
    let _enter = span.enter();
    ctx.diagnostics.runs_started.fetch_add(1, Ordering::Relaxed);

    let result = run_stages(&ctx, source);
    match &result {
        Ok(tiles) => {
            ctx.diagnostics
                .tiles_emitted
                .fetch_add(tiles.len(), Ordering::Relaxed);
            info!(tiles = tiles.len(), "pipeline run complete");
        }
        Err(e) if matches!(e.root(), MelsyncError::Cancelled) => {
            ctx.diagnostics.runs_cancelled.fetch_add(1, Ordering::Relaxed);
            info!("pipeline run cancelled");
        }
        Err(e) => {
            ctx.diagnostics.runs_failed.fetch_add(1, Ordering::Relaxed);
            error!("pipeline run failed: {e}");
        }
    }
    result
}

fn run_stages(ctx: &RunContext<'_>, source: Source<'_>) -> Result<Vec<MelTile>> {
    // ── 1. Load ───────────────────────────────────────────────────────────
    let raw = match source {
        Source::Bytes(bytes) => audio::load_bytes(bytes),
        Source::File(path) => audio::load_file(path),
        Source::Decoded(buf) => Ok(buf),
    }
    .map_err(|e| e.at(Stage::Load))?;

    // ── 2. Normalize ──────────────────────────────────────────────────────
    let normalized = audio::normalize(
        &raw,
        ctx.config.target_sample_rate,
        ctx.config.resample_quality,
    )
    .map_err(|e| e.at(Stage::Normalize))?;
    drop(raw);
    ctx.diagnostics
        .samples_normalized
        .fetch_add(normalized.len(), Ordering::Relaxed);

    // ── 3. Chunk ──────────────────────────────────────────────────────────
    let frames = buffering::chunk(&normalized, ctx.config.frame_length())
        .map_err(|e| e.at(Stage::Chunk))?;
    drop(normalized);
    ctx.diagnostics
        .frames_chunked
        .fetch_add(frames.len(), Ordering::Relaxed);
    if frames.last().is_some_and(|f| f.is_padded()) {
        ctx.diagnostics.frames_padded.fetch_add(1, Ordering::Relaxed);
    }

    // ── 4. Featurize ──────────────────────────────────────────────────────
    features::featurize_all(ctx.featurizer, &frames, ctx.config.workers, ctx.running)
        .map_err(|e| e.at(Stage::Featurize))
}
