//! `Pipeline`: top-level handle over the four processing stages.
//!
//! ## Lifecycle
//!
//! ```text
//! Pipeline::new(config)      → config validated, FFT + filterbank precomputed
//!     └─► run(bytes)         → Vec<MelTile>, one per 20 ms frame
//!     └─► run_file(path)
//!     └─► run_text(tts, ..)  → synthesize, then run
//! ```
//!
//! ## Threading
//!
//! `Pipeline` is `Send + Sync` and holds no per-run state, so independent
//! runs may execute concurrently from any number of threads. Wrap it in
//! `Arc<Pipeline>` to share it; `run_blocking` moves a run onto Tokio's
//! blocking pool for async callers.

pub mod pipeline;
pub mod session;

use std::path::Path;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use tracing::info;

use crate::{
    audio::RawAudioBuffer,
    config::PipelineConfig,
    error::{MelsyncError, Result, Stage},
    features::{Featurizer, MelTile},
    synth::{StyleId, SynthHandle},
};

pub use pipeline::{DiagnosticsSnapshot, PipelineDiagnostics, Source};
pub use session::AudioSession;

/// Audio → tile pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    featurizer: Featurizer,
    /// Monotonically increasing run id, used as the tracing span field.
    next_run: AtomicU64,
    diagnostics: PipelineDiagnostics,
}

impl Pipeline {
    /// Validate `config` and precompute the featurizer.
    ///
    /// # Errors
    /// `InvalidConfig` for parameters that can never yield valid tiles.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let featurizer = Featurizer::new(config.mel_params())?;
        info!(
            target_sample_rate = config.target_sample_rate,
            frame_length = config.frame_length(),
            tile = ?config.mel_params().tile_shape(),
            workers = config.workers,
            "pipeline ready"
        );
        Ok(Self {
            config,
            featurizer,
            next_run: AtomicU64::new(0),
            diagnostics: PipelineDiagnostics::default(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn featurizer(&self) -> &Featurizer {
        &self.featurizer
    }

    /// Run the pipeline on an in-memory audio container.
    pub fn run(&self, bytes: &[u8]) -> Result<Vec<MelTile>> {
        self.run_source(Source::Bytes(bytes), None)
    }

    /// Run the pipeline on an audio file.
    pub fn run_file(&self, path: &Path) -> Result<Vec<MelTile>> {
        self.run_source(Source::File(path), None)
    }

    /// Run the pipeline on an already-decoded buffer.
    pub fn run_decoded(&self, buf: RawAudioBuffer) -> Result<Vec<MelTile>> {
        self.run_source(Source::Decoded(buf), None)
    }

    /// Like [`Pipeline::run`], stopping with `Cancelled` once `running` is
    /// cleared. The flag is checked between frames only.
    pub fn run_with_cancel(&self, bytes: &[u8], running: &AtomicBool) -> Result<Vec<MelTile>> {
        self.run_source(Source::Bytes(bytes), Some(running))
    }

    pub fn run_source(
        &self,
        source: Source<'_>,
        running: Option<&AtomicBool>,
    ) -> Result<Vec<MelTile>> {
        let run_id = self.next_run.fetch_add(1, Ordering::Relaxed);
        pipeline::run(
            pipeline::RunContext {
                run_id,
                config: &self.config,
                featurizer: &self.featurizer,
                running,
                diagnostics: &self.diagnostics,
            },
            source,
        )
    }

    /// Synthesize `text` with `tts`, then run the pipeline on the result.
    ///
    /// # Errors
    /// `EmptyInput` (tagged `Synthesize`) for empty or whitespace-only text;
    /// the engine is not called in that case.
    pub fn run_text(&self, tts: &SynthHandle, text: &str, voice: StyleId) -> Result<Vec<MelTile>> {
        if text.trim().is_empty() {
            return Err(MelsyncError::EmptyInput("synthesis text").at(Stage::Synthesize));
        }
        let bytes = tts
            .synthesize(text, voice)
            .map_err(|e| e.at(Stage::Synthesize))?;
        self.run(&bytes)
    }

    /// Run on Tokio's blocking pool.
    pub async fn run_blocking(self: Arc<Self>, bytes: Vec<u8>) -> Result<Vec<MelTile>> {
        tokio::task::spawn_blocking(move || self.run(&bytes))
            .await
            .map_err(|e| MelsyncError::Other(anyhow::anyhow!("pipeline task died: {e}")))?
    }

    /// Start a staged session sharing this pipeline's configuration.
    pub fn session(&self) -> AudioSession<'_> {
        AudioSession::new(&self.config, &self.featurizer)
    }

    /// Snapshot of pipeline counters for observability.
    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    pub fn reset_diagnostics(&self) {
        self.diagnostics.reset();
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
