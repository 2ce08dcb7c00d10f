//! # melsync-core
//!
//! Audio → mel-spectrogram tile pipeline for lip-sync models.
//!
//! ## Architecture
//!
//! ```text
//! WAV bytes / file ──► load ──► RawAudioBuffer
//!                                   │
//!                      normalize (downmix + rubato resample → 16 kHz mono)
//!                                   │
//!                      chunk (20 ms frames, zero-padded tail)
//!                                   │
//!                      featurize (STFT → Slaney mel → ln, fitted to 80 × 4)
//!                                   │
//!                               Vec<MelTile>
//! ```
//!
//! `Pipeline` runs all stages in one call; `AudioSession` exposes them one
//! at a time. Text input goes through a `SpeechSynthesizer` first.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod features;
pub mod synth;

// Convenience re-exports for downstream crates
pub use audio::{NormalizedAudio, RawAudioBuffer};
pub use buffering::frame::AudioFrame;
pub use config::{PipelineConfig, ResampleQuality};
pub use engine::{AudioSession, DiagnosticsSnapshot, Pipeline};
pub use error::{MelsyncError, Result, Stage};
pub use features::{Featurizer, MelParams, MelTile};
pub use synth::{SpeechSynthesizer, StyleId, SynthHandle, ToneSynthesizer, VoiceCatalog};
