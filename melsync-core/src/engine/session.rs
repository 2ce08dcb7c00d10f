//! Staged session: drive the pipeline one stage at a time.
//!
//! ```text
//! Empty ─load_*─► Loaded ─normalize─► Normalized ─chunk─► Chunked ─featurize─► Featurized
//!   ▲                                                                              │
//!   └───────────────────────────── load_* (fresh start) ◄──────────────────────────┘
//! ```
//!
//! Each step consumes the previous stage's output. Calling a step from any
//! other state returns `InvalidState` and leaves the session untouched.
//! Earlier outputs stay readable after later stages ran.

use std::path::Path;

use tracing::info;

use crate::{
    audio::{self, wav, NormalizedAudio, RawAudioBuffer},
    buffering::{self, AudioFrame},
    config::PipelineConfig,
    error::{MelsyncError, Result},
    features::{self, Featurizer, MelTile},
};

enum SessionState {
    Empty,
    Loaded(RawAudioBuffer),
    Normalized(NormalizedAudio),
    Chunked {
        audio: NormalizedAudio,
        frames: Vec<AudioFrame>,
    },
    Featurized {
        audio: NormalizedAudio,
        frames: Vec<AudioFrame>,
        tiles: Vec<MelTile>,
    },
}

impl SessionState {
    fn name(&self) -> &'static str {
        match self {
            SessionState::Empty => "empty",
            SessionState::Loaded(_) => "loaded",
            SessionState::Normalized(_) => "normalized",
            SessionState::Chunked { .. } => "chunked",
            SessionState::Featurized { .. } => "featurized",
        }
    }
}

/// Step-by-step driver over one audio input.
pub struct AudioSession<'a> {
    config: &'a PipelineConfig,
    featurizer: &'a Featurizer,
    state: SessionState,
}

impl<'a> AudioSession<'a> {
    pub fn new(config: &'a PipelineConfig, featurizer: &'a Featurizer) -> Self {
        Self {
            config,
            featurizer,
            state: SessionState::Empty,
        }
    }

    /// Current stage name (`"empty"`, `"loaded"`, …).
    pub fn stage(&self) -> &'static str {
        self.state.name()
    }

    /// Decode `bytes`, discarding anything a previous input produced.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let raw = audio::load_bytes(bytes)?;
        self.state = SessionState::Loaded(raw);
        Ok(())
    }

    /// Decode a file, discarding anything a previous input produced.
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let raw = audio::load_file(path)?;
        self.state = SessionState::Loaded(raw);
        Ok(())
    }

    /// Downmix + resample the loaded audio.
    pub fn normalize(&mut self) -> Result<&NormalizedAudio> {
        let SessionState::Loaded(raw) = &self.state else {
            return Err(self.invalid("loaded"));
        };
        let audio = audio::normalize(
            raw,
            self.config.target_sample_rate,
            self.config.resample_quality,
        )?;
        self.state = SessionState::Normalized(audio);
        self.normalized_audio()
    }

    /// Split the normalized audio into frames.
    pub fn chunk(&mut self) -> Result<&[AudioFrame]> {
        let audio = match std::mem::replace(&mut self.state, SessionState::Empty) {
            SessionState::Normalized(audio) => audio,
            other => {
                self.state = other;
                return Err(self.invalid("normalized"));
            }
        };
        match buffering::chunk(&audio, self.config.frame_length()) {
            Ok(frames) => {
                self.state = SessionState::Chunked { audio, frames };
                self.frames()
            }
            Err(e) => {
                self.state = SessionState::Normalized(audio);
                Err(e)
            }
        }
    }

    /// Turn every frame into a tile.
    pub fn featurize(&mut self) -> Result<&[MelTile]> {
        let (audio, frames) = match std::mem::replace(&mut self.state, SessionState::Empty) {
            SessionState::Chunked { audio, frames } => (audio, frames),
            other => {
                self.state = other;
                return Err(self.invalid("chunked"));
            }
        };
        match features::featurize_all(self.featurizer, &frames, self.config.workers, None) {
            Ok(tiles) => {
                self.state = SessionState::Featurized {
                    audio,
                    frames,
                    tiles,
                };
                self.tiles()
            }
            Err(e) => {
                self.state = SessionState::Chunked { audio, frames };
                Err(e)
            }
        }
    }

    pub fn normalized_audio(&self) -> Result<&NormalizedAudio> {
        match &self.state {
            SessionState::Normalized(audio)
            | SessionState::Chunked { audio, .. }
            | SessionState::Featurized { audio, .. } => Ok(audio),
            _ => Err(self.invalid("normalized")),
        }
    }

    pub fn frames(&self) -> Result<&[AudioFrame]> {
        match &self.state {
            SessionState::Chunked { frames, .. } | SessionState::Featurized { frames, .. } => {
                Ok(frames)
            }
            _ => Err(self.invalid("chunked")),
        }
    }

    pub fn tiles(&self) -> Result<&[MelTile]> {
        match &self.state {
            SessionState::Featurized { tiles, .. } => Ok(tiles),
            _ => Err(self.invalid("featurized")),
        }
    }

    /// Take the tiles, ending the session.
    pub fn into_tiles(self) -> Result<Vec<MelTile>> {
        match self.state {
            SessionState::Featurized { tiles, .. } => Ok(tiles),
            other => Err(MelsyncError::InvalidState {
                expected: "featurized",
                found: other.name(),
            }),
        }
    }

    /// Normalized duration in seconds; 0.0 before normalization.
    pub fn duration_secs(&self) -> f64 {
        self.normalized_audio()
            .map(NormalizedAudio::duration_secs)
            .unwrap_or(0.0)
    }

    /// Number of frames; 0 before chunking.
    pub fn frame_count(&self) -> usize {
        self.frames().map(<[AudioFrame]>::len).unwrap_or(0)
    }

    /// Write the normalized audio as a mono PCM16 WAV file.
    pub fn save_processed_audio(&self, path: &Path) -> Result<()> {
        let audio = self.normalized_audio()?;
        wav::write_pcm16_wav(path, audio.samples(), audio.sample_rate())?;
        info!(path = %path.display(), "saved processed audio");
        Ok(())
    }

    fn invalid(&self, expected: &'static str) -> MelsyncError {
        MelsyncError::InvalidState {
            expected,
            found: self.state.name(),
        }
    }
}
