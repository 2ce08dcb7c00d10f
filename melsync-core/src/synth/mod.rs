//! Speech synthesis collaborator.
//!
//! The `SpeechSynthesizer` trait decouples the pipeline from any specific
//! TTS engine. The pipeline only needs "text + voice in, audio bytes out";
//! the bytes go straight into the loader.
//!
//! `&mut self` on `synthesize` expresses that engines are stateful (loaded
//! voice models, query caches). All mutation is serialised through
//! `SynthHandle`'s `parking_lot::Mutex`.

pub mod catalog;
pub mod stub;

pub use catalog::VoiceCatalog;
pub use stub::ToneSynthesizer;

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Engine-specific voice style identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleId(pub u32);

impl std::fmt::Display for StyleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Contract for TTS backends.
pub trait SpeechSynthesizer: Send + 'static {
    /// Render `text` in the given voice as a complete audio container
    /// (WAV for the bundled stub).
    ///
    /// Callers reject empty text before reaching the engine.
    fn synthesize(&mut self, text: &str, voice: StyleId) -> Result<Vec<u8>>;
}

/// Thread-safe reference-counted handle to any `SpeechSynthesizer` implementor.
#[derive(Clone)]
pub struct SynthHandle(pub Arc<Mutex<dyn SpeechSynthesizer>>);

impl SynthHandle {
    /// Wrap any `SpeechSynthesizer` in a `SynthHandle`.
    pub fn new<S: SpeechSynthesizer>(engine: S) -> Self {
        Self(Arc::new(Mutex::new(engine)))
    }

    pub fn synthesize(&self, text: &str, voice: StyleId) -> Result<Vec<u8>> {
        self.0.lock().synthesize(text, voice)
    }
}

impl std::fmt::Debug for SynthHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthHandle").finish_non_exhaustive()
    }
}
