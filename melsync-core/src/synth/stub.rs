//! `ToneSynthesizer`: placeholder engine that renders text as a tone burst.
//!
//! Produces deterministic mono PCM16 WAV bytes so the full
//! text → audio → tiles path can run without a real TTS engine.

use tracing::debug;

use super::{SpeechSynthesizer, StyleId, VoiceCatalog};
use crate::audio::wav::encode_pcm16;
use crate::error::{MelsyncError, Result};

/// Tone-burst stub engine.
///
/// Each character lasts `ms_per_char`; the pitch is `base_hz + 20 Hz * style`.
/// Whitespace renders as silence so word boundaries show up in the tiles.
#[derive(Debug, Clone)]
pub struct ToneSynthesizer {
    sample_rate: u32,
    ms_per_char: u32,
    base_hz: f32,
    utterance_count: u64,
}

impl ToneSynthesizer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ms_per_char: 60,
            base_hz: 180.0,
            utterance_count: 0,
        }
    }

    pub fn with_ms_per_char(mut self, ms: u32) -> Self {
        self.ms_per_char = ms;
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples rendered per character.
    pub fn samples_per_char(&self) -> usize {
        (self.sample_rate as u64 * self.ms_per_char as u64 / 1000) as usize
    }

    /// Named voices of the tone engine. Styles only shift the pitch.
    pub fn voice_catalog() -> VoiceCatalog {
        VoiceCatalog::from_entries([
            ("tone", "normal", StyleId(0)),
            ("tone", "bright", StyleId(6)),
            ("tone", "deep", StyleId(2)),
            ("hum", "normal", StyleId(1)),
            ("hum", "whisper", StyleId(4)),
        ])
    }
}

impl Default for ToneSynthesizer {
    fn default() -> Self {
        Self::new(24_000)
    }
}

impl SpeechSynthesizer for ToneSynthesizer {
    fn synthesize(&mut self, text: &str, voice: StyleId) -> Result<Vec<u8>> {
        if self.sample_rate == 0 {
            return Err(MelsyncError::Synthesis("sample rate is zero".into()));
        }
        self.utterance_count += 1;

        let per_char = self.samples_per_char();
        let freq = self.base_hz + 20.0 * voice.0 as f32;
        let sr = self.sample_rate as f32;
        let mut samples = Vec::with_capacity(per_char * text.chars().count());
        for ch in text.chars() {
            let start = samples.len();
            if ch.is_whitespace() {
                samples.resize(start + per_char, 0.0);
                continue;
            }
            for i in 0..per_char {
                let t = (start + i) as f32 / sr;
                // Short linear fade at both ends of each character.
                let edge = (i.min(per_char - 1 - i) as f32 / 64.0).min(1.0);
                samples.push((2.0 * std::f32::consts::PI * freq * t).sin() * 0.4 * edge);
            }
        }

        debug!(
            utterance = self.utterance_count,
            chars = text.chars().count(),
            samples = samples.len(),
            voice = %voice,
            "tone synthesis"
        );
        encode_pcm16(&samples, self.sample_rate)
    }
}
