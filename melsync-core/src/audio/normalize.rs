//! Downmix to mono and resample to the pipeline's target rate.

use tracing::{debug, info};

use super::loader::RawAudioBuffer;
use super::resample::RateConverter;
use crate::config::ResampleQuality;
use crate::error::Result;

/// Mono audio at the configured target rate.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedAudio {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl NormalizedAudio {
    /// Wrap samples that are already mono at `sample_rate`.
    pub fn from_mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Always 1.
    pub fn channels(&self) -> u16 {
        1
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Arithmetic mean across channels per sample index.
///
/// Equal weighting for every channel; no loudness-aware mixing.
pub fn downmix(interleaved: &[f32], channels: u16) -> Vec<f32> {
    let ch = channels.max(1) as usize;
    if ch == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Produce mono audio at `target_rate` from a decoded buffer.
///
/// Rates that already match pass through untouched.
pub fn normalize(
    buf: &RawAudioBuffer,
    target_rate: u32,
    quality: ResampleQuality,
) -> Result<NormalizedAudio> {
    let mono = downmix(buf.samples(), buf.channels());
    if buf.channels() > 1 {
        debug!(channels = buf.channels(), "downmixed to mono");
    }

    let mut converter = RateConverter::new(buf.sample_rate(), target_rate, quality)?;
    let samples = if converter.is_passthrough() {
        mono
    } else {
        let out = converter.convert(&mono)?;
        debug!(
            "resampled from {}Hz to {}Hz",
            buf.sample_rate(),
            target_rate
        );
        out
    };

    let audio = NormalizedAudio::from_mono(samples, target_rate);
    info!(
        samples = audio.len(),
        "normalized audio: duration={:.2}s",
        audio.duration_secs()
    );
    Ok(audio)
}
