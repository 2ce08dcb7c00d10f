//! Sample-rate conversion using a rubato `SincFixedIn` resampler.
//!
//! ## Design
//!
//! TTS engines emit audio at their own rate (22.05, 24, 44.1 or 48 kHz are
//! common). Tiles are defined on 16 kHz mono f32. `RateConverter` bridges that
//! gap with band-limited sinc interpolation over a whole buffer.
//!
//! When source rate == target rate, `RateConverter` is a passthrough and no
//! rubato session is created at all, so the samples come back bit-identical.
//!
//! Fed through `process` / `process_partial`, `SincFixedIn` already emits
//! time-aligned output: sample `i` of the result corresponds to time
//! `i / target` in the source. The converter only flushes the tail with
//! silence until `round(len * target / source)` samples exist, then trims to
//! exactly that length.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

use crate::config::ResampleQuality;
use crate::error::{MelsyncError, Result};

/// Input frames per rubato call.
const CHUNK_SIZE: usize = 1024;

/// Upper bound on silent flush calls.
const MAX_FLUSH_CALLS: usize = 64;

/// Converts f32 mono audio from one fixed sample rate to another.
pub struct RateConverter {
    /// `None` when source rate == target rate (passthrough mode).
    resampler: Option<SincFixedIn<f32>>,
    source_rate: u32,
    target_rate: u32,
}

impl RateConverter {
    /// Create a new converter.
    ///
    /// # Errors
    /// `InvalidConfig` for a zero rate, `Resample` if rubato fails to initialise.
    pub fn new(source_rate: u32, target_rate: u32, quality: ResampleQuality) -> Result<Self> {
        if source_rate == 0 || target_rate == 0 {
            return Err(MelsyncError::InvalidConfig(format!(
                "cannot resample {source_rate} Hz -> {target_rate} Hz"
            )));
        }
        if source_rate == target_rate {
            return Ok(Self {
                resampler: None,
                source_rate,
                target_rate,
            });
        }

        let (sinc_len, oversampling_factor) = match quality {
            ResampleQuality::High => (256, 256),
            ResampleQuality::Normal => (128, 128),
        };
        let params = SincInterpolationParameters {
            sinc_len,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor,
            window: WindowFunction::BlackmanHarris2,
        };

        let ratio = target_rate as f64 / source_rate as f64;
        let resampler = SincFixedIn::<f32>::new(
            ratio, 1.0, // fixed ratio, no dynamic adjustment
            params, CHUNK_SIZE, 1, // mono
        )
        .map_err(|e| MelsyncError::Resample(format!("resampler init: {e}")))?;

        debug!(
            source_rate,
            target_rate,
            delay = resampler.output_delay(),
            "sinc resampler ready"
        );

        Ok(Self {
            resampler: Some(resampler),
            source_rate,
            target_rate,
        })
    }

    /// Returns `true` when source rate == target rate (no resampling occurs).
    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }

    /// Output length for `input_len` source samples.
    pub fn expected_len(&self, input_len: usize) -> usize {
        (input_len as f64 * self.target_rate as f64 / self.source_rate as f64).round() as usize
    }

    /// Convert a complete mono signal.
    pub fn convert(&mut self, samples: &[f32]) -> Result<Vec<f32>> {
        let expected = self.expected_len(samples.len());
        let Some(ref mut resampler) = self.resampler else {
            return Ok(samples.to_vec());
        };
        if samples.is_empty() {
            return Ok(Vec::new());
        }

        let mut out = Vec::with_capacity(expected + CHUNK_SIZE);

        for chunk in samples.chunks(CHUNK_SIZE) {
            let input: [&[f32]; 1] = [chunk];
            let produced = if chunk.len() == CHUNK_SIZE {
                resampler.process(&input[..], None)
            } else {
                resampler.process_partial(Some(&input[..]), None)
            }
            .map_err(|e| MelsyncError::Resample(e.to_string()))?;
            if let Some(channel) = produced.first() {
                out.extend_from_slice(channel);
            }
        }

        let mut flushes = 0;
        while out.len() < expected && flushes < MAX_FLUSH_CALLS {
            let produced = resampler
                .process_partial(None::<&[&[f32]]>, None)
                .map_err(|e| MelsyncError::Resample(e.to_string()))?;
            match produced.first() {
                Some(channel) if !channel.is_empty() => out.extend_from_slice(channel),
                _ => break,
            }
            flushes += 1;
        }

        out.resize(expected, 0.0);
        resampler.reset();
        Ok(out)
    }
}

/// One-shot conversion of a mono signal.
pub fn resample(
    samples: &[f32],
    source_rate: u32,
    target_rate: u32,
    quality: ResampleQuality,
) -> Result<Vec<f32>> {
    RateConverter::new(source_rate, target_rate, quality)?.convert(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin() * 0.5)
            .collect()
    }

    #[test]
    fn passthrough_identity() {
        let mut rc = RateConverter::new(16_000, 16_000, ResampleQuality::High).unwrap();
        assert!(rc.is_passthrough());
        let samples: Vec<f32> = (0..480).map(|i| i as f32 * 0.001).collect();
        let out = rc.convert(&samples).unwrap();
        assert_eq!(out, samples);
    }

    #[test]
    fn ratio_48k_to_16k_exact_length() {
        let out = resample(&vec![0.0f32; 4_800], 48_000, 16_000, ResampleQuality::Normal).unwrap();
        assert_eq!(out.len(), 1_600);
    }

    #[test]
    fn upsample_length_rounds() {
        // 1000 * 16000 / 11025 = 1451.25…
        let out = resample(&vec![0.0f32; 1_000], 11_025, 16_000, ResampleQuality::Normal).unwrap();
        assert_eq!(out.len(), 1_451);
    }

    #[test]
    fn empty_input_gives_empty_output() {
        let out = resample(&[], 44_100, 16_000, ResampleQuality::High).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn delay_is_compensated() {
        // A 440 Hz tone should stay aligned: correlation with the reference
        // generated directly at the target rate must be strongly positive.
        let src = sine(440.0, 48_000, 48_000);
        let out = resample(&src, 48_000, 16_000, ResampleQuality::High).unwrap();
        let reference = sine(440.0, 16_000, 16_000);
        let mid = 4_000..12_000;
        let dot: f32 = mid.clone().map(|i| out[i] * reference[i]).sum();
        let norm: f32 = mid.map(|i| reference[i] * reference[i]).sum();
        assert!(dot / norm > 0.9, "correlation {}", dot / norm);
    }

    fn peak_index(samples: &[f32]) -> usize {
        samples
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn impulse_keeps_its_position() {
        // An impulse half a second in must land at 8000 in the 16 kHz output.
        for from in [48_000u32, 44_100, 24_000, 22_050] {
            let mut src = vec![0.0f32; from as usize];
            src[from as usize / 2] = 1.0;
            for quality in [ResampleQuality::High, ResampleQuality::Normal] {
                let out = resample(&src, from, 16_000, quality).unwrap();
                assert_eq!(out.len(), 16_000);
                let peak = peak_index(&out) as i64;
                assert!((peak - 8_000).abs() <= 1, "from={from} peak_at={peak}");
            }
        }
    }

    #[test]
    fn zero_rate_rejected() {
        assert!(RateConverter::new(0, 16_000, ResampleQuality::High).is_err());
    }
}
