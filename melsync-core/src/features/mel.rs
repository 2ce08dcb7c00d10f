//! Numeric kernels for the mel frontend: Hann window, Slaney mel scale and
//! the triangular filterbank.

use std::f32::consts::PI;

use super::MelParams;

// Slaney scale: linear at 200/3 Hz per mel up to 1 kHz (15 mel), then
// logarithmic with 27 mel per factor of 6.4.
const LINEAR_HZ_PER_MEL: f32 = 200.0 / 3.0;
const BREAK_HZ: f32 = 1_000.0;
const BREAK_MEL: f32 = BREAK_HZ / LINEAR_HZ_PER_MEL;
const MELS_PER_LOG_STEP: f32 = 27.0;
const LOG_STEP_RATIO: f32 = 6.4;

fn log_step() -> f32 {
    LOG_STEP_RATIO.ln() / MELS_PER_LOG_STEP
}

/// Hz → Slaney mel.
pub fn hz_to_mel(hz: f32) -> f32 {
    if hz < BREAK_HZ {
        return hz / LINEAR_HZ_PER_MEL;
    }
    BREAK_MEL + (hz / BREAK_HZ).ln() / log_step()
}

/// Slaney mel → Hz.
pub fn mel_to_hz(mel: f32) -> f32 {
    if mel < BREAK_MEL {
        return mel * LINEAR_HZ_PER_MEL;
    }
    BREAK_HZ * ((mel - BREAK_MEL) * log_step()).exp()
}

/// Periodic Hann window of `window_length`, zero-padded on both sides and
/// centered inside a buffer of `fft_size`.
pub fn build_centered_hann(window_length: usize, fft_size: usize) -> Vec<f32> {
    let window_length = window_length.min(fft_size);
    let offset = (fft_size - window_length) / 2;
    let mut out = vec![0f32; fft_size];
    let step = 2.0 * PI / window_length as f32;
    for (i, w) in out[offset..offset + window_length].iter_mut().enumerate() {
        *w = 0.5 - 0.5 * (step * i as f32).cos();
    }
    out
}

/// One triangular band, stored as its non-zero span of FFT bins.
#[derive(Debug, Clone)]
struct Band {
    first_bin: usize,
    weights: Vec<f32>,
}

/// Area-normalized triangular filters over `fft_size / 2 + 1` power bins.
///
/// Band edges are evenly spaced on the Slaney scale between `min_freq` and
/// `max_freq`; each triangle is scaled by `2 / (upper_hz - lower_hz)`.
#[derive(Debug, Clone)]
pub struct MelFilterbank {
    bands: Vec<Band>,
    n_bins: usize,
}

impl MelFilterbank {
    pub fn new(params: &MelParams) -> Self {
        let n_bins = params.fft_size / 2 + 1;
        let bin_hz = params.sample_rate as f32 / params.fft_size as f32;
        let lo = hz_to_mel(params.min_freq);
        let hi = hz_to_mel(params.max_freq);
        let divisions = (params.mel_bands + 1) as f32;
        let edges: Vec<f32> = (0..params.mel_bands + 2)
            .map(|i| mel_to_hz(lo + (hi - lo) * i as f32 / divisions))
            .collect();

        let bands = edges
            .windows(3)
            .map(|edge| {
                let (lower, center, upper) = (edge[0], edge[1], edge[2]);
                let scale = 2.0 / (upper - lower).max(1e-10);
                let rise = (center - lower).max(1e-10);
                let fall = (upper - center).max(1e-10);
                let weight_at = |bin: usize| {
                    let f = bin as f32 * bin_hz;
                    let w = ((f - lower) / rise).min((upper - f) / fall);
                    w.max(0.0) * scale
                };

                let first_bin = ((lower / bin_hz).floor() as usize).min(n_bins);
                let end_bin = ((upper / bin_hz).ceil() as usize + 1).min(n_bins);
                let weights: Vec<f32> = (first_bin..end_bin).map(weight_at).collect();
                Band { first_bin, weights }
            })
            .collect();

        Self { bands, n_bins }
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Number of power bins each band expects.
    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    /// Dense weights of band `m` across all bins.
    pub fn dense_row(&self, m: usize) -> Vec<f32> {
        let mut row = vec![0f32; self.n_bins];
        if let Some(band) = self.bands.get(m) {
            row[band.first_bin..band.first_bin + band.weights.len()]
                .copy_from_slice(&band.weights);
        }
        row
    }

    /// Mel energies of one power spectrum, one value per band.
    pub fn project<'a>(&'a self, power: &'a [f32]) -> impl Iterator<Item = f32> + 'a {
        self.bands.iter().map(move |band| {
            let bins = power.get(band.first_bin..).unwrap_or(&[]);
            band.weights.iter().zip(bins).map(|(w, p)| w * p).sum()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use approx::assert_abs_diff_eq;

    fn canonical() -> MelFilterbank {
        MelFilterbank::new(&PipelineConfig::default().mel_params())
    }

    #[test]
    fn mel_scale_round_trips() {
        for hz in [0.0f32, 55.0, 999.0, 1_000.0, 4_000.0, 7_600.0] {
            assert_abs_diff_eq!(mel_to_hz(hz_to_mel(hz)), hz, epsilon = 1e-2);
        }
    }

    #[test]
    fn linear_region_below_1khz() {
        assert_abs_diff_eq!(hz_to_mel(200.0), 3.0, epsilon = 1e-5);
        assert_abs_diff_eq!(hz_to_mel(1_000.0), 15.0, epsilon = 1e-5);
        // 6.4 kHz is exactly one log step (27 mel) above the break.
        assert_abs_diff_eq!(hz_to_mel(6_400.0), 42.0, epsilon = 1e-3);
    }

    #[test]
    fn hann_is_centered_and_periodic() {
        let w = build_centered_hann(4, 8);
        assert_eq!(w.len(), 8);
        assert_eq!(&w[..2], &[0.0, 0.0]);
        assert_eq!(&w[6..], &[0.0, 0.0]);
        assert_abs_diff_eq!(w[2], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(w[3], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(w[4], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(w[5], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn filters_stay_inside_band() {
        let bank = canonical();
        assert_eq!(bank.len(), 80);
        assert_eq!(bank.n_bins(), 401);
        // Bin k sits at k * 20 Hz: DC and 20 Hz are below 55 Hz.
        for m in 0..bank.len() {
            let row = bank.dense_row(m);
            assert_eq!(row[0], 0.0);
            assert_eq!(row[1], 0.0);
            assert_eq!(row[400], 0.0);
        }
        assert!((40..80).all(|m| bank.dense_row(m).iter().any(|&w| w > 0.0)));
    }

    #[test]
    fn triangle_area_is_normalized() {
        // Integral of each triangle over Hz is 1; at 20 Hz per bin the sum of
        // weights times the bin width approximates it for the wide bands.
        let bank = canonical();
        for m in 60..80 {
            let area: f32 = bank.dense_row(m).iter().sum::<f32>() * 20.0;
            assert_abs_diff_eq!(area, 1.0, epsilon = 0.05);
        }
    }

    #[test]
    fn projection_matches_dense_product() {
        let bank = canonical();
        let power: Vec<f32> = (0..401).map(|k| (k as f32 * 0.37).sin().abs()).collect();
        for (m, energy) in bank.project(&power).enumerate() {
            let dense: f32 = bank.dense_row(m).iter().zip(&power).map(|(w, p)| w * p).sum();
            assert_abs_diff_eq!(energy, dense, epsilon = 1e-5);
        }
    }
}
