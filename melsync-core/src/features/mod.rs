//! Log-mel featurizer: one fixed-shape tile per audio frame.
//!
//! ## Parameters (canonical lip-sync frontend)
//!
//! | Parameter       | Value          |
//! |-----------------|----------------|
//! | Sample rate     | 16 000 Hz      |
//! | Frame length    | 320 (20 ms)    |
//! | Hann window     | 800 samples    |
//! | FFT size        | 800            |
//! | Frequency bins  | 401 (800/2+1)  |
//! | Hop length      | 160            |
//! | Mel bands       | 80             |
//! | Mel range       | 55–7 600 Hz    |
//! | Tile            | 80 × 4         |
//!
//! ## Per-frame algorithm
//!
//! 1. Fit the frame to `frame_length` (zero-pad or truncate).
//! 2. Zero-pad `fft_size / 2` on both sides so window 0 is centered on sample 0.
//! 3. Power spectrum of each Hann-windowed hop.
//! 4. Project onto the mel filterbank, then `ln(energy + epsilon)`.
//! 5. Fix the time axis to `target_time_steps`: repeat the last column when
//!    short (never zeros, which would read as silence), truncate when long.

pub mod mel;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use ndarray::Array2;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use tracing::{debug, trace, warn};

use crate::buffering::AudioFrame;
use crate::error::{MelsyncError, Result};

/// Featurizer parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MelParams {
    pub sample_rate: u32,
    /// Frame length the featurizer expects; other lengths are fitted to it.
    pub frame_length: usize,
    pub mel_bands: usize,
    pub fft_size: usize,
    pub hop_length: usize,
    pub window_length: usize,
    pub min_freq: f32,
    pub max_freq: f32,
    pub target_time_steps: usize,
    pub log_epsilon: f32,
}

impl MelParams {
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(MelsyncError::InvalidConfig(msg));
        if self.sample_rate == 0 {
            return fail("sample_rate must be > 0".into());
        }
        if self.frame_length == 0 {
            return fail("frame_length must be > 0".into());
        }
        if self.mel_bands == 0 || self.target_time_steps == 0 {
            return fail("tile dimensions must be > 0".into());
        }
        if self.fft_size < 2 {
            return fail(format!("fft_size {} too small", self.fft_size));
        }
        if self.window_length == 0 || self.window_length > self.fft_size {
            return fail(format!(
                "window_length {} must be in 1..={}",
                self.window_length, self.fft_size
            ));
        }
        if self.hop_length == 0 {
            return fail("hop_length must be > 0".into());
        }
        let nyquist = self.sample_rate as f32 / 2.0;
        if !(self.min_freq >= 0.0 && self.min_freq < self.max_freq && self.max_freq <= nyquist) {
            return fail(format!(
                "frequency range [{}, {}] must satisfy 0 <= min < max <= {nyquist}",
                self.min_freq, self.max_freq
            ));
        }
        if !(self.log_epsilon.is_finite() && self.log_epsilon > 0.0) {
            return fail("log_epsilon must be a positive finite number".into());
        }
        Ok(())
    }

    /// Tile shape `(mel_bands, target_time_steps)`.
    pub fn tile_shape(&self) -> (usize, usize) {
        (self.mel_bands, self.target_time_steps)
    }

    /// STFT columns produced for one fitted frame before the time-axis fix.
    pub fn raw_time_steps(&self) -> usize {
        let padded = self.frame_length + 2 * (self.fft_size / 2);
        1 + padded.saturating_sub(self.fft_size) / self.hop_length
    }
}

/// One log-mel tile, shape `(mel_bands, time_steps)`.
#[derive(Debug, Clone, PartialEq)]
pub struct MelTile {
    /// Index of the source frame.
    pub index: usize,
    pub data: Array2<f32>,
}

impl MelTile {
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Values in row-major (mel band major) order.
    pub fn values(&self) -> impl Iterator<Item = f32> + '_ {
        self.data.iter().copied()
    }
}

/// Precomputed STFT + filterbank state. Cheap to share across threads.
pub struct Featurizer {
    params: MelParams,
    window: Vec<f32>,
    filterbank: mel::MelFilterbank,
    fft: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for Featurizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Featurizer")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl Featurizer {
    /// # Errors
    /// `InvalidConfig` when the parameters cannot produce a valid tile.
    pub fn new(params: MelParams) -> Result<Self> {
        params.validate()?;
        let window = mel::build_centered_hann(params.window_length, params.fft_size);
        let filterbank = mel::MelFilterbank::new(&params);
        let fft = FftPlanner::<f32>::new().plan_fft_forward(params.fft_size);
        debug!(
            fft_size = params.fft_size,
            hop = params.hop_length,
            mel_bands = params.mel_bands,
            raw_steps = params.raw_time_steps(),
            "featurizer ready"
        );
        Ok(Self {
            params,
            window,
            filterbank,
            fft,
        })
    }

    pub fn params(&self) -> &MelParams {
        &self.params
    }

    /// Featurize one frame.
    pub fn featurize(&self, frame: &AudioFrame) -> Result<MelTile> {
        let data = self.featurize_samples(&frame.samples)?;
        Ok(MelTile {
            index: frame.index,
            data,
        })
    }

    /// Featurize a raw sample slice of (nominally) `frame_length` samples.
    ///
    /// # Errors
    /// `ShapeInvariant` if the tile does not come out as
    /// `(mel_bands, target_time_steps)`.
    pub fn featurize_samples(&self, samples: &[f32]) -> Result<Array2<f32>> {
        let p = &self.params;
        if samples.len() != p.frame_length {
            warn!(
                got = samples.len(),
                expected = p.frame_length,
                "frame length mismatch, fitting before analysis"
            );
        }

        let pad = p.fft_size / 2;
        let fitted_len = p.frame_length;
        let mut padded = vec![0f32; fitted_len + 2 * pad];
        let take = samples.len().min(fitted_len);
        padded[pad..pad + take].copy_from_slice(&samples[..take]);

        let n_freqs = p.fft_size / 2 + 1;
        let n_cols = 1 + (padded.len() - p.fft_size) / p.hop_length;
        let mut raw = Array2::<f32>::zeros((p.mel_bands, n_cols));
        let mut fft_buf = vec![Complex::new(0.0f32, 0.0); p.fft_size];
        let mut power = vec![0f32; n_freqs];

        for col in 0..n_cols {
            let start = col * p.hop_length;
            for (i, slot) in fft_buf.iter_mut().enumerate() {
                *slot = Complex::new(padded[start + i] * self.window[i], 0.0);
            }
            self.fft.process(&mut fft_buf);
            for (k, pw) in power.iter_mut().enumerate() {
                *pw = fft_buf[k].norm_sqr();
            }

            for (m, energy) in self.filterbank.project(&power).enumerate() {
                raw[[m, col]] = (energy + p.log_epsilon).ln();
            }
        }

        let tile = fit_time_axis(&raw, p.target_time_steps);
        if n_cols != p.target_time_steps {
            trace!(raw = n_cols, target = p.target_time_steps, "time axis fitted");
        }

        let expected = p.tile_shape();
        let actual = tile.dim();
        debug_assert_eq!(actual, expected, "tile shape invariant");
        if actual != expected {
            return Err(MelsyncError::ShapeInvariant { expected, actual });
        }
        Ok(tile)
    }
}

/// Repeat the last column to reach `target` columns, or keep the first `target`.
pub fn fit_time_axis(raw: &Array2<f32>, target: usize) -> Array2<f32> {
    let (rows, cols) = raw.dim();
    if cols == 0 {
        return Array2::zeros((rows, 0));
    }
    Array2::from_shape_fn((rows, target), |(m, t)| raw[[m, t.min(cols - 1)]])
}

/// Featurize every frame in order.
///
/// With `workers > 1` frames are fanned out to scoped threads and the tiles
/// reassembled by position. `running`, when given, is checked before each
/// frame; clearing it stops the run with `Cancelled`. The error of the lowest
/// failing frame is returned: after a failure, workers skip only frames above
/// it, so every earlier frame is still analysed.
pub fn featurize_all(
    featurizer: &Featurizer,
    frames: &[AudioFrame],
    workers: usize,
    running: Option<&AtomicBool>,
) -> Result<Vec<MelTile>> {
    let workers = workers.clamp(1, frames.len().max(1));
    if workers == 1 {
        return featurize_sequential(featurizer, frames, running);
    }
    featurize_parallel(frames, workers, running, |frame| featurizer.featurize(frame))
}

/// Fan `frames` out to `workers` scoped threads running `analyse`.
fn featurize_parallel<F>(
    frames: &[AudioFrame],
    workers: usize,
    running: Option<&AtomicBool>,
    analyse: F,
) -> Result<Vec<MelTile>>
where
    F: Fn(&AudioFrame) -> Result<MelTile> + Sync,
{
    let (job_tx, job_rx) = crossbeam_channel::unbounded::<(usize, &AudioFrame)>();
    let (res_tx, res_rx) = crossbeam_channel::unbounded::<(usize, Result<MelTile>)>();
    for job in frames.iter().enumerate() {
        // Receiver is alive until the scope below ends.
        let _ = job_tx.send(job);
    }
    drop(job_tx);

    // Lowest failing position seen so far; usize::MAX while none failed.
    let lowest_failure = AtomicUsize::new(usize::MAX);
    std::thread::scope(|s| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let res_tx = res_tx.clone();
            let lowest_failure = &lowest_failure;
            let analyse = &analyse;
            s.spawn(move || {
                for (pos, frame) in job_rx.iter() {
                    if pos > lowest_failure.load(Ordering::Acquire) {
                        continue;
                    }
                    let result = if is_cancelled(running) {
                        Err(MelsyncError::Cancelled)
                    } else {
                        analyse(frame)
                    };
                    if result.is_err() {
                        lowest_failure.fetch_min(pos, Ordering::AcqRel);
                    }
                    if res_tx.send((pos, result)).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(res_tx);

    let mut slots: Vec<Option<MelTile>> = (0..frames.len()).map(|_| None).collect();
    let mut first_err: Option<(usize, MelsyncError)> = None;
    for (pos, result) in res_rx.iter() {
        match result {
            Ok(tile) => slots[pos] = Some(tile),
            Err(e) => {
                if first_err.as_ref().map_or(true, |(p, _)| pos < *p) {
                    first_err = Some((pos, e));
                }
            }
        }
    }
    if let Some((pos, e)) = first_err {
        debug!(frame = pos, "featurize aborted: {e}");
        return Err(e);
    }

    slots
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| MelsyncError::Other(anyhow::anyhow!("featurize worker dropped a frame")))
}

fn featurize_sequential(
    featurizer: &Featurizer,
    frames: &[AudioFrame],
    running: Option<&AtomicBool>,
) -> Result<Vec<MelTile>> {
    let mut tiles = Vec::with_capacity(frames.len());
    for (i, frame) in frames.iter().enumerate() {
        if is_cancelled(running) {
            return Err(MelsyncError::Cancelled);
        }
        let tile = featurizer.featurize(frame)?;
        if i < 3 {
            debug!(frame = i, shape = ?tile.shape(), "tile");
        }
        tiles.push(tile);
    }
    Ok(tiles)
}

fn is_cancelled(running: Option<&AtomicBool>) -> bool {
    running.is_some_and(|r| !r.load(Ordering::Relaxed))
}
