//! Fixed-duration chunking of normalized audio.
//!
//! `chunk` slices a mono signal into consecutive, non-overlapping frames of
//! exactly `frame_length` samples starting at offset 0. The final partial
//! frame is right-padded with zeros, so no sample is ever dropped and no frame
//! is ever short. Empty input yields no frames.

pub mod frame;

use tracing::debug;

use crate::audio::NormalizedAudio;
use crate::error::{MelsyncError, Result};

pub use frame::AudioFrame;

/// Split `audio` into `ceil(len / frame_length)` frames.
///
/// # Errors
/// `InvalidConfig` when `frame_length` is zero.
pub fn chunk(audio: &NormalizedAudio, frame_length: usize) -> Result<Vec<AudioFrame>> {
    chunk_samples(audio.samples(), frame_length)
}

/// Slice-level variant of [`chunk`].
pub fn chunk_samples(samples: &[f32], frame_length: usize) -> Result<Vec<AudioFrame>> {
    if frame_length == 0 {
        return Err(MelsyncError::InvalidConfig(
            "frame_length must be > 0".into(),
        ));
    }

    let frames: Vec<AudioFrame> = samples
        .chunks(frame_length)
        .enumerate()
        .map(|(index, window)| {
            let mut buf = Vec::with_capacity(frame_length);
            buf.extend_from_slice(window);
            buf.resize(frame_length, 0.0);
            AudioFrame::new(index, buf, window.len())
        })
        .collect();

    debug!(
        samples = samples.len(),
        frame_length,
        frames = frames.len(),
        padded = frames.last().is_some_and(AudioFrame::is_padded),
        "chunked audio"
    );
    Ok(frames)
}

/// Number of frames `chunk` produces for `len` samples.
pub fn frame_count(len: usize, frame_length: usize) -> usize {
    if frame_length == 0 {
        return 0;
    }
    len.div_ceil(frame_length)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> NormalizedAudio {
        NormalizedAudio::from_mono((1..=len).map(|i| i as f32).collect(), 16_000)
    }

    #[test]
    fn one_second_gives_fifty_unpadded_frames() {
        let frames = chunk(&ramp(16_000), 320).unwrap();
        assert_eq!(frames.len(), 50);
        assert!(frames.iter().all(|f| f.len() == 320 && !f.is_padded()));
    }

    #[test]
    fn partial_tail_is_zero_padded() {
        let frames = chunk(&ramp(16_010), 320).unwrap();
        assert_eq!(frames.len(), 51);
        let last = &frames[50];
        assert_eq!(last.len(), 320);
        assert_eq!(last.valid_len, 10);
        assert_eq!(last.samples[9], 16_010.0);
        assert!(last.padding().iter().all(|&s| s == 0.0));
        assert_eq!(last.padding().len(), 310);
    }

    #[test]
    fn frames_are_in_order_and_lossless() {
        let audio = ramp(1_000);
        let frames = chunk(&audio, 64).unwrap();
        for (i, f) in frames.iter().enumerate() {
            assert_eq!(f.index, i);
        }
        let rebuilt: Vec<f32> = frames
            .iter()
            .flat_map(|f| f.samples[..f.valid_len].iter().copied())
            .collect();
        assert_eq!(rebuilt, audio.samples());
    }

    #[test]
    fn empty_input_yields_no_frames() {
        let frames = chunk(&NormalizedAudio::from_mono(vec![], 16_000), 320).unwrap();
        assert!(frames.is_empty());
    }

    #[test]
    fn zero_frame_length_rejected() {
        assert!(chunk(&ramp(10), 0).is_err());
    }

    #[test]
    fn frame_count_matches_chunk() {
        for len in [0, 1, 319, 320, 321, 16_010] {
            assert_eq!(chunk(&ramp(len), 320).unwrap().len(), frame_count(len, 320));
        }
    }
}
