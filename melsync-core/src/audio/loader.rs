//! Audio decoding into a `RawAudioBuffer`.
//!
//! Decodes WAV containers with `hound`, keeping the native sample rate and
//! channel layout. Integer PCM of any bit depth is scaled by `2^(bits-1)`
//! into [-1.0, 1.0); float PCM is passed through.

use std::io::{Cursor, Read};
use std::path::Path;

use hound::{SampleFormat, WavReader};
use tracing::{error, info};

use crate::error::{MelsyncError, Result};

/// Decoded audio exactly as the container stored it.
///
/// Samples are interleaved when `channels > 1`. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl RawAudioBuffer {
    /// Wrap already-decoded interleaved samples.
    ///
    /// # Errors
    /// `Decode` when the layout is inconsistent (zero channels, zero rate, or a
    /// sample count that is not a multiple of the channel count).
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self> {
        if channels == 0 {
            return Err(format_error("zero channels"));
        }
        if sample_rate == 0 {
            return Err(format_error("zero sample rate"));
        }
        if samples.len() % channels as usize != 0 {
            return Err(format_error("sample count not a multiple of channel count"));
        }
        Ok(Self {
            samples,
            sample_rate,
            channels,
        })
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Samples per channel.
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Decode an in-memory audio blob (e.g. TTS engine output).
///
/// # Errors
/// `Decode` carrying the decoder failure for empty, corrupt or unsupported input.
pub fn load_bytes(bytes: &[u8]) -> Result<RawAudioBuffer> {
    let buf = decode(Cursor::new(bytes)).inspect_err(|e| {
        error!(len = bytes.len(), "failed to load audio from bytes: {e}");
    })?;
    info!(
        samples = buf.frames(),
        sample_rate = buf.sample_rate,
        channels = buf.channels,
        "loaded audio: duration={:.2}s",
        buf.duration_secs()
    );
    Ok(buf)
}

/// Decode an audio file.
///
/// # Errors
/// `Io` when the file cannot be read, `Decode` when its content is not audio.
pub fn load_file(path: &Path) -> Result<RawAudioBuffer> {
    let bytes = std::fs::read(path).inspect_err(|e| {
        error!(path = %path.display(), "failed to read audio file: {e}");
    })?;
    let buf = decode(Cursor::new(bytes)).inspect_err(|e| {
        error!(path = %path.display(), "failed to decode audio file: {e}");
    })?;
    info!(
        path = %path.display(),
        samples = buf.frames(),
        sample_rate = buf.sample_rate,
        channels = buf.channels,
        "loaded audio file"
    );
    Ok(buf)
}

fn decode<R: Read>(source: R) -> Result<RawAudioBuffer> {
    let reader = WavReader::new(source).map_err(MelsyncError::Decode)?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(MelsyncError::Decode)?,
        SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(format_error("unsupported integer bit depth"));
            }
            let scale = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(MelsyncError::Decode)?
        }
    };

    RawAudioBuffer::new(samples, spec.sample_rate, spec.channels)
}

fn format_error(msg: &'static str) -> MelsyncError {
    MelsyncError::Decode(hound::Error::FormatError(msg))
}
