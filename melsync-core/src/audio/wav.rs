//! Mono PCM16 WAV encoding.

use std::io::{Cursor, Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::error::{MelsyncError, Result};

/// Encode mono f32 samples as a 16-bit PCM WAV blob.
pub fn encode_pcm16(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    write_pcm16(&mut cursor, samples, sample_rate)?;
    Ok(cursor.into_inner())
}

/// Write mono f32 samples to `path` as a 16-bit PCM WAV file.
pub fn write_pcm16_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_pcm16(file, samples, sample_rate)
}

fn write_pcm16<W: Write + Seek>(sink: W, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::new(sink, spec).map_err(encode_error)?;
    for &sample in samples {
        let v = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        writer.write_sample(v).map_err(encode_error)?;
    }
    writer.finalize().map_err(encode_error)
}

fn encode_error(e: hound::Error) -> MelsyncError {
    match e {
        hound::Error::IoError(io) => MelsyncError::Io(io),
        other => MelsyncError::Other(anyhow::anyhow!("wav encode: {other}")),
    }
}
