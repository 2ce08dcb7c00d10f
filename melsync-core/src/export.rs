//! Tile persistence and opt-in debug dumps.
//!
//! ## Tensor dump layout (little endian)
//!
//! | Offset | Type     | Field                         |
//! |--------|----------|-------------------------------|
//! | 0      | `[u8;4]` | magic `"MELT"`                |
//! | 4      | `u32`    | version (1)                   |
//! | 8      | `u32`    | tile count                    |
//! | 12     | `u32`    | mel bands                     |
//! | 16     | `u32`    | time steps                    |
//! | 20     | `f32`…   | tiles, each row-major         |

use std::io::{Read, Write};
use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{MelsyncError, Result};
use crate::features::MelTile;

pub const DUMP_MAGIC: &[u8; 4] = b"MELT";
pub const DUMP_VERSION: u32 = 1;

/// Largest `bands * steps` a dump may declare per tile.
pub const MAX_TILE_VALUES: usize = 1 << 20;

/// Write `tiles` as a binary tensor dump.
///
/// # Errors
/// `ShapeInvariant` if the tiles do not all share one shape.
pub fn write_tensor_dump<W: Write>(mut writer: W, tiles: &[MelTile]) -> Result<()> {
    let (bands, steps) = tiles.first().map(MelTile::shape).unwrap_or((0, 0));
    if let Some(bad) = tiles.iter().find(|t| t.shape() != (bands, steps)) {
        return Err(MelsyncError::ShapeInvariant {
            expected: (bands, steps),
            actual: bad.shape(),
        });
    }

    writer.write_all(DUMP_MAGIC)?;
    for field in [DUMP_VERSION, to_u32(tiles.len())?, to_u32(bands)?, to_u32(steps)?] {
        writer.write_all(&field.to_le_bytes())?;
    }
    for tile in tiles {
        for v in tile.values() {
            writer.write_all(&v.to_le_bytes())?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Write a tensor dump file.
pub fn save_tensor_dump(path: &Path, tiles: &[MelTile]) -> Result<()> {
    let file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_tensor_dump(file, tiles)?;
    info!(path = %path.display(), tiles = tiles.len(), "tensor dump written");
    Ok(())
}

/// Read a tensor dump back into tiles (indices are positional).
pub fn read_tensor_dump<R: Read>(mut reader: R) -> Result<Vec<MelTile>> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != DUMP_MAGIC {
        return Err(corrupt("bad magic"));
    }
    let version = read_u32(&mut reader)?;
    if version != DUMP_VERSION {
        return Err(corrupt("unsupported version"));
    }
    let count = read_u32(&mut reader)? as usize;
    let bands = read_u32(&mut reader)? as usize;
    let steps = read_u32(&mut reader)? as usize;

    let per_tile = bands
        .checked_mul(steps)
        .filter(|&n| n <= MAX_TILE_VALUES)
        .ok_or_else(|| corrupt_owned(format!("tile shape {bands}x{steps} out of range")))?;
    // The header is untrusted: grow as tiles are actually read.
    let mut tiles = Vec::new();
    let mut buf = vec![0u8; per_tile * 4];
    for index in 0..count {
        reader.read_exact(&mut buf)?;
        let values: Vec<f32> = buf
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        let data = Array2::from_shape_vec((bands, steps), values)
            .map_err(|e| corrupt_owned(e.to_string()))?;
        tiles.push(MelTile { index, data });
    }
    Ok(tiles)
}

/// Per-tile summary for eyeballing feature ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileSummary {
    pub index: usize,
    pub shape: [usize; 2],
    pub min: f32,
    pub max: f32,
    pub mean: f32,
}

impl TileSummary {
    pub fn of(tile: &MelTile) -> Self {
        let (bands, steps) = tile.shape();
        let (min, max, sum) = tile.values().fold(
            (f32::INFINITY, f32::NEG_INFINITY, 0f64),
            |(lo, hi, sum), v| (lo.min(v), hi.max(v), sum + v as f64),
        );
        let n = (bands * steps).max(1);
        Self {
            index: tile.index,
            shape: [bands, steps],
            min,
            max,
            mean: (sum / n as f64) as f32,
        }
    }
}

/// Explicit debug export of tile summaries as pretty JSON.
pub fn export_debug_json(path: &Path, tiles: &[MelTile]) -> Result<()> {
    let summaries: Vec<TileSummary> = tiles.iter().map(TileSummary::of).collect();
    std::fs::write(path, serde_json::to_string_pretty(&summaries)?)?;
    info!(path = %path.display(), tiles = tiles.len(), "debug summary written");
    Ok(())
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut b = [0u8; 4];
    reader.read_exact(&mut b)?;
    Ok(u32::from_le_bytes(b))
}

fn to_u32(n: usize) -> Result<u32> {
    u32::try_from(n).map_err(|_| corrupt("dimension exceeds u32"))
}

fn corrupt(msg: &str) -> MelsyncError {
    corrupt_owned(msg.to_string())
}

fn corrupt_owned(msg: String) -> MelsyncError {
    MelsyncError::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("tensor dump: {msg}"),
    ))
}
