//! Binary tile format.
//!
//! A tile file is a 4-byte magic, a format version byte and a bincode payload
//! (standard config) holding the cell bounds, the overlap margin and the ways.
//! Floating-point fields are stored fixed-width and round-trip bit-exactly;
//! collection lengths are varints.

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::error::TileError;
use crate::way::Way;

pub const MAGIC: [u8; 4] = *b"WYTL";
pub const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = MAGIC.len() + 1;

/// Decoded contents of one tile file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileFile {
    pub bounds: BoundingBox,
    pub overlap: f64,
    pub ways: Vec<Way>,
}

// Serializes identically to `TileFile` without cloning the assigned ways
#[derive(Serialize)]
struct TileFileRef<'a> {
    bounds: BoundingBox,
    overlap: f64,
    ways: &'a [&'a Way],
}

impl TileFile {
    pub fn decode(bytes: &[u8]) -> Result<Self, TileError> {
        decode(bytes)
    }

    pub fn encode(&self) -> Result<Vec<u8>, TileError> {
        let ways: Vec<&Way> = self.ways.iter().collect();
        encode(self.bounds, self.overlap, &ways)
    }
}

/// Encodes a cell's bounds, the overlap margin and its assigned ways.
pub fn encode(bounds: BoundingBox, overlap: f64, ways: &[&Way]) -> Result<Vec<u8>, TileError> {
    let tile = TileFileRef {
        bounds,
        overlap,
        ways,
    };

    let mut buffer = Vec::with_capacity(HEADER_LEN + estimated_size(ways));
    buffer.extend_from_slice(&MAGIC);
    buffer.push(FORMAT_VERSION);
    bincode::serde::encode_into_std_write(&tile, &mut buffer, bincode::config::standard())
        .map_err(|e| TileError::Encode(e.to_string()))?;
    Ok(buffer)
}

/// Decodes a complete tile file. Any framing or payload defect is an error.
pub fn decode(bytes: &[u8]) -> Result<TileFile, TileError> {
    if bytes.len() < HEADER_LEN {
        return Err(TileError::Decode(format!(
            "file too short for header: {} bytes",
            bytes.len()
        )));
    }
    if bytes[..MAGIC.len()] != MAGIC {
        return Err(TileError::Decode("bad magic".to_string()));
    }
    let version = bytes[MAGIC.len()];
    if version != FORMAT_VERSION {
        return Err(TileError::Decode(format!(
            "unsupported format version {}",
            version
        )));
    }

    let payload = &bytes[HEADER_LEN..];
    let (tile, read): (TileFile, usize) =
        bincode::serde::decode_from_slice(payload, bincode::config::standard())
            .map_err(|e| TileError::Decode(e.to_string()))?;
    if read != payload.len() {
        return Err(TileError::Decode(format!(
            "{} trailing bytes after tile payload",
            payload.len() - read
        )));
    }
    Ok(tile)
}

fn estimated_size(ways: &[&Way]) -> usize {
    64 + ways
        .iter()
        .map(|w| 128 + w.name.len() + w.reference.len() + w.coordinates.len() * 16)
        .sum::<usize>()
}
