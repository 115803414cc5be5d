//! Raw packed 4bpp tile binary reader/writer.

use std::path::Path;

use log::warn;

use crate::models::{TileStore, TILE_BYTES};

/// Load tiles from a raw 4bpp binary: sequential 32-byte records.
///
/// A trailing partial record is zero-padded to a full tile, so the byte
/// count need not be a multiple of 32. Open failures log a warning and
/// return an empty store.
pub fn load_tiles(path: &Path) -> TileStore {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("failed to open tiles file {}: {}", path.display(), e);
            return TileStore::new();
        }
    };

    decode_tiles(&bytes)
}

/// Decode a raw 4bpp byte stream into a tile store, zero-padding a trailing
/// partial record.
pub fn decode_tiles(bytes: &[u8]) -> TileStore {
    let mut store = TileStore::new();
    let mut chunks = bytes.chunks_exact(TILE_BYTES);

    for chunk in &mut chunks {
        let mut record = [0u8; TILE_BYTES];
        record.copy_from_slice(chunk);
        store.add_tile(&record);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut record = [0u8; TILE_BYTES];
        record[..tail.len()].copy_from_slice(tail);
        store.add_tile(&record);
    }

    store
}

/// Encode a tile store back into the raw 4bpp byte stream.
pub fn encode_tiles(store: &TileStore) -> Vec<u8> {
    let mut out = Vec::with_capacity(store.len() * TILE_BYTES);
    for tile in store.iter() {
        out.extend_from_slice(&tile.to_packed());
    }
    out
}

/// Write a tile store to a raw 4bpp binary file.
pub fn save_tiles(path: &Path, store: &TileStore) -> std::io::Result<()> {
    std::fs::write(path, encode_tiles(store))
}
