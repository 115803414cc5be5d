//! 8x8 4bpp tiles and the index-addressed tile store.

use log::warn;

/// Size of one packed tile on disk: 8x8 pixels at 2 pixels per byte.
pub const TILE_BYTES: usize = 32;

/// Tile stores lay out at most 32 tiles per row (256 px) for display purposes.
pub const TILES_PER_ROW: usize = 32;

/// An 8x8 grid of 4-bit palette indices.
///
/// The packed wire form stores two pixels per byte: the low nibble is the
/// even-x (left) pixel and the high nibble is the odd-x pixel, matching the
/// GBA 4bpp VRAM layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TileData {
    /// Palette indices addressed as `pixels[y][x]`, each in `0..=15`.
    pub pixels: [[u8; 8]; 8],
}

impl TileData {
    /// Unpack a 32-byte 4bpp record into an index grid.
    pub fn from_packed(bytes: &[u8; TILE_BYTES]) -> Self {
        let mut pixels = [[0u8; 8]; 8];
        for y in 0..8 {
            for x in 0..8 {
                let byte = bytes[y * 4 + x / 2];
                pixels[y][x] = (byte >> ((x % 2) * 4)) & 0x0F;
            }
        }
        Self { pixels }
    }

    /// Pack the index grid back into the 32-byte 4bpp wire form.
    pub fn to_packed(&self) -> [u8; TILE_BYTES] {
        let mut bytes = [0u8; TILE_BYTES];
        for y in 0..8 {
            for x in 0..4 {
                let lo = self.pixels[y][x * 2] & 0x0F;
                let hi = self.pixels[y][x * 2 + 1] & 0x0F;
                bytes[y * 4 + x] = (hi << 4) | lo;
            }
        }
        bytes
    }

    /// Palette index at `(x, y)`. Out-of-range coordinates return 0.
    pub fn get(&self, x: usize, y: usize) -> u8 {
        if x < 8 && y < 8 {
            self.pixels[y][x]
        } else {
            0
        }
    }

    /// Set the palette index at `(x, y)`, masked to 4 bits.
    /// Out-of-range coordinates are ignored.
    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        if x < 8 && y < 8 {
            self.pixels[y][x] = value & 0x0F;
        }
    }
}

/// Ordered, growable collection of tiles addressed by integer index.
///
/// The index is the sole identity of a tile; OAM records reference tiles by
/// index with a fixed stride of [`TILES_PER_ROW`]. Out-of-range access never
/// panics: reads return an all-zero tile and writes are dropped, both with a
/// logged warning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TileStore {
    tiles: Vec<TileData>,
}

impl TileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unpack and append a 32-byte 4bpp record.
    pub fn add_tile(&mut self, bytes: &[u8; TILE_BYTES]) {
        self.tiles.push(TileData::from_packed(bytes));
    }

    /// Append an already-unpacked tile.
    pub fn push(&mut self, tile: TileData) {
        self.tiles.push(tile);
    }

    /// Tile at `index`, or an all-zero tile (with a warning) if out of range.
    pub fn get_tile(&self, index: usize) -> TileData {
        match self.tiles.get(index) {
            Some(tile) => *tile,
            None => {
                warn!("tile index out of bounds: {} (size {})", index, self.tiles.len());
                TileData::default()
            }
        }
    }

    /// Overwrite the tile at `index` in place.
    /// A no-op (with a warning) if `index` is out of range.
    pub fn set_tile(&mut self, index: usize, tile: TileData) {
        match self.tiles.get_mut(index) {
            Some(slot) => *slot = tile,
            None => {
                warn!("set_tile index out of bounds: {} (size {})", index, self.tiles.len());
            }
        }
    }

    /// Append zero tiles until the store holds at least `count` tiles.
    /// Never shrinks.
    pub fn ensure_size(&mut self, count: usize) {
        if self.tiles.len() < count {
            self.tiles.resize(count, TileData::default());
        }
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Layout width in pixels: up to 32 tiles per row.
    pub fn width(&self) -> usize {
        self.tiles.len().min(TILES_PER_ROW) * 8
    }

    /// Layout height in pixels: grows one 8 px row per 32 tiles.
    pub fn height(&self) -> usize {
        self.tiles.len().div_ceil(TILES_PER_ROW) * 8
    }

    pub fn clear(&mut self) {
        self.tiles.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &TileData> {
        self.tiles.iter()
    }
}
