//! Core data model: tiles, palettes, OAM records, cels, animations, projects.

mod animation;
mod oam;
mod palette;
mod project;
mod tile;

pub use animation::{find_cel, Animation, AnimationCel, AnimationEntry};
pub use oam::{Oam, ObjShape, POSITION_MAX, POSITION_MIN};
pub use palette::{rgb_key, Palette, MAX_PALETTES, PALETTE_SIZE};
pub use project::{Project, ProjectMeta};
pub use tile::{TileData, TileStore, TILES_PER_ROW, TILE_BYTES};
