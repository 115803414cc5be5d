//! Frame compositor: renders a cel from tile memory, palettes, and OAM
//! attributes.
//!
//! Z-order follows the cel's OAM ordering: index 0 is the top of the stack,
//! so drawing iterates in reverse. Tile addressing uses the fixed VRAM
//! stride of 32 tiles per row regardless of the store's actual layout
//! width. Palette index 0 is always transparent.

use image::{Rgba, RgbaImage};

use crate::models::{AnimationCel, Oam, Palette, TileStore, TILES_PER_ROW};

/// Nominal GBA screen dimensions used as the compositing canvas.
pub const GBA_WIDTH: u32 = 240;
pub const GBA_HEIGHT: u32 = 160;

/// Composite a cel onto `canvas`.
///
/// Each OAM draws at `origin + position * scale`, pixel-replicated by the
/// integer `scale`. OAMs whose palette index is out of range are skipped
/// entirely; tile cells beyond the store are skipped silently.
pub fn render_cel(
    canvas: &mut RgbaImage,
    cel: &AnimationCel,
    tiles: &TileStore,
    palettes: &[Palette],
    origin: (i32, i32),
    scale: u32,
) {
    let scale = scale.max(1);
    for oam in cel.oams.iter().rev() {
        render_oam(canvas, oam, tiles, palettes, origin, scale);
    }
}

/// Composite a single OAM onto `canvas`.
pub fn render_oam(
    canvas: &mut RgbaImage,
    oam: &Oam,
    tiles: &TileStore,
    palettes: &[Palette],
    origin: (i32, i32),
    scale: u32,
) {
    let (width, height) = oam.dimensions();
    let palette = match palettes.get(oam.palette as usize) {
        Some(p) => p,
        None => return,
    };

    let base_x = origin.0 + oam.x as i32 * scale as i32;
    let base_y = origin.1 + oam.y as i32 * scale as i32;

    for ty in 0..height / 8 {
        for tx in 0..width / 8 {
            // Flips reverse the tile-grid traversal and the intra-tile
            // pixel traversal independently.
            let tile_col = if oam.h_flip { width / 8 - 1 - tx } else { tx };
            let tile_row = if oam.v_flip { height / 8 - 1 - ty } else { ty };
            let tile_index =
                oam.tile_id as usize + tile_row as usize * TILES_PER_ROW + tile_col as usize;

            if tile_index >= tiles.len() {
                continue;
            }
            let tile = tiles.get_tile(tile_index);

            for py in 0..8u32 {
                for px in 0..8u32 {
                    let pixel_x = if oam.h_flip { 7 - px } else { px };
                    let pixel_y = if oam.v_flip { 7 - py } else { py };
                    let color_index = tile.pixels[pixel_y as usize][pixel_x as usize];
                    if color_index == 0 {
                        continue;
                    }

                    let c = palette.colors[color_index as usize];
                    let color = Rgba([c[0], c[1], c[2], 255]);
                    fill_block(
                        canvas,
                        base_x + ((tx * 8 + px) * scale) as i32,
                        base_y + ((ty * 8 + py) * scale) as i32,
                        scale,
                        color,
                    );
                }
            }
        }
    }
}

/// Color of the topmost opaque pixel of a cel at canvas-relative `(x, y)`,
/// or `None` if every OAM is transparent there.
///
/// This is the per-pixel query the editor uses for hit testing; it walks
/// OAMs front to back and resolves the first non-transparent pixel.
pub fn pixel_at(
    cel: &AnimationCel,
    tiles: &TileStore,
    palettes: &[Palette],
    x: i32,
    y: i32,
) -> Option<Rgba<u8>> {
    for oam in &cel.oams {
        let (width, height) = oam.dimensions();
        if palettes.get(oam.palette as usize).is_none() {
            continue;
        }

        let local_x = x - oam.x as i32;
        let local_y = y - oam.y as i32;
        if local_x < 0 || local_y < 0 || local_x >= width as i32 || local_y >= height as i32 {
            continue;
        }

        let mut tile_col = local_x as u32 / 8;
        let mut tile_row = local_y as u32 / 8;
        if oam.h_flip {
            tile_col = width / 8 - 1 - tile_col;
        }
        if oam.v_flip {
            tile_row = height / 8 - 1 - tile_row;
        }

        let tile_index =
            oam.tile_id as usize + tile_row as usize * TILES_PER_ROW + tile_col as usize;
        if tile_index >= tiles.len() {
            continue;
        }

        let mut pixel_x = local_x as u32 % 8;
        let mut pixel_y = local_y as u32 % 8;
        if oam.h_flip {
            pixel_x = 7 - pixel_x;
        }
        if oam.v_flip {
            pixel_y = 7 - pixel_y;
        }

        let tile = tiles.get_tile(tile_index);
        let color_index = tile.pixels[pixel_y as usize][pixel_x as usize];
        if color_index != 0 {
            let c = palettes[oam.palette as usize].colors[color_index as usize];
            return Some(Rgba([c[0], c[1], c[2], 255]));
        }
    }

    None
}

/// Render a cel centered on a fresh GBA-sized canvas.
pub fn render_cel_to_image(
    cel: &AnimationCel,
    tiles: &TileStore,
    palettes: &[Palette],
    scale: u32,
) -> RgbaImage {
    let scale = scale.max(1);
    let mut canvas = RgbaImage::new(GBA_WIDTH * scale, GBA_HEIGHT * scale);
    let origin = ((GBA_WIDTH / 2 * scale) as i32, (GBA_HEIGHT / 2 * scale) as i32);
    render_cel(&mut canvas, cel, tiles, palettes, origin, scale);
    canvas
}

/// Draw a scale x scale block, clipping against the canvas bounds.
fn fill_block(canvas: &mut RgbaImage, x: i32, y: i32, scale: u32, color: Rgba<u8>) {
    let (w, h) = canvas.dimensions();
    for dy in 0..scale as i32 {
        for dx in 0..scale as i32 {
            let cx = x + dx;
            let cy = y + dy;
            if cx >= 0 && cy >= 0 && (cx as u32) < w && (cy as u32) < h {
                canvas.put_pixel(cx as u32, cy as u32, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnimationCel, ObjShape, TileData};

    fn solid_tile(index: u8) -> TileData {
        let mut tile = TileData::default();
        for y in 0..8 {
            for x in 0..8 {
                tile.set(x, y, index);
            }
        }
        tile
    }

    fn test_palettes() -> Vec<Palette> {
        let mut a = Palette::default();
        a.colors[1] = Rgba([255, 0, 0, 255]);
        a.colors[2] = Rgba([0, 255, 0, 255]);
        let mut b = Palette::default();
        b.colors[1] = Rgba([0, 0, 255, 255]);
        vec![a, b]
    }

    #[test]
    fn test_zorder_first_oam_wins() {
        let mut tiles = TileStore::new();
        tiles.push(solid_tile(1)); // red via palette 0
        tiles.push(solid_tile(1)); // blue via palette 1

        let cel = AnimationCel {
            name: "overlap".into(),
            oams: vec![
                Oam { tile_id: 0, palette: 0, ..Oam::default() },
                Oam { tile_id: 1, palette: 1, ..Oam::default() },
            ],
        };

        let mut canvas = RgbaImage::new(16, 16);
        render_cel(&mut canvas, &cel, &tiles, &test_palettes(), (0, 0), 1);
        assert_eq!(*canvas.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_zorder_transparency_shows_through() {
        let mut top = TileData::default();
        top.set(0, 0, 1); // only one opaque pixel
        let mut tiles = TileStore::new();
        tiles.push(top);
        tiles.push(solid_tile(1));

        let cel = AnimationCel {
            name: "overlap".into(),
            oams: vec![
                Oam { tile_id: 0, palette: 0, ..Oam::default() },
                Oam { tile_id: 1, palette: 1, ..Oam::default() },
            ],
        };

        let mut canvas = RgbaImage::new(16, 16);
        let palettes = test_palettes();
        render_cel(&mut canvas, &cel, &tiles, &palettes, (0, 0), 1);
        // Top OAM's opaque pixel
        assert_eq!(*canvas.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        // Everywhere else the lower OAM shows through
        assert_eq!(*canvas.get_pixel(1, 0), Rgba([0, 0, 255, 255]));

        assert_eq!(pixel_at(&cel, &tiles, &palettes, 0, 0), Some(Rgba([255, 0, 0, 255])));
        assert_eq!(pixel_at(&cel, &tiles, &palettes, 1, 0), Some(Rgba([0, 0, 255, 255])));
    }

    #[test]
    fn test_out_of_range_palette_skips_oam() {
        let mut tiles = TileStore::new();
        tiles.push(solid_tile(1));

        let cel = AnimationCel {
            name: "bad".into(),
            oams: vec![Oam { palette: 9, ..Oam::default() }],
        };

        let mut canvas = RgbaImage::new(8, 8);
        render_cel(&mut canvas, &cel, &tiles, &test_palettes(), (0, 0), 1);
        assert_eq!(canvas.get_pixel(0, 0)[3], 0);
        assert_eq!(pixel_at(&cel, &tiles, &test_palettes(), 0, 0), None);
    }

    #[test]
    fn test_tile_out_of_store_is_skipped() {
        let tiles = TileStore::new();
        let cel = AnimationCel {
            name: "empty".into(),
            oams: vec![Oam { tile_id: 5, ..Oam::default() }],
        };

        let mut canvas = RgbaImage::new(8, 8);
        render_cel(&mut canvas, &cel, &tiles, &test_palettes(), (0, 0), 1);
        assert_eq!(canvas.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn test_h_flip_mirrors_pixels() {
        let mut tile = TileData::default();
        tile.set(0, 0, 1);
        let mut tiles = TileStore::new();
        tiles.push(tile);

        let cel = AnimationCel {
            name: "flip".into(),
            oams: vec![Oam { h_flip: true, ..Oam::default() }],
        };

        let mut canvas = RgbaImage::new(8, 8);
        render_cel(&mut canvas, &cel, &tiles, &test_palettes(), (0, 0), 1);
        assert_eq!(canvas.get_pixel(0, 0)[3], 0);
        assert_eq!(*canvas.get_pixel(7, 0), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_multi_tile_sprite_uses_vram_stride() {
        // A 16x16 sprite reads tiles base, base+1, base+32, base+33.
        let mut tiles = TileStore::new();
        tiles.ensure_size(34);
        tiles.set_tile(0, solid_tile(1));
        tiles.set_tile(1, solid_tile(2));
        tiles.set_tile(32, solid_tile(2));
        tiles.set_tile(33, solid_tile(1));

        let cel = AnimationCel {
            name: "big".into(),
            oams: vec![Oam { shape: ObjShape::Square, size: 1, ..Oam::default() }],
        };

        let mut canvas = RgbaImage::new(16, 16);
        render_cel(&mut canvas, &cel, &tiles, &test_palettes(), (0, 0), 1);
        assert_eq!(*canvas.get_pixel(0, 0), Rgba([255, 0, 0, 255])); // tile 0
        assert_eq!(*canvas.get_pixel(8, 0), Rgba([0, 255, 0, 255])); // tile 1
        assert_eq!(*canvas.get_pixel(0, 8), Rgba([0, 255, 0, 255])); // tile 32
        assert_eq!(*canvas.get_pixel(8, 8), Rgba([255, 0, 0, 255])); // tile 33
    }

    #[test]
    fn test_scale_replicates_pixels() {
        let mut tile = TileData::default();
        tile.set(0, 0, 1);
        let mut tiles = TileStore::new();
        tiles.push(tile);

        let cel =
            AnimationCel { name: "scaled".into(), oams: vec![Oam::default()] };

        let mut canvas = RgbaImage::new(16, 16);
        render_cel(&mut canvas, &cel, &tiles, &test_palettes(), (0, 0), 2);
        assert_eq!(*canvas.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(*canvas.get_pixel(1, 1), Rgba([255, 0, 0, 255]));
        assert_eq!(canvas.get_pixel(2, 0)[3], 0);
    }

    #[test]
    fn test_negative_positions_clip() {
        let mut tiles = TileStore::new();
        tiles.push(solid_tile(1));

        let cel = AnimationCel {
            name: "off".into(),
            oams: vec![Oam { x: -4, y: -4, ..Oam::default() }],
        };

        let mut canvas = RgbaImage::new(8, 8);
        render_cel(&mut canvas, &cel, &tiles, &test_palettes(), (0, 0), 1);
        assert_eq!(*canvas.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(canvas.get_pixel(4, 4)[3], 0);
    }
}
