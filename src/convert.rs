//! Image <-> tileset conversion: palette-constrained quantization with
//! Floyd-Steinberg dithering, spritesheet export, and rectangular selection
//! import/export.

use std::collections::HashMap;
use std::path::Path;

use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use log::warn;
use thiserror::Error;

use crate::models::{rgb_key, Palette, TileData, TileStore, PALETTE_SIZE, TILES_PER_ROW};

/// Canonical spritesheet canvas: 32x32 tiles of 8x8 pixels.
pub const SHEET_SIZE: u32 = 256;

/// Error for conversion operations that write files.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Convert an image into a full 1024-tile spritesheet quantized against the
/// palette table.
///
/// The image is forced to 256x256 (nearest-neighbor) first. Candidate colors
/// are the target palette's 16 colors followed by every other palette's,
/// deduplicated by 24-bit RGB, so target-palette colors win distance ties.
/// Open failures log a warning and return an empty store.
pub fn tiles_from_image(path: &Path, palettes: &[Palette], current_palette: i32) -> TileStore {
    match open_sheet(path) {
        Some(img) => quantize_sheet(&img, palettes, current_palette),
        None => TileStore::new(),
    }
}

/// Quantize a 256x256 image into 1024 tiles in raster order.
pub fn quantize_sheet(img: &RgbaImage, palettes: &[Palette], current_palette: i32) -> TileStore {
    let candidates = candidate_colors(palettes, current_palette);
    if candidates.is_empty() {
        warn!("no palette colors available for quantization");
        return TileStore::new();
    }

    let quantized = floyd_steinberg(img, &candidates);

    let mut store = TileStore::new();
    for tile_y in 0..TILES_PER_ROW {
        for tile_x in 0..TILES_PER_ROW {
            let mut tile = TileData::default();
            for py in 0..8 {
                for px in 0..8 {
                    let ix = tile_x * 8 + px;
                    let iy = tile_y * 8 + py;
                    let color = quantized[iy * SHEET_SIZE as usize + ix];
                    tile.pixels[py][px] = palette_index_for(color, palettes, current_palette);
                }
            }
            store.push(tile);
        }
    }
    store
}

/// Render a tile store back to a 256x256 spritesheet image, without
/// dithering.
///
/// Palette index 0 is emitted fully transparent; other indices look up
/// palette 0. Output format follows the file extension (`png`/`bmp`);
/// anything else falls back to `.bmp` under a renamed path with a warning.
pub fn tiles_to_image(path: &Path, store: &TileStore, palettes: &[Palette]) -> Result<(), ConvertError> {
    if store.is_empty() {
        warn!("no tiles to save to image");
        return Ok(());
    }

    let mut img = RgbaImage::new(SHEET_SIZE, SHEET_SIZE);
    let max_tiles = TILES_PER_ROW * TILES_PER_ROW;

    for (tile_index, tile) in store.iter().take(max_tiles).enumerate() {
        let tile_x = tile_index % TILES_PER_ROW;
        let tile_y = tile_index / TILES_PER_ROW;

        for py in 0..8 {
            for px in 0..8 {
                let index = tile.pixels[py][px] as usize;
                if index == 0 {
                    continue;
                }
                let color = match palettes.first() {
                    Some(palette) => {
                        let c = palette.colors[index];
                        Rgba([c[0], c[1], c[2], 255])
                    }
                    None => Rgba([0, 0, 0, 255]),
                };
                img.put_pixel((tile_x * 8 + px) as u32, (tile_y * 8 + py) as u32, color);
            }
        }
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if ext == "png" || ext == "bmp" {
        img.save(path)?;
    } else {
        let bmp_path = path.with_extension("bmp");
        warn!("unknown image format, saving as BMP: {}", bmp_path.display());
        img.save(&bmp_path)?;
    }

    Ok(())
}

/// Export a rectangular tile region to an image. Index 0 is transparent;
/// region cells beyond the store stay blank.
pub fn export_selection(
    path: &Path,
    store: &TileStore,
    palette: &Palette,
    tile_x: usize,
    tile_y: usize,
    tiles_w: usize,
    tiles_h: usize,
) -> Result<(), ConvertError> {
    let mut img = RgbaImage::new((tiles_w * 8) as u32, (tiles_h * 8) as u32);

    for ty in 0..tiles_h {
        for tx in 0..tiles_w {
            let index = (tile_y + ty) * TILES_PER_ROW + tile_x + tx;
            if index >= store.len() {
                continue;
            }
            let tile = store.get_tile(index);
            for py in 0..8 {
                for px in 0..8 {
                    let color_index = tile.pixels[py][px] as usize;
                    if color_index == 0 {
                        continue;
                    }
                    let c = palette.colors[color_index];
                    img.put_pixel(
                        (tx * 8 + px) as u32,
                        (ty * 8 + py) as u32,
                        Rgba([c[0], c[1], c[2], 255]),
                    );
                }
            }
        }
    }

    img.save(path)?;
    Ok(())
}

/// Import an arbitrary-size image into the store at a tile-grid offset.
///
/// The store auto-extends to cover the region. Pixels with alpha below 128
/// map to index 0; opaque pixels map to the nearest color within the single
/// chosen palette (indices 1..=15, so nothing quantizes to the transparent
/// slot). No dithering is applied.
pub fn import_selection(
    path: &Path,
    store: &mut TileStore,
    palette: &Palette,
    dest_tile_x: usize,
    dest_tile_y: usize,
) -> Result<(), ConvertError> {
    let img = image::open(path)?.to_rgba8();
    let (w, h) = img.dimensions();
    let tiles_w = (w as usize).div_ceil(8);
    let tiles_h = (h as usize).div_ceil(8);
    if tiles_w == 0 || tiles_h == 0 {
        return Ok(());
    }

    let last_index = (dest_tile_y + tiles_h - 1) * TILES_PER_ROW + dest_tile_x + tiles_w - 1;
    store.ensure_size(last_index + 1);

    for ty in 0..tiles_h {
        for tx in 0..tiles_w {
            let mut tile = TileData::default();
            for py in 0..8 {
                for px in 0..8 {
                    let ix = (tx * 8 + px) as u32;
                    let iy = (ty * 8 + py) as u32;
                    if ix >= w || iy >= h {
                        continue;
                    }
                    let pixel = *img.get_pixel(ix, iy);
                    if pixel[3] < 128 {
                        continue;
                    }
                    tile.pixels[py][px] = nearest_in_palette(palette, pixel);
                }
            }
            let index = (dest_tile_y + ty) * TILES_PER_ROW + dest_tile_x + tx;
            store.set_tile(index, tile);
        }
    }

    Ok(())
}

/// Build a palette from an image and quantize the image against it.
///
/// The palette holds the image's 15 most frequent exact-RGB colors plus a
/// forced transparent slot 0. Open failures log a warning and return an
/// empty store with the default palette.
pub fn image_to_spritesheet_and_palette(path: &Path) -> (TileStore, Palette) {
    let Some(img) = open_sheet(path) else {
        return (TileStore::new(), Palette::default());
    };

    let mut counts: HashMap<u32, u64> = HashMap::new();
    for pixel in img.pixels() {
        if pixel[3] < 128 {
            continue;
        }
        *counts.entry(rgb_key(*pixel)).or_insert(0) += 1;
    }

    let mut ranked: Vec<(u32, u64)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut palette = Palette::default();
    for (slot, (key, _)) in ranked.into_iter().take(PALETTE_SIZE - 1).enumerate() {
        palette.colors[slot + 1] =
            Rgba([((key >> 16) & 0xFF) as u8, ((key >> 8) & 0xFF) as u8, (key & 0xFF) as u8, 255]);
    }

    let store = quantize_sheet(&img, std::slice::from_ref(&palette), 0);
    (store, palette)
}

/// Open an image and force it to the 256x256 spritesheet canvas.
fn open_sheet(path: &Path) -> Option<RgbaImage> {
    let img = match image::open(path) {
        Ok(img) => img.to_rgba8(),
        Err(e) => {
            warn!("failed to load image {}: {}", path.display(), e);
            return None;
        }
    };

    if img.dimensions() == (SHEET_SIZE, SHEET_SIZE) {
        Some(img)
    } else {
        Some(image::imageops::resize(&img, SHEET_SIZE, SHEET_SIZE, FilterType::Nearest))
    }
}

/// Candidate list for quantization: target palette first, then all others,
/// deduplicated by 24-bit RGB so earlier entries win ties.
fn candidate_colors(palettes: &[Palette], current_palette: i32) -> Vec<Rgba<u8>> {
    let mut seen: HashMap<u32, usize> = HashMap::new();
    let mut out = Vec::new();

    let mut add_palette = |palette: &Palette, seen: &mut HashMap<u32, usize>, out: &mut Vec<Rgba<u8>>| {
        for color in &palette.colors {
            let key = rgb_key(*color);
            if !seen.contains_key(&key) {
                seen.insert(key, out.len());
                out.push(*color);
            }
        }
    };

    if current_palette >= 0 && (current_palette as usize) < palettes.len() {
        add_palette(&palettes[current_palette as usize], &mut seen, &mut out);
    }
    for (i, palette) in palettes.iter().enumerate() {
        if i as i32 == current_palette {
            continue;
        }
        add_palette(palette, &mut seen, &mut out);
    }

    out
}

/// Floyd-Steinberg error diffusion against a fixed candidate list, using
/// squared RGB distance. Returns one quantized color per pixel in raster
/// order.
fn floyd_steinberg(img: &RgbaImage, candidates: &[Rgba<u8>]) -> Vec<Rgba<u8>> {
    let size = SHEET_SIZE as usize;
    let mut err_r = vec![0f32; size * size];
    let mut err_g = vec![0f32; size * size];
    let mut err_b = vec![0f32; size * size];
    let mut quantized = vec![Rgba([0, 0, 0, 0]); size * size];

    for y in 0..size {
        for x in 0..size {
            let i = y * size + x;
            let pixel = img.get_pixel(x as u32, y as u32);

            let r = (pixel[0] as f32 + err_r[i]).clamp(0.0, 255.0);
            let g = (pixel[1] as f32 + err_g[i]).clamp(0.0, 255.0);
            let b = (pixel[2] as f32 + err_b[i]).clamp(0.0, 255.0);

            let closest = candidates[nearest_color(candidates, r as u8, g as u8, b as u8)];
            quantized[i] = closest;

            let dr = r - closest[0] as f32;
            let dg = g - closest[1] as f32;
            let db = b - closest[2] as f32;

            let mut spread = |xi: i64, yi: i64, weight: f32, err_r: &mut [f32], err_g: &mut [f32], err_b: &mut [f32]| {
                if xi >= 0 && xi < size as i64 && yi < size as i64 {
                    let j = yi as usize * size + xi as usize;
                    err_r[j] += dr * weight;
                    err_g[j] += dg * weight;
                    err_b[j] += db * weight;
                }
            };

            let (xi, yi) = (x as i64, y as i64);
            spread(xi + 1, yi, 7.0 / 16.0, &mut err_r, &mut err_g, &mut err_b);
            spread(xi - 1, yi + 1, 3.0 / 16.0, &mut err_r, &mut err_g, &mut err_b);
            spread(xi, yi + 1, 5.0 / 16.0, &mut err_r, &mut err_g, &mut err_b);
            spread(xi + 1, yi + 1, 1.0 / 16.0, &mut err_r, &mut err_g, &mut err_b);
        }
    }

    quantized
}

/// Index of the candidate with the smallest squared RGB distance. Strict
/// comparison keeps the first (target-palette) color on ties.
fn nearest_color(candidates: &[Rgba<u8>], r: u8, g: u8, b: u8) -> usize {
    let mut best_index = 0;
    let mut best_distance = i32::MAX;
    for (i, color) in candidates.iter().enumerate() {
        let dr = r as i32 - color[0] as i32;
        let dg = g as i32 - color[1] as i32;
        let db = b as i32 - color[2] as i32;
        let distance = dr * dr + dg * dg + db * db;
        if distance < best_distance {
            best_distance = distance;
            best_index = i;
        }
    }
    best_index
}

/// Map a quantized color back to a 4-bit index: exact match in the target
/// palette first, then every palette in order, else 0.
fn palette_index_for(color: Rgba<u8>, palettes: &[Palette], current_palette: i32) -> u8 {
    if current_palette >= 0 && (current_palette as usize) < palettes.len() {
        if let Some(index) = palettes[current_palette as usize].find_rgb(color) {
            return index as u8;
        }
    }
    for palette in palettes {
        if let Some(index) = palette.find_rgb(color) {
            return index as u8;
        }
    }
    0
}

/// Nearest color within a single palette, considering only the opaque
/// indices 1..=15.
fn nearest_in_palette(palette: &Palette, pixel: Rgba<u8>) -> u8 {
    let mut best_index = 0u8;
    let mut best_distance = i32::MAX;
    for (i, color) in palette.colors.iter().enumerate().skip(1) {
        let dr = pixel[0] as i32 - color[0] as i32;
        let dg = pixel[1] as i32 - color[1] as i32;
        let db = pixel[2] as i32 - color[2] as i32;
        let distance = dr * dr + dg * dg + db * db;
        if distance < best_distance {
            best_distance = distance;
            best_index = i as u8;
        }
    }
    best_index
}
