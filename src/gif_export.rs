//! Animated GIF export: indexed-color frames against a derived global
//! palette, bounding-box cropping, and accumulated frame timing.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use gif::{DisposalMethod, Encoder, Frame, Repeat};
use log::debug;
use thiserror::Error;

use crate::compositor::{render_cel, GBA_HEIGHT, GBA_WIDTH};
use crate::models::{find_cel, rgb_key, Animation, AnimationCel, Palette, TileStore};

/// GIF export failure.
#[derive(Debug, Error)]
pub enum GifExportError {
    #[error("animation has no entries with nonzero duration")]
    EmptyAnimation,
    #[error("no cels referenced by the animation could be found")]
    NoVisibleFrames,
    #[error("animation bounding box is empty")]
    EmptyBounds,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("GIF encoding error: {0}")]
    Encoding(#[from] gif::EncodingError),
}

/// Export options.
#[derive(Debug, Clone, Copy)]
pub struct GifOptions {
    /// Export frame rate in frames per second.
    pub fps: f32,
    /// Integer pixel-replication factor.
    pub scale: u32,
    /// Loop the animation indefinitely.
    pub looped: bool,
}

impl Default for GifOptions {
    fn default() -> Self {
        Self { fps: 60.0, scale: 1, looped: true }
    }
}

/// Pixel bounding box of an animation on the GBA canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Bounds {
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
}

impl Bounds {
    fn width(&self) -> u32 {
        (self.x1 - self.x0) as u32
    }

    fn height(&self) -> u32 {
        (self.y1 - self.y0) as u32
    }
}

/// Export an animation as a delta-timed indexed-color GIF.
///
/// Entries with duration 0 contribute no frames. Frame delays use
/// accumulated ideal-vs-actual centisecond tracking so the cumulative
/// duration matches the ideal animation length without compounding
/// rounding error; every emitted delay is at least 1 centisecond.
pub fn export_gif(
    path: &Path,
    animation: &Animation,
    cels: &[AnimationCel],
    tiles: &TileStore,
    palettes: &[Palette],
    options: GifOptions,
) -> Result<(), GifExportError> {
    let scale = options.scale.max(1);
    let fps = if options.fps > 0.0 { options.fps } else { 60.0 };

    let visible: Vec<&crate::models::AnimationEntry> =
        animation.entries.iter().filter(|e| e.duration > 0).collect();
    if visible.is_empty() {
        return Err(GifExportError::EmptyAnimation);
    }
    if !visible.iter().any(|e| find_cel(cels, &e.cel_name).is_some()) {
        return Err(GifExportError::NoVisibleFrames);
    }

    let bounds = animation_bounds(&visible, cels)?;
    let (table, lookup) = global_color_table(&visible, cels, palettes);
    let depth = color_depth(table.len());

    let width = (bounds.width() * scale) as u16;
    let height = (bounds.height() * scale) as u16;

    // Pad the palette out to the full table size for the chosen depth.
    let mut flat = Vec::with_capacity((1usize << depth) * 3);
    for color in &table {
        flat.extend_from_slice(color);
    }
    flat.resize((1usize << depth) * 3, 0);

    let file = File::create(path)?;
    let mut encoder = Encoder::new(BufWriter::new(file), width, height, &flat)?;
    if options.looped {
        encoder.set_repeat(Repeat::Infinite)?;
    }

    // Canvas-space origin of the crop region.
    let origin = (
        ((GBA_WIDTH as i32 / 2 - bounds.x0) * scale as i32),
        ((GBA_HEIGHT as i32 / 2 - bounds.y0) * scale as i32),
    );

    let mut ideal_cs = 0.0f64;
    let mut actual_cs = 0u32;

    for entry in &visible {
        let Some(cel) = find_cel(cels, &entry.cel_name) else {
            debug!("animation {} references missing cel {}", animation.name, entry.cel_name);
            continue;
        };

        let mut scratch = image::RgbaImage::new(width as u32, height as u32);
        render_cel(&mut scratch, cel, tiles, palettes, origin, scale);

        let buffer: Vec<u8> = scratch
            .pixels()
            .map(|p| {
                if p[3] == 0 {
                    0
                } else {
                    *lookup.get(&rgb_key(*p)).unwrap_or(&0)
                }
            })
            .collect();

        ideal_cs += entry.duration as f64 * 100.0 / fps as f64;
        // Clamp rather than truncate: very low export rates can ask for
        // more centiseconds than a frame delay field can hold.
        let delay = ((ideal_cs - actual_cs as f64).round() as i64).clamp(1, u16::MAX as i64) as u16;
        actual_cs += delay as u32;

        let mut frame = Frame::default();
        frame.width = width;
        frame.height = height;
        frame.delay = delay;
        frame.transparent = Some(0);
        frame.dispose = DisposalMethod::Background;
        frame.buffer = std::borrow::Cow::Owned(buffer);
        encoder.write_frame(&frame)?;
    }

    // Dropping the encoder writes the trailer.
    Ok(())
}

/// Union of every visible OAM placement rectangle, clamped to the canvas.
fn animation_bounds(
    visible: &[&crate::models::AnimationEntry],
    cels: &[AnimationCel],
) -> Result<Bounds, GifExportError> {
    let half_w = GBA_WIDTH as i32 / 2;
    let half_h = GBA_HEIGHT as i32 / 2;

    let mut bounds = Bounds { x0: i32::MAX, y0: i32::MAX, x1: i32::MIN, y1: i32::MIN };
    for entry in visible {
        let Some(cel) = find_cel(cels, &entry.cel_name) else {
            continue;
        };
        for oam in &cel.oams {
            let (w, h) = oam.dimensions();
            bounds.x0 = bounds.x0.min(half_w + oam.x as i32);
            bounds.y0 = bounds.y0.min(half_h + oam.y as i32);
            bounds.x1 = bounds.x1.max(half_w + oam.x as i32 + w as i32);
            bounds.y1 = bounds.y1.max(half_h + oam.y as i32 + h as i32);
        }
    }

    let clamped = Bounds {
        x0: bounds.x0.clamp(0, GBA_WIDTH as i32),
        y0: bounds.y0.clamp(0, GBA_HEIGHT as i32),
        x1: bounds.x1.clamp(0, GBA_WIDTH as i32),
        y1: bounds.y1.clamp(0, GBA_HEIGHT as i32),
    };

    if clamped.x1 <= clamped.x0 || clamped.y1 <= clamped.y0 {
        return Err(GifExportError::EmptyBounds);
    }
    Ok(clamped)
}

/// Global color table: index 0 is the reserved transparent slot; the rest
/// is the union of all non-index-0 colors from every palette referenced by
/// the animation, deduplicated by RGB and capped at 254 entries. Colors
/// beyond the cap are dropped silently.
fn global_color_table(
    visible: &[&crate::models::AnimationEntry],
    cels: &[AnimationCel],
    palettes: &[Palette],
) -> (Vec<[u8; 3]>, HashMap<u32, u8>) {
    let mut referenced = vec![false; palettes.len()];
    for entry in visible {
        if let Some(cel) = find_cel(cels, &entry.cel_name) {
            for oam in &cel.oams {
                if let Some(flag) = referenced.get_mut(oam.palette as usize) {
                    *flag = true;
                }
            }
        }
    }

    let mut table: Vec<[u8; 3]> = vec![[0, 0, 0]];
    let mut lookup: HashMap<u32, u8> = HashMap::new();

    for (palette, _) in palettes.iter().zip(&referenced).filter(|(_, &used)| used) {
        for color in palette.colors.iter().skip(1) {
            let key = rgb_key(*color);
            if lookup.contains_key(&key) {
                continue;
            }
            if table.len() >= 255 {
                break;
            }
            lookup.insert(key, table.len() as u8);
            table.push([color[0], color[1], color[2]]);
        }
    }

    (table, lookup)
}

/// Minimum bit depth (>= 2, <= 8) able to index `len` table entries.
fn color_depth(len: usize) -> u32 {
    let mut depth = 2;
    while (1usize << depth) < len && depth < 8 {
        depth += 1;
    }
    depth
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnimationEntry, Oam, TileData};
    use image::Rgba;
    use tempfile::tempdir;

    fn fixture() -> (Vec<AnimationCel>, TileStore, Vec<Palette>) {
        let mut tile = TileData::default();
        for y in 0..8 {
            for x in 0..8 {
                tile.set(x, y, 1);
            }
        }
        let mut tiles = TileStore::new();
        tiles.push(tile);

        let mut palette = Palette::default();
        palette.colors[1] = Rgba([255, 0, 0, 255]);

        let cels = vec![AnimationCel { name: "frame0".into(), oams: vec![Oam::default()] }];
        (cels, tiles, vec![palette])
    }

    fn anim(durations: &[u8]) -> Animation {
        Animation {
            name: "anim_test".into(),
            entries: durations
                .iter()
                .map(|&d| AnimationEntry { cel_name: "frame0".into(), duration: d })
                .collect(),
        }
    }

    #[test]
    fn test_export_creates_valid_gif() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.gif");
        let (cels, tiles, palettes) = fixture();

        export_gif(&path, &anim(&[4, 4]), &cels, &tiles, &palettes, GifOptions::default())
            .unwrap();
        assert!(path.exists());

        let img = image::open(&path);
        assert!(img.is_ok());
    }

    #[test]
    fn test_zero_total_duration_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("none.gif");
        let (cels, tiles, palettes) = fixture();

        let result =
            export_gif(&path, &anim(&[0, 0]), &cels, &tiles, &palettes, GifOptions::default());
        assert!(matches!(result, Err(GifExportError::EmptyAnimation)));
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_cels_fail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("miss.gif");
        let (_, tiles, palettes) = fixture();

        let result =
            export_gif(&path, &anim(&[4]), &[], &tiles, &palettes, GifOptions::default());
        assert!(matches!(result, Err(GifExportError::NoVisibleFrames)));
    }

    fn decode_delays(path: &std::path::Path) -> Vec<u16> {
        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::Indexed);
        let mut decoder = options.read_info(File::open(path).unwrap()).unwrap();

        let mut delays = Vec::new();
        while let Some(frame) = decoder.read_next_frame().unwrap() {
            delays.push(frame.delay);
        }
        delays
    }

    #[test]
    fn test_exported_delays_track_ideal_duration() {
        // Durations [10, 5, 1] at 60 fps: total delay must equal
        // round(16 * 100 / 60) within 1 centisecond, every delay >= 1.
        let dir = tempdir().unwrap();
        let path = dir.path().join("timing.gif");
        let (cels, tiles, palettes) = fixture();

        export_gif(&path, &anim(&[10, 5, 1]), &cels, &tiles, &palettes, GifOptions::default())
            .unwrap();

        let delays = decode_delays(&path);
        assert_eq!(delays.len(), 3);

        let total: i64 = delays.iter().map(|&d| d as i64).sum();
        let expected = (16.0 * 100.0 / 60.0f64).round() as i64;
        assert!((total - expected).abs() <= 1, "total {} vs expected {}", total, expected);
        assert!(delays.iter().all(|&d| d >= 1));
    }

    #[test]
    fn test_extreme_frame_rate_saturates_delay() {
        // 255 frames at 0.01 fps asks for 2,550,000 centiseconds; the
        // delay field holds at its maximum instead of wrapping.
        let dir = tempdir().unwrap();
        let path = dir.path().join("slow.gif");
        let (cels, tiles, palettes) = fixture();

        let options = GifOptions { fps: 0.01, ..GifOptions::default() };
        export_gif(&path, &anim(&[255]), &cels, &tiles, &palettes, options).unwrap();

        let delays = decode_delays(&path);
        assert_eq!(delays, vec![u16::MAX]);
    }

    #[test]
    fn test_color_depth() {
        assert_eq!(color_depth(1), 2);
        assert_eq!(color_depth(4), 2);
        assert_eq!(color_depth(5), 3);
        assert_eq!(color_depth(16), 4);
        assert_eq!(color_depth(255), 8);
        assert_eq!(color_depth(1000), 8);
    }

    #[test]
    fn test_global_table_reserves_transparent_slot() {
        let (cels, _, palettes) = fixture();
        let entries = [AnimationEntry { cel_name: "frame0".into(), duration: 1 }];
        let visible: Vec<&AnimationEntry> = entries.iter().collect();
        let (table, lookup) = global_color_table(&visible, &cels, &palettes);

        assert_eq!(table[0], [0, 0, 0]);
        assert_eq!(table[1], [255, 0, 0]);
        assert_eq!(lookup.get(&0xFF0000), Some(&1));
        // Index 0 stays reserved even though black also appears in the table
        assert!(lookup.values().all(|&i| i != 0));
    }

    #[test]
    fn test_bounds_clamped_to_canvas() {
        let cels = vec![AnimationCel {
            name: "frame0".into(),
            oams: vec![Oam { x: -128, y: -128, size: 3, ..Oam::default() }],
        }];
        let entries = [AnimationEntry { cel_name: "frame0".into(), duration: 1 }];
        let visible: Vec<&AnimationEntry> = entries.iter().collect();

        let bounds = animation_bounds(&visible, &cels).unwrap();
        assert!(bounds.x0 >= 0 && bounds.y0 >= 0);
        assert!(bounds.x1 <= GBA_WIDTH as i32 && bounds.y1 <= GBA_HEIGHT as i32);
        assert!(bounds.width() > 0 && bounds.height() > 0);
    }
}
