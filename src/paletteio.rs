//! Palette file I/O: binary RIFF `.pal` files, C-source palette extraction,
//! and C-source export.

use std::fmt::Write as _;
use std::path::Path;

use image::Rgba;
use log::warn;
use regex::Regex;
use thiserror::Error;

use crate::models::{Palette, MAX_PALETTES, PALETTE_SIZE};

/// Error writing a palette file.
#[derive(Debug, Error)]
pub enum PalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A named group of palettes extracted from one C array.
///
/// Source grouping is preserved so callers can import groups selectively.
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteGroup {
    pub name: String,
    pub palettes: Vec<Palette>,
}

/// Load palettes from a binary RIFF `.pal` file.
///
/// Colors are grouped into palettes of 16; a trailing partial group is
/// zero-padded and anything past the 16-palette hardware limit is ignored.
/// Alpha is forced to 255 regardless of the stored flag byte.
/// Any failure (open error, truncated or foreign header) logs a warning and
/// returns an empty list.
pub fn load_palettes(path: &Path) -> Vec<Palette> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("failed to open palette file {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    // "RIFF" u32 "PAL " "data" u32 u16 u16 = 24 header bytes
    if bytes.len() < 24 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"PAL " {
        warn!("{} is not a RIFF palette file", path.display());
        return Vec::new();
    }

    let num_colors = u16::from_le_bytes([bytes[22], bytes[23]]) as usize;
    let mut colors = bytes[24..].chunks_exact(4);

    let mut palettes = Vec::new();
    let mut i = 0;
    while i < num_colors {
        if palettes.len() == MAX_PALETTES {
            warn!(
                "{} holds more than {} palettes, ignoring the rest",
                path.display(),
                MAX_PALETTES
            );
            break;
        }
        let mut palette = Palette::default();
        for j in 0..PALETTE_SIZE {
            if i + j >= num_colors {
                break;
            }
            let Some(entry) = colors.next() else {
                warn!("palette file {} truncated at color {}", path.display(), i + j);
                break;
            };
            palette.colors[j] = Rgba([entry[0], entry[1], entry[2], 255]);
        }
        palettes.push(palette);
        i += PALETTE_SIZE;
    }

    palettes
}

/// Save palettes to `path`.
///
/// A `.pal` extension writes the binary RIFF layout; any other extension
/// writes C source in the `TO_RGB555` convention.
pub fn save_palettes(path: &Path, palettes: &[Palette]) -> Result<(), PalError> {
    let is_pal = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pal"));

    if is_pal {
        std::fs::write(path, encode_riff_pal(palettes))?;
    } else {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("palette");
        std::fs::write(path, serialize_palettes_c(palettes, stem))?;
    }
    Ok(())
}

/// Encode palettes into the binary RIFF PAL layout.
///
/// Header: `"RIFF" <u32 fileSize> "PAL " "data" <u32 chunkSize>
/// <u16 version=0x0300> <u16 numColors>`, then 4 bytes per color with the
/// flag byte always 0.
pub fn encode_riff_pal(palettes: &[Palette]) -> Vec<u8> {
    let color_count = palettes.len() * PALETTE_SIZE;
    let data_chunk_size = 4 + 2 + 2 + color_count * 4;
    let riff_file_size = 4 + 4 + data_chunk_size;

    let mut out = Vec::with_capacity(riff_file_size + 8);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(riff_file_size as u32).to_le_bytes());
    out.extend_from_slice(b"PAL ");
    out.extend_from_slice(b"data");
    out.extend_from_slice(&((data_chunk_size - 8) as u32).to_le_bytes());
    out.extend_from_slice(&0x0300u16.to_le_bytes());
    out.extend_from_slice(&(color_count as u16).to_le_bytes());

    for palette in palettes {
        for color in &palette.colors {
            out.extend_from_slice(&[color[0], color[1], color[2], 0]);
        }
    }

    out
}

/// Best-effort extraction of palettes embedded in C source.
///
/// Scans for `Palette <name>[] = { ... };` arrays, `{...}` sub-blocks
/// within each (one per palette), and `TO_RGB555(0x..)` tokens within each
/// sub-block (up to 16 per palette, fewer yields a zero-padded palette).
/// Groups with no palettes are discarded.
pub fn extract_palettes_from_c(text: &str) -> Vec<PaletteGroup> {
    // Unwraps are safe: the patterns are compile-time constants.
    let group_re = Regex::new(r"(?s)Palette\s+(\w+)\s*\[\]\s*=\s*\{(.*?)\};").unwrap();
    let block_re = Regex::new(r"\{[^{}]*\}").unwrap();
    let color_re = Regex::new(r"TO_RGB555\(0x([0-9a-fA-F]+)\)").unwrap();

    let mut groups = Vec::new();
    for group_match in group_re.captures_iter(text) {
        let name = group_match[1].to_string();
        let body = &group_match[2];

        let mut palettes = Vec::new();
        for block in block_re.find_iter(body) {
            let mut palette = Palette::default();
            for (i, color) in color_re.captures_iter(block.as_str()).take(PALETTE_SIZE).enumerate()
            {
                let rgb24 = u32::from_str_radix(&color[1], 16).unwrap_or(0);
                palette.colors[i] = Rgba([
                    ((rgb24 >> 16) & 0xFF) as u8,
                    ((rgb24 >> 8) & 0xFF) as u8,
                    (rgb24 & 0xFF) as u8,
                    255,
                ]);
            }
            palettes.push(palette);
        }

        if !palettes.is_empty() {
            groups.push(PaletteGroup { name, palettes });
        }
    }

    groups
}

/// Serialize palettes as C source: one flat `Palette <stem>_pal[]` array in
/// the `TO_RGB555` convention. Groups are not preserved on export.
pub fn serialize_palettes_c(palettes: &[Palette], stem: &str) -> String {
    let mut out = String::from("// Generated by celforge\n\n");
    out.push_str("#include \"global.h\"\n#include \"graphics.h\"\n\n");
    let _ = writeln!(out, "Palette {}_pal[] = {{", stem);

    for (palette_index, palette) in palettes.iter().enumerate() {
        let _ = writeln!(out, "    /* PALETTE {:02} */ {{", palette_index);
        for (color_index, color) in palette.colors.iter().enumerate() {
            let rgb24 = ((color[0] as u32) << 16) | ((color[1] as u32) << 8) | color[2] as u32;
            let _ = write!(out, "        /* {:02} */ TO_RGB555(0x{:06x})", color_index, rgb24);
            if color_index < PALETTE_SIZE - 1 {
                out.push(',');
            }
            out.push('\n');
        }
        out.push_str("    }");
        if palette_index + 1 < palettes.len() {
            out.push(',');
        }
        out.push('\n');
    }

    out.push_str("};\n");
    out
}
