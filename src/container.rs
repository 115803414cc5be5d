//! The project container: a sectioned TLV binary holding tiles, palettes,
//! cel and animation text, and scalar metadata in one file.
//!
//! Layout: 4-byte magic `ENOT`, u32 version, u32 section count, then
//! `{u32 type, u32 length, bytes}` per section, all integers little-endian.
//! Unknown section types are skipped by length so newer files still load.

use std::path::Path;

use image::Rgba;
use log::{debug, warn};
use thiserror::Error;

use crate::celtext;
use crate::models::{Palette, Project, MAX_PALETTES, PALETTE_SIZE};
use crate::tileio;

pub const MAGIC: &[u8; 4] = b"ENOT";
pub const VERSION: u32 = 1;

const SECTION_TILES: u32 = 1;
const SECTION_PALETTES: u32 = 2;
const SECTION_CELS: u32 = 3;
const SECTION_ANIMATIONS: u32 = 4;
const SECTION_METADATA: u32 = 5;

/// Container read/write failure.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("not a project container (bad magic)")]
    BadMagic,
    #[error("unsupported container version {0}")]
    UnsupportedVersion(u32),
    #[error("container truncated")]
    Truncated,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write the whole project to a single container file.
///
/// Tile, palette, cel, and animation sections are emitted only when their
/// collection is non-empty; the metadata section is always emitted.
pub fn save_project(path: &Path, project: &Project) -> Result<(), ContainerError> {
    let mut sections: Vec<(u32, Vec<u8>)> = Vec::new();

    if !project.tiles.is_empty() {
        sections.push((SECTION_TILES, tileio::encode_tiles(&project.tiles)));
    }
    if !project.palettes.is_empty() {
        sections.push((SECTION_PALETTES, encode_palettes(&project.palettes)));
    }
    if !project.cels.is_empty() {
        sections.push((SECTION_CELS, celtext::serialize_cels(&project.cels).into_bytes()));
    }
    if !project.animations.is_empty() {
        sections.push((
            SECTION_ANIMATIONS,
            celtext::serialize_animations(&project.animations, &project.meta.cel_filename)
                .into_bytes(),
        ));
    }
    sections.push((SECTION_METADATA, encode_metadata(project)));

    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&(sections.len() as u32).to_le_bytes());
    for (kind, payload) in &sections {
        out.extend_from_slice(&kind.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
    }

    std::fs::write(path, out)?;
    Ok(())
}

/// Read a project back from a container file.
///
/// Only a bad magic, an unsupported version, or a truncated section header
/// fail the load. Sections with unknown types are skipped; malformed
/// section payloads degrade to empty collections the same way the
/// standalone loaders do. Metadata indices are clamped against whatever
/// actually loaded.
pub fn load_project(path: &Path) -> Result<Project, ContainerError> {
    let bytes = std::fs::read(path)?;
    if bytes.len() < 12 || &bytes[0..4] != MAGIC {
        return Err(ContainerError::BadMagic);
    }
    let version = read_u32(&bytes, 4)?;
    if version != VERSION {
        return Err(ContainerError::UnsupportedVersion(version));
    }
    let section_count = read_u32(&bytes, 8)?;

    let mut project = Project { palettes: Vec::new(), ..Project::default() };

    let mut offset = 12usize;
    for _ in 0..section_count {
        let kind = read_u32(&bytes, offset)?;
        let len = read_u32(&bytes, offset + 4)? as usize;
        offset += 8;
        let payload = bytes.get(offset..offset + len).ok_or(ContainerError::Truncated)?;
        offset += len;

        match kind {
            SECTION_TILES => project.tiles = tileio::decode_tiles(payload),
            SECTION_PALETTES => project.palettes = decode_palettes(payload),
            SECTION_CELS => {
                project.cels = celtext::parse_cels(&String::from_utf8_lossy(payload));
            }
            SECTION_ANIMATIONS => {
                project.animations = celtext::parse_animations(&String::from_utf8_lossy(payload));
            }
            SECTION_METADATA => decode_metadata(payload, &mut project),
            other => debug!("skipping unknown container section type {}", other),
        }
    }

    project.clamp_indices();
    Ok(project)
}

/// Flat RGBA: 16 colors x 4 bytes per palette, in table order.
fn encode_palettes(palettes: &[Palette]) -> Vec<u8> {
    let mut out = Vec::with_capacity(palettes.len() * PALETTE_SIZE * 4);
    for palette in palettes {
        for color in &palette.colors {
            out.extend_from_slice(&color.0);
        }
    }
    out
}

fn decode_palettes(bytes: &[u8]) -> Vec<Palette> {
    let mut palettes = Vec::new();
    for group in bytes.chunks_exact(PALETTE_SIZE * 4) {
        if palettes.len() == MAX_PALETTES {
            warn!("palette section holds more than {} palettes, ignoring the rest", MAX_PALETTES);
            break;
        }
        let mut palette = Palette::default();
        for (color, entry) in palette.colors.iter_mut().zip(group.chunks_exact(4)) {
            *color = Rgba([entry[0], entry[1], entry[2], entry[3]]);
        }
        palettes.push(palette);
    }
    if bytes.len() % (PALETTE_SIZE * 4) != 0 {
        warn!("palette section has {} trailing bytes", bytes.len() % (PALETTE_SIZE * 4));
    }
    palettes
}

/// Metadata section: one `key=value` per line, UTF-8.
fn encode_metadata(project: &Project) -> Vec<u8> {
    let meta = &project.meta;
    format!(
        "cel_filename={}\ncurrent_palette={}\ncurrent_animation={}\nframe_rate={}\nloop={}\n",
        meta.cel_filename,
        meta.current_palette,
        meta.current_animation,
        meta.frame_rate,
        if meta.looped { 1 } else { 0 },
    )
    .into_bytes()
}

fn decode_metadata(bytes: &[u8], project: &mut Project) {
    for line in String::from_utf8_lossy(bytes).lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key {
            "cel_filename" => project.meta.cel_filename = value.to_string(),
            "current_palette" => {
                project.meta.current_palette = value.parse().unwrap_or(0);
            }
            "current_animation" => {
                project.meta.current_animation = value.parse().unwrap_or(-1);
            }
            "frame_rate" => {
                project.meta.frame_rate = value.parse().unwrap_or(60.0);
            }
            "loop" => project.meta.looped = value != "0",
            other => debug!("ignoring unknown metadata key {}", other),
        }
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, ContainerError> {
    let slice = bytes.get(offset..offset + 4).ok_or(ContainerError::Truncated)?;
    Ok(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Animation, AnimationCel, AnimationEntry, Oam, TileData};
    use tempfile::tempdir;

    fn sample_project() -> Project {
        let mut project = Project::new();

        let mut tile = TileData::default();
        tile.set(0, 0, 7);
        tile.set(7, 7, 3);
        project.tiles.push(tile);

        project.palettes[0].colors[1] = Rgba([255, 0, 0, 255]);
        project.cels.push(AnimationCel {
            name: "idle0".into(),
            oams: vec![Oam { x: -4, y: -4, ..Oam::default() }],
        });
        project.animations.push(Animation {
            name: "anim_idle".into(),
            entries: vec![AnimationEntry { cel_name: "idle0".into(), duration: 8 }],
        });
        project.meta.cel_filename = "idle.h".into();
        project.meta.frame_rate = 30.0;
        project.meta.looped = false;
        project
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sprite.inv");
        let project = sample_project();

        save_project(&path, &project).unwrap();
        let loaded = load_project(&path).unwrap();

        assert_eq!(loaded.tiles.len(), project.tiles.len());
        assert_eq!(loaded.tiles.get_tile(0), project.tiles.get_tile(0));
        assert_eq!(loaded.palettes, project.palettes);
        assert_eq!(loaded.cels, project.cels);
        assert_eq!(loaded.animations, project.animations);
        assert_eq!(loaded.meta, project.meta);
    }

    #[test]
    fn test_header_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.inv");
        save_project(&path, &Project::default()).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..4], b"ENOT");
        assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]), 1);
        // Only the metadata section for a default project
        assert_eq!(u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]), 1);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.inv");
        std::fs::write(&path, b"NOPE\x01\x00\x00\x00\x00\x00\x00\x00").unwrap();
        assert!(matches!(load_project(&path), Err(ContainerError::BadMagic)));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("future.inv");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"ENOT");
        bytes.extend_from_slice(&99u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(load_project(&path), Err(ContainerError::UnsupportedVersion(99))));
    }

    #[test]
    fn test_truncated_section_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cut.inv");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"ENOT");
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&SECTION_TILES.to_le_bytes());
        bytes.extend_from_slice(&64u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 10]);
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(load_project(&path), Err(ContainerError::Truncated)));
    }

    #[test]
    fn test_unknown_sections_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("extra.inv");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"ENOT");
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.extend_from_slice(&2u32.to_le_bytes());
        // Unknown type 42 first, then a valid metadata section
        bytes.extend_from_slice(&42u32.to_le_bytes());
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(b"???");
        let meta = b"frame_rate=24\n";
        bytes.extend_from_slice(&SECTION_METADATA.to_le_bytes());
        bytes.extend_from_slice(&(meta.len() as u32).to_le_bytes());
        bytes.extend_from_slice(meta);
        std::fs::write(&path, bytes).unwrap();

        let project = load_project(&path).unwrap();
        assert_eq!(project.meta.frame_rate, 24.0);
    }

    #[test]
    fn test_load_caps_palettes_at_hardware_limit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("many.inv");

        let mut project = Project::new();
        project.palettes = (0..40)
            .map(|i| {
                let mut p = Palette::default();
                p.colors[1] = Rgba([i as u8, 0, 0, 255]);
                p
            })
            .collect();
        save_project(&path, &project).unwrap();

        let loaded = load_project(&path).unwrap();
        assert_eq!(loaded.palettes.len(), MAX_PALETTES);
        assert_eq!(loaded.palettes[15].colors[1], Rgba([15, 0, 0, 255]));
    }

    #[test]
    fn test_metadata_bad_values_fall_back() {
        let mut project = Project::default();
        decode_metadata(b"current_palette=abc\nframe_rate=xyz\nloop=0\nmystery=1\n", &mut project);
        assert_eq!(project.meta.current_palette, 0);
        assert_eq!(project.meta.frame_rate, 60.0);
        assert!(!project.meta.looped);
    }

    #[test]
    fn test_load_clamps_indices() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clamp.inv");
        let mut project = sample_project();
        project.meta.current_palette = 40;
        project.meta.current_animation = 40;

        save_project(&path, &project).unwrap();
        let loaded = load_project(&path).unwrap();
        assert_eq!(loaded.meta.current_palette, 0);
        assert_eq!(loaded.meta.current_animation, 0);
    }
}
