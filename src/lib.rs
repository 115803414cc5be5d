//! Celforge - Codec and composition engine for GBA-style sprite assets
//!
//! This library provides functionality to:
//! - Load and save 4bpp tile graphics, 16-color palettes, animation cels
//!   and animations in the formats used by a GBA asset pipeline
//! - Composite sprite frames from tile memory, palettes and OAM attributes
//! - Export animations as indexed-color animated GIFs
//! - Bundle everything into a single tagged project container

pub mod celtext;
pub mod cli;
pub mod compositor;
pub mod container;
pub mod convert;
pub mod gif_export;
pub mod models;
pub mod paletteio;
pub mod tileio;
