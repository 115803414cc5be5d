//! 16-color palettes.

use image::Rgba;

/// Colors per palette. Color index 0 is conventionally transparent when
/// composited.
pub const PALETTE_SIZE: usize = 16;

/// Hardware limit on the number of palettes in a table.
pub const MAX_PALETTES: usize = 16;

/// A fixed block of 16 RGBA colors addressed by a 4-bit index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub colors: [Rgba<u8>; PALETTE_SIZE],
}

impl Default for Palette {
    fn default() -> Self {
        Self { colors: [Rgba([0, 0, 0, 0]); PALETTE_SIZE] }
    }
}

impl Palette {
    /// Placeholder palette for fresh projects: transparent slot 0 followed by
    /// a 15-step grayscale ramp.
    pub fn grayscale() -> Self {
        let mut colors = [Rgba([0, 0, 0, 0]); PALETTE_SIZE];
        for (i, color) in colors.iter_mut().enumerate().skip(1) {
            let v = (i * 255 / 15) as u8;
            *color = Rgba([v, v, v, 255]);
        }
        Self { colors }
    }

    /// Index of the first color matching `color` exactly by RGB, ignoring
    /// alpha.
    pub fn find_rgb(&self, color: Rgba<u8>) -> Option<usize> {
        self.colors
            .iter()
            .position(|c| c[0] == color[0] && c[1] == color[1] && c[2] == color[2])
    }
}

/// 24-bit RGB key for deduplicating colors across palettes.
pub fn rgb_key(color: Rgba<u8>) -> u32 {
    ((color[0] as u32) << 16) | ((color[1] as u32) << 8) | color[2] as u32
}
