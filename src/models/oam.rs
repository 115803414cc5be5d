//! Hardware sprite attribute records and their bit-packed wire form.
//!
//! An OAM record occupies three little-endian 16-bit words:
//!
//! ```text
//! attr0: [ y:8 | affine:1 | disable:1 | mode:2 | mosaic:1 | palette_mode:1 | shape:2 ]
//! attr1: [ x:9 | unused:3 | h_flip:1 | v_flip:1 | size:2 ]
//! attr2: [ tile_id:10 | priority:2 | palette:4 ]
//! ```
//!
//! `pack`/`unpack` are pure bit codecs: they replicate this layout exactly
//! and apply no clamping, so cel files interchanged with an external GBA
//! toolchain round-trip bit for bit. Editors clamp positions separately via
//! [`Oam::clamp_position`].

/// Practical position range on both axes (8-bit two's-complement, even
/// though x carries 9 bits on the wire).
pub const POSITION_MIN: i16 = -128;
pub const POSITION_MAX: i16 = 127;

/// Sprite shape selector. Combined with the 2-bit size field it selects the
/// pixel dimensions from a fixed lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjShape {
    #[default]
    Square,
    Horizontal,
    Vertical,
}

impl ObjShape {
    /// Decode the 2-bit shape field. The value 3 is undefined by the
    /// hardware; callers are expected to have clamped it away, so it decodes
    /// as `Square`.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            1 => ObjShape::Horizontal,
            2 => ObjShape::Vertical,
            _ => ObjShape::Square,
        }
    }

    pub fn bits(self) -> u16 {
        match self {
            ObjShape::Square => 0,
            ObjShape::Horizontal => 1,
            ObjShape::Vertical => 2,
        }
    }
}

/// One sprite attribute record in unpacked form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Oam {
    pub y: i16,
    pub affine: bool,
    pub disabled: bool,
    pub mode: u8,
    pub mosaic: bool,
    pub palette_mode: bool,
    pub shape: ObjShape,
    pub x: i16,
    pub h_flip: bool,
    pub v_flip: bool,
    pub size: u8,
    pub tile_id: u16,
    pub priority: u8,
    pub palette: u8,
}

impl Oam {
    /// Decode from the three attribute words.
    pub fn unpack(words: [u16; 3]) -> Self {
        let [a0, a1, a2] = words;

        let y = (a0 & 0xFF) as u8 as i8 as i16;
        let raw_x = a1 & 0x01FF;
        // Sign-extend the 9-bit x field
        let x = if raw_x & 0x0100 != 0 { raw_x as i16 - 512 } else { raw_x as i16 };

        Self {
            y,
            affine: a0 & 0x0100 != 0,
            disabled: a0 & 0x0200 != 0,
            mode: ((a0 >> 10) & 0x3) as u8,
            mosaic: a0 & 0x1000 != 0,
            palette_mode: a0 & 0x2000 != 0,
            shape: ObjShape::from_bits((a0 >> 14) as u8),
            x,
            h_flip: a1 & 0x1000 != 0,
            v_flip: a1 & 0x2000 != 0,
            size: ((a1 >> 14) & 0x3) as u8,
            tile_id: a2 & 0x03FF,
            priority: ((a2 >> 10) & 0x3) as u8,
            palette: ((a2 >> 12) & 0xF) as u8,
        }
    }

    /// Encode into the three attribute words.
    pub fn pack(&self) -> [u16; 3] {
        let mut a0 = (self.y as u16) & 0xFF;
        if self.affine {
            a0 |= 0x0100;
        }
        if self.disabled {
            a0 |= 0x0200;
        }
        a0 |= ((self.mode as u16) & 0x3) << 10;
        if self.mosaic {
            a0 |= 0x1000;
        }
        if self.palette_mode {
            a0 |= 0x2000;
        }
        a0 |= self.shape.bits() << 14;

        let mut a1 = (self.x as u16) & 0x01FF;
        if self.h_flip {
            a1 |= 0x1000;
        }
        if self.v_flip {
            a1 |= 0x2000;
        }
        a1 |= ((self.size as u16) & 0x3) << 14;

        let mut a2 = self.tile_id & 0x03FF;
        a2 |= ((self.priority as u16) & 0x3) << 10;
        a2 |= ((self.palette as u16) & 0xF) << 12;

        [a0, a1, a2]
    }

    /// Decode from the 6-byte little-endian wire form.
    pub fn from_le_bytes(bytes: [u8; 6]) -> Self {
        Self::unpack([
            u16::from_le_bytes([bytes[0], bytes[1]]),
            u16::from_le_bytes([bytes[2], bytes[3]]),
            u16::from_le_bytes([bytes[4], bytes[5]]),
        ])
    }

    /// Encode into the 6-byte little-endian wire form.
    pub fn to_le_bytes(&self) -> [u8; 6] {
        let words = self.pack();
        let mut bytes = [0u8; 6];
        for (i, word) in words.iter().enumerate() {
            bytes[i * 2..i * 2 + 2].copy_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    /// Pixel dimensions selected by the shape and size fields.
    pub fn dimensions(&self) -> (u32, u32) {
        dimensions(self.shape, self.size)
    }

    /// Clamp both positions to the practical `-128..=127` range.
    pub fn clamp_position(&mut self) {
        self.x = self.x.clamp(POSITION_MIN, POSITION_MAX);
        self.y = self.y.clamp(POSITION_MIN, POSITION_MAX);
    }
}

/// Sprite pixel dimensions for a shape/size pair (8x8 up to 64x64).
pub fn dimensions(shape: ObjShape, size: u8) -> (u32, u32) {
    const TABLE: [[(u32, u32); 4]; 3] = [
        [(8, 8), (16, 16), (32, 32), (64, 64)],
        [(16, 8), (32, 8), (32, 16), (64, 32)],
        [(8, 16), (8, 32), (16, 32), (32, 64)],
    ];
    TABLE[shape.bits() as usize][(size & 0x3) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_record() {
        let oam = Oam::unpack([0, 0, 0]);
        assert_eq!(oam, Oam::default());
        assert_eq!(oam.pack(), [0, 0, 0]);
    }

    #[test]
    fn test_y_sign_extension() {
        let oam = Oam::unpack([0x0080, 0, 0]);
        assert_eq!(oam.y, -128);
        let oam = Oam::unpack([0x007F, 0, 0]);
        assert_eq!(oam.y, 127);
    }

    #[test]
    fn test_x_sign_extension() {
        let oam = Oam::unpack([0, 0x0180, 0]);
        assert_eq!(oam.x, -128);
        let oam = Oam::unpack([0, 0x007F, 0]);
        assert_eq!(oam.x, 127);
    }

    #[test]
    fn test_attr0_flags() {
        let oam = Oam::unpack([0b1011_1111_0000_0000, 0, 0]);
        assert!(oam.affine);
        assert!(oam.disabled);
        assert_eq!(oam.mode, 3);
        assert!(oam.mosaic);
        assert!(oam.palette_mode);
        assert_eq!(oam.shape, ObjShape::Vertical);
    }

    #[test]
    fn test_undefined_shape_decodes_as_square() {
        assert_eq!(ObjShape::from_bits(3), ObjShape::Square);
    }

    #[test]
    fn test_attr2_fields() {
        let oam = Oam::unpack([0, 0, 0xFFFF]);
        assert_eq!(oam.tile_id, 0x3FF);
        assert_eq!(oam.priority, 3);
        assert_eq!(oam.palette, 0xF);
    }

    #[test]
    fn test_pack_round_trip() {
        let oam = Oam {
            y: -128,
            affine: false,
            disabled: true,
            mode: 2,
            mosaic: true,
            palette_mode: false,
            shape: ObjShape::Horizontal,
            x: 127,
            h_flip: true,
            v_flip: false,
            size: 3,
            tile_id: 0x2A5,
            priority: 1,
            palette: 7,
        };
        assert_eq!(Oam::unpack(oam.pack()), oam);
    }

    #[test]
    fn test_le_bytes_round_trip() {
        let bytes = [0x80, 0x43, 0x7F, 0x90, 0xA5, 0x5A];
        let oam = Oam::from_le_bytes(bytes);
        assert_eq!(oam.to_le_bytes(), bytes);
    }

    #[test]
    fn test_dimensions_table() {
        assert_eq!(dimensions(ObjShape::Square, 0), (8, 8));
        assert_eq!(dimensions(ObjShape::Square, 3), (64, 64));
        assert_eq!(dimensions(ObjShape::Horizontal, 0), (16, 8));
        assert_eq!(dimensions(ObjShape::Horizontal, 3), (64, 32));
        assert_eq!(dimensions(ObjShape::Vertical, 0), (8, 16));
        assert_eq!(dimensions(ObjShape::Vertical, 3), (32, 64));
    }

    #[test]
    fn test_clamp_position() {
        let mut oam = Oam { x: 200, y: -200, ..Oam::default() };
        oam.clamp_position();
        assert_eq!(oam.x, 127);
        assert_eq!(oam.y, -128);
    }
}
