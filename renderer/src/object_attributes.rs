//! OAM parsing: sprite attribute entries and the interleaved affine matrices.
//!
//! OAM is 1KB holding 128 sprite entries, 8 bytes each:
//!
//! ```text
//! Bytes 0-1: attribute 0 - y, obj mode, gfx mode, mosaic, color mode, shape
//! Bytes 2-3: attribute 1 - x, (affine param index) or (h/v flip), size
//! Bytes 4-5: attribute 2 - tile number, priority, palette bank
//! Bytes 6-7: one parameter of an affine matrix (see below), unused otherwise
//! ```
//!
//! The 32 affine matrices are not stored contiguously: each is built from the
//! bytes-6-7 slot of four consecutive sprite entries (entry `4n` contributes
//! `pa` of matrix `n`, `4n+1` contributes `pb`, and so on).

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

/// Sprite rendering mode (attribute 0, bits 8-9).
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjMode {
    #[default]
    Normal,
    Affine,
    Disabled,
    AffineDouble,
}

impl From<u16> for ObjMode {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::Normal,
            1 => Self::Affine,
            2 => Self::Disabled,
            3 => Self::AffineDouble,
            _ => unreachable!(),
        }
    }
}

/// Sprite graphics effect (attribute 0, bits 10-11).
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GfxMode {
    #[default]
    Normal,
    AlphaBlending,
    ObjectWindow,
}

impl From<u16> for GfxMode {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::Normal,
            1 => Self::AlphaBlending,
            2 => Self::ObjectWindow,
            // Forbidden combination; the hardware treats it as normal.
            _ => Self::Normal,
        }
    }
}

/// Sprite shape (attribute 0, bits 14-15), combined with [`ObjAttributes::size`]
/// via [`obj_dimensions`].
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjShape {
    #[default]
    Square,
    Horizontal,
    Vertical,
}

impl From<u16> for ObjShape {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::Square,
            1 => Self::Horizontal,
            2 => Self::Vertical,
            // Prohibited shape; treated as square like the other three.
            _ => Self::Square,
        }
    }
}

/// Width/height in pixels for every (shape, size) pair, flattened `shape * 4 +
/// size`. Mirrors the hardware's dimension table; there are no forbidden
/// entries left once shape 3 folds into `Square` above.
const OBJ_DIMENSIONS: [(u16, u16); 12] = [
    (8, 8),
    (16, 16),
    (32, 32),
    (64, 64),
    (16, 8),
    (32, 8),
    (32, 16),
    (64, 32),
    (8, 16),
    (8, 32),
    (16, 32),
    (32, 64),
];

/// Looks up a sprite's pixel dimensions from its shape and size selector
/// (`size` is 0-3, as stored in attribute 1).
#[must_use]
pub fn obj_dimensions(shape: ObjShape, size: u8) -> (u16, u16) {
    let shape_idx = shape as usize;
    OBJ_DIMENSIONS[shape_idx * 4 + (size as usize & 0b11)]
}

/// One parsed OAM entry. Fields that only apply to one of the two
/// transformation kinds are zeroed/defaulted on the other kind rather than
/// modeled as a nested enum, since the OAM layout itself reuses the same bits
/// for both meanings depending on `obj_mode`.
#[derive(Default, Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ObjAttributes {
    pub y_coordinate: u8,
    pub obj_mode: ObjMode,
    pub gfx_mode: GfxMode,
    pub mosaic: bool,
    /// `true` selects 8bpp/256-color tiles, `false` selects 4bpp/16-color.
    pub palette_8bpp: bool,
    pub shape: ObjShape,

    /// 9-bit coordinate (0-511), wraps.
    pub x_coordinate: u16,
    /// Size selector 0-3; meaning depends on `shape`, see [`obj_dimensions`].
    pub size: u8,

    // Normal-sprite-only fields (meaningless when `obj_mode` is affine).
    pub h_flip: bool,
    pub v_flip: bool,

    // Affine-sprite-only fields (meaningless when `obj_mode` is normal/disabled).
    pub affine_index: u8,

    pub tile_number: u16,
    pub priority: u8,
    pub palette_number: u8,
}

impl ObjAttributes {
    /// A sprite occupies the OAM-enabled set iff it isn't disabled. Affine
    /// sprites have no disable bit: attribute 0 bit 9 is repurposed as
    /// `AffineDouble` rather than disable, so any affine mode counts as
    /// enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        !matches!(self.obj_mode, ObjMode::Disabled)
    }

    #[must_use]
    pub const fn is_affine(&self) -> bool {
        matches!(self.obj_mode, ObjMode::Affine | ObjMode::AffineDouble)
    }

    #[must_use]
    pub fn dimensions(&self) -> (u16, u16) {
        obj_dimensions(self.shape, self.size)
    }
}

fn parse_entry(attribute0: u16, attribute1: u16, attribute2: u16) -> ObjAttributes {
    let obj_mode = ObjMode::from(attribute0.get_bits(8..=9));

    let (h_flip, v_flip, affine_index) = if matches!(obj_mode, ObjMode::Affine | ObjMode::AffineDouble) {
        (false, false, attribute1.get_bits(9..=13) as u8)
    } else {
        (attribute1.get_bit(12), attribute1.get_bit(13), 0)
    };

    ObjAttributes {
        y_coordinate: attribute0.get_bits(0..=7) as u8,
        obj_mode,
        gfx_mode: GfxMode::from(attribute0.get_bits(10..=11)),
        mosaic: attribute0.get_bit(12),
        palette_8bpp: attribute0.get_bit(13),
        shape: ObjShape::from(attribute0.get_bits(14..=15)),

        x_coordinate: attribute1.get_bits(0..=8),
        size: attribute1.get_bits(14..=15) as u8,

        h_flip,
        v_flip,
        affine_index,

        tile_number: attribute2.get_bits(0..=9),
        priority: attribute2.get_bits(10..=11) as u8,
        palette_number: attribute2.get_bits(12..=15) as u8,
    }
}

/// One of the 32 affine transformation matrices shared by affine sprites.
///
/// Components are 8.8 fixed-point signed values, as stored in OAM. `apply`
/// keeps the math in fixed point rather than converting to float, matching
/// how the hardware actually computes a transformed sprite's source pixel.
#[derive(Default, Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RotationScaling {
    pub pa: i16,
    pub pb: i16,
    pub pc: i16,
    pub pd: i16,
}

impl RotationScaling {
    /// Maps a point `(x, y)` relative to the sprite's transformed-space
    /// origin back to a point in source (texture) space, both in 8.8 fixed
    /// point on input and whole pixels on output:
    ///
    /// `(localX, localY) = ((pa*x + pb*y) >> 8, (pc*x + pd*y) >> 8)`
    #[must_use]
    pub fn apply(self, x: i32, y: i32) -> (i32, i32) {
        let a = i32::from(self.pa);
        let b = i32::from(self.pb);
        let c = i32::from(self.pc);
        let d = i32::from(self.pd);
        ((a * x + b * y) >> 8, (c * x + d * y) >> 8)
    }
}

/// Parses the single OAM entry at sprite `index` (0-127), ignoring its
/// affine matrix component. Used by incremental OAM writes, which only need
/// to re-derive one sprite's enabled state rather than all 128.
#[must_use]
pub fn parse_single(oam: &[u8; 0x400], index: usize) -> ObjAttributes {
    let base = index * 8;
    let attribute0 = u16::from_le_bytes([oam[base], oam[base + 1]]);
    let attribute1 = u16::from_le_bytes([oam[base + 2], oam[base + 3]]);
    let attribute2 = u16::from_le_bytes([oam[base + 4], oam[base + 5]]);
    parse_entry(attribute0, attribute1, attribute2)
}

/// Parses all 128 OAM entries and the 32 interleaved affine matrices out of
/// raw OAM bytes.
#[must_use]
pub fn get_attributes(oam: &[u8; 0x400]) -> ([ObjAttributes; 128], [RotationScaling; 32]) {
    let mut attributes = [ObjAttributes::default(); 128];
    let mut matrices = [RotationScaling::default(); 32];

    for (idx, entry) in oam.chunks_exact(8).enumerate() {
        let attribute0 = u16::from_le_bytes([entry[0], entry[1]]);
        let attribute1 = u16::from_le_bytes([entry[2], entry[3]]);
        let attribute2 = u16::from_le_bytes([entry[4], entry[5]]);
        let matrix_component = i16::from_le_bytes([entry[6], entry[7]]);

        attributes[idx] = parse_entry(attribute0, attribute1, attribute2);

        let matrix = &mut matrices[idx / 4];
        match idx % 4 {
            0 => matrix.pa = matrix_component,
            1 => matrix.pb = matrix_component,
            2 => matrix.pc = matrix_component,
            _ => matrix.pd = matrix_component,
        }
    }

    (attributes, matrices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(attribute0: u16, attribute1: u16, attribute2: u16, matrix_component: i16) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes[0..2].copy_from_slice(&attribute0.to_le_bytes());
        bytes[2..4].copy_from_slice(&attribute1.to_le_bytes());
        bytes[4..6].copy_from_slice(&attribute2.to_le_bytes());
        bytes[6..8].copy_from_slice(&matrix_component.to_le_bytes());
        bytes
    }

    #[test]
    fn parses_normal_sprite_flip_bits() {
        // y=100, mode=Normal(0), gfx=Normal(0), mosaic=0, 4bpp, shape=Square(0)
        let attribute0 = 100;
        // x=50, hflip=1, vflip=0, size=1
        let attribute1 = 50 | (1 << 12) | (1 << 14);
        let attribute2 = 7 | (2 << 10) | (3 << 12);

        let mut oam = [0u8; 0x400];
        oam[0..8].copy_from_slice(&entry(attribute0, attribute1, attribute2, 0));
        let (attrs, _) = get_attributes(&oam);

        assert_eq!(attrs[0].y_coordinate, 100);
        assert_eq!(attrs[0].x_coordinate, 50);
        assert!(attrs[0].h_flip);
        assert!(!attrs[0].v_flip);
        assert_eq!(attrs[0].size, 1);
        assert_eq!(attrs[0].tile_number, 7);
        assert_eq!(attrs[0].priority, 2);
        assert_eq!(attrs[0].palette_number, 3);
        assert!(attrs[0].is_enabled());
        assert!(!attrs[0].is_affine());
    }

    #[test]
    fn disabled_sprite_is_not_enabled() {
        let attribute0 = 2 << 8; // obj_mode = Disabled
        let mut oam = [0u8; 0x400];
        oam[0..8].copy_from_slice(&entry(attribute0, 0, 0, 0));
        let (attrs, _) = get_attributes(&oam);
        assert!(!attrs[0].is_enabled());
    }

    #[test]
    fn affine_sprite_reads_matrix_index_not_flip_bits() {
        let attribute0 = 1 << 8; // obj_mode = Affine
        let attribute1 = 17 << 9; // affine_index = 17
        let mut oam = [0u8; 0x400];
        oam[0..8].copy_from_slice(&entry(attribute0, attribute1, 0, 0));
        let (attrs, _) = get_attributes(&oam);
        assert!(attrs[0].is_affine());
        assert_eq!(attrs[0].affine_index, 17);
        assert!(!attrs[0].h_flip);
    }

    #[test]
    fn affine_matrices_are_interleaved_across_four_sprites() {
        let mut oam = [0u8; 0x400];
        oam[0..8].copy_from_slice(&entry(0, 0, 0, 0x0100)); // sprite 0 -> pa
        oam[8..16].copy_from_slice(&entry(0, 0, 0, 0x0080)); // sprite 1 -> pb
        oam[16..24].copy_from_slice(&entry(0, 0, 0, -0x0080_i16)); // sprite 2 -> pc
        oam[24..32].copy_from_slice(&entry(0, 0, 0, 0x0100)); // sprite 3 -> pd
        let (_, matrices) = get_attributes(&oam);
        assert_eq!(matrices[0].pa, 0x0100);
        assert_eq!(matrices[0].pb, 0x0080);
        assert_eq!(matrices[0].pc, -0x0080);
        assert_eq!(matrices[0].pd, 0x0100);
    }

    #[test]
    fn identity_matrix_maps_points_onto_themselves() {
        let identity = RotationScaling {
            pa: 0x0100,
            pb: 0,
            pc: 0,
            pd: 0x0100,
        };
        assert_eq!(identity.apply(5, -3), (5, -3));
    }

    #[test]
    fn parse_single_matches_the_entry_from_a_full_parse() {
        let mut oam = [0u8; 0x400];
        oam[8..16].copy_from_slice(&entry(42, 7, 1 << 10, 0)); // sprite 1
        let single = parse_single(&oam, 1);
        let (all, _) = get_attributes(&oam);
        assert_eq!(single.y_coordinate, all[1].y_coordinate);
        assert_eq!(single.priority, all[1].priority);
    }

    #[test]
    fn obj_dimensions_covers_all_shape_size_pairs() {
        assert_eq!(obj_dimensions(ObjShape::Square, 0), (8, 8));
        assert_eq!(obj_dimensions(ObjShape::Square, 3), (64, 64));
        assert_eq!(obj_dimensions(ObjShape::Horizontal, 2), (32, 16));
        assert_eq!(obj_dimensions(ObjShape::Vertical, 3), (32, 64));
    }
}
