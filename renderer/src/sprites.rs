//! Sprite (OBJ) pipeline: incremental OAM-enabled bitmap maintenance, plus
//! per-scanline preprocess/postprocess rasterization.
//!
//! Sprites draw in two passes because their priority ordering is interleaved
//! with backgrounds (see `Renderer::draw_scanline`): `preprocess_sprite`/
//! `preprocess_transformed_sprite` rasterize every visible sprite for this
//! row into a scratch layer, tagging each pixel with its own sprite's
//! priority; `postprocess_sprite` then walks that scratch layer once per
//! priority level and composites only the pixels that match.

use crate::color::{flags, Pixel};
use crate::compositor::composite;
use crate::memory::Memory;
use crate::object_attributes::{GfxMode, ObjAttributes, ObjMode, RotationScaling};
use crate::palette::PaletteCache;
use crate::registers::BlendMode;

const SCREEN_WIDTH: usize = 240;

/// Byte offset into VRAM where OBJ tile data begins (character block 4).
const BASE_TILE: usize = 0x1_0000;

/// Tracks which of the 128 OAM entries currently count as enabled for the
/// scanline driver's preprocess walk. Updated incrementally as OAM is
/// written rather than recomputed by scanning all 128 entries every row.
#[derive(Default, Clone, Copy)]
pub struct EnabledBitmap {
    groups: [u32; 4],
}

impl EnabledBitmap {
    /// Applies one OAM attribute write at halfword index `oam`. A write to
    /// the fourth halfword of an entry (`oam & 3 == 3`) is an affine matrix
    /// component and never affects enabled state.
    pub fn write_oam(&mut self, oam: u32, sprite: &ObjAttributes) {
        if oam & 3 == 3 {
            return;
        }
        let i = oam >> 2;
        let bit = i & 31;
        let group = &mut self.groups[(i >> 5) as usize];
        if sprite.is_enabled() {
            *group |= 1 << bit;
        } else {
            *group &= !(1 << bit);
        }
    }

    /// Indices of every enabled sprite, in ascending order, skipping whole
    /// zero groups of 32.
    pub fn iter_enabled(&self) -> impl Iterator<Item = usize> + '_ {
        self.groups.iter().enumerate().flat_map(|(group_idx, &bitmap)| {
            (0..32).filter(move |bit| bitmap & (1 << bit) != 0).map(move |bit| group_idx * 32 + bit)
        })
    }
}

/// Interprets a 9-bit OAM x-coordinate as signed: values 256-511 represent
/// sprites positioned off the left edge of the screen.
fn signed_x(x_coordinate: u16) -> i32 {
    if x_coordinate >= 256 {
        i32::from(x_coordinate) - 512
    } else {
        i32::from(x_coordinate)
    }
}

fn sprite_flags(sprite: &ObjAttributes, target1_obj: bool, target2_obj: bool, blend_mode: BlendMode) -> Pixel {
    let mut out = flags::priority(sprite.priority) | flags::FINALIZED;
    if (target1_obj && blend_mode == BlendMode::AlphaBlend) || sprite.gfx_mode == GfxMode::AlphaBlending {
        out |= flags::TARGET_1;
    }
    if target2_obj {
        out |= flags::TARGET_2;
    }
    out
}

fn tile_pixel_16color(memory: &Memory, char_base: usize, width: u32, character_1d_mapping: bool, local_x: u32, local_y: u32) -> usize {
    let x_base = (local_x & !7) * 4 + ((local_x >> 1) & 2);
    let y_base = (local_y & !7) * (if character_1d_mapping { width / 2 } else { 0x80 }) + (local_y & 7) * 4;
    let byte_offset = (char_base as u32 + y_base + x_base) as usize & !1;
    let half = memory.vram_half(byte_offset);
    ((half >> ((local_x & 3) * 4)) & 0xF) as usize
}

fn tile_pixel_256color(memory: &Memory, char_base: usize, width: u32, character_1d_mapping: bool, local_x: u32, local_y: u32) -> usize {
    let x_base = (local_x & !7) * 8 + (local_x & 6);
    let y_base = (local_y & !7) * (if character_1d_mapping { width } else { 0x80 }) + (local_y & 7) * 8;
    let byte_offset = (char_base as u32 + y_base + x_base) as usize & !1;
    let half = memory.vram_half(byte_offset);
    ((half >> ((local_x & 1) * 8)) & 0xFF) as usize
}

fn palette_index(sprite: &ObjAttributes, pixel_index: usize) -> usize {
    if sprite.palette_8bpp {
        0x100 | pixel_index
    } else {
        0x100 | (usize::from(sprite.palette_number) << 4) | pixel_index
    }
}

/// Rasterizes one non-affine sprite's contribution to scanline `y` into the
/// sprite scratch layer. A no-op if the sprite doesn't reach this row.
#[allow(clippy::too_many_arguments)]
pub fn preprocess_sprite(
    sprite: &ObjAttributes,
    y: u32,
    memory: &Memory,
    palette: &PaletteCache,
    character_1d_mapping: bool,
    target1_obj: bool,
    target2_obj: bool,
    blend_mode: BlendMode,
    scratch: &mut [Pixel; SCREEN_WIDTH],
) {
    let (width, height) = sprite.dimensions();
    let (width, height) = (u32::from(width), u32::from(height));
    let sprite_y = u32::from(sprite.y_coordinate);
    let bottom = sprite_y + height;

    let visible = if bottom > 256 {
        y < bottom % 256
    } else {
        y >= sprite_y && y < bottom
    };
    if !visible {
        return;
    }

    let mut in_y = if bottom >= 256 { y + 256 - sprite_y } else { y - sprite_y };
    if sprite.v_flip {
        in_y = height - in_y - 1;
    }

    let flags = sprite_flags(sprite, target1_obj, target2_obj, blend_mode);
    let variant = target1_obj && matches!(blend_mode, BlendMode::Brighten | BlendMode::Darken);
    let char_base = BASE_TILE + usize::from(sprite.tile_number) * 0x20;
    let x = signed_x(sprite.x_coordinate);

    for out_x in x.max(0)..(x + width as i32).min(SCREEN_WIDTH as i32) {
        let out_xu = out_x as usize;
        if scratch[out_xu] != 0 {
            continue;
        }

        let mut in_x = (out_x - x) as u32;
        if sprite.h_flip {
            in_x = width - in_x - 1;
        }

        let pixel_index = if sprite.palette_8bpp {
            tile_pixel_256color(memory, char_base, width, character_1d_mapping, in_x, in_y)
        } else {
            tile_pixel_16color(memory, char_base, width, character_1d_mapping, in_x, in_y)
        };
        if pixel_index == 0 {
            continue;
        }

        let index = palette_index(sprite, pixel_index);
        let color = if variant { palette.variant(index) } else { palette.normal(index) };
        scratch[out_xu] = color | flags;
    }
}

/// Rasterizes one affine sprite's contribution to scanline `y` into the
/// sprite scratch layer, sampling source pixels through `matrix`.
#[allow(clippy::too_many_arguments)]
pub fn preprocess_transformed_sprite(
    sprite: &ObjAttributes,
    matrix: &RotationScaling,
    y: u32,
    memory: &Memory,
    palette: &PaletteCache,
    character_1d_mapping: bool,
    target1_obj: bool,
    target2_obj: bool,
    blend_mode: BlendMode,
    scratch: &mut [Pixel; SCREEN_WIDTH],
) {
    let (width, height) = sprite.dimensions();
    let (width, height) = (u32::from(width), u32::from(height));
    let double_size = matches!(sprite.obj_mode, ObjMode::AffineDouble);
    let (total_width, total_height) = if double_size { (width * 2, height * 2) } else { (width, height) };

    let sprite_y = u32::from(sprite.y_coordinate);
    let bottom = sprite_y + total_height;

    let visible = if bottom > 256 {
        y < bottom % 256
    } else {
        y >= sprite_y && y < bottom
    };
    if !visible {
        return;
    }

    let in_y = if bottom >= 256 { (y + 256 - sprite_y) as i32 } else { (y - sprite_y) as i32 };

    let flags = sprite_flags(sprite, target1_obj, target2_obj, blend_mode);
    let variant = target1_obj && matches!(blend_mode, BlendMode::Brighten | BlendMode::Darken);
    let char_base = BASE_TILE + usize::from(sprite.tile_number) * 0x20;
    let x = signed_x(sprite.x_coordinate);

    for out_x in x.max(0)..(x + total_width as i32).min(SCREEN_WIDTH as i32) {
        let out_xu = out_x as usize;
        if scratch[out_xu] != 0 {
            continue;
        }

        let in_x = out_x - x;
        let rel_x = in_x - (total_width as i32 / 2);
        let rel_y = in_y - (total_height as i32 / 2);
        let (local_x, local_y) = matrix.apply(rel_x, rel_y);
        let local_x = local_x + width as i32 / 2;
        let local_y = local_y + height as i32 / 2;

        if local_x < 0 || local_x >= width as i32 || local_y < 0 || local_y >= height as i32 {
            continue;
        }
        let (local_x, local_y) = (local_x as u32, local_y as u32);

        let pixel_index = if sprite.palette_8bpp {
            tile_pixel_256color(memory, char_base, width, character_1d_mapping, local_x, local_y)
        } else {
            tile_pixel_16color(memory, char_base, width, character_1d_mapping, local_x, local_y)
        };
        if pixel_index == 0 {
            continue;
        }

        let index = palette_index(sprite, pixel_index);
        let color = if variant { palette.variant(index) } else { palette.normal(index) };
        scratch[out_xu] = color | flags;
    }
}

/// Composites every scratch pixel at the given `priority` into `row`,
/// skipping positions already finalized by an earlier (higher-priority)
/// layer. Clears `FINALIZED` from the scratch copy first so the compositor
/// is still free to blend it as an ordinary incoming pixel.
pub fn postprocess_sprite(scratch: &[Pixel; SCREEN_WIDTH], priority: u8, row: &mut [Pixel], blda: u32, bldb: u32) {
    for x in 0..SCREEN_WIDTH {
        let color = scratch[x];
        if color & flags::FINALIZED != 0 && flags::decoded_priority(color) == priority && row[x] & flags::FINALIZED == 0 {
            composite(row, x, color & !flags::FINALIZED, blda, bldb);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_attributes::ObjShape;
    use pretty_assertions::assert_eq;

    fn fresh_scratch() -> [Pixel; SCREEN_WIDTH] {
        [0; SCREEN_WIDTH]
    }

    #[test]
    fn write_oam_sets_and_clears_enabled_bit() {
        let mut bitmap = EnabledBitmap::default();
        let mut enabled = ObjAttributes::default();
        enabled.obj_mode = ObjMode::Normal;
        bitmap.write_oam(4, &enabled); // i = 1
        assert_eq!(bitmap.iter_enabled().collect::<Vec<_>>(), vec![1]);

        let mut disabled = ObjAttributes::default();
        disabled.obj_mode = ObjMode::Disabled;
        bitmap.write_oam(4, &disabled);
        assert!(bitmap.iter_enabled().collect::<Vec<_>>().is_empty());
    }

    #[test]
    fn write_oam_ignores_matrix_component_writes() {
        let mut bitmap = EnabledBitmap::default();
        let mut enabled = ObjAttributes::default();
        enabled.obj_mode = ObjMode::Normal;
        bitmap.write_oam(7, &enabled); // oam & 3 == 3 -> matrix write, ignored
        assert!(bitmap.iter_enabled().collect::<Vec<_>>().is_empty());
    }

    #[test]
    fn preprocess_sprite_draws_nonzero_tile_pixel() {
        let mut sprite = ObjAttributes::default();
        sprite.shape = ObjShape::Square;
        sprite.size = 0; // 8x8
        sprite.y_coordinate = 0;
        sprite.x_coordinate = 0;
        sprite.tile_number = 0;
        sprite.priority = 1;

        let mut memory = Memory::default();
        memory.video_ram[BASE_TILE] = 0x01; // first pixel (4bpp) = index 1

        let mut palette = PaletteCache::default();
        palette.write(1, 0b0_00000_00000_11111, BlendMode::None, 0);

        let mut scratch = fresh_scratch();
        preprocess_sprite(&sprite, 0, &memory, &palette, false, false, false, BlendMode::None, &mut scratch);

        assert_ne!(scratch[0], 0);
        assert_eq!(scratch[0] & crate::color::COLOR_MASK, 0x0000_00F8);
        assert_eq!(flags::decoded_priority(scratch[0]), 1);
    }

    #[test]
    fn preprocess_sprite_skips_row_outside_its_height() {
        let mut sprite = ObjAttributes::default();
        sprite.shape = ObjShape::Square;
        sprite.size = 0; // 8x8
        sprite.y_coordinate = 10;

        let memory = Memory::default();
        let palette = PaletteCache::default();
        let mut scratch = fresh_scratch();
        preprocess_sprite(&sprite, 0, &memory, &palette, false, false, false, BlendMode::None, &mut scratch);
        assert_eq!(scratch[0], 0);
    }

    #[test]
    fn preprocess_sprite_wraps_from_bottom_of_oam_space() {
        // y_coordinate=255, height=8: the sprite's bottom edge (263) wraps
        // past the 256-row OAM coordinate space, so scanline 0 falls within
        // it at inY = 0 + 256 - 255 = 1.
        let mut sprite = ObjAttributes::default();
        sprite.shape = ObjShape::Square;
        sprite.size = 0; // 8x8
        sprite.y_coordinate = 255;
        sprite.tile_number = 0;

        let mut memory = Memory::default();
        memory.video_ram[BASE_TILE + 4] = 0x01; // inY=1 -> yBase=4, inX=0 -> xBase=0
        let mut palette = PaletteCache::default();
        palette.write(1, 0b0_00000_00000_11111, BlendMode::None, 0);

        let mut scratch = fresh_scratch();
        preprocess_sprite(&sprite, 0, &memory, &palette, false, false, false, BlendMode::None, &mut scratch);
        assert_ne!(scratch[0], 0);
    }

    #[test]
    fn preprocess_transformed_sprite_identity_matrix_samples_same_pixel() {
        let mut sprite = ObjAttributes::default();
        sprite.obj_mode = ObjMode::Affine;
        sprite.shape = ObjShape::Square;
        sprite.size = 0; // 8x8
        sprite.y_coordinate = 0;
        sprite.x_coordinate = 0;
        sprite.tile_number = 0;

        let identity = RotationScaling { pa: 0x0100, pb: 0, pc: 0, pd: 0x0100 };

        let mut memory = Memory::default();
        memory.video_ram[BASE_TILE] = 0x01;
        let mut palette = PaletteCache::default();
        palette.write(1, 0b0_00000_00000_11111, BlendMode::None, 0);

        let mut scratch = fresh_scratch();
        preprocess_transformed_sprite(&sprite, &identity, 0, &memory, &palette, false, false, false, BlendMode::None, &mut scratch);
        assert_ne!(scratch[0], 0);
    }

    #[test]
    fn postprocess_sprite_only_composites_matching_priority() {
        let mut scratch = fresh_scratch();
        scratch[0] = flags::priority(1) | flags::FINALIZED | 0x0000_00F8;
        scratch[1] = flags::priority(2) | flags::FINALIZED | 0x0000_00F8;

        let mut row = [flags::UNWRITTEN | flags::priority(3) | flags::IS_BACKGROUND; SCREEN_WIDTH];
        postprocess_sprite(&scratch, 1, &mut row, 8, 8);

        assert_eq!(row[0] & crate::color::COLOR_MASK, 0x0000_00F8);
        assert!(row[0] & flags::FINALIZED != 0);
        assert_eq!(row[1] & flags::UNWRITTEN, flags::UNWRITTEN); // priority 2 untouched
    }
}
