//! Mode 0/1 text background rasterizer: a scrolling tilemap of 8×8 tiles.
//!
//! The hardware's own renderer draws this tile-by-tile with hand-unrolled
//! prologue/epilogue loops for the partially-scrolled edge tiles. Here every
//! output column is addressed directly from its scrolled coordinate, which
//! is the same addressing the tile-batched version reduces to - just
//! expressed per pixel instead of per tile, so there's no separate edge case
//! to special-case.

use crate::background::{bg_flags, is_variant, Background};
use crate::compositor::composite;
use crate::memory::Memory;
use crate::palette::PaletteCache;
use crate::registers::BlendMode;

const SCREEN_WIDTH: usize = 240;

struct MapEntry {
    tile: u16,
    h_flip: bool,
    v_flip: bool,
    palette: u8,
}

fn decode_map_entry(raw: u16) -> MapEntry {
    MapEntry {
        tile: raw & 0x03FF,
        h_flip: raw & (1 << 10) != 0,
        v_flip: raw & (1 << 11) != 0,
        palette: ((raw >> 12) & 0xF) as u8,
    }
}

/// Byte offset (within VRAM) of the screen (map) entry covering scrolled
/// pixel coordinate `(scrolled_x, scrolled_y)`, honoring the 1/2/4-screen-block
/// layout selected by `size`.
fn screen_entry_offset(screen_base: u32, size: u8, scrolled_x: u32, scrolled_y: u32) -> usize {
    let tile_x = scrolled_x >> 3;
    let tile_y = scrolled_y >> 3;
    let blocks_per_row: u32 = if matches!(size, 1 | 3) { 2 } else { 1 };
    let block_x = if blocks_per_row == 2 { tile_x >> 5 } else { 0 };
    let block_y = if matches!(size, 2 | 3) { tile_y >> 5 } else { 0 };
    let local_tile_x = tile_x & 0x1F;
    let local_tile_y = tile_y & 0x1F;
    let block_index = block_y * blocks_per_row + block_x;

    let halfword_index = (screen_base / 2) + block_index * 0x400 + local_tile_y * 32 + local_tile_x;
    (halfword_index * 2) as usize
}

pub fn rasterize(
    background: &Background,
    y: u32,
    memory: &Memory,
    palette: &PaletteCache,
    blend_mode: BlendMode,
    row: &mut [u32],
    blda: u32,
    bldb: u32,
) {
    let flags = bg_flags(background, blend_mode);
    let variant = is_variant(background, blend_mode);

    let (map_width, map_height) = background.text_size_px();

    for out_x in 0..SCREEN_WIDTH {
        if row[out_x] & crate::color::flags::FINALIZED != 0 {
            continue;
        }

        let scrolled_x = (out_x as u32 + u32::from(background.x)) % map_width;
        let scrolled_y = (y + u32::from(background.y)) % map_height;

        let entry_offset = screen_entry_offset(background.screen_base, background.size, scrolled_x, scrolled_y);
        let entry = decode_map_entry(memory.vram_half(entry_offset));

        let row_in_tile = if entry.v_flip {
            7 - (scrolled_y & 7)
        } else {
            scrolled_y & 7
        };
        let col_in_tile = if entry.h_flip {
            7 - (scrolled_x & 7)
        } else {
            scrolled_x & 7
        };

        let pixel_index = if background.multipalette {
            let char_byte = background.char_base as usize + entry.tile as usize * 64 + (row_in_tile as usize) * 8;
            let word = memory.vram_word(char_byte + if col_in_tile >= 4 { 4 } else { 0 });
            ((word >> ((col_in_tile & 3) * 8)) & 0xFF) as usize
        } else {
            let char_byte = background.char_base as usize + entry.tile as usize * 32 + (row_in_tile as usize) * 4;
            let word = memory.vram_word(char_byte);
            ((word >> (col_in_tile * 4)) & 0xF) as usize
        };

        if pixel_index == 0 {
            continue;
        }

        let palette_index = if background.multipalette {
            pixel_index
        } else {
            (usize::from(entry.palette) << 4) | pixel_index
        };

        let color = if variant {
            palette.variant(palette_index)
        } else {
            palette.normal(palette_index)
        };

        composite(row, out_x, color | flags, blda, bldb);
    }
}
