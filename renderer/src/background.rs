//! Per-background derived state, decoded once at register-write time rather
//! than on every pixel.
//!
//! `BGxCNT` bits are unpacked into named fields the moment the register is
//! written (mirroring the hardware's own renderer, which never re-decodes the
//! raw register while drawing a scanline). Affine backgrounds (modes 1-5)
//! additionally carry a running reference point `(sx, sy)` that `draw_scanline`
//! advances by `(dmx, dmy)` after each row, separately from the registers
//! `(refx, refy)` a CPU write resets it to.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::color::{flags, Pixel};
use crate::registers::BlendMode;

pub mod affine;
pub mod bitmap;
pub mod text;

/// How an affine background samples outside its wrap boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AffineOverflow {
    #[default]
    Transparent,
    Wrap,
}

#[derive(Default, Serialize, Deserialize)]
pub struct Background {
    pub priority: u8,
    pub char_base: u32,
    pub screen_base: u32,
    pub mosaic: bool,
    pub multipalette: bool,
    pub size: u8,
    pub overflow: AffineOverflow,
    pub target1: bool,
    pub target2: bool,

    /// Text-mode scroll offsets, 9-bit wrapping.
    pub x: u16,
    pub y: u16,

    /// Affine parameters, signed 8.8 fixed point as stored in `BGxPA..PD`.
    pub dx: i16,
    pub dmx: i16,
    pub dy: i16,
    pub dmy: i16,

    /// Reference point as last written via `BGxX/Y`, signed 20.8 fixed point
    /// sign-extended from 28 bits.
    pub refx: i32,
    pub refy: i32,

    /// Running reference point for the current frame; reset to `(refx,
    /// refy)` by a CPU write and advanced by `(dmx, dmy)` after each row
    /// `draw_scanline` renders in an affine mode.
    pub sx: i32,
    pub sy: i32,
}

impl Background {
    pub fn write_control(&mut self, value: u16) {
        self.priority = value.get_bits(0..=1) as u8;
        self.char_base = u32::from(value.get_bits(2..=3)) << 14;
        self.mosaic = value.get_bit(6);
        self.multipalette = value.get_bit(7);
        self.screen_base = u32::from(value.get_bits(8..=12)) << 11;
        self.overflow = if value.get_bit(13) {
            AffineOverflow::Wrap
        } else {
            AffineOverflow::Transparent
        };
        self.size = value.get_bits(14..=15) as u8;
    }

    pub fn write_h_scroll(&mut self, value: u16) {
        self.x = value & 0x01FF;
    }

    pub fn write_v_scroll(&mut self, value: u16) {
        self.y = value & 0x01FF;
    }

    pub fn write_dx(&mut self, value: u16) {
        self.dx = value as i16;
    }

    pub fn write_dmx(&mut self, value: u16) {
        self.dmx = value as i16;
    }

    pub fn write_dy(&mut self, value: u16) {
        self.dy = value as i16;
    }

    pub fn write_dmy(&mut self, value: u16) {
        self.dmy = value as i16;
    }

    /// Sign-extends a 28-bit value (stored left-aligned in the low 28 bits of
    /// a 32-bit word) to a full `i32` via a shift-left/shift-right-arithmetic
    /// pair, as the hardware does.
    fn sign_extend_28(value: u32) -> i32 {
        ((value << 4) as i32) >> 4
    }

    pub fn write_refx_lo(&mut self, value: u16) {
        self.refx = Self::sign_extend_28((self.refx as u32 & 0xFFFF_0000) | u32::from(value));
        self.sx = self.refx;
    }

    pub fn write_refx_hi(&mut self, value: u16) {
        self.refx = Self::sign_extend_28((self.refx as u32 & 0x0000_FFFF) | (u32::from(value) << 16));
        self.sx = self.refx;
    }

    pub fn write_refy_lo(&mut self, value: u16) {
        self.refy = Self::sign_extend_28((self.refy as u32 & 0xFFFF_0000) | u32::from(value));
        self.sy = self.refy;
    }

    pub fn write_refy_hi(&mut self, value: u16) {
        self.refy = Self::sign_extend_28((self.refy as u32 & 0x0000_FFFF) | (u32::from(value) << 16));
        self.sy = self.refy;
    }

    /// Advances the running reference point by one scanline's worth of
    /// affine motion. Called after drawing a row in modes 2-5, never in text
    /// modes (0/1's text layers don't have a running point at all).
    pub fn advance_row(&mut self) {
        self.sx += i32::from(self.dmx);
        self.sy += i32::from(self.dmy);
    }

    /// Text-mode background size in pixels, from the 2-bit `size` field.
    #[must_use]
    pub fn text_size_px(&self) -> (u32, u32) {
        match self.size {
            0 => (256, 256),
            1 => (512, 256),
            2 => (256, 512),
            3 => (512, 512),
            _ => unreachable!(),
        }
    }

    /// Affine-mode background size in pixels (always square); from the 2-bit
    /// `size` field.
    #[must_use]
    pub fn affine_size_px(&self) -> u32 {
        128 << self.size
    }
}

/// Compositor flags shared by every rasterizer for this background: priority
/// and `IS_BACKGROUND` always, `TARGET_1` only when alpha blending is active
/// (brighten/darken are pre-baked into the variant palette instead), and
/// `TARGET_2` whenever this background is a blend target-2.
#[must_use]
pub fn bg_flags(background: &Background, blend_mode: BlendMode) -> Pixel {
    let mut out = flags::priority(background.priority) | flags::IS_BACKGROUND;
    if background.target1 && blend_mode == BlendMode::AlphaBlend {
        out |= flags::TARGET_1;
    }
    if background.target2 {
        out |= flags::TARGET_2;
    }
    out
}

/// Whether this background should read from the variant (pre-brightened or
/// pre-darkened) palette rather than the normal one.
#[must_use]
pub fn is_variant(background: &Background, blend_mode: BlendMode) -> bool {
    background.target1 && matches!(blend_mode, BlendMode::Brighten | BlendMode::Darken)
}
