//! Scalar I/O registers: LCD control/status and the blend control trio.
//!
//! Per-background control, scroll, and affine registers are not stored here -
//! writing one of those immediately updates the cached derived state in
//! [`crate::background::Background`] instead, matching how the original
//! hardware's software renderer decodes `BGxCNT` once at write time rather
//! than on every pixel.
//!
//! Window (`WIN0H/V`, `WIN1H/V`, `WININ`, `WINOUT`) and `MOSAIC` registers are
//! stored here for observability only; they have no effect on rasterization.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

#[derive(Default, Serialize, Deserialize)]
pub struct Registers {
    pub dispcnt: u16,
    pub green_swap: u16,
    pub dispstat: u16,
    pub vcount: u16,

    pub win0h: u16,
    pub win1h: u16,
    pub win0v: u16,
    pub win1v: u16,
    pub winin: u16,
    pub winout: u16,
    pub mosaic: u16,

    pub bldcnt: u16,
    pub bldalpha: u16,
    pub bldy: u16,
}

/// Color special effect selected by `BLDCNT` bits 6-7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    None,
    AlphaBlend,
    Brighten,
    Darken,
}

impl From<u16> for BlendMode {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::None,
            1 => Self::AlphaBlend,
            2 => Self::Brighten,
            3 => Self::Darken,
            _ => unreachable!(),
        }
    }
}

impl Registers {
    #[must_use]
    pub fn bg_mode(&self) -> u8 {
        self.dispcnt.get_bits(0..=2) as u8
    }

    #[must_use]
    pub fn bg_enabled(&self, index: usize) -> bool {
        self.dispcnt.get_bit(8 + index as u8)
    }

    #[must_use]
    pub fn obj_enabled(&self) -> bool {
        self.dispcnt.get_bit(12)
    }

    /// Selects which of the two paged framebuffers modes 4/5 display.
    #[must_use]
    pub fn frame_select(&self) -> bool {
        self.dispcnt.get_bit(4)
    }

    /// `false` selects 2D OBJ character mapping, `true` selects 1D.
    #[must_use]
    pub fn obj_character_1d_mapping(&self) -> bool {
        self.dispcnt.get_bit(6)
    }

    #[must_use]
    pub fn forced_blank(&self) -> bool {
        self.dispcnt.get_bit(7)
    }

    #[must_use]
    pub fn vblank_flag(&self) -> bool {
        self.dispstat.get_bit(0)
    }

    pub fn set_vblank_flag(&mut self, value: bool) {
        self.dispstat.set_bit(0, value);
    }

    #[must_use]
    pub fn hblank_flag(&self) -> bool {
        self.dispstat.get_bit(1)
    }

    pub fn set_hblank_flag(&mut self, value: bool) {
        self.dispstat.set_bit(1, value);
    }

    #[must_use]
    pub fn blend_mode(&self) -> BlendMode {
        BlendMode::from(self.bldcnt.get_bits(6..=7))
    }

    /// First-target-layer flags: (BG0, BG1, BG2, BG3, OBJ, backdrop).
    #[must_use]
    pub fn blend_target1(&self) -> (bool, bool, bool, bool, bool, bool) {
        (
            self.bldcnt.get_bit(0),
            self.bldcnt.get_bit(1),
            self.bldcnt.get_bit(2),
            self.bldcnt.get_bit(3),
            self.bldcnt.get_bit(4),
            self.bldcnt.get_bit(5),
        )
    }

    /// Second-target-layer flags: (BG0, BG1, BG2, BG3, OBJ, backdrop).
    #[must_use]
    pub fn blend_target2(&self) -> (bool, bool, bool, bool, bool, bool) {
        (
            self.bldcnt.get_bit(8),
            self.bldcnt.get_bit(9),
            self.bldcnt.get_bit(10),
            self.bldcnt.get_bit(11),
            self.bldcnt.get_bit(12),
            self.bldcnt.get_bit(13),
        )
    }

    /// Alpha blend coefficients (EVA, EVB), each clamped to 0-16.
    #[must_use]
    pub fn blend_alpha(&self) -> (u32, u32) {
        (
            u32::from(self.bldalpha.get_bits(0..=4)).min(16),
            u32::from(self.bldalpha.get_bits(8..=12)).min(16),
        )
    }

    /// Brighten/darken coefficient (EVY), clamped to 0-16.
    #[must_use]
    pub fn blend_brightness(&self) -> u32 {
        u32::from(self.bldy.get_bits(0..=4)).min(16)
    }
}
