//! Cached, pre-expanded color lookup tables.
//!
//! Palette RAM stores 15-bit `0BBBBBGGGGGRRRRR` colors; re-expanding them to
//! 24-bit on every pixel would waste work, since a palette write is far rarer
//! than a pixel read. `PaletteCache` keeps two parallel 512-entry tables
//! (256 background + 256 object colors each): `normal` is the color as
//! written, `variant` is the same color pre-brightened or pre-darkened
//! according to the current `BLDY`/`BLDCNT` brighten/darken effect, so the
//! compositor can pick whichever table a pixel's blend state calls for
//! without touching `color::brighten`/`darken` per pixel.

use crate::color::{self, Pixel};
use crate::registers::BlendMode;

const ENTRIES: usize = 512;

pub struct PaletteCache {
    normal: [Pixel; ENTRIES],
    variant: [Pixel; ENTRIES],
}

impl Default for PaletteCache {
    fn default() -> Self {
        Self {
            normal: [0; ENTRIES],
            variant: [0; ENTRIES],
        }
    }
}

impl PaletteCache {
    /// Writes one palette entry (0-511, background and object banks share
    /// this 512-entry index space: 0-255 background, 256-511 object) and
    /// refreshes its variant slot under the currently active blend effect.
    pub fn write(&mut self, index: usize, color15: u16, blend_mode: BlendMode, brightness: u32) {
        let color = color::expand_15_to_24(color15);
        self.normal[index] = color;
        self.variant[index] = match blend_mode {
            BlendMode::Brighten => color::brighten(color, brightness),
            BlendMode::Darken => color::darken(color, brightness),
            BlendMode::None | BlendMode::AlphaBlend => color,
        };
    }

    /// Recomputes every variant entry from `normal`. Needed whenever the
    /// blend effect or brightness coefficient changes, since a palette write
    /// isn't what triggered it.
    pub fn refresh_variants(&mut self, blend_mode: BlendMode, brightness: u32) {
        for i in 0..ENTRIES {
            self.variant[i] = match blend_mode {
                BlendMode::Brighten => color::brighten(self.normal[i], brightness),
                BlendMode::Darken => color::darken(self.normal[i], brightness),
                BlendMode::None | BlendMode::AlphaBlend => self.normal[i],
            };
        }
    }

    #[must_use]
    pub fn normal(&self, index: usize) -> Pixel {
        self.normal[index]
    }

    #[must_use]
    pub fn variant(&self, index: usize) -> Pixel {
        self.variant[index]
    }
}
