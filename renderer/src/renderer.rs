//! Top-level scanline driver: owns all renderer state and implements the five
//! operations the video controller calls (`write_video_register`,
//! `write_oam`, `write_palette`, `draw_scanline`, `finish_frame`), plus
//! `init`/`deinit`.
//!
//! `draw_scanline` is the one place every other module in this crate meets:
//! it fills the backdrop, preprocesses sprites into a scratch layer, then
//! walks priority 0..3 compositing sprites and mode-compatible backgrounds
//! into the row, in the same order the hardware's own renderer does.

use crate::background::{affine, bitmap, text, Background};
use crate::color::{self, Pixel};
use crate::memory::Memory;
use crate::object_attributes;
use crate::palette::PaletteCache;
use crate::registers::Registers;
use crate::sprites::{self, EnabledBitmap};
use crate::sync::{FramePresenter, FrameSync};
use crate::RendererConfig;

const SCREEN_WIDTH: usize = 240;
const SCREEN_HEIGHT: usize = 160;

enum BgKind {
    Text,
    Affine,
    Bitmap3,
    Bitmap4,
    Bitmap5,
}

/// Which kind of layer BGx rasterizes as under the current display mode, or
/// `None` if this mode doesn't use that background at all.
fn bg_kind(mode: u8, bg_index: usize) -> Option<BgKind> {
    match (mode, bg_index) {
        (0, 0..=3) => Some(BgKind::Text),
        (1, 0 | 1) => Some(BgKind::Text),
        (1, 2) | (2, 2 | 3) => Some(BgKind::Affine),
        (3, 2) => Some(BgKind::Bitmap3),
        (4, 2) => Some(BgKind::Bitmap4),
        (5, 2) => Some(BgKind::Bitmap5),
        _ => None,
    }
}

pub struct Renderer {
    registers: Registers,
    memory: Memory,
    palette: PaletteCache,
    backgrounds: [Background; 4],
    enabled_bitmap: EnabledBitmap,
    sync: FrameSync,
    framebuffer: Vec<Pixel>,
    stride: usize,
}

impl Renderer {
    /// Builds a renderer with power-on state and returns it alongside the
    /// presenter-thread handle for its frame sync.
    #[must_use]
    pub fn new(config: RendererConfig) -> (Self, FramePresenter) {
        let (sync, presenter) = FrameSync::new();
        sync.set_turbo(config.initial_turbo);
        sync.set_frameskip(config.initial_frameskip);

        let mut renderer = Self {
            registers: Registers::default(),
            memory: Memory::default(),
            palette: PaletteCache::default(),
            backgrounds: Default::default(),
            enabled_bitmap: EnabledBitmap::default(),
            sync,
            framebuffer: vec![0; config.stride * SCREEN_HEIGHT],
            stride: config.stride,
        };
        renderer.init();
        (renderer, presenter)
    }

    /// Zeroes all renderer state, forces a blank display, and resets every
    /// background's affine parameters to the identity transform.
    pub fn init(&mut self) {
        self.registers = Registers::default();
        self.registers.dispcnt = 0x0080;
        self.memory = Memory::default();
        self.palette = PaletteCache::default();
        self.enabled_bitmap = EnabledBitmap::default();
        for background in &mut self.backgrounds {
            *background = Background::default();
            background.dx = 256;
            background.dmy = 256;
        }
        self.framebuffer.fill(0);
    }

    /// Wakes any waiter blocked in `finish_frame` and marks the handoff defunct.
    pub fn deinit(&mut self) {
        self.sync.shutdown();
    }

    #[must_use]
    pub fn framebuffer(&self) -> &[Pixel] {
        &self.framebuffer
    }

    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn set_turbo(&self, turbo: bool) {
        self.sync.set_turbo(turbo);
    }

    pub fn set_frameskip(&self, frames: u32) {
        self.sync.set_frameskip(frames);
    }

    #[must_use]
    pub fn frames_pending(&self) -> u64 {
        self.sync.frames_pending()
    }

    fn write_bg_control(&mut self, index: usize, value: u16) -> u16 {
        let masked = value & 0xFFCF;
        self.backgrounds[index].write_control(masked);
        masked
    }

    fn write_bg_hofs(&mut self, index: usize, value: u16) -> u16 {
        self.backgrounds[index].write_h_scroll(value);
        value & 0x01FF
    }

    fn write_bg_vofs(&mut self, index: usize, value: u16) -> u16 {
        self.backgrounds[index].write_v_scroll(value);
        value & 0x01FF
    }

    /// Applies one 16-bit video register write and returns the value actually
    /// stored after masking. Unlisted offsets are ignored but logged.
    pub fn write_video_register(&mut self, addr: u16, value: u16) -> u16 {
        match addr {
            0x00 => {
                let masked = value & 0xFFFB;
                self.registers.dispcnt = masked;
                masked
            }
            0x02 => {
                self.registers.green_swap = value;
                value
            }
            0x04 => {
                let masked = (self.registers.dispstat & 0x0007) | (value & 0xFFF8);
                self.registers.dispstat = masked;
                masked
            }
            0x06 => self.registers.vcount,
            0x08 => self.write_bg_control(0, value),
            0x0A => self.write_bg_control(1, value),
            0x0C => self.write_bg_control(2, value),
            0x0E => self.write_bg_control(3, value),
            0x10 => self.write_bg_hofs(0, value),
            0x12 => self.write_bg_vofs(0, value),
            0x14 => self.write_bg_hofs(1, value),
            0x16 => self.write_bg_vofs(1, value),
            0x18 => self.write_bg_hofs(2, value),
            0x1A => self.write_bg_vofs(2, value),
            0x1C => self.write_bg_hofs(3, value),
            0x1E => self.write_bg_vofs(3, value),
            0x20 => {
                self.backgrounds[2].write_dx(value);
                value
            }
            0x22 => {
                self.backgrounds[2].write_dmx(value);
                value
            }
            0x24 => {
                self.backgrounds[2].write_dy(value);
                value
            }
            0x26 => {
                self.backgrounds[2].write_dmy(value);
                value
            }
            0x28 => {
                self.backgrounds[2].write_refx_lo(value);
                value
            }
            0x2A => {
                self.backgrounds[2].write_refx_hi(value);
                value
            }
            0x2C => {
                self.backgrounds[2].write_refy_lo(value);
                value
            }
            0x2E => {
                self.backgrounds[2].write_refy_hi(value);
                value
            }
            0x30 => {
                self.backgrounds[3].write_dx(value);
                value
            }
            0x32 => {
                self.backgrounds[3].write_dmx(value);
                value
            }
            0x34 => {
                self.backgrounds[3].write_dy(value);
                value
            }
            0x36 => {
                self.backgrounds[3].write_dmy(value);
                value
            }
            0x38 => {
                self.backgrounds[3].write_refx_lo(value);
                value
            }
            0x3A => {
                self.backgrounds[3].write_refx_hi(value);
                value
            }
            0x3C => {
                self.backgrounds[3].write_refy_lo(value);
                value
            }
            0x3E => {
                self.backgrounds[3].write_refy_hi(value);
                value
            }
            0x40 => {
                self.registers.win0h = value;
                value
            }
            0x42 => {
                self.registers.win1h = value;
                value
            }
            0x44 => {
                self.registers.win0v = value;
                value
            }
            0x46 => {
                self.registers.win1v = value;
                value
            }
            0x48 => {
                self.registers.winin = value;
                value
            }
            0x4A => {
                self.registers.winout = value;
                value
            }
            0x4C => {
                self.registers.mosaic = value;
                value
            }
            0x50 => {
                let before = self.registers.blend_mode();
                self.registers.bldcnt = value;

                let target1 = self.registers.blend_target1();
                let target2 = self.registers.blend_target2();
                for (index, background) in self.backgrounds.iter_mut().enumerate() {
                    let (t1, t2) = match index {
                        0 => (target1.0, target2.0),
                        1 => (target1.1, target2.1),
                        2 => (target1.2, target2.2),
                        _ => (target1.3, target2.3),
                    };
                    background.target1 = t1;
                    background.target2 = t2;
                }

                let after = self.registers.blend_mode();
                if after != before {
                    let brightness = self.registers.blend_brightness();
                    self.palette.refresh_variants(after, brightness);
                }
                value
            }
            0x52 => {
                self.registers.bldalpha = value;
                value
            }
            0x54 => {
                self.registers.bldy = value;
                let blend_mode = self.registers.blend_mode();
                let brightness = self.registers.blend_brightness();
                self.palette.refresh_variants(blend_mode, brightness);
                value
            }
            _ => {
                logger::log(format!("unmapped video register write: addr=0x{addr:04X} value=0x{value:04X}"));
                value
            }
        }
    }

    /// Updates the sprite enable bitmap for one OAM halfword write; `oam` is
    /// the halfword index (4 per sprite entry), matching the wire format the
    /// video controller writes OAM through.
    pub fn write_oam(&mut self, oam: u32) {
        if oam & 3 == 3 {
            return;
        }
        let index = (oam >> 2) as usize;
        debug_assert!(index < 128);
        let sprite = object_attributes::parse_single(&self.memory.obj_attributes, index);
        self.enabled_bitmap.write_oam(oam, &sprite);
    }

    /// Writes a 16-bit color at `byte_addr` into the appropriate palette bank
    /// and refreshes the unified palette cache at the matching index.
    pub fn write_palette(&mut self, byte_addr: u32, value: u16) {
        debug_assert!(byte_addr < 0x400);
        debug_assert!(byte_addr % 2 == 0);
        let bytes = value.to_le_bytes();
        let byte_addr = byte_addr as usize;

        let index = if byte_addr < 0x200 {
            self.memory.bg_palette_ram[byte_addr] = bytes[0];
            self.memory.bg_palette_ram[byte_addr + 1] = bytes[1];
            byte_addr / 2
        } else {
            let local = byte_addr - 0x200;
            self.memory.obj_palette_ram[local] = bytes[0];
            self.memory.obj_palette_ram[local + 1] = bytes[1];
            256 + local / 2
        };

        let blend_mode = self.registers.blend_mode();
        let brightness = self.registers.blend_brightness();
        self.palette.write(index, value, blend_mode, brightness);
    }

    /// Renders scanline `y` (0..159) into the output framebuffer.
    pub fn draw_scanline(&mut self, y: u32) {
        if self.sync.frameskip() > 0 {
            return;
        }

        let row_start = y as usize * self.stride;
        let row = &mut self.framebuffer[row_start..row_start + SCREEN_WIDTH];

        if self.registers.forced_blank() {
            row.fill(color::WHITE);
            return;
        }

        let blend_mode = self.registers.blend_mode();
        let brightness = self.registers.blend_brightness();
        let (blda, bldb) = self.registers.blend_alpha();
        let target1 = self.registers.blend_target1();
        let target2 = self.registers.blend_target2();

        let backdrop_variant = target1.5 && matches!(blend_mode, crate::registers::BlendMode::Brighten | crate::registers::BlendMode::Darken);
        let backdrop = if backdrop_variant { self.palette.variant(0) } else { self.palette.normal(0) };
        row.fill(backdrop | color::flags::UNWRITTEN | color::flags::priority(3) | color::flags::IS_BACKGROUND);

        let mut scratch = [0 as Pixel; SCREEN_WIDTH];
        if self.registers.obj_enabled() {
            let (attributes, matrices) = object_attributes::get_attributes(&self.memory.obj_attributes);
            let character_1d_mapping = self.registers.obj_character_1d_mapping();

            for index in self.enabled_bitmap.iter_enabled() {
                let sprite = &attributes[index];
                if sprite.is_affine() {
                    let matrix = &matrices[sprite.affine_index as usize];
                    sprites::preprocess_transformed_sprite(
                        sprite,
                        matrix,
                        y,
                        &self.memory,
                        &self.palette,
                        character_1d_mapping,
                        target1.4,
                        target2.4,
                        blend_mode,
                        &mut scratch,
                    );
                } else {
                    sprites::preprocess_sprite(
                        sprite,
                        y,
                        &self.memory,
                        &self.palette,
                        character_1d_mapping,
                        target1.4,
                        target2.4,
                        blend_mode,
                        &mut scratch,
                    );
                }
            }
        }

        let mode = self.registers.bg_mode();
        let frame_select = self.registers.frame_select();

        for priority in 0..4u8 {
            sprites::postprocess_sprite(&scratch, priority, row, blda, bldb);

            for bg_index in 0..4usize {
                if !self.registers.bg_enabled(bg_index) || self.backgrounds[bg_index].priority != priority {
                    continue;
                }
                match bg_kind(mode, bg_index) {
                    Some(BgKind::Text) => {
                        text::rasterize(&self.backgrounds[bg_index], y, &self.memory, &self.palette, blend_mode, row, blda, bldb);
                    }
                    Some(BgKind::Affine) => {
                        affine::rasterize(&self.backgrounds[bg_index], &self.memory, &self.palette, blend_mode, row, blda, bldb);
                        self.backgrounds[bg_index].advance_row();
                    }
                    Some(BgKind::Bitmap3) => {
                        bitmap::rasterize_mode3(&self.backgrounds[bg_index], &self.memory, blend_mode, brightness, row, blda, bldb);
                        self.backgrounds[bg_index].advance_row();
                    }
                    Some(BgKind::Bitmap4) => {
                        bitmap::rasterize_mode4(&self.backgrounds[bg_index], &self.memory, &self.palette, blend_mode, frame_select, row, blda, bldb);
                        self.backgrounds[bg_index].advance_row();
                    }
                    Some(BgKind::Bitmap5) => {
                        bitmap::rasterize_mode5(&self.backgrounds[bg_index], &self.memory, blend_mode, brightness, frame_select, row, blda, bldb);
                        self.backgrounds[bg_index].advance_row();
                    }
                    None => {}
                }
            }
        }
    }

    /// Publishes the current framebuffer to the presenter (per §5's
    /// finish-frame rendezvous) and resets the affine backgrounds' running
    /// reference points for the next frame.
    pub fn finish_frame(&mut self) {
        self.sync.finish_frame();
        self.backgrounds[2].sx = self.backgrounds[2].refx;
        self.backgrounds[2].sy = self.backgrounds[2].refy;
        self.backgrounds[3].sx = self.backgrounds[3].refx;
        self.backgrounds[3].sy = self.backgrounds[3].refy;
    }
}
