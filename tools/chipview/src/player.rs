//! A tiny engine for running the viewer without an external VM: it plays
//! back packed 1-bpp frames stored one after another in the ROM.

use chipview_core::engine::{Engine, Rom, TickOutput};

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 32;

const ROW_BYTES: usize = WIDTH as usize / 8;
pub const FRAME_BYTES: usize = ROW_BYTES * HEIGHT as usize;

/// Unpacks one row per tick into its framebuffer. Holding any key freezes
/// playback on the current frame.
pub struct FramePlayer {
    rom: Vec<u8>,
    vram: Vec<u8>,
    frame: usize,
    row: usize,
    keys: u16,
}

impl Default for FramePlayer {
    fn default() -> Self {
        Self { rom: Vec::new(), vram: vec![0; WIDTH as usize * HEIGHT as usize], frame: 0, row: 0, keys: 0 }
    }
}

impl FramePlayer {
    pub fn frame_count(&self) -> usize {
        self.rom.len() / FRAME_BYTES
    }

    fn unpack_row(&mut self) {
        let start = self.frame * FRAME_BYTES + self.row * ROW_BYTES;
        let packed = &self.rom[start..start + ROW_BYTES];
        let row = &mut self.vram[self.row * WIDTH as usize..(self.row + 1) * WIDTH as usize];

        for (i, px) in row.iter_mut().enumerate() {
            *px = (packed[i / 8] >> (7 - i % 8)) & 1;
        }
    }
}

impl Engine for FramePlayer {
    fn load(&mut self, rom: &[u8]) {
        *self = Self { rom: rom.to_vec(), ..Self::default() };
    }

    fn next(&mut self) -> bool {
        self.frame_count() > 0
    }

    fn tick(&mut self) -> TickOutput {
        if self.keys != 0 {
            return TickOutput { vram: true, beep: false };
        }

        self.unpack_row();
        self.row += 1;
        if self.row < HEIGHT as usize {
            return TickOutput::default();
        }

        self.row = 0;
        self.frame += 1;
        let wrapped = self.frame == self.frame_count();
        if wrapped {
            self.frame = 0;
        }
        TickOutput { vram: true, beep: wrapped }
    }

    fn set_key(&mut self, code: u8) {
        self.keys |= 1 << (code & 0xF);
    }

    fn unset_key(&mut self, code: u8) {
        self.keys &= !(1 << (code & 0xF));
    }

    fn vram(&self) -> &[u8] {
        &self.vram
    }

    fn vram_width(&self) -> u32 {
        WIDTH
    }

    fn vram_height(&self) -> u32 {
        HEIGHT
    }
}

/// Two frames: a checkerboard of 8x8 cells and its inverse.
pub fn demo_rom() -> Rom {
    let mut bytes = Vec::with_capacity(FRAME_BYTES * 2);
    for invert in [0x00u8, 0xFF] {
        for y in 0..HEIGHT as usize {
            for cell in 0..ROW_BYTES {
                let lit = (cell + y / 8) % 2 == 0;
                let byte = if lit { 0xFF } else { 0x00 };
                bytes.push(byte ^ invert);
            }
        }
    }
    Rom::new("checkerboard", bytes)
}
