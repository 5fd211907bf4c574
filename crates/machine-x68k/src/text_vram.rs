//! Text VRAM.
//!
//! Four 1024x1024x1 planes at 0xe00000, 128 KiB each. The machine draws
//! glyphs into plane 0 and reports dirty rectangles to the console.

use std::sync::{Arc, Mutex, PoisonError};

use cpu_m68k::bus::{BusError, FunctionCode, Memory};

use crate::console::Console;

/// Bytes per raster row of one plane (1024 dots).
const ROW_BYTES: u32 = 128;
/// One plane is 128 KiB.
const PLANE_BYTES: u32 = 0x20000;
/// Mapped window: four planes.
const SIZE: u32 = 4 * PLANE_BYTES;

/// Text columns and rows of the 768x512 screen (8x16 character cells).
pub const COLUMNS: u32 = 96;
pub const ROWS: u32 = 31;

pub struct TextVram {
    console: Arc<dyn Console>,
    buf: Mutex<Box<[u8]>>,
}

impl TextVram {
    #[must_use]
    pub fn new(console: Arc<dyn Console>) -> Self {
        Self {
            console,
            buf: Mutex::new(vec![0; SIZE as usize].into_boxed_slice()),
        }
    }

    fn bytes(&self) -> std::sync::MutexGuard<'_, Box<[u8]>> {
        self.buf.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn report_dirty(&self, offset: u32, len: u32) {
        let row = offset % PLANE_BYTES / ROW_BYTES;
        let x = offset % ROW_BYTES * 8;
        self.console.update_area(x, row, len * 8, 1);
    }

    /// Draw a glyph at a character cell. Alphanumeric codes take one
    /// cell, Kanji codes two.
    pub fn draw_char(&self, x: u32, y: u32, code: u32) {
        let mut glyph = [0u8; 32];
        let wide = code >= 0x100;
        if wide {
            self.console.get_k16_image(code, &mut glyph);
        } else {
            self.console.get_b16_image(code, &mut glyph);
        }

        let mut buf = self.bytes();
        for row in 0..16 {
            let offset = ((y * 16 + row) * ROW_BYTES + x) as usize;
            buf[offset] = glyph[(row * 2) as usize];
            if wide && x + 1 < ROW_BYTES {
                buf[offset + 1] = glyph[(row * 2 + 1) as usize];
            }
        }
        drop(buf);
        self.console
            .update_area(x * 8, y * 16, if wide { 16 } else { 8 }, 16);
    }

    /// Scroll plane 0 up by one text row and blank the bottom row.
    pub fn scroll(&self) {
        let mut buf = self.bytes();
        let step = (16 * ROW_BYTES) as usize;
        let visible = (ROWS as usize + 1) * step;
        buf.copy_within(step..visible, 0);
        let blank_from = visible - step;
        buf[blank_from..visible].fill(0);
        drop(buf);
        self.console.update_area(0, 0, COLUMNS * 8, (ROWS + 1) * 16);
    }
}

impl Memory for TextVram {
    fn get_8(&self, address: u32, _fc: FunctionCode) -> Result<u8, BusError> {
        Ok(self.bytes()[(address % SIZE) as usize])
    }

    fn get_16(&self, address: u32, fc: FunctionCode) -> Result<u16, BusError> {
        let hi = self.get_8(address, fc)?;
        let lo = self.get_8(address.wrapping_add(1), fc)?;
        Ok(u16::from(hi) << 8 | u16::from(lo))
    }

    fn put_8(&self, address: u32, value: u8, _fc: FunctionCode) -> Result<(), BusError> {
        let offset = address % SIZE;
        self.bytes()[offset as usize] = value;
        self.report_dirty(offset, 1);
        Ok(())
    }

    fn put_16(&self, address: u32, value: u16, _fc: FunctionCode) -> Result<(), BusError> {
        let offset = address % SIZE;
        {
            let mut buf = self.bytes();
            buf[offset as usize] = (value >> 8) as u8;
            buf[(offset.wrapping_add(1) % SIZE) as usize] = value as u8;
        }
        self.report_dirty(offset, 2);
        Ok(())
    }
}
