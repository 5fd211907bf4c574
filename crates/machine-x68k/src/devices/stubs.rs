//! Small register pages with latch-and-read-back behavior.

use std::sync::{Mutex, PoisonError};

use cpu_m68k::bus::{BusError, FunctionCode, Memory};

/// CRTC register page at 0xe80000. Register 0x28 reads back the mode
/// word guest code checks for the 768x512 text screen.
pub struct CrtcMemory {
    regs: Mutex<[u16; 0x30]>,
}

impl Default for CrtcMemory {
    fn default() -> Self {
        Self { regs: Mutex::new([0; 0x30]) }
    }
}

impl CrtcMemory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Memory for CrtcMemory {
    fn get_8(&self, address: u32, fc: FunctionCode) -> Result<u8, BusError> {
        let w = self.get_16(address & !1, fc)?;
        Ok(if address & 1 != 0 { w as u8 } else { (w >> 8) as u8 })
    }

    fn get_16(&self, address: u32, _fc: FunctionCode) -> Result<u16, BusError> {
        match address & 0x1fff {
            0x28 => Ok(0x417),
            offset => {
                let regs = self.regs.lock().unwrap_or_else(PoisonError::into_inner);
                Ok(regs.get((offset >> 1) as usize).copied().unwrap_or(0))
            }
        }
    }

    fn put_8(&self, address: u32, value: u8, fc: FunctionCode) -> Result<(), BusError> {
        let old = self.get_16(address & !1, fc)?;
        let new = if address & 1 != 0 {
            old & 0xff00 | u16::from(value)
        } else {
            old & 0x00ff | u16::from(value) << 8
        };
        self.put_16(address & !1, new, fc)
    }

    fn put_16(&self, address: u32, value: u16, _fc: FunctionCode) -> Result<(), BusError> {
        let offset = address & 0x1fff;
        let mut regs = self.regs.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = regs.get_mut((offset >> 1) as usize) {
            *slot = value;
        }
        Ok(())
    }
}

/// Palette and video-control page at 0xe82000. Supervisor-only, like
/// the hardware.
pub struct PaletteMemory {
    text_palette: Mutex<[u16; 256]>,
}

impl Default for PaletteMemory {
    fn default() -> Self {
        Self { text_palette: Mutex::new([0; 256]) }
    }
}

impl PaletteMemory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Memory for PaletteMemory {
    fn get_8(&self, address: u32, fc: FunctionCode) -> Result<u8, BusError> {
        let w = self.get_16(address & !1, fc)?;
        Ok(if address & 1 != 0 { w as u8 } else { (w >> 8) as u8 })
    }

    fn get_16(&self, address: u32, fc: FunctionCode) -> Result<u16, BusError> {
        if fc != FunctionCode::SuperData {
            return Err(BusError { read: true, fc, address });
        }
        let offset = address & 0x1fff;
        if (0x200..0x400).contains(&offset) {
            let palette = self.text_palette.lock().unwrap_or_else(PoisonError::into_inner);
            return Ok(palette[((offset - 0x200) >> 1) as usize]);
        }
        Ok(0)
    }

    fn put_8(&self, address: u32, _value: u8, fc: FunctionCode) -> Result<(), BusError> {
        if fc != FunctionCode::SuperData {
            return Err(BusError { read: false, fc, address });
        }
        Ok(())
    }

    fn put_16(&self, address: u32, value: u16, fc: FunctionCode) -> Result<(), BusError> {
        if fc != FunctionCode::SuperData {
            return Err(BusError { read: false, fc, address });
        }
        let offset = address & 0x1fff;
        if (0x200..0x400).contains(&offset) {
            let mut palette = self.text_palette.lock().unwrap_or_else(PoisonError::into_inner);
            palette[((offset - 0x200) >> 1) as usize] = value;
        }
        Ok(())
    }
}

/// 8255 PPI page at 0xe9a000: joystick ports read back idle.
#[derive(Default)]
pub struct PpiMemory {
    control: Mutex<u8>,
}

impl PpiMemory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Memory for PpiMemory {
    fn get_8(&self, address: u32, _fc: FunctionCode) -> Result<u8, BusError> {
        match address & 0x7 {
            0x1 | 0x3 => Ok(0xff), // no joystick activity
            0x5 => Ok(*self.control.lock().unwrap_or_else(PoisonError::into_inner)),
            _ => Ok(0xff),
        }
    }

    fn get_16(&self, address: u32, fc: FunctionCode) -> Result<u16, BusError> {
        Ok(u16::from(self.get_8(address | 1, fc)?))
    }

    fn put_8(&self, address: u32, value: u8, _fc: FunctionCode) -> Result<(), BusError> {
        if address & 0x7 == 0x5 {
            *self.control.lock().unwrap_or_else(PoisonError::into_inner) = value;
        }
        Ok(())
    }

    fn put_16(&self, address: u32, value: u16, fc: FunctionCode) -> Result<(), BusError> {
        self.put_8(address | 1, value as u8, fc)
    }
}

/// Word-array register file, shared shape of the sprite and ADPCM pages
/// and the graphic VRAM window.
struct WordPage {
    words: Mutex<Box<[u16]>>,
    mask: u32,
}

impl WordPage {
    fn new(size: u32) -> Self {
        Self {
            words: Mutex::new(vec![0; (size >> 1) as usize].into_boxed_slice()),
            mask: size - 1,
        }
    }

    fn get_16(&self, address: u32) -> u16 {
        let words = self.words.lock().unwrap_or_else(PoisonError::into_inner);
        words[((address & self.mask) >> 1) as usize]
    }

    fn put_16(&self, address: u32, value: u16) {
        let mut words = self.words.lock().unwrap_or_else(PoisonError::into_inner);
        words[((address & self.mask) >> 1) as usize] = value;
    }
}

macro_rules! word_page_memory {
    ($name:ident, $size:expr, $doc:literal) => {
        #[doc = $doc]
        pub struct $name {
            page: WordPage,
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self {
                    page: WordPage::new($size),
                }
            }
        }

        impl Memory for $name {
            fn get_8(&self, address: u32, _fc: FunctionCode) -> Result<u8, BusError> {
                let w = self.page.get_16(address & !1);
                Ok(if address & 1 != 0 { w as u8 } else { (w >> 8) as u8 })
            }

            fn get_16(&self, address: u32, _fc: FunctionCode) -> Result<u16, BusError> {
                Ok(self.page.get_16(address))
            }

            fn put_8(&self, address: u32, value: u8, _fc: FunctionCode) -> Result<(), BusError> {
                let old = self.page.get_16(address & !1);
                let new = if address & 1 != 0 {
                    old & 0xff00 | u16::from(value)
                } else {
                    old & 0x00ff | u16::from(value) << 8
                };
                self.page.put_16(address & !1, new);
                Ok(())
            }

            fn put_16(&self, address: u32, value: u16, _fc: FunctionCode) -> Result<(), BusError> {
                self.page.put_16(address, value);
                Ok(())
            }
        }
    };
}

word_page_memory!(
    SpriteMemory,
    0x10000,
    "Sprite registers and PCG area at 0xeb0000."
);
word_page_memory!(
    AdpcmMemory,
    0x2000,
    "MSM6258V ADPCM register page at 0xe92000; samples are latched, not played."
);
word_page_memory!(GraphicVram, 0x20_0000, "Graphic VRAM window at 0xc00000.");
