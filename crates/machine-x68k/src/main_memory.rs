//! Main RAM.
//!
//! Stored as big-endian words, the natural grain of the 68000 bus.
//! Accesses beyond the installed size raise a bus error even though the
//! backing pages are mapped.

use std::sync::Mutex;
use std::sync::PoisonError;

use cpu_m68k::bus::{BusError, FunctionCode, Memory};

pub struct MainMemory {
    end: u32,
    array: Mutex<Box<[u16]>>,
}

impl MainMemory {
    /// Allocate `size` bytes of RAM (rounded up to a word).
    #[must_use]
    pub fn new(size: u32) -> Self {
        let end = (size + 1) & !1;
        let words = (end >> 1) as usize;
        // Uninitialized RAM reads back as ILLEGAL instructions, which
        // makes runaway guest code fault fast in debug builds.
        let fill = if cfg!(debug_assertions) { 0x4afc } else { 0 };
        Self {
            end,
            array: Mutex::new(vec![fill; words].into_boxed_slice()),
        }
    }

    /// Installed size in bytes.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.end
    }

    fn words(&self) -> std::sync::MutexGuard<'_, Box<[u16]>> {
        self.array.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Memory for MainMemory {
    fn get_8(&self, address: u32, fc: FunctionCode) -> Result<u8, BusError> {
        if address >= self.end {
            return Err(BusError { read: true, fc, address });
        }
        let w = self.words()[(address >> 1) as usize];
        Ok(if address & 1 != 0 { w as u8 } else { (w >> 8) as u8 })
    }

    fn get_16(&self, address: u32, fc: FunctionCode) -> Result<u16, BusError> {
        if address >= self.end {
            return Err(BusError { read: true, fc, address });
        }
        Ok(self.words()[(address >> 1) as usize])
    }

    fn get_32(&self, address: u32, fc: FunctionCode) -> Result<u32, BusError> {
        if address.wrapping_add(2) >= self.end {
            return Err(BusError {
                read: true,
                fc,
                address: address.wrapping_add(2),
            });
        }
        let words = self.words();
        let hi = words[(address >> 1) as usize];
        let lo = words[(address.wrapping_add(2) >> 1) as usize];
        Ok(u32::from(hi) << 16 | u32::from(lo))
    }

    fn put_8(&self, address: u32, value: u8, fc: FunctionCode) -> Result<(), BusError> {
        if address >= self.end {
            return Err(BusError { read: false, fc, address });
        }
        let mut words = self.words();
        let w = &mut words[(address >> 1) as usize];
        if address & 1 != 0 {
            *w = *w & 0xff00 | u16::from(value);
        } else {
            *w = *w & 0x00ff | u16::from(value) << 8;
        }
        Ok(())
    }

    fn put_16(&self, address: u32, value: u16, fc: FunctionCode) -> Result<(), BusError> {
        if address >= self.end {
            return Err(BusError { read: false, fc, address });
        }
        self.words()[(address >> 1) as usize] = value;
        Ok(())
    }

    fn put_32(&self, address: u32, value: u32, fc: FunctionCode) -> Result<(), BusError> {
        if address.wrapping_add(2) >= self.end {
            return Err(BusError {
                read: false,
                fc,
                address: address.wrapping_add(2),
            });
        }
        let mut words = self.words();
        words[(address >> 1) as usize] = (value >> 16) as u16;
        words[(address.wrapping_add(2) >> 1) as usize] = value as u16;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FC: FunctionCode = FunctionCode::SuperData;

    #[test]
    fn byte_lanes_pack_into_words() {
        let ram = MainMemory::new(0x1000);
        ram.put_8(0x10, 0x12, FC).unwrap();
        ram.put_8(0x11, 0x34, FC).unwrap();
        assert_eq!(ram.get_16(0x10, FC).unwrap(), 0x1234);
    }

    #[test]
    fn access_past_the_installed_size_faults() {
        let ram = MainMemory::new(0x1000);
        assert!(ram.get_16(0x1000, FC).is_err());
        assert!(ram.put_8(0x1000, 0, FC).is_err());
    }
}
