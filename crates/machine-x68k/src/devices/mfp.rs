//! MFP (MC68901) register page at 0xe88000.
//!
//! Only the register file and the GPIP display-sync bits are modeled.
//! Guest code polls GPIP bit 4 (V-DISP) and bit 7 (H-SYNC) in busy
//! loops, so reads of the GPIP toggle those bits to keep such loops
//! finite.

use std::sync::{Mutex, PoisonError};
use std::sync::atomic::{AtomicU8, Ordering};

use cpu_m68k::bus::{BusError, FunctionCode, Memory};

const GPIP: u32 = 0x01;

pub struct MfpMemory {
    regs: Mutex<[u8; 0x30]>,
    gpip: AtomicU8,
}

impl Default for MfpMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MfpMemory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: Mutex::new([0; 0x30]),
            gpip: AtomicU8::new(0xfb),
        }
    }
}

impl Memory for MfpMemory {
    fn get_8(&self, address: u32, _fc: FunctionCode) -> Result<u8, BusError> {
        let offset = address & 0x3f;
        if offset == GPIP {
            // Fake the sync inputs by flipping them on every read.
            let old = self.gpip.fetch_xor(0x90, Ordering::Relaxed);
            return Ok(old);
        }
        let index = (offset >> 1) as usize;
        let regs = self.regs.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(regs.get(index).copied().unwrap_or(0))
    }

    fn get_16(&self, address: u32, fc: FunctionCode) -> Result<u16, BusError> {
        // Registers sit on the odd byte lanes.
        Ok(u16::from(self.get_8(address | 1, fc)?))
    }

    fn put_8(&self, address: u32, value: u8, _fc: FunctionCode) -> Result<(), BusError> {
        let index = ((address & 0x3f) >> 1) as usize;
        let mut regs = self.regs.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = regs.get_mut(index) {
            *slot = value;
        }
        Ok(())
    }

    fn put_16(&self, address: u32, value: u16, fc: FunctionCode) -> Result<(), BusError> {
        self.put_8(address | 1, value as u8, fc)
    }
}
