//! DMAC (HD63450) register page at 0xe84000.
//!
//! Four channels of 64 bytes each. Registers latch; a start command
//! completes immediately with a clean status, which satisfies drivers
//! that kick a transfer and poll for completion (the FDC path does its
//! actual data movement through the IOCS disk capability instead).

use std::sync::{Mutex, PoisonError};

use cpu_m68k::bus::{BusError, FunctionCode, Memory};

/// Channel status register offset.
const CSR: usize = 0x00;
/// Channel control register offset.
const CCR: usize = 0x07;

/// CSR channel-operation-complete bit.
const COC: u8 = 0x80;
/// CCR start bit.
const STR: u8 = 0x80;

pub struct DmacMemory {
    regs: Mutex<[u8; 0x100]>,
}

impl Default for DmacMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl DmacMemory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: Mutex::new([0; 0x100]),
        }
    }
}

impl Memory for DmacMemory {
    fn get_8(&self, address: u32, _fc: FunctionCode) -> Result<u8, BusError> {
        let regs = self.regs.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(regs[(address & 0xff) as usize])
    }

    fn get_16(&self, address: u32, fc: FunctionCode) -> Result<u16, BusError> {
        let hi = self.get_8(address, fc)?;
        let lo = self.get_8(address.wrapping_add(1), fc)?;
        Ok(u16::from(hi) << 8 | u16::from(lo))
    }

    fn put_8(&self, address: u32, value: u8, fc: FunctionCode) -> Result<(), BusError> {
        if fc != FunctionCode::SuperData {
            return Err(BusError { read: false, fc, address });
        }
        let offset = (address & 0xff) as usize;
        let channel_base = offset & !0x3f;
        let mut regs = self.regs.lock().unwrap_or_else(PoisonError::into_inner);
        if offset & 0x3f == CSR {
            // Writing 1-bits acknowledges status flags.
            regs[offset] &= !value;
            return Ok(());
        }
        regs[offset] = value;
        if offset & 0x3f == CCR && value & STR != 0 {
            // Transfers complete instantly.
            regs[channel_base + CSR] |= COC;
            regs[offset] &= !STR;
        }
        Ok(())
    }

    fn put_16(&self, address: u32, value: u16, fc: FunctionCode) -> Result<(), BusError> {
        self.put_8(address, (value >> 8) as u8, fc)?;
        self.put_8(address.wrapping_add(1), value as u8, fc)
    }
}
