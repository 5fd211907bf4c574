//! FDC (uPD72065) register page at 0xe94000.
//!
//! Real sector I/O goes through the IOCS disk capability; this page only
//! keeps command/drive-select state so status polls make progress.

use std::sync::{Mutex, PoisonError};

use cpu_m68k::bus::{BusError, FunctionCode, Memory};

/// Main status: request-for-master set, not busy.
const STATUS_READY: u8 = 0x80;

#[derive(Default)]
struct State {
    command: Vec<u8>,
    drive_control: u8,
    drive_select: u8,
}

#[derive(Default)]
pub struct FdcMemory {
    state: Mutex<State>,
}

impl FdcMemory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Memory for FdcMemory {
    fn get_8(&self, address: u32, fc: FunctionCode) -> Result<u8, BusError> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match address & 0x7 {
            0x1 => Ok(STATUS_READY),
            0x3 => Ok(0), // result phase: everything fine
            0x5 => Ok(state.drive_control),
            0x7 => Ok(state.drive_select | 0x80), // drives present
            _ => Err(BusError { read: true, fc, address }),
        }
    }

    fn get_16(&self, address: u32, fc: FunctionCode) -> Result<u16, BusError> {
        Ok(u16::from(self.get_8(address | 1, fc)?))
    }

    fn put_8(&self, address: u32, value: u8, fc: FunctionCode) -> Result<(), BusError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match address & 0x7 {
            0x1 => Ok(()),
            0x3 => {
                state.command.push(value);
                // Commands are bounded; keep only the current phrase.
                if state.command.len() > 9 {
                    state.command.clear();
                    state.command.push(value);
                }
                Ok(())
            }
            0x5 => {
                state.drive_control = value;
                Ok(())
            }
            0x7 => {
                state.drive_select = value & 0x3;
                Ok(())
            }
            _ => Err(BusError { read: false, fc, address }),
        }
    }

    fn put_16(&self, address: u32, value: u16, fc: FunctionCode) -> Result<(), BusError> {
        self.put_8(address | 1, value as u8, fc)
    }
}
