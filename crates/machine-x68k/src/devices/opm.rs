//! YM2151 (OPM) register page at 0xe90000.
//!
//! Sound synthesis happens host-side; what the guest relies on here is
//! the pair of interval timers. Timer A counts in units of 64/4000 ms
//! from a 10-bit period, timer B in 1024/4000 ms units from an 8-bit
//! period. Each timer runs independently; when one expires its status
//! bit is set and, if its IRQ enable is on, a priority-6 interrupt with
//! vector 0x43 is posted for the rising edge.

use std::sync::{Mutex, PoisonError};

use cpu_m68k::bus::{BusError, FunctionCode, Memory};
use cpu_m68k::interrupts::InterruptLines;

/// OPM interrupt vector on the X68000.
const OPM_VECTOR: u32 = 0x43;
const OPM_PRIORITY: u32 = 6;

struct Timers {
    regs: [u8; 0x100],
    address: u8,
    status: u8,
    interrupt_enabled: bool,
    last_check_time: u64,
    timer_a_interval: u64,
    timer_a_start_time: u64,
    timer_b_interval: u64,
    timer_b_start_time: u64,
}

impl Default for Timers {
    fn default() -> Self {
        Self {
            regs: [0; 0x100],
            address: 0,
            status: 0,
            interrupt_enabled: false,
            last_check_time: 0,
            timer_a_interval: 0,
            timer_a_start_time: 0,
            timer_b_interval: 0,
            timer_b_start_time: 0,
        }
    }
}

pub struct OpmMemory {
    state: Mutex<Timers>,
}

impl Default for OpmMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl OpmMemory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(Timers::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Timers> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn reset(&self, time: u64) {
        let mut t = self.lock();
        t.last_check_time = time;
        t.timer_a_start_time = time;
        t.timer_b_start_time = time;
        t.status = 0;
    }

    /// Whether the OPM may raise interrupts at all (gated by the host
    /// machine wiring).
    pub fn set_interrupt_enabled(&self, value: bool) {
        self.lock().interrupt_enabled = value;
    }

    #[must_use]
    pub fn status(&self) -> u8 {
        self.lock().status
    }

    /// Advance the timers to `time`, posting an interrupt for any status
    /// bit that rises while its IRQ enable is set.
    pub fn check_timeouts(&self, time: u64, lines: &InterruptLines) {
        let mut t = self.lock();
        t.last_check_time = time;

        let old_status = t.status;
        let tcr = t.regs[0x14];

        if tcr & 0x01 != 0
            && t.timer_a_interval > 0
            && time.wrapping_sub(t.timer_a_start_time) >= t.timer_a_interval
        {
            t.status |= 0x2;
            t.timer_a_start_time += t.timer_a_interval;
        }
        if tcr & 0x02 != 0
            && t.timer_b_interval > 0
            && time.wrapping_sub(t.timer_b_start_time) >= t.timer_b_interval
        {
            t.status |= 0x1;
            t.timer_b_start_time += t.timer_b_interval;
        }

        if t.interrupt_enabled {
            let risen = t.status & !old_status;
            if (tcr & 0x04 != 0 && risen & 0x2 != 0) || (tcr & 0x08 != 0 && risen & 0x1 != 0) {
                lines.post(OPM_PRIORITY, OPM_VECTOR);
            }
        }
    }

    fn set_reg(&self, regno: u8, value: u8) {
        let mut t = self.lock();
        t.regs[usize::from(regno)] = value;

        match regno {
            0x10 | 0x11 => {
                // Timer A period: 10 bits across two registers.
                let k = u64::from(t.regs[0x10]) << 2 | u64::from(t.regs[0x11]) & 0x3;
                t.timer_a_interval = (0x400 - k) * 64 / 4000;
                t.timer_a_start_time = t.last_check_time;
            }
            0x12 => {
                let k = u64::from(t.regs[0x12]);
                t.timer_b_interval = (0x100 - k) * 1024 / 4000;
                t.timer_b_start_time = t.last_check_time;
            }
            0x14 => {
                // Writing the reset bits acknowledges the status flags.
                if value & 0x10 != 0 {
                    t.status &= !0x2;
                }
                if value & 0x20 != 0 {
                    t.status &= !0x1;
                }
            }
            _ => {}
        }
    }
}

impl Memory for OpmMemory {
    fn get_8(&self, address: u32, fc: FunctionCode) -> Result<u8, BusError> {
        match address & 0x1fff {
            // The status register reads back on the odd lanes.
            0x1 | 0x3 => Ok(self.status()),
            _ => Err(BusError { read: true, fc, address }),
        }
    }

    fn get_16(&self, address: u32, fc: FunctionCode) -> Result<u16, BusError> {
        Ok(u16::from(self.get_8(address | 1, fc)?))
    }

    fn put_8(&self, address: u32, value: u8, fc: FunctionCode) -> Result<(), BusError> {
        if fc != FunctionCode::SuperData {
            return Err(BusError { read: false, fc, address });
        }
        match address & 0x1fff {
            0x1 => {
                self.lock().address = value;
                Ok(())
            }
            0x3 => {
                let regno = self.lock().address;
                self.set_reg(regno, value);
                Ok(())
            }
            _ => Err(BusError { read: false, fc, address }),
        }
    }

    fn put_16(&self, address: u32, value: u16, fc: FunctionCode) -> Result<(), BusError> {
        self.put_8(address | 1, value as u8, fc)
    }
}
