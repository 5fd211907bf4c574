//! SCC (Z8530) register page at 0xe98000.
//!
//! Channel B carries the mouse. The host pushes mouse packets into the
//! receive queue; the guest reads them through the data port and polls
//! RR0 bit 0 for "character available". Write-register state is latched
//! but otherwise inert.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use cpu_m68k::bus::{BusError, FunctionCode, Memory};

#[derive(Default)]
struct Channel {
    wr: [u8; 16],
    /// Pending write-register selection from the command port.
    selected: u8,
    rx: VecDeque<u8>,
}

#[derive(Default)]
struct State {
    a: Channel,
    b: Channel,
}

#[derive(Default)]
pub struct SccMemory {
    state: Mutex<State>,
}

impl SccMemory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a three-byte mouse packet on channel B.
    pub fn queue_mouse_packet(&self, buttons: u8, dx: i8, dy: i8) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.b.rx.extend([buttons, dx as u8, dy as u8]);
    }

    fn command(channel: &mut Channel, value: u8) {
        if channel.selected == 0 {
            let reg = value & 0x0f;
            if reg != 0 {
                channel.selected = reg;
                return;
            }
            // Point-high and reset commands are ignored.
        } else {
            channel.wr[usize::from(channel.selected)] = value;
            channel.selected = 0;
        }
    }

    fn status(channel: &Channel) -> u8 {
        // RR0: rx character available (bit 0), tx empty (bit 2).
        let rx = u8::from(!channel.rx.is_empty());
        0x04 | rx
    }
}

impl Memory for SccMemory {
    fn get_8(&self, address: u32, fc: FunctionCode) -> Result<u8, BusError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        // Byte lanes: 1 = B command, 3 = B data, 5 = A command, 7 = A data.
        match address & 0x7 {
            0x1 => Ok(Self::status(&state.b)),
            0x3 => Ok(state.b.rx.pop_front().unwrap_or(0)),
            0x5 => Ok(Self::status(&state.a)),
            0x7 => Ok(state.a.rx.pop_front().unwrap_or(0)),
            _ => Err(BusError { read: true, fc, address }),
        }
    }

    fn get_16(&self, address: u32, fc: FunctionCode) -> Result<u16, BusError> {
        Ok(u16::from(self.get_8(address | 1, fc)?))
    }

    fn put_8(&self, address: u32, value: u8, fc: FunctionCode) -> Result<(), BusError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match address & 0x7 {
            0x1 => {
                Self::command(&mut state.b, value);
                Ok(())
            }
            0x3 => Ok(()), // transmit data: discarded
            0x5 => {
                Self::command(&mut state.a, value);
                Ok(())
            }
            0x7 => Ok(()),
            _ => Err(BusError { read: false, fc, address }),
        }
    }

    fn put_16(&self, address: u32, value: u16, fc: FunctionCode) -> Result<(), BusError> {
        self.put_8(address | 1, value as u8, fc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FC: FunctionCode = FunctionCode::SuperData;

    #[test]
    fn mouse_packet_drains_through_channel_b() {
        let scc = SccMemory::new();
        assert_eq!(scc.get_8(1, FC).unwrap() & 1, 0, "no data yet");
        scc.queue_mouse_packet(0x01, 5, -3);
        assert_eq!(scc.get_8(1, FC).unwrap() & 1, 1);
        assert_eq!(scc.get_8(3, FC).unwrap(), 0x01);
        assert_eq!(scc.get_8(3, FC).unwrap(), 5);
        assert_eq!(scc.get_8(3, FC).unwrap(), 0xfd);
        assert_eq!(scc.get_8(1, FC).unwrap() & 1, 0);
    }
}
