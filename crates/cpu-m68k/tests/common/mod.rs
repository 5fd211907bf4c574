//! Shared test harness: a RAM-backed address space and a CPU wired to it.

use std::sync::{Arc, Mutex};

use cpu_m68k::{BusError, Context, ExecUnit, FunctionCode, InterruptLines, Memory, MemoryMap};

/// Big-endian byte RAM mapped from address zero.
pub struct Ram {
    data: Mutex<Vec<u8>>,
}

impl Ram {
    pub fn new(len: usize) -> Arc<Self> {
        Arc::new(Self {
            data: Mutex::new(vec![0; len]),
        })
    }
}

impl Memory for Ram {
    fn get_8(&self, address: u32, fc: FunctionCode) -> Result<u8, BusError> {
        let data = self.data.lock().unwrap();
        data.get(address as usize)
            .copied()
            .ok_or(BusError { read: true, fc, address })
    }

    fn get_16(&self, address: u32, fc: FunctionCode) -> Result<u16, BusError> {
        let hi = self.get_8(address, fc)?;
        let lo = self.get_8(address + 1, fc)?;
        Ok(u16::from(hi) << 8 | u16::from(lo))
    }

    fn put_8(&self, address: u32, value: u8, fc: FunctionCode) -> Result<(), BusError> {
        let mut data = self.data.lock().unwrap();
        match data.get_mut(address as usize) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(BusError { read: false, fc, address }),
        }
    }

    fn put_16(&self, address: u32, value: u16, fc: FunctionCode) -> Result<(), BusError> {
        self.put_8(address, (value >> 8) as u8, fc)?;
        self.put_8(address + 1, value as u8, fc)
    }
}

pub const FC: FunctionCode = FunctionCode::SuperData;

/// A CPU over `ram_len` bytes of RAM; everything above is unmapped.
pub fn setup(ram_len: usize) -> (Context, ExecUnit) {
    let mut map = MemoryMap::new();
    map.fill(0, ram_len as u32, Ram::new(ram_len));
    let ctx = Context::new(Arc::new(map), Arc::new(InterruptLines::new()));
    (ctx, ExecUnit::new())
}

/// Store opcode words at an address.
pub fn write_words(c: &Context, address: u32, words: &[u16]) {
    for (i, w) in words.iter().enumerate() {
        c.mem.put_16(address + 2 * i as u32, *w, FC).unwrap();
    }
}

/// Step exactly one instruction, asserting no fatal error.
pub fn step(c: &mut Context, eu: &ExecUnit) -> cpu_m68k::Step {
    c.step(eu).expect("fatal error during test step")
}
