//! Memory backend trait with byte/word/long access and function codes.
//!
//! Every device on the 68000 bus implements [`Memory`]. Accesses carry a
//! function code (the FC0-FC2 pins) so backends can discriminate
//! user/supervisor and program/data cycles, and any access may be refused
//! with a [`BusError`].

use std::fmt;

/// Function code values from the 68000's FC0-FC2 pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCode {
    /// User data access (FC=1).
    UserData = 1,
    /// User program access (FC=2).
    UserProgram = 2,
    /// Supervisor data access (FC=5).
    SuperData = 5,
    /// Supervisor program access (FC=6).
    SuperProgram = 6,
}

impl FunctionCode {
    /// Build a function code from supervisor flag and program/data flag.
    #[must_use]
    pub fn from_flags(supervisor: bool, program: bool) -> Self {
        match (supervisor, program) {
            (false, false) => Self::UserData,
            (false, true) => Self::UserProgram,
            (true, false) => Self::SuperData,
            (true, true) => Self::SuperProgram,
        }
    }

    /// Returns the 3-bit value for the function code.
    #[must_use]
    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Returns true for program-space cycles.
    #[must_use]
    pub const fn is_program(self) -> bool {
        matches!(self, Self::UserProgram | Self::SuperProgram)
    }

    /// Returns true for supervisor-mode cycles.
    #[must_use]
    pub const fn is_supervisor(self) -> bool {
        matches!(self, Self::SuperData | Self::SuperProgram)
    }
}

/// A bus cycle refused by a backend (no DTACK response).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusError {
    /// True for a read cycle, false for a write cycle.
    pub read: bool,
    /// Function code of the failing cycle.
    pub fc: FunctionCode,
    /// Failing address.
    pub address: u32,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bus error: {} fc={} address={:#08x}",
            if self.read { "read" } else { "write" },
            self.fc.bits(),
            self.address
        )
    }
}

/// A memory-mapped device backend.
///
/// Word and long accesses are always even-aligned by the time they reach a
/// backend (the address space checks alignment first). `get_32`/`put_32`
/// default to two word cycles, high word first; backends that can serve a
/// long natively may override them.
///
/// Methods take `&self`: backends with mutable state use interior
/// mutability so a single backend can be mapped behind shared references
/// and poked from device threads.
pub trait Memory: Send + Sync {
    fn get_8(&self, address: u32, fc: FunctionCode) -> Result<u8, BusError>;

    /// `address` is even.
    fn get_16(&self, address: u32, fc: FunctionCode) -> Result<u16, BusError>;

    /// `address` is even.
    fn get_32(&self, address: u32, fc: FunctionCode) -> Result<u32, BusError> {
        let hi = self.get_16(address, fc)?;
        let lo = self.get_16(address.wrapping_add(2), fc)?;
        Ok(u32::from(hi) << 16 | u32::from(lo))
    }

    fn put_8(&self, address: u32, value: u8, fc: FunctionCode) -> Result<(), BusError>;

    /// `address` is even.
    fn put_16(&self, address: u32, value: u16, fc: FunctionCode) -> Result<(), BusError>;

    /// `address` is even.
    fn put_32(&self, address: u32, value: u32, fc: FunctionCode) -> Result<(), BusError> {
        self.put_16(address, (value >> 16) as u16, fc)?;
        self.put_16(address.wrapping_add(2), value as u16, fc)
    }
}
