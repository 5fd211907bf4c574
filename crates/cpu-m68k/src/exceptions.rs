//! Exception taxonomy.
//!
//! Guest-observable exceptions travel through instruction handlers as the
//! error arm of [`Exec`](crate::exec::Exec); the execution loop catches
//! them, pushes the proper frame and vectors. They never reach the host
//! caller. Host-fatal conditions surface as [`FatalError`].

use std::fmt;

use crate::bus::{BusError, FunctionCode};
use crate::memory_map::{AddressError, MemoryError};

/// A guest-observable CPU exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuException {
    /// A backend refused the bus cycle. Group 0, vector 0x08.
    Bus {
        read: bool,
        fc: FunctionCode,
        address: u32,
    },
    /// Word or long access to an odd address. Group 0, vector 0x0c.
    Address {
        read: bool,
        fc: FunctionCode,
        address: u32,
    },
    /// Unrecognized opcode. Vector 0x10.
    Illegal,
    /// Division by zero. Vector 0x14.
    ZeroDivide,
    /// CHK register out of bounds. Vector 0x18.
    Chk,
    /// TRAPV with V set. Vector 0x1c.
    Trapv,
    /// Privileged instruction in user mode. Vector 0x20.
    Privilege,
    /// TRAP #n. Vector 0x80 + 4n.
    Trap(u16),
}

impl CpuException {
    /// Vector table offset.
    #[must_use]
    pub fn vector(self) -> u32 {
        match self {
            Self::Bus { .. } => 0x08,
            Self::Address { .. } => 0x0c,
            Self::Illegal => 0x10,
            Self::ZeroDivide => 0x14,
            Self::Chk => 0x18,
            Self::Trapv => 0x1c,
            Self::Privilege => 0x20,
            Self::Trap(n) => 0x80 + 4 * u32::from(n & 0xf),
        }
    }

    /// Group 0 exceptions push the long fault frame.
    #[must_use]
    pub fn is_group_0(self) -> bool {
        matches!(self, Self::Bus { .. } | Self::Address { .. })
    }
}

impl From<BusError> for CpuException {
    fn from(e: BusError) -> Self {
        Self::Bus {
            read: e.read,
            fc: e.fc,
            address: e.address,
        }
    }
}

impl From<AddressError> for CpuException {
    fn from(e: AddressError) -> Self {
        Self::Address {
            read: e.read,
            fc: e.fc,
            address: e.address,
        }
    }
}

impl From<MemoryError> for CpuException {
    fn from(e: MemoryError) -> Self {
        match e {
            MemoryError::Bus(e) => e.into(),
            MemoryError::Address(e) => e.into(),
        }
    }
}

impl fmt::Display for CpuException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus { read, fc, address } => write!(
                f,
                "bus error: {} fc={} address={address:#08x}",
                if *read { "read" } else { "write" },
                fc.bits(),
            ),
            Self::Address { read, fc, address } => write!(
                f,
                "address error: {} fc={} address={address:#08x}",
                if *read { "read" } else { "write" },
                fc.bits(),
            ),
            Self::Illegal => f.write_str("illegal instruction"),
            Self::ZeroDivide => f.write_str("zero divide"),
            Self::Chk => f.write_str("CHK out of bounds"),
            Self::Trapv => f.write_str("TRAPV"),
            Self::Privilege => f.write_str("privilege violation"),
            Self::Trap(n) => write!(f, "trap #{n}"),
        }
    }
}

/// A condition the emulation cannot recover from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalError {
    /// A bus or address error occurred while building a group 0 exception
    /// frame.
    DoubleFault {
        /// Vector of the exception whose frame push failed.
        vector: u32,
    },
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DoubleFault { vector } => {
                write!(f, "double fault while entering exception vector {vector:#x}")
            }
        }
    }
}

impl std::error::Error for FatalError {}
