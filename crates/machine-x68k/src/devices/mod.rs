//! Device register pages.
//!
//! These expose the uniform [`Memory`](cpu_m68k::Memory) interface; only
//! the behavior guest software depends on is modeled (the OPM timers,
//! the SCC receive queue), the rest are register latches.

mod dmac;
mod fdc;
mod mfp;
mod opm;
mod scc;
mod stubs;

pub use dmac::DmacMemory;
pub use fdc::FdcMemory;
pub use mfp::MfpMemory;
pub use opm::OpmMemory;
pub use scc::SccMemory;
pub use stubs::{AdpcmMemory, CrtcMemory, GraphicVram, PaletteMemory, PpiMemory, SpriteMemory};
