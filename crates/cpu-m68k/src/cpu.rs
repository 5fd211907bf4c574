//! Per-CPU execution state and the instruction loop.

use std::sync::Arc;

use crate::bus::FunctionCode;
use crate::exceptions::{CpuException, FatalError};
use crate::exec::ExecUnit;
use crate::interrupts::InterruptLines;
use crate::memory_map::{MemoryError, MemoryMap};
use crate::registers::Registers;

const FC_SUPER_DATA: FunctionCode = FunctionCode::SuperData;

/// Outcome of a single execution step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// An instruction (or exception entry) ran.
    Executed,
    /// The CPU is parked by STOP, waiting for an interrupt.
    Stopped,
    /// A host-intercepted TRAP #n was reached; the PC already points past
    /// the TRAP instruction and the caller services the call.
    Trap(u16),
}

/// Execution context: register file, address space, interrupt state, and
/// cached function codes.
pub struct Context {
    pub regs: Registers,
    pub mem: Arc<MemoryMap>,
    lines: Arc<InterruptLines>,
    pfc: FunctionCode,
    dfc: FunctionCode,
    stopped: bool,
    /// Opcode of the instruction being executed, for group 0 frames.
    last_op: u16,
    /// Bitmask of TRAP numbers serviced by the host instead of the guest
    /// vector table.
    intercepted_traps: u16,
}

impl Context {
    #[must_use]
    pub fn new(mem: Arc<MemoryMap>, lines: Arc<InterruptLines>) -> Self {
        let mut c = Self {
            regs: Registers::new(),
            mem,
            lines,
            pfc: FunctionCode::SuperProgram,
            dfc: FunctionCode::SuperData,
            stopped: false,
            last_op: 0,
            intercepted_traps: 0,
        };
        c.refresh_fc_cache();
        c
    }

    fn refresh_fc_cache(&mut self) {
        let s = self.regs.sr.supervisor();
        self.pfc = FunctionCode::from_flags(s, true);
        self.dfc = FunctionCode::from_flags(s, false);
    }

    /// Function code for instruction fetches.
    #[must_use]
    pub fn program_fc(&self) -> FunctionCode {
        self.pfc
    }

    /// Function code for operand accesses.
    #[must_use]
    pub fn data_fc(&self) -> FunctionCode {
        self.dfc
    }

    #[must_use]
    pub fn supervisor_state(&self) -> bool {
        self.regs.sr.supervisor()
    }

    /// Enter or leave supervisor state, swapping `A7` with the stored
    /// inactive stack pointer on a transition.
    pub fn set_supervisor_state(&mut self, state: bool) {
        if state {
            if !self.supervisor_state() {
                self.regs.usp = self.regs.a[7];
                self.regs.sr.set_s_bit(true);
                self.regs.a[7] = self.regs.ssp;
                self.refresh_fc_cache();
            }
        } else if self.supervisor_state() {
            self.regs.ssp = self.regs.a[7];
            self.regs.sr.set_s_bit(false);
            self.regs.a[7] = self.regs.usp;
            self.refresh_fc_cache();
        }
    }

    /// Materialize the status register.
    #[must_use]
    pub fn sr(&self) -> u16 {
        self.regs.sr.value()
    }

    /// Overwrite the status register, handling a privilege transition.
    pub fn set_sr(&mut self, value: u16) {
        self.set_supervisor_state(value & 0x2000 != 0);
        self.regs.sr.set(value);
    }

    /// Shared interrupt lines, for wiring devices.
    #[must_use]
    pub fn interrupt_lines(&self) -> Arc<InterruptLines> {
        self.lines.clone()
    }

    /// Post an interrupt. Callable from any thread through
    /// [`interrupt_lines`](Self::interrupt_lines); this is the CPU-side
    /// convenience.
    pub fn interrupt(&self, prio: u32, vecno: u32) {
        self.lines.post(prio, vecno);
    }

    #[must_use]
    pub fn interrupted(&self) -> bool {
        self.lines.pending()
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub(crate) fn set_stopped(&mut self) {
        self.stopped = true;
    }

    /// Service TRAP `n` on the host side instead of vectoring through the
    /// guest table. The step loop then yields [`Step::Trap`].
    pub fn intercept_trap(&mut self, n: u16) {
        self.intercepted_traps |= 1 << (n & 0xf);
    }

    /// Fetch an instruction word at `PC + offset`.
    pub fn fetch_16(&self, offset: u32) -> Result<u16, CpuException> {
        Ok(self.mem.get_16(self.regs.pc.wrapping_add(offset), self.pfc)?)
    }

    /// Fetch an instruction long at `PC + offset`.
    pub fn fetch_32(&self, offset: u32) -> Result<u32, CpuException> {
        Ok(self.mem.get_32(self.regs.pc.wrapping_add(offset), self.pfc)?)
    }

    /// Service the highest-priority deliverable interrupt, if any.
    ///
    /// Pushes the old SR and PC on the supervisor stack, raises the mask
    /// to the serviced priority, and vectors. Returns whether a vector
    /// was serviced.
    pub fn handle_interrupts(&mut self) -> Result<bool, CpuException> {
        let mask = self.regs.sr.interrupt_mask();
        let Some((prio, vecno)) = self.lines.take(mask) else {
            return Ok(false);
        };
        log::trace!("interrupt: priority {prio} vector {vecno:#04x}");

        let old_sr = self.sr();
        self.set_sr(old_sr & !0x0700 | prio << 8);
        self.set_supervisor_state(true);
        self.regs.a[7] = self.regs.a[7].wrapping_sub(6);
        self.mem
            .put_32(self.regs.a[7].wrapping_add(2), self.regs.pc, FC_SUPER_DATA)?;
        self.mem.put_16(self.regs.a[7], old_sr, FC_SUPER_DATA)?;

        self.regs.pc = self.mem.get_32(u32::from(vecno) * 4, FC_SUPER_DATA)?;
        self.stopped = false;
        Ok(true)
    }

    /// Execute one instruction, servicing pending interrupts and catching
    /// guest exceptions at the boundary. Interrupt entry counts as its
    /// own step.
    pub fn step(&mut self, eu: &ExecUnit) -> Result<Step, FatalError> {
        if self.lines.pending() {
            match self.handle_interrupts() {
                Ok(true) => return Ok(Step::Executed),
                Ok(false) => {}
                Err(e) => {
                    self.process_exception(e)?;
                    return Ok(Step::Executed);
                }
            }
        }
        if self.stopped {
            return Ok(Step::Stopped);
        }

        let op = match self.fetch_16(0) {
            Ok(op) => op,
            Err(e) => {
                self.process_exception(e)?;
                return Ok(Step::Executed);
            }
        };
        self.last_op = op;

        if let Err(e) = eu.dispatch(op, self) {
            if let CpuException::Trap(n) = e {
                // The TRAP handler advances the PC before raising, so the
                // caller resumes at the next instruction.
                if self.intercepted_traps & (1 << (n & 0xf)) != 0 {
                    return Ok(Step::Trap(n));
                }
            }
            self.process_exception(e)?;
        }
        Ok(Step::Executed)
    }

    /// Push the exception frame for `e` and vector, escalating a nested
    /// failure to a group 0 frame and a double fault to the host.
    pub fn process_exception(&mut self, e: CpuException) -> Result<(), FatalError> {
        log::trace!("exception: {e}");
        match self.enter_exception(e) {
            Ok(()) => Ok(()),
            Err(nested) => {
                if e.is_group_0() {
                    return Err(FatalError::DoubleFault { vector: e.vector() });
                }
                let nested = CpuException::from(nested);
                self.enter_exception(nested)
                    .map_err(|_| FatalError::DoubleFault {
                        vector: nested.vector(),
                    })
            }
        }
    }

    fn enter_exception(&mut self, e: CpuException) -> Result<(), MemoryError> {
        let old_sr = self.sr();
        self.set_supervisor_state(true);
        self.regs.sr.set_trace(false);

        if let CpuException::Bus { read, fc, address } | CpuException::Address { read, fc, address } = e
        {
            // 14-byte group 0 frame: access info, fault address, opcode,
            // SR, PC.
            let sp = self.regs.a[7].wrapping_sub(14);
            self.regs.a[7] = sp;
            let info = self.last_op & 0xffe0
                | if read { 0x10 } else { 0 }
                | u16::from(fc.bits());
            self.mem.put_16(sp, info, FC_SUPER_DATA)?;
            self.mem.put_32(sp.wrapping_add(2), address, FC_SUPER_DATA)?;
            self.mem
                .put_16(sp.wrapping_add(6), self.last_op, FC_SUPER_DATA)?;
            self.mem.put_16(sp.wrapping_add(8), old_sr, FC_SUPER_DATA)?;
            self.mem
                .put_32(sp.wrapping_add(10), self.regs.pc, FC_SUPER_DATA)?;
        } else {
            // Short frame: SR, PC.
            let sp = self.regs.a[7].wrapping_sub(6);
            self.regs.a[7] = sp;
            self.mem.put_16(sp, old_sr, FC_SUPER_DATA)?;
            self.mem
                .put_32(sp.wrapping_add(2), self.regs.pc, FC_SUPER_DATA)?;
        }

        self.regs.pc = self.mem.get_32(e.vector(), FC_SUPER_DATA)?;
        Ok(())
    }
}
