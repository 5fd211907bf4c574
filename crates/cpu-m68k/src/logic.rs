//! Logical operations: AND, OR, EOR.

use crate::cpu::Context;
use crate::ea::{self, Ea};
use crate::exceptions::CpuException;
use crate::exec::{Exec, ExecUnit};
use crate::size::Size;

pub(crate) fn install(eu: &mut ExecUnit) {
    for sz in 0..3u16 {
        eu.set_instruction(0x8000 | sz << 6, 0x0e3f, m68k_or_to_data);
        eu.set_instruction(0x8100 | sz << 6, 0x0e3f, m68k_or_to_mem);
        eu.set_instruction(0xc000 | sz << 6, 0x0e3f, m68k_and_to_data);
        eu.set_instruction(0xc100 | sz << 6, 0x0e3f, m68k_and_to_mem);
        eu.set_instruction(0xb100 | sz << 6, 0x0e3f, m68k_eor);
    }
}

fn op_size(op: u16) -> Result<Size, CpuException> {
    Size::from_bits(op >> 6).ok_or(CpuException::Illegal)
}

fn logical_to_data(op: u16, c: &mut Context, f: fn(u32, u32) -> u32) -> Exec {
    let size = op_size(op)?;
    let mut off = 2;
    let src = ea::resolve(c, op >> 3 & 7, op & 7, size, &mut off)?;
    if matches!(src, Ea::An(_)) {
        return Err(CpuException::Illegal);
    }
    let s = ea::read(c, src, size)?;
    let n = usize::from(op >> 9 & 7);
    let r = size.uvalue(f(c.regs.d[n], s));
    c.regs.set_d_sized(n, size, r);
    c.regs.sr.set_cc(size.svalue(r));
    c.regs.pc = c.regs.pc.wrapping_add(off);
    Ok(())
}

fn logical_to_mem(op: u16, c: &mut Context, f: fn(u32, u32) -> u32) -> Exec {
    let size = op_size(op)?;
    let mut off = 2;
    let dst = ea::resolve_dst(c, op >> 3 & 7, op & 7, size, &mut off)?;
    if !matches!(dst, Ea::Mem { .. }) {
        return Err(CpuException::Illegal);
    }
    let d = ea::read(c, dst, size)?;
    let s = size.uvalue(c.regs.d[usize::from(op >> 9 & 7)]);
    let r = size.uvalue(f(d, s));
    ea::write(c, dst, size, r)?;
    c.regs.sr.set_cc(size.svalue(r));
    c.regs.pc = c.regs.pc.wrapping_add(off);
    Ok(())
}

fn m68k_or_to_data(op: u16, c: &mut Context) -> Exec {
    logical_to_data(op, c, |d, s| d | s)
}

fn m68k_or_to_mem(op: u16, c: &mut Context) -> Exec {
    logical_to_mem(op, c, |d, s| d | s)
}

fn m68k_and_to_data(op: u16, c: &mut Context) -> Exec {
    logical_to_data(op, c, |d, s| d & s)
}

fn m68k_and_to_mem(op: u16, c: &mut Context) -> Exec {
    logical_to_mem(op, c, |d, s| d & s)
}

/// EOR only exists in the register-to-EA direction, and the EA may be a
/// data register.
fn m68k_eor(op: u16, c: &mut Context) -> Exec {
    let size = op_size(op)?;
    let mut off = 2;
    let dst = ea::resolve_dst(c, op >> 3 & 7, op & 7, size, &mut off)?;
    if matches!(dst, Ea::An(_)) {
        return Err(CpuException::Illegal);
    }
    let d = ea::read(c, dst, size)?;
    let s = size.uvalue(c.regs.d[usize::from(op >> 9 & 7)]);
    let r = size.uvalue(d ^ s);
    ea::write(c, dst, size, r)?;
    c.regs.sr.set_cc(size.svalue(r));
    c.regs.pc = c.regs.pc.wrapping_add(off);
    Ok(())
}
