//! Opcode family 0: immediate arithmetic/logical forms (including the
//! CCR/SR targets), bit manipulation, and MOVEP.

use crate::arith::{add_set, cmp_set, sub_set};
use crate::cpu::Context;
use crate::ea::{self, Ea};
use crate::exceptions::CpuException;
use crate::exec::{Exec, ExecUnit};
use crate::size::Size;

pub(crate) fn install(eu: &mut ExecUnit) {
    for sz in 0..3u16 {
        eu.set_instruction(0x0000 | sz << 6, 0x003f, m68k_ori);
        eu.set_instruction(0x0200 | sz << 6, 0x003f, m68k_andi);
        eu.set_instruction(0x0400 | sz << 6, 0x003f, m68k_subi);
        eu.set_instruction(0x0600 | sz << 6, 0x003f, m68k_addi);
        eu.set_instruction(0x0a00 | sz << 6, 0x003f, m68k_eori);
        eu.set_instruction(0x0c00 | sz << 6, 0x003f, m68k_cmpi);
    }
    // The CCR/SR forms occupy the immediate-destination encodings of the
    // byte and word patterns above.
    eu.set_instruction(0x003c, 0x0000, m68k_ori_to_ccr);
    eu.set_instruction(0x007c, 0x0000, m68k_ori_to_sr);
    eu.set_instruction(0x023c, 0x0000, m68k_andi_to_ccr);
    eu.set_instruction(0x027c, 0x0000, m68k_andi_to_sr);
    eu.set_instruction(0x0a3c, 0x0000, m68k_eori_to_ccr);
    eu.set_instruction(0x0a7c, 0x0000, m68k_eori_to_sr);
    eu.set_instruction(0x0800, 0x00ff, m68k_bit_static);
    eu.set_instruction(0x0100, 0x0eff, m68k_bit_dynamic);
    // MOVEP reclaims the address-register slots of the dynamic bit forms.
    eu.set_instruction(0x0108, 0x0ec7, m68k_movep);
}

fn op_size(op: u16) -> Result<Size, CpuException> {
    Size::from_bits(op >> 6).ok_or(CpuException::Illegal)
}

/// Fetch the immediate operand, which precedes any EA extension words.
fn immediate(c: &Context, size: Size, off: &mut u32) -> Result<u32, CpuException> {
    let value = match size {
        Size::Byte => u32::from(c.fetch_16(*off)?) & 0xff,
        Size::Word => u32::from(c.fetch_16(*off)?),
        Size::Long => c.fetch_32(*off)?,
    };
    *off += size.aligned_bytes();
    Ok(value)
}

fn logical_immediate(op: u16, c: &mut Context, f: fn(u32, u32) -> u32) -> Exec {
    let size = op_size(op)?;
    let mut off = 2;
    let imm = immediate(c, size, &mut off)?;
    let dst = ea::resolve_dst(c, op >> 3 & 7, op & 7, size, &mut off)?;
    if matches!(dst, Ea::An(_)) {
        return Err(CpuException::Illegal);
    }
    let d = ea::read(c, dst, size)?;
    let r = size.uvalue(f(d, imm));
    ea::write(c, dst, size, r)?;
    c.regs.sr.set_cc(size.svalue(r));
    c.regs.pc = c.regs.pc.wrapping_add(off);
    Ok(())
}

fn m68k_ori(op: u16, c: &mut Context) -> Exec {
    logical_immediate(op, c, |d, s| d | s)
}

fn m68k_andi(op: u16, c: &mut Context) -> Exec {
    logical_immediate(op, c, |d, s| d & s)
}

fn m68k_eori(op: u16, c: &mut Context) -> Exec {
    logical_immediate(op, c, |d, s| d ^ s)
}

fn m68k_addi(op: u16, c: &mut Context) -> Exec {
    let size = op_size(op)?;
    let mut off = 2;
    let imm = immediate(c, size, &mut off)?;
    let dst = ea::resolve_dst(c, op >> 3 & 7, op & 7, size, &mut off)?;
    if matches!(dst, Ea::An(_)) {
        return Err(CpuException::Illegal);
    }
    let d = ea::read(c, dst, size)?;
    let r = add_set(c, size, d, imm);
    ea::write(c, dst, size, r)?;
    c.regs.pc = c.regs.pc.wrapping_add(off);
    Ok(())
}

fn m68k_subi(op: u16, c: &mut Context) -> Exec {
    let size = op_size(op)?;
    let mut off = 2;
    let imm = immediate(c, size, &mut off)?;
    let dst = ea::resolve_dst(c, op >> 3 & 7, op & 7, size, &mut off)?;
    if matches!(dst, Ea::An(_)) {
        return Err(CpuException::Illegal);
    }
    let d = ea::read(c, dst, size)?;
    let r = sub_set(c, size, d, imm);
    ea::write(c, dst, size, r)?;
    c.regs.pc = c.regs.pc.wrapping_add(off);
    Ok(())
}

fn m68k_cmpi(op: u16, c: &mut Context) -> Exec {
    let size = op_size(op)?;
    let mut off = 2;
    let imm = immediate(c, size, &mut off)?;
    let src = ea::resolve(c, op >> 3 & 7, op & 7, size, &mut off)?;
    if matches!(src, Ea::An(_) | Ea::Imm(_)) {
        return Err(CpuException::Illegal);
    }
    let d = ea::read(c, src, size)?;
    cmp_set(c, size, d, imm);
    c.regs.pc = c.regs.pc.wrapping_add(off);
    Ok(())
}

fn m68k_ori_to_ccr(_op: u16, c: &mut Context) -> Exec {
    let imm = c.fetch_16(2)? as u8;
    let ccr = c.regs.sr.ccr();
    c.regs.sr.set_ccr(ccr | imm);
    c.regs.pc = c.regs.pc.wrapping_add(4);
    Ok(())
}

fn m68k_andi_to_ccr(_op: u16, c: &mut Context) -> Exec {
    let imm = c.fetch_16(2)? as u8;
    let ccr = c.regs.sr.ccr();
    c.regs.sr.set_ccr(ccr & imm);
    c.regs.pc = c.regs.pc.wrapping_add(4);
    Ok(())
}

fn m68k_eori_to_ccr(_op: u16, c: &mut Context) -> Exec {
    let imm = c.fetch_16(2)? as u8;
    let ccr = c.regs.sr.ccr();
    c.regs.sr.set_ccr(ccr ^ imm);
    c.regs.pc = c.regs.pc.wrapping_add(4);
    Ok(())
}

fn sr_immediate(c: &mut Context, f: fn(u16, u16) -> u16) -> Exec {
    if !c.supervisor_state() {
        return Err(CpuException::Privilege);
    }
    let imm = c.fetch_16(2)?;
    let sr = c.sr();
    c.set_sr(f(sr, imm));
    c.regs.pc = c.regs.pc.wrapping_add(4);
    Ok(())
}

fn m68k_ori_to_sr(_op: u16, c: &mut Context) -> Exec {
    sr_immediate(c, |sr, imm| sr | imm)
}

fn m68k_andi_to_sr(_op: u16, c: &mut Context) -> Exec {
    sr_immediate(c, |sr, imm| sr & imm)
}

fn m68k_eori_to_sr(_op: u16, c: &mut Context) -> Exec {
    sr_immediate(c, |sr, imm| sr ^ imm)
}

/// Common tail of BTST/BCHG/BCLR/BSET once the bit number is known.
///
/// Register targets operate on all 32 bits; memory targets on a byte.
/// Only Z is affected, from the bit value before any modification.
fn bit_operate(op: u16, c: &mut Context, bitno: u32, mut off: u32) -> Exec {
    let kind = op >> 6 & 3;
    let mode = op >> 3 & 7;
    let reg = op & 7;
    let tested;
    if mode == 0 {
        let n = usize::from(reg);
        let bit = bitno % 32;
        let v = c.regs.d[n];
        tested = v >> bit & 1;
        let updated = match kind {
            0 => v,
            1 => v ^ 1 << bit,
            2 => v & !(1 << bit),
            _ => v | 1 << bit,
        };
        c.regs.d[n] = updated;
    } else {
        let bit = bitno % 8;
        let ea = if kind == 0 {
            ea::resolve(c, mode, reg, Size::Byte, &mut off)?
        } else {
            ea::resolve_dst(c, mode, reg, Size::Byte, &mut off)?
        };
        if matches!(ea, Ea::An(_) | Ea::Imm(_)) {
            return Err(CpuException::Illegal);
        }
        let v = ea::read(c, ea, Size::Byte)?;
        tested = v >> bit & 1;
        if kind != 0 {
            let updated = match kind {
                1 => v ^ 1 << bit,
                2 => v & !(1 << bit),
                _ => v | 1 << bit,
            };
            ea::write(c, ea, Size::Byte, updated)?;
        }
    }
    // Z reflects the tested bit; every other flag (including X) stands.
    let bits = c.regs.sr.ccr() & !0x04 | if tested == 0 { 0x04 } else { 0 };
    c.regs.sr.set_cc_bits(bits);
    c.regs.pc = c.regs.pc.wrapping_add(off);
    Ok(())
}

fn m68k_bit_static(op: u16, c: &mut Context) -> Exec {
    let bitno = u32::from(c.fetch_16(2)?) & 0xff;
    bit_operate(op, c, bitno, 4)
}

fn m68k_bit_dynamic(op: u16, c: &mut Context) -> Exec {
    let bitno = c.regs.d[usize::from(op >> 9 & 7)];
    bit_operate(op, c, bitno, 2)
}

/// MOVEP: byte lanes on alternating addresses, for 8-bit peripherals.
fn m68k_movep(op: u16, c: &mut Context) -> Exec {
    let dn = usize::from(op >> 9 & 7);
    let an = usize::from(op & 7);
    let bytes: u32 = if op & 0x0040 != 0 { 4 } else { 2 };
    let to_mem = op & 0x0080 != 0;
    let disp = Size::Word.svalue(u32::from(c.fetch_16(2)?)) as u32;
    let address = c.regs.a[an].wrapping_add(disp);

    if to_mem {
        for i in 0..bytes {
            let byte = (c.regs.d[dn] >> (8 * (bytes - 1 - i))) as u8;
            c.mem
                .put_8(address.wrapping_add(2 * i), byte, c.data_fc())?;
        }
    } else {
        let mut v = 0u32;
        for i in 0..bytes {
            v = v << 8 | u32::from(c.mem.get_8(address.wrapping_add(2 * i), c.data_fc())?);
        }
        if bytes == 4 {
            c.regs.d[dn] = v;
        } else {
            c.regs.set_d_sized(dn, Size::Word, v);
        }
    }
    c.regs.pc = c.regs.pc.wrapping_add(4);
    Ok(())
}
