//! Single-operand and system instructions: NEGX, CLR, NEG, NOT, NBCD,
//! SWAP, EXT, TST, TAS, CHK, LINK, UNLK, MOVE to/from SR/CCR/USP, TRAP,
//! TRAPV, RESET, NOP, STOP.

use crate::arith::sbcd_core;
use crate::cpu::Context;
use crate::ea::{self, Ea};
use crate::exceptions::CpuException;
use crate::exec::{Exec, ExecUnit};
use crate::size::Size;
use crate::status::ccr_bits;

pub(crate) fn install(eu: &mut ExecUnit) {
    for sz in 0..3u16 {
        eu.set_instruction(0x4000 | sz << 6, 0x003f, m68k_negx);
        eu.set_instruction(0x4200 | sz << 6, 0x003f, m68k_clr);
        eu.set_instruction(0x4400 | sz << 6, 0x003f, m68k_neg);
        eu.set_instruction(0x4600 | sz << 6, 0x003f, m68k_not);
        eu.set_instruction(0x4a00 | sz << 6, 0x003f, m68k_tst);
    }
    eu.set_instruction(0x40c0, 0x003f, m68k_move_from_sr);
    eu.set_instruction(0x44c0, 0x003f, m68k_move_to_ccr);
    eu.set_instruction(0x46c0, 0x003f, m68k_move_to_sr);
    eu.set_instruction(0x4800, 0x003f, m68k_nbcd);
    // SWAP and EXT reclaim the register-direct slots of PEA and MOVEM.
    eu.set_instruction(0x4840, 0x0007, m68k_swap);
    eu.set_instruction(0x4880, 0x0007, m68k_ext);
    eu.set_instruction(0x48c0, 0x0007, m68k_ext);
    eu.set_instruction(0x4ac0, 0x003f, m68k_tas);
    // The designated illegal-instruction opcode sits in TAS's pattern.
    eu.set_instruction(0x4afc, 0x0000, m68k_illegal);
    eu.set_instruction(0x4180, 0x0e3f, m68k_chk);
    eu.set_instruction(0x4e40, 0x000f, m68k_trap);
    eu.set_instruction(0x4e50, 0x0007, m68k_link);
    eu.set_instruction(0x4e58, 0x0007, m68k_unlk);
    eu.set_instruction(0x4e60, 0x000f, m68k_move_usp);
    eu.set_instruction(0x4e70, 0x0000, m68k_reset);
    eu.set_instruction(0x4e71, 0x0000, m68k_nop);
    eu.set_instruction(0x4e72, 0x0000, m68k_stop);
    eu.set_instruction(0x4e76, 0x0000, m68k_trapv);
}

fn op_size(op: u16) -> Result<Size, CpuException> {
    Size::from_bits(op >> 6).ok_or(CpuException::Illegal)
}

fn check_supervisor(c: &Context) -> Exec {
    if c.supervisor_state() {
        Ok(())
    } else {
        Err(CpuException::Privilege)
    }
}

fn m68k_negx(op: u16, c: &mut Context) -> Exec {
    let size = op_size(op)?;
    let mut off = 2;
    let dst = ea::resolve_dst(c, op >> 3 & 7, op & 7, size, &mut off)?;
    if matches!(dst, Ea::An(_)) {
        return Err(CpuException::Illegal);
    }
    let v = ea::read(c, dst, size)?;
    let x = u32::from(c.regs.sr.x());
    let r = size.uvalue(0u32.wrapping_sub(v).wrapping_sub(x));
    ea::write(c, dst, size, r)?;

    let true_diff = -i64::from(size.svalue(v)) - i64::from(x);
    let overflow = true_diff != i64::from(size.svalue(r));
    let borrow = v != 0 || x != 0;
    let z = c.regs.sr.eq() && r == 0;
    c.regs
        .sr
        .set_cc_bits_with_x(ccr_bits(borrow, size.msb(r), z, overflow, borrow));
    c.regs.pc = c.regs.pc.wrapping_add(off);
    Ok(())
}

fn m68k_clr(op: u16, c: &mut Context) -> Exec {
    let size = op_size(op)?;
    let mut off = 2;
    let dst = ea::resolve_dst(c, op >> 3 & 7, op & 7, size, &mut off)?;
    if matches!(dst, Ea::An(_)) {
        return Err(CpuException::Illegal);
    }
    ea::write(c, dst, size, 0)?;
    c.regs.sr.set_cc(0);
    c.regs.pc = c.regs.pc.wrapping_add(off);
    Ok(())
}

fn m68k_neg(op: u16, c: &mut Context) -> Exec {
    let size = op_size(op)?;
    let mut off = 2;
    let dst = ea::resolve_dst(c, op >> 3 & 7, op & 7, size, &mut off)?;
    if matches!(dst, Ea::An(_)) {
        return Err(CpuException::Illegal);
    }
    let v = ea::read(c, dst, size)?;
    let r = size.uvalue(0u32.wrapping_sub(v));
    ea::write(c, dst, size, r)?;
    c.regs.sr.set_cc_sub(size.svalue(r), 0, size.svalue(v));
    c.regs.pc = c.regs.pc.wrapping_add(off);
    Ok(())
}

fn m68k_not(op: u16, c: &mut Context) -> Exec {
    let size = op_size(op)?;
    let mut off = 2;
    let dst = ea::resolve_dst(c, op >> 3 & 7, op & 7, size, &mut off)?;
    if matches!(dst, Ea::An(_)) {
        return Err(CpuException::Illegal);
    }
    let v = ea::read(c, dst, size)?;
    let r = size.uvalue(!v);
    ea::write(c, dst, size, r)?;
    c.regs.sr.set_cc(size.svalue(r));
    c.regs.pc = c.regs.pc.wrapping_add(off);
    Ok(())
}

fn m68k_tst(op: u16, c: &mut Context) -> Exec {
    let size = op_size(op)?;
    let mut off = 2;
    let src = ea::resolve(c, op >> 3 & 7, op & 7, size, &mut off)?;
    if matches!(src, Ea::An(_) | Ea::Imm(_)) {
        return Err(CpuException::Illegal);
    }
    let v = ea::read(c, src, size)?;
    c.regs.sr.set_cc(size.svalue(v));
    c.regs.pc = c.regs.pc.wrapping_add(off);
    Ok(())
}

fn m68k_move_from_sr(op: u16, c: &mut Context) -> Exec {
    let mut off = 2;
    let dst = ea::resolve_dst(c, op >> 3 & 7, op & 7, Size::Word, &mut off)?;
    if matches!(dst, Ea::An(_)) {
        return Err(CpuException::Illegal);
    }
    let sr = c.sr();
    ea::write(c, dst, Size::Word, u32::from(sr))?;
    c.regs.pc = c.regs.pc.wrapping_add(off);
    Ok(())
}

fn m68k_move_to_ccr(op: u16, c: &mut Context) -> Exec {
    let mut off = 2;
    let src = ea::resolve(c, op >> 3 & 7, op & 7, Size::Word, &mut off)?;
    if matches!(src, Ea::An(_)) {
        return Err(CpuException::Illegal);
    }
    let v = ea::read(c, src, Size::Word)?;
    c.regs.sr.set_ccr(v as u8);
    c.regs.pc = c.regs.pc.wrapping_add(off);
    Ok(())
}

fn m68k_move_to_sr(op: u16, c: &mut Context) -> Exec {
    check_supervisor(c)?;
    let mut off = 2;
    let src = ea::resolve(c, op >> 3 & 7, op & 7, Size::Word, &mut off)?;
    if matches!(src, Ea::An(_)) {
        return Err(CpuException::Illegal);
    }
    let v = ea::read(c, src, Size::Word)?;
    c.set_sr(v as u16);
    c.regs.pc = c.regs.pc.wrapping_add(off);
    Ok(())
}

fn m68k_nbcd(op: u16, c: &mut Context) -> Exec {
    let mut off = 2;
    let dst = ea::resolve_dst(c, op >> 3 & 7, op & 7, Size::Byte, &mut off)?;
    if matches!(dst, Ea::An(_)) {
        return Err(CpuException::Illegal);
    }
    let v = ea::read(c, dst, Size::Byte)?;
    let x = u32::from(c.regs.sr.x());
    let (r, borrow) = sbcd_core(0, v, x);
    ea::write(c, dst, Size::Byte, r)?;
    let z = c.regs.sr.eq() && r == 0;
    c.regs
        .sr
        .set_cc_bits_with_x(ccr_bits(borrow, r & 0x80 != 0, z, false, borrow));
    c.regs.pc = c.regs.pc.wrapping_add(off);
    Ok(())
}

fn m68k_swap(op: u16, c: &mut Context) -> Exec {
    let n = usize::from(op & 7);
    let r = c.regs.d[n].rotate_left(16);
    c.regs.d[n] = r;
    c.regs.sr.set_cc(r as i32);
    c.regs.pc = c.regs.pc.wrapping_add(2);
    Ok(())
}

fn m68k_ext(op: u16, c: &mut Context) -> Exec {
    let n = usize::from(op & 7);
    if op & 0x0040 == 0 {
        // EXT.W: byte to word, upper half untouched.
        let r = Size::Byte.svalue(c.regs.d[n]) as u32;
        c.regs.set_d_sized(n, Size::Word, r);
        c.regs.sr.set_cc(Size::Word.svalue(r));
    } else {
        // EXT.L: word to long.
        let r = Size::Word.svalue(c.regs.d[n]) as u32;
        c.regs.d[n] = r;
        c.regs.sr.set_cc(r as i32);
    }
    c.regs.pc = c.regs.pc.wrapping_add(2);
    Ok(())
}

fn m68k_tas(op: u16, c: &mut Context) -> Exec {
    let mut off = 2;
    let dst = ea::resolve_dst(c, op >> 3 & 7, op & 7, Size::Byte, &mut off)?;
    if matches!(dst, Ea::An(_)) {
        return Err(CpuException::Illegal);
    }
    let v = ea::read(c, dst, Size::Byte)?;
    c.regs.sr.set_cc(Size::Byte.svalue(v));
    ea::write(c, dst, Size::Byte, v | 0x80)?;
    c.regs.pc = c.regs.pc.wrapping_add(off);
    Ok(())
}

fn m68k_illegal(_op: u16, _c: &mut Context) -> Exec {
    Err(CpuException::Illegal)
}

fn m68k_chk(op: u16, c: &mut Context) -> Exec {
    let mut off = 2;
    let src = ea::resolve(c, op >> 3 & 7, op & 7, Size::Word, &mut off)?;
    if matches!(src, Ea::An(_)) {
        return Err(CpuException::Illegal);
    }
    let bound = Size::Word.svalue(ea::read(c, src, Size::Word)?);
    let value = Size::Word.svalue(c.regs.d[usize::from(op >> 9 & 7)]);
    c.regs.pc = c.regs.pc.wrapping_add(off);
    if value < 0 {
        c.regs.sr.set_cc_bits(0x08);
        return Err(CpuException::Chk);
    }
    if value > bound {
        c.regs.sr.set_cc_bits(0x00);
        return Err(CpuException::Chk);
    }
    Ok(())
}

fn m68k_trap(op: u16, c: &mut Context) -> Exec {
    c.regs.pc = c.regs.pc.wrapping_add(2);
    Err(CpuException::Trap(op & 0xf))
}

fn m68k_link(op: u16, c: &mut Context) -> Exec {
    let n = usize::from(op & 7);
    let disp = Size::Word.svalue(u32::from(c.fetch_16(2)?)) as u32;
    let sp = c.regs.a[7].wrapping_sub(4);
    let frame = if n == 7 { sp } else { c.regs.a[n] };
    c.mem.put_32(sp, frame, c.data_fc())?;
    c.regs.a[7] = sp;
    c.regs.a[n] = sp;
    c.regs.a[7] = sp.wrapping_add(disp);
    c.regs.pc = c.regs.pc.wrapping_add(4);
    Ok(())
}

fn m68k_unlk(op: u16, c: &mut Context) -> Exec {
    let n = usize::from(op & 7);
    c.regs.a[7] = c.regs.a[n];
    let v = c.mem.get_32(c.regs.a[7], c.data_fc())?;
    c.regs.a[7] = c.regs.a[7].wrapping_add(4);
    c.regs.a[n] = v;
    c.regs.pc = c.regs.pc.wrapping_add(2);
    Ok(())
}

fn m68k_move_usp(op: u16, c: &mut Context) -> Exec {
    check_supervisor(c)?;
    let n = usize::from(op & 7);
    if op & 0x0008 == 0 {
        // MOVE An,USP
        c.regs.usp = c.regs.a[n];
    } else {
        // MOVE USP,An
        c.regs.a[n] = c.regs.usp;
    }
    c.regs.pc = c.regs.pc.wrapping_add(2);
    Ok(())
}

fn m68k_reset(_op: u16, c: &mut Context) -> Exec {
    check_supervisor(c)?;
    // External device reset is not modeled.
    c.regs.pc = c.regs.pc.wrapping_add(2);
    Ok(())
}

fn m68k_nop(_op: u16, c: &mut Context) -> Exec {
    c.regs.pc = c.regs.pc.wrapping_add(2);
    Ok(())
}

fn m68k_stop(_op: u16, c: &mut Context) -> Exec {
    check_supervisor(c)?;
    let v = c.fetch_16(2)?;
    c.set_sr(v);
    c.regs.pc = c.regs.pc.wrapping_add(4);
    // Park until the next serviced interrupt.
    c.set_stopped();
    Ok(())
}

fn m68k_trapv(_op: u16, c: &mut Context) -> Exec {
    c.regs.pc = c.regs.pc.wrapping_add(2);
    if c.regs.sr.vs() {
        return Err(CpuException::Trapv);
    }
    Ok(())
}
