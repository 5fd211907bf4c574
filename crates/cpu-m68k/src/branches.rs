//! Control flow: Bcc, BRA, BSR, DBcc, Scc, JMP, JSR, RTS, RTR, RTE.

use crate::cpu::Context;
use crate::ea::{self, Ea};
use crate::exceptions::CpuException;
use crate::exec::{Exec, ExecUnit};
use crate::size::Size;

pub(crate) fn install(eu: &mut ExecUnit) {
    eu.set_instruction(0x6000, 0x00ff, m68k_bra);
    eu.set_instruction(0x6100, 0x00ff, m68k_bsr);
    for cond in 2..16u16 {
        eu.set_instruction(0x6000 | cond << 8, 0x00ff, m68k_bcc);
    }
    eu.set_instruction(0x50c0, 0x0f3f, m68k_scc);
    // DBcc reclaims Scc's address-register slots.
    eu.set_instruction(0x50c8, 0x0f07, m68k_dbcc);
    eu.set_instruction(0x4e80, 0x003f, m68k_jsr);
    eu.set_instruction(0x4ec0, 0x003f, m68k_jmp);
    eu.set_instruction(0x4e73, 0x0000, m68k_rte);
    eu.set_instruction(0x4e75, 0x0000, m68k_rts);
    eu.set_instruction(0x4e77, 0x0000, m68k_rtr);
}

/// Decode the branch displacement: the byte embedded in the opcode, or a
/// word extension when that byte is zero. Returns `(disp, ext_len)`.
fn branch_displacement(op: u16, c: &Context) -> Result<(u32, u32), CpuException> {
    let disp8 = op & 0xff;
    if disp8 == 0 {
        let disp = Size::Word.svalue(u32::from(c.fetch_16(2)?)) as u32;
        Ok((disp, 2))
    } else {
        Ok((Size::Byte.svalue(u32::from(disp8)) as u32, 0))
    }
}

fn m68k_bra(op: u16, c: &mut Context) -> Exec {
    let (disp, _) = branch_displacement(op, c)?;
    log::trace!("bra {:#08x}", c.regs.pc.wrapping_add(2).wrapping_add(disp));
    c.regs.pc = c.regs.pc.wrapping_add(2).wrapping_add(disp);
    Ok(())
}

fn m68k_bsr(op: u16, c: &mut Context) -> Exec {
    let (disp, ext) = branch_displacement(op, c)?;
    log::trace!("bsr {:#08x}", c.regs.pc.wrapping_add(2).wrapping_add(disp));
    let ret = c.regs.pc.wrapping_add(2).wrapping_add(ext);
    c.regs.a[7] = c.regs.a[7].wrapping_sub(4);
    c.mem.put_32(c.regs.a[7], ret, c.data_fc())?;
    c.regs.pc = c.regs.pc.wrapping_add(2).wrapping_add(disp);
    Ok(())
}

fn m68k_bcc(op: u16, c: &mut Context) -> Exec {
    let (disp, ext) = branch_displacement(op, c)?;
    let taken = c.regs.sr.test(op >> 8);
    c.regs.pc = c
        .regs
        .pc
        .wrapping_add(2)
        .wrapping_add(if taken { disp } else { ext });
    Ok(())
}

fn m68k_scc(op: u16, c: &mut Context) -> Exec {
    let mut off = 2;
    let dst = ea::resolve_dst(c, op >> 3 & 7, op & 7, Size::Byte, &mut off)?;
    if matches!(dst, Ea::An(_)) {
        return Err(CpuException::Illegal);
    }
    let value = if c.regs.sr.test(op >> 8) { 0xff } else { 0x00 };
    ea::write(c, dst, Size::Byte, value)?;
    c.regs.pc = c.regs.pc.wrapping_add(off);
    Ok(())
}

fn m68k_dbcc(op: u16, c: &mut Context) -> Exec {
    let n = usize::from(op & 7);
    if c.regs.sr.test(op >> 8) {
        c.regs.pc = c.regs.pc.wrapping_add(4);
        return Ok(());
    }
    let disp = Size::Word.svalue(u32::from(c.fetch_16(2)?)) as u32;
    let counter = (c.regs.d[n] as u16).wrapping_sub(1);
    c.regs.set_d_sized(n, Size::Word, u32::from(counter));
    if counter == 0xffff {
        c.regs.pc = c.regs.pc.wrapping_add(4);
    } else {
        c.regs.pc = c.regs.pc.wrapping_add(2).wrapping_add(disp);
    }
    Ok(())
}

fn m68k_jsr(op: u16, c: &mut Context) -> Exec {
    let mut off = 2;
    let target = ea::resolve_control(c, op >> 3 & 7, op & 7, &mut off)?;
    let ret = c.regs.pc.wrapping_add(off);
    c.regs.a[7] = c.regs.a[7].wrapping_sub(4);
    c.mem.put_32(c.regs.a[7], ret, c.data_fc())?;
    log::trace!("jsr {target:#08x}");
    c.regs.pc = target;
    Ok(())
}

fn m68k_jmp(op: u16, c: &mut Context) -> Exec {
    let mut off = 2;
    let target = ea::resolve_control(c, op >> 3 & 7, op & 7, &mut off)?;
    c.regs.pc = target;
    Ok(())
}

fn m68k_rts(_op: u16, c: &mut Context) -> Exec {
    let pc = c.mem.get_32(c.regs.a[7], c.data_fc())?;
    c.regs.a[7] = c.regs.a[7].wrapping_add(4);
    c.regs.pc = pc;
    Ok(())
}

fn m68k_rtr(_op: u16, c: &mut Context) -> Exec {
    let ccr = c.mem.get_16(c.regs.a[7], c.data_fc())?;
    let pc = c.mem.get_32(c.regs.a[7].wrapping_add(2), c.data_fc())?;
    c.regs.a[7] = c.regs.a[7].wrapping_add(6);
    c.regs.sr.set_ccr(ccr as u8);
    c.regs.pc = pc;
    Ok(())
}

fn m68k_rte(_op: u16, c: &mut Context) -> Exec {
    if !c.supervisor_state() {
        return Err(CpuException::Privilege);
    }
    let sp = c.regs.a[7];
    let sr = c.mem.get_16(sp, c.data_fc())?;
    let pc = c.mem.get_32(sp.wrapping_add(2), c.data_fc())?;
    c.regs.a[7] = sp.wrapping_add(6);
    c.set_sr(sr);
    c.regs.pc = pc;
    Ok(())
}
