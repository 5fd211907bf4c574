//! Data movement: MOVE, MOVEA, MOVEQ, MOVEM, LEA, PEA, EXG.

use crate::cpu::Context;
use crate::ea::{self, Ea};
use crate::exceptions::CpuException;
use crate::exec::{Exec, ExecUnit};
use crate::size::Size;

pub(crate) fn install(eu: &mut ExecUnit) {
    eu.set_instruction(0x1000, 0x0fff, m68k_move);
    eu.set_instruction(0x2000, 0x0fff, m68k_move);
    eu.set_instruction(0x3000, 0x0fff, m68k_move);
    eu.set_instruction(0x7000, 0x0eff, m68k_moveq);
    eu.set_instruction(0x41c0, 0x0e3f, m68k_lea);
    eu.set_instruction(0x4840, 0x003f, m68k_pea);
    eu.set_instruction(0x4880, 0x003f, m68k_movem_to_mem);
    eu.set_instruction(0x48c0, 0x003f, m68k_movem_to_mem);
    eu.set_instruction(0x4c80, 0x003f, m68k_movem_to_regs);
    eu.set_instruction(0x4cc0, 0x003f, m68k_movem_to_regs);
    eu.set_instruction(0xc140, 0x0e07, m68k_exg_dd);
    eu.set_instruction(0xc148, 0x0e07, m68k_exg_aa);
    eu.set_instruction(0xc188, 0x0e07, m68k_exg_da);
}

/// Handles MOVE and MOVEA of all sizes.
fn m68k_move(op: u16, c: &mut Context) -> Exec {
    let size = Size::from_move_bits(op >> 12).ok_or(CpuException::Illegal)?;
    let mut off = 2;
    let src = ea::resolve(c, op >> 3 & 7, op & 7, size, &mut off)?;
    if size == Size::Byte && matches!(src, Ea::An(_)) {
        return Err(CpuException::Illegal);
    }
    let value = ea::read(c, src, size)?;

    let dst_mode = op >> 6 & 7;
    let dst_reg = op >> 9 & 7;
    if dst_mode == 1 {
        // MOVEA: sign-extends and leaves the condition codes alone.
        if size == Size::Byte {
            return Err(CpuException::Illegal);
        }
        c.regs.set_a_sized(usize::from(dst_reg), size, value);
    } else {
        let dst = ea::resolve_dst(c, dst_mode, dst_reg, size, &mut off)?;
        ea::write(c, dst, size, value)?;
        c.regs.sr.set_cc(size.svalue(value));
    }
    c.regs.pc = c.regs.pc.wrapping_add(off);
    Ok(())
}

fn m68k_moveq(op: u16, c: &mut Context) -> Exec {
    let value = Size::Byte.svalue(u32::from(op)) as u32;
    c.regs.d[usize::from(op >> 9 & 7)] = value;
    c.regs.sr.set_cc(value as i32);
    c.regs.pc = c.regs.pc.wrapping_add(2);
    Ok(())
}

fn m68k_lea(op: u16, c: &mut Context) -> Exec {
    let mut off = 2;
    let address = ea::resolve_control(c, op >> 3 & 7, op & 7, &mut off)?;
    c.regs.a[usize::from(op >> 9 & 7)] = address;
    c.regs.pc = c.regs.pc.wrapping_add(off);
    Ok(())
}

fn m68k_pea(op: u16, c: &mut Context) -> Exec {
    let mut off = 2;
    let address = ea::resolve_control(c, op >> 3 & 7, op & 7, &mut off)?;
    c.regs.a[7] = c.regs.a[7].wrapping_sub(4);
    c.mem.put_32(c.regs.a[7], address, c.data_fc())?;
    c.regs.pc = c.regs.pc.wrapping_add(off);
    Ok(())
}

fn movem_size(op: u16) -> Size {
    if op & 0x0040 != 0 { Size::Long } else { Size::Word }
}

fn m68k_movem_to_mem(op: u16, c: &mut Context) -> Exec {
    let size = movem_size(op);
    let mut off = 2;
    let mask = c.fetch_16(off)?;
    off += 2;
    let mode = op >> 3 & 7;
    let reg = op & 7;
    let n = usize::from(reg);
    if mode == 4 {
        // Predecrement: the mask holds A7 in bit 0 and D0 in bit 15;
        // transfers run D0-first at descending addresses.
        for i in (0..16).rev() {
            if mask & 1 << i == 0 {
                continue;
            }
            let r = 15 - i;
            let value = if r < 8 { c.regs.d[r] } else { c.regs.a[r - 8] };
            c.regs.a[n] = c.regs.a[n].wrapping_sub(size.bytes());
            size.put(&c.mem, c.regs.a[n], value, c.data_fc())?;
        }
    } else {
        let mut address = ea::resolve_control(c, mode, reg, &mut off)?;
        for i in 0..16 {
            if mask & 1 << i == 0 {
                continue;
            }
            let value = if i < 8 { c.regs.d[i] } else { c.regs.a[i - 8] };
            size.put(&c.mem, address, value, c.data_fc())?;
            address = address.wrapping_add(size.bytes());
        }
    }
    c.regs.pc = c.regs.pc.wrapping_add(off);
    Ok(())
}

fn m68k_movem_to_regs(op: u16, c: &mut Context) -> Exec {
    let size = movem_size(op);
    let mut off = 2;
    let mask = c.fetch_16(off)?;
    off += 2;
    let mode = op >> 3 & 7;
    let reg = op & 7;
    let n = usize::from(reg);

    let load = |c: &Context, address: u32| -> Result<u32, CpuException> {
        let value = size.get(&c.mem, address, c.data_fc())?;
        // Word transfers sign-extend into the full register.
        Ok(size.svalue(value) as u32)
    };

    if mode == 3 {
        // Postincrement: step the register for each transfer.
        for i in 0..16 {
            if mask & 1 << i == 0 {
                continue;
            }
            let address = c.regs.a[n];
            let value = load(c, address)?;
            c.regs.a[n] = c.regs.a[n].wrapping_add(size.bytes());
            if i < 8 {
                c.regs.d[i] = value;
            } else {
                c.regs.a[i - 8] = value;
            }
        }
    } else {
        let mut address = ea::resolve_control(c, mode, reg, &mut off)?;
        for i in 0..16 {
            if mask & 1 << i == 0 {
                continue;
            }
            let value = load(c, address)?;
            address = address.wrapping_add(size.bytes());
            if i < 8 {
                c.regs.d[i] = value;
            } else {
                c.regs.a[i - 8] = value;
            }
        }
    }
    c.regs.pc = c.regs.pc.wrapping_add(off);
    Ok(())
}

fn m68k_exg_dd(op: u16, c: &mut Context) -> Exec {
    let x = usize::from(op >> 9 & 7);
    let y = usize::from(op & 7);
    c.regs.d.swap(x, y);
    c.regs.pc = c.regs.pc.wrapping_add(2);
    Ok(())
}

fn m68k_exg_aa(op: u16, c: &mut Context) -> Exec {
    let x = usize::from(op >> 9 & 7);
    let y = usize::from(op & 7);
    c.regs.a.swap(x, y);
    c.regs.pc = c.regs.pc.wrapping_add(2);
    Ok(())
}

fn m68k_exg_da(op: u16, c: &mut Context) -> Exec {
    let x = usize::from(op >> 9 & 7);
    let y = usize::from(op & 7);
    std::mem::swap(&mut c.regs.d[x], &mut c.regs.a[y]);
    c.regs.pc = c.regs.pc.wrapping_add(2);
    Ok(())
}
