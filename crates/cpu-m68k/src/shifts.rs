//! Shifts and rotates, register and memory forms.
//!
//! The carry comes out of the dedicated shift testers: for right forms
//! the tester looks at bit `count - 1` of the original value, for left
//! forms at bit `32 - count` of the value pre-shifted to the top of the
//! 32-bit lane. Zero counts clear C and leave X alone; the rotate forms
//! never touch X.

use crate::cpu::Context;
use crate::ea::{self, Ea};
use crate::exceptions::CpuException;
use crate::exec::{Exec, ExecUnit};
use crate::size::Size;
use crate::status::ccr_bits;

pub(crate) fn install(eu: &mut ExecUnit) {
    for sz in 0..3u16 {
        eu.set_instruction(0xe000 | sz << 6, 0x0f3f, m68k_shift_register);
    }
    eu.set_instruction(0xe0c0, 0x073f, m68k_shift_memory);
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    Arith,
    Logical,
    RotateX,
    Rotate,
}

impl Kind {
    fn from_bits(bits: u16) -> Self {
        match bits & 3 {
            0 => Self::Arith,
            1 => Self::Logical,
            2 => Self::RotateX,
            _ => Self::Rotate,
        }
    }
}

fn m68k_shift_register(op: u16, c: &mut Context) -> Exec {
    let size = Size::from_bits(op >> 6).ok_or(CpuException::Illegal)?;
    let n = usize::from(op & 7);
    let left = op & 0x0100 != 0;
    let kind = Kind::from_bits(op >> 3);
    let count = if op & 0x0020 != 0 {
        c.regs.d[usize::from(op >> 9 & 7)] % 64
    } else {
        let k = u32::from(op >> 9 & 7);
        if k == 0 { 8 } else { k }
    };
    let d = size.uvalue(c.regs.d[n]);
    let r = apply(c, size, kind, left, d, count);
    c.regs.set_d_sized(n, size, r);
    c.regs.pc = c.regs.pc.wrapping_add(2);
    Ok(())
}

fn m68k_shift_memory(op: u16, c: &mut Context) -> Exec {
    let left = op & 0x0100 != 0;
    let kind = Kind::from_bits(op >> 9);
    let mut off = 2;
    let dst = ea::resolve_dst(c, op >> 3 & 7, op & 7, Size::Word, &mut off)?;
    if !matches!(dst, Ea::Mem { .. }) {
        return Err(CpuException::Illegal);
    }
    let d = ea::read(c, dst, Size::Word)?;
    let r = apply(c, Size::Word, kind, left, d, 1);
    ea::write(c, dst, Size::Word, r)?;
    c.regs.pc = c.regs.pc.wrapping_add(off);
    Ok(())
}

fn apply(c: &mut Context, size: Size, kind: Kind, left: bool, d: u32, count: u32) -> u32 {
    match (kind, left) {
        (Kind::Arith, false) => asr(c, size, d, count),
        (Kind::Arith | Kind::Logical, true) => lsl(c, size, d, count),
        (Kind::Logical, false) => lsr(c, size, d, count),
        (Kind::RotateX, false) => roxr(c, size, d, count),
        (Kind::RotateX, true) => roxl(c, size, d, count),
        (Kind::Rotate, false) => ror(c, size, d, count),
        (Kind::Rotate, true) => rol(c, size, d, count),
    }
}

/// Value shifted so its top bit sits at bit 31, for the left-shift tester.
fn to_top(size: Size, d: u32) -> i32 {
    (size.uvalue(d) << (32 - size.bits())) as i32
}

fn asr(c: &mut Context, size: Size, d: u32, count: u32) -> u32 {
    if count == 0 {
        c.regs.sr.set_cc_ror(size.svalue(d), size.svalue(d), 0);
        return d;
    }
    let r = size.uvalue((i64::from(size.svalue(d)) >> count.min(63)) as u32);
    // Counts past the operand width keep shifting out the sign bit.
    c.regs
        .sr
        .set_cc_asr(size.svalue(r), size.svalue(d), count.min(size.bits()));
    r
}

fn lsr(c: &mut Context, size: Size, d: u32, count: u32) -> u32 {
    if count == 0 {
        c.regs.sr.set_cc_ror(size.svalue(d), size.svalue(d), 0);
        return d;
    }
    let r = if count >= size.bits() { 0 } else { size.uvalue(d) >> count };
    c.regs
        .sr
        .set_cc_asr(size.svalue(r), size.uvalue(d) as i32, count);
    r
}

fn lsl(c: &mut Context, size: Size, d: u32, count: u32) -> u32 {
    if count == 0 {
        c.regs.sr.set_cc_rol(size.svalue(d), to_top(size, d), 0);
        return d;
    }
    let r = size.uvalue((u64::from(size.uvalue(d)) << count.min(63)) as u32);
    c.regs.sr.set_cc_lsl(size.svalue(r), to_top(size, d), count);
    r
}

fn ror(c: &mut Context, size: Size, d: u32, count: u32) -> u32 {
    let width = size.bits();
    if count == 0 {
        c.regs.sr.set_cc_ror(size.svalue(d), size.uvalue(d) as i32, 0);
        return d;
    }
    let by = count % width;
    let v = size.uvalue(d);
    let r = size.uvalue(if by == 0 { v } else { v >> by | v << (width - by) });
    // The carry is the last bit rotated across, at index (count-1) mod width.
    c.regs.sr.set_cc_ror(
        size.svalue(r),
        size.uvalue(d) as i32,
        (count - 1) % width + 1,
    );
    r
}

fn rol(c: &mut Context, size: Size, d: u32, count: u32) -> u32 {
    let width = size.bits();
    if count == 0 {
        c.regs.sr.set_cc_rol(size.svalue(d), to_top(size, d), 0);
        return d;
    }
    let by = count % width;
    let v = size.uvalue(d);
    let r = size.uvalue(if by == 0 { v } else { v << by | v >> (width - by) });
    c.regs
        .sr
        .set_cc_rol(size.svalue(r), to_top(size, d), (count - 1) % width + 1);
    r
}

/// Rotate right through X: a width+1-bit rotation of `value | X << width`.
fn roxr(c: &mut Context, size: Size, d: u32, count: u32) -> u32 {
    let width = size.bits();
    let x = u64::from(c.regs.sr.x());
    if count == 0 {
        let bits = ccr_bits(x != 0, size.msb(d), size.uvalue(d) == 0, false, x != 0);
        c.regs.sr.set_cc_bits(bits);
        return d;
    }
    let lane = width + 1;
    let by = count % lane;
    let chain = u64::from(size.uvalue(d)) | x << width;
    let rotated = if by == 0 {
        chain
    } else {
        (chain >> by | chain << (lane - by)) & ((1u64 << lane) - 1)
    };
    let r = size.uvalue(rotated as u32);
    let new_x = rotated >> width & 1 != 0;
    let bits = ccr_bits(new_x, size.msb(r), r == 0, false, new_x);
    c.regs.sr.set_cc_bits_with_x(bits);
    r
}

/// Rotate left through X.
fn roxl(c: &mut Context, size: Size, d: u32, count: u32) -> u32 {
    let width = size.bits();
    let x = u64::from(c.regs.sr.x());
    if count == 0 {
        let bits = ccr_bits(x != 0, size.msb(d), size.uvalue(d) == 0, false, x != 0);
        c.regs.sr.set_cc_bits(bits);
        return d;
    }
    let lane = width + 1;
    let by = count % lane;
    let chain = u64::from(size.uvalue(d)) | x << width;
    let rotated = if by == 0 {
        chain
    } else {
        (chain << by | chain >> (lane - by)) & ((1u64 << lane) - 1)
    };
    let r = size.uvalue(rotated as u32);
    let new_x = rotated >> width & 1 != 0;
    let bits = ccr_bits(new_x, size.msb(r), r == 0, false, new_x);
    c.regs.sr.set_cc_bits_with_x(bits);
    r
}
