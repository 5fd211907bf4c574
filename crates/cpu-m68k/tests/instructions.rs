//! Instruction-level behavior tests against a small RAM machine.

mod common;

use common::{FC, setup, step, write_words};
use cpu_m68k::Step;

const X: u8 = 0x10;
const N: u8 = 0x08;
const Z: u8 = 0x04;
const V: u8 = 0x02;
const C: u8 = 0x01;

#[test]
fn addq_w_carries_into_x_and_z() {
    let (mut c, eu) = setup(0x4000);
    c.regs.pc = 0x1000;
    c.regs.d[0] = 0x0000_ffff;
    write_words(&c, 0x1000, &[0x5240]); // ADDQ.W #1,D0
    step(&mut c, &eu);
    assert_eq!(c.regs.d[0], 0x0000_0000);
    assert_eq!(c.regs.sr.ccr(), X | Z | C);
    assert_eq!(c.regs.pc, 0x1002);
}

#[test]
fn addq_to_address_register_skips_flags() {
    let (mut c, eu) = setup(0x4000);
    c.regs.pc = 0x1000;
    c.regs.a[1] = 0xffff_ffff;
    c.regs.sr.set_ccr(0);
    write_words(&c, 0x1000, &[0x5249]); // ADDQ.W #1,A1
    step(&mut c, &eu);
    assert_eq!(c.regs.a[1], 0);
    assert_eq!(c.regs.sr.ccr(), 0, "ADDQ to An leaves the flags alone");
}

#[test]
fn sub_word_signed_overflow() {
    let (mut c, eu) = setup(0x4000);
    c.regs.pc = 0x1000;
    c.regs.d[0] = 0x8000;
    write_words(&c, 0x1000, &[0x0440, 0x0001]); // SUBI.W #1,D0
    step(&mut c, &eu);
    assert_eq!(c.regs.d[0], 0x7fff);
    assert_eq!(c.regs.sr.ccr(), V);
}

#[test]
fn move_w_sets_nz_and_preserves_x() {
    let (mut c, eu) = setup(0x4000);
    c.regs.pc = 0x1000;
    c.regs.sr.set_ccr(X | C | V);
    c.regs.d[1] = 0x8000;
    write_words(&c, 0x1000, &[0x3001]); // MOVE.W D1,D0
    step(&mut c, &eu);
    assert_eq!(c.regs.d[0] & 0xffff, 0x8000);
    assert_eq!(c.regs.sr.ccr(), X | N, "V and C cleared, X kept");
}

#[test]
fn movea_sign_extends_without_flags() {
    let (mut c, eu) = setup(0x4000);
    c.regs.pc = 0x1000;
    c.regs.sr.set_ccr(Z);
    write_words(&c, 0x1000, &[0x307c, 0x8000]); // MOVEA.W #$8000,A0
    step(&mut c, &eu);
    assert_eq!(c.regs.a[0], 0xffff_8000);
    assert_eq!(c.regs.sr.ccr(), Z);
}

#[test]
fn movem_l_predec_pushes_d0_high() {
    let (mut c, eu) = setup(0x4000);
    c.regs.pc = 0x2000;
    c.regs.d[0] = 1;
    c.regs.d[1] = 2;
    c.regs.d[2] = 3;
    c.regs.a[7] = 0x1000;
    write_words(&c, 0x2000, &[0x48e7, 0xe000]); // MOVEM.L D0-D2,-(A7)
    step(&mut c, &eu);
    assert_eq!(c.regs.a[7], 0xff4);
    assert_eq!(c.mem.get_32(0xff4, FC).unwrap(), 3);
    assert_eq!(c.mem.get_32(0xff8, FC).unwrap(), 2);
    assert_eq!(c.mem.get_32(0xffc, FC).unwrap(), 1);
}

#[test]
fn movem_w_postinc_sign_extends() {
    let (mut c, eu) = setup(0x4000);
    c.regs.pc = 0x2000;
    c.regs.a[0] = 0x3000;
    c.mem.put_16(0x3000, 0x8001, FC).unwrap();
    c.mem.put_16(0x3002, 0x1234, FC).unwrap();
    write_words(&c, 0x2000, &[0x4c98, 0x0003]); // MOVEM.W (A0)+,D0-D1
    step(&mut c, &eu);
    assert_eq!(c.regs.d[0], 0xffff_8001);
    assert_eq!(c.regs.d[1], 0x0000_1234);
    assert_eq!(c.regs.a[0], 0x3004);
}

#[test]
fn bsr_rts_round_trip() {
    let (mut c, eu) = setup(0x4000);
    c.regs.pc = 0x1000;
    c.regs.a[7] = 0x2000;
    write_words(&c, 0x1000, &[0x6104]); // BSR.S +4
    write_words(&c, 0x1006, &[0x4e75]); // RTS at the target
    step(&mut c, &eu);
    assert_eq!(c.regs.pc, 0x1006);
    assert_eq!(c.regs.a[7], 0x1ffc);
    step(&mut c, &eu);
    assert_eq!(c.regs.pc, 0x1002, "RTS returns past the BSR");
    assert_eq!(c.regs.a[7], 0x2000);
}

#[test]
fn bcc_takes_word_displacement_when_byte_is_zero() {
    let (mut c, eu) = setup(0x4000);
    c.regs.pc = 0x1000;
    c.regs.sr.set_ccr(Z);
    write_words(&c, 0x1000, &[0x6700, 0x0100]); // BEQ with 16-bit disp
    step(&mut c, &eu);
    assert_eq!(c.regs.pc, 0x1102);
}

#[test]
fn bcc_not_taken_skips_extension() {
    let (mut c, eu) = setup(0x4000);
    c.regs.pc = 0x1000;
    c.regs.sr.set_ccr(0);
    write_words(&c, 0x1000, &[0x6700, 0x0100]); // BEQ, Z clear
    step(&mut c, &eu);
    assert_eq!(c.regs.pc, 0x1004);
}

#[test]
fn dbf_loops_until_minus_one() {
    let (mut c, eu) = setup(0x4000);
    c.regs.pc = 0x1000;
    c.regs.d[3] = 2;
    // DBF D3,-2 (branch back to itself)
    write_words(&c, 0x1000, &[0x51cb, 0xfffe]);
    step(&mut c, &eu);
    assert_eq!(c.regs.pc, 0x1000);
    step(&mut c, &eu);
    assert_eq!(c.regs.pc, 0x1000);
    step(&mut c, &eu);
    assert_eq!(c.regs.pc, 0x1004, "counter expired");
    assert_eq!(c.regs.d[3] & 0xffff, 0xffff);
}

#[test]
fn link_and_unlk_restore_the_frame() {
    let (mut c, eu) = setup(0x4000);
    c.regs.pc = 0x1000;
    c.regs.a[6] = 0xdead_0000;
    c.regs.a[7] = 0x2000;
    write_words(&c, 0x1000, &[0x4e56, 0xfff0]); // LINK A6,#-16
    write_words(&c, 0x1004, &[0x4e5e]); // UNLK A6
    step(&mut c, &eu);
    assert_eq!(c.regs.a[6], 0x1ffc);
    assert_eq!(c.regs.a[7], 0x1fec);
    assert_eq!(c.mem.get_32(0x1ffc, FC).unwrap(), 0xdead_0000);
    step(&mut c, &eu);
    assert_eq!(c.regs.a[6], 0xdead_0000);
    assert_eq!(c.regs.a[7], 0x2000);
}

#[test]
fn privilege_swap_keeps_both_stacks() {
    let (mut c, eu) = setup(0x4000);
    c.regs.pc = 0x1000;
    c.regs.a[7] = 0x3000; // supervisor stack
    c.regs.usp = 0x2800;
    // Drop to user mode: ANDI.W #$DFFF,SR
    write_words(&c, 0x1000, &[0x027c, 0xdfff]);
    step(&mut c, &eu);
    assert!(!c.supervisor_state());
    assert_eq!(c.regs.a[7], 0x2800, "A7 is now the user stack");
    assert_eq!(c.regs.ssp, 0x3000, "supervisor stack preserved");
}

#[test]
fn mulu_word_into_full_register() {
    let (mut c, eu) = setup(0x4000);
    c.regs.pc = 0x1000;
    c.regs.d[0] = 0xffff;
    c.regs.d[1] = 0x2_ffff; // only the low word participates
    write_words(&c, 0x1000, &[0xc0c1]); // MULU.W D1,D0
    step(&mut c, &eu);
    assert_eq!(c.regs.d[0], 0xffff * 0xffff);
    assert_eq!(c.regs.sr.ccr() & (Z | C), 0);
}

#[test]
fn divu_packs_remainder_and_quotient() {
    let (mut c, eu) = setup(0x4000);
    c.regs.pc = 0x1000;
    c.regs.d[0] = 100_007;
    write_words(&c, 0x1000, &[0x80fc, 0x0064]); // DIVU.W #100,D0
    step(&mut c, &eu);
    assert_eq!(c.regs.d[0], 7 << 16 | 1000);
}

#[test]
fn divu_overflow_sets_v_and_keeps_destination() {
    let (mut c, eu) = setup(0x4000);
    c.regs.pc = 0x1000;
    c.regs.d[0] = 0x0012_0000;
    write_words(&c, 0x1000, &[0x80fc, 0x0001]); // DIVU.W #1,D0
    step(&mut c, &eu);
    assert_eq!(c.regs.d[0], 0x0012_0000);
    assert_ne!(c.regs.sr.ccr() & V, 0);
}

#[test]
fn asl_b_shifts_into_carry_and_x() {
    let (mut c, eu) = setup(0x4000);
    c.regs.pc = 0x1000;
    c.regs.d[0] = 0x81;
    write_words(&c, 0x1000, &[0xe308]); // LSL.B #1,D0
    step(&mut c, &eu);
    assert_eq!(c.regs.d[0] & 0xff, 0x02);
    let ccr = c.regs.sr.ccr();
    assert_ne!(ccr & C, 0);
    assert_ne!(ccr & X, 0);
    assert_eq!(ccr & Z, 0);
}

#[test]
fn zero_count_shift_clears_c_keeps_x() {
    let (mut c, eu) = setup(0x4000);
    c.regs.pc = 0x1000;
    c.regs.sr.set_ccr(X | C);
    c.regs.d[0] = 0x40;
    c.regs.d[1] = 0; // shift count
    write_words(&c, 0x1000, &[0xe328]); // LSL.B D1,D0
    step(&mut c, &eu);
    assert_eq!(c.regs.d[0] & 0xff, 0x40);
    let ccr = c.regs.sr.ccr();
    assert_eq!(ccr & C, 0, "C cleared on zero count");
    assert_ne!(ccr & X, 0, "X untouched on zero count");
}

#[test]
fn roxr_rotates_through_x() {
    let (mut c, eu) = setup(0x4000);
    c.regs.pc = 0x1000;
    c.regs.sr.set_ccr(X);
    c.regs.d[0] = 0x01;
    write_words(&c, 0x1000, &[0xe210]); // ROXR.B #1,D0
    step(&mut c, &eu);
    assert_eq!(c.regs.d[0] & 0xff, 0x80, "old X came in at the top");
    let ccr = c.regs.sr.ccr();
    assert_ne!(ccr & C, 0, "bit 0 went out to C");
    assert_ne!(ccr & X, 0);
    assert_ne!(ccr & N, 0);
}

#[test]
fn btst_only_touches_z() {
    let (mut c, eu) = setup(0x4000);
    c.regs.pc = 0x1000;
    c.regs.sr.set_ccr(X | N | V | C);
    c.regs.d[0] = 0x08;
    write_words(&c, 0x1000, &[0x0800, 0x0003]); // BTST #3,D0
    step(&mut c, &eu);
    assert_eq!(c.regs.sr.ccr(), X | N | V | C, "bit set, Z stays clear");
    write_words(&c, 0x1004, &[0x0800, 0x0002]); // BTST #2,D0
    step(&mut c, &eu);
    assert_eq!(c.regs.sr.ccr(), X | N | V | C | Z);
}

#[test]
fn abcd_adds_decimal_digits() {
    let (mut c, eu) = setup(0x4000);
    c.regs.pc = 0x1000;
    c.regs.sr.set_ccr(0);
    c.regs.d[0] = 0x19;
    c.regs.d[1] = 0x03;
    write_words(&c, 0x1000, &[0xc101]); // ABCD D1,D0
    step(&mut c, &eu);
    assert_eq!(c.regs.d[0] & 0xff, 0x22);
    assert_eq!(c.regs.sr.ccr() & (C | X), 0);
}

#[test]
fn byte_postincrement_on_a7_steps_by_two() {
    let (mut c, eu) = setup(0x4000);
    c.regs.pc = 0x1000;
    c.regs.a[7] = 0x2000;
    c.mem.put_8(0x2000, 0x7f, FC).unwrap();
    write_words(&c, 0x1000, &[0x101f]); // MOVE.B (A7)+,D0
    step(&mut c, &eu);
    assert_eq!(c.regs.d[0] & 0xff, 0x7f);
    assert_eq!(c.regs.a[7], 0x2002, "A7 stays even");
}

#[test]
fn pc_relative_source() {
    let (mut c, eu) = setup(0x4000);
    c.regs.pc = 0x1000;
    write_words(&c, 0x1000, &[0x303a, 0x0006]); // MOVE.W 6(PC),D0
    c.mem.put_16(0x1008, 0xabcd, FC).unwrap();
    step(&mut c, &eu);
    assert_eq!(c.regs.d[0] & 0xffff, 0xabcd);
}

#[test]
fn indexed_addressing_with_long_index() {
    let (mut c, eu) = setup(0x8000);
    c.regs.pc = 0x1000;
    c.regs.a[0] = 0x2000;
    c.regs.d[2] = 0x100;
    // MOVE.W 4(A0,D2.L),D0
    write_words(&c, 0x1000, &[0x3030, 0x2804]);
    c.mem.put_16(0x2104, 0x5a5a, FC).unwrap();
    step(&mut c, &eu);
    assert_eq!(c.regs.d[0] & 0xffff, 0x5a5a);
}

#[test]
fn stop_parks_until_interrupt() {
    let (mut c, eu) = setup(0x4000);
    c.regs.pc = 0x1000;
    c.regs.a[7] = 0x3000;
    write_words(&c, 0x1000, &[0x4e72, 0x2000]); // STOP #$2000
    c.mem.put_32(0x64, 0x2000, FC).unwrap(); // autovector level 1
    step(&mut c, &eu);
    assert!(c.is_stopped());
    assert_eq!(step(&mut c, &eu), Step::Stopped);
    c.interrupt(1, 0x19);
    assert_eq!(step(&mut c, &eu), Step::Executed);
    assert!(!c.is_stopped());
    assert_eq!(c.regs.pc, 0x2000);
}
