//! Instruction-table population.
//!
//! Install order matters within an opcode family: narrower patterns are
//! installed after the broad ones whose slots they reclaim (SBCD over
//! OR, EXT over MOVEM, CMPM over EOR, and so on). Each module keeps its
//! own family ordered; the cross-module constraints are encoded here.

use crate::exec::ExecUnit;

pub(crate) fn install_instructions(eu: &mut ExecUnit) {
    crate::immediates::install(eu);
    crate::moves::install(eu);
    // Family 4 singles override the MOVEM/PEA slots installed above.
    crate::misc::install(eu);
    // Logical ops first so the BCD/X-form/EXG patterns can reclaim
    // their register-direct slots.
    crate::logic::install(eu);
    crate::arith::install(eu);
    crate::branches::install(eu);
    crate::muldiv::install(eu);
    crate::shifts::install(eu);
}
