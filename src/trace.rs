/*!
trace.rs - per-instruction trace line formatting (§6).

Deliberately independent of the `log` crate: the original's trace output
(`original_source/emu6502/emmain.c`'s trace helpers) writes straight to a
`FILE*` regardless of any other diagnostic channel, and this crate keeps
that separation — `log::debug!` covers ambient diagnostics (ROM loads,
hook registration, ROM-call dispatch), while trace lines are a
spec-mandated, fixed-width format written directly to whatever sink
`main` configured (stdout or `--trace-file`).

Line shape: `PC  bytes  mnemonic operand  A X Y S  flags  IC`, flags
rendered as `NV-BDIZC` with a `.` standing in for each clear bit.
*/

use std::fmt::Write as _;

use crate::bits::{FLAG_B, FLAG_C, FLAG_D, FLAG_I, FLAG_N, FLAG_V, FLAG_Z};
use crate::cpu::Regs;

/// Render the flag register as an 8-character string, one letter per
/// flag (`N V - B D I Z C`), `.` where the bit is clear. Bit 5 (unused)
/// is always shown as `-`.
pub fn flags_string(p: u8) -> String {
    let bit = |mask: u8, ch: char| if p & mask != 0 { ch } else { '.' };
    format!(
        "{}{}-{}{}{}{}{}",
        bit(FLAG_N, 'N'),
        bit(FLAG_V, 'V'),
        bit(FLAG_B, 'B'),
        bit(FLAG_D, 'D'),
        bit(FLAG_I, 'I'),
        bit(FLAG_Z, 'Z'),
        bit(FLAG_C, 'C'),
    )
}

/// Format one trace line for the instruction about to execute at
/// `pc_at_fetch`, given its raw bytes (opcode plus operand, already
/// fetched) and the register file as it stood before execution.
pub fn format_line(pc_at_fetch: u16, raw_bytes: &[u8], mnemonic_text: &str, regs: &Regs) -> String {
    let mut bytes_col = String::new();
    for b in raw_bytes {
        let _ = write!(bytes_col, "{b:02X} ");
    }
    format!(
        "{pc_at_fetch:04X}  {bytes_col:<9}{mnemonic_text:<16} A:{a:02X} X:{x:02X} Y:{y:02X} S:{s:02X} P:{p:02X} [{flags}] IC:{ic:09X}",
        a = regs.a,
        x = regs.x,
        y = regs.y,
        s = regs.s,
        p = regs.p,
        flags = flags_string(regs.p),
        ic = regs.ic,
    )
}
