/*!
cpu/mod.rs - the MOS 6502 interpreter: registers, the opcode table,
addressing-mode resolution, and instruction execution.
*/

pub mod addressing;
pub mod decode;
pub mod execute;
pub mod regs;

pub use execute::{step, RomCall, ROM_CALL_THRESHOLD};
pub use regs::Regs;
