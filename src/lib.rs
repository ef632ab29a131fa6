/*!
c64em - a MOS 6502 interpreter and Commodore 64 / 1541 loader emulation
core.

Runs 6502 machine code against banked C64 memory, trampolining KERNAL
ROM calls into a modeled serial bus and 1541 disk drive instead of
executing ROM bytes. See `SPEC_FULL.md` for the full component design.
*/

pub mod bits;
pub mod cpu;
pub mod drive;
pub mod error;
pub mod hooks;
pub mod kernal;
pub mod loader;
pub mod machine;
pub mod memory;
pub mod rom;
pub mod serial;
pub mod trace;

pub use error::{EmuError, EmuResult};
pub use machine::Machine;
