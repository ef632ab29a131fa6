/*!
loader.rs - PRG and machine-state file loaders (§4.10, §6).

Three flat binary formats, each validated by exact size before anything
touches `Regs`/`Memory`:

- PRG: a 2-byte little-endian load address followed by the program body.
- Register snapshot: exactly 7 bytes (`pc_lo, pc_hi, a, x, y, s, p`).
- RAM snapshot: exactly 65536 bytes, loaded verbatim.

A size mismatch in any of the three is fatal (§7) — these are loaded once
at startup, never incrementally, so there is no partial-load state to
reconcile.
*/

use std::path::Path;

use crate::cpu::Regs;
use crate::error::{EmuError, EmuResult};
use crate::memory::{Memory, RAM_SIZE};

const REGISTER_SNAPSHOT_SIZE: usize = 7;

/// A loaded PRG: its declared load address and body bytes.
pub struct Prg {
    pub load_address: u16,
    pub data: Vec<u8>,
}

/// Parse a PRG image already read into memory: 2-byte LE load address
/// plus body.
pub fn parse_prg(bytes: &[u8]) -> EmuResult<Prg> {
    if bytes.len() < 2 {
        return Err(EmuError::SizeMismatch {
            what: "PRG file",
            expected: 2,
            actual: bytes.len(),
        });
    }
    Ok(Prg {
        load_address: crate::bits::word(bytes[0], bytes[1]),
        data: bytes[2..].to_vec(),
    })
}

/// Load a PRG from disk and copy it into RAM at its declared address.
pub fn load_prg(path: &Path, mem: &mut Memory) -> EmuResult<u16> {
    let bytes = std::fs::read(path)?;
    let prg = parse_prg(&bytes)?;
    for (i, &byte) in prg.data.iter().enumerate() {
        mem.store(prg.load_address.wrapping_add(i as u16), byte);
    }
    Ok(prg.load_address)
}

/// Load a 7-byte register snapshot (`pc_lo, pc_hi, a, x, y, s, p`) into
/// `regs`. The instruction counter is left untouched; `run` starts it
/// fresh from 0.
pub fn load_registers(path: &Path, regs: &mut Regs) -> EmuResult<()> {
    let bytes = std::fs::read(path)?;
    if bytes.len() != REGISTER_SNAPSHOT_SIZE {
        return Err(EmuError::SizeMismatch {
            what: "register snapshot",
            expected: REGISTER_SNAPSHOT_SIZE,
            actual: bytes.len(),
        });
    }
    regs.pc = crate::bits::word(bytes[0], bytes[1]);
    regs.a = bytes[2];
    regs.x = bytes[3];
    regs.y = bytes[4];
    regs.s = bytes[5];
    regs.p = bytes[6];
    Ok(())
}

/// Load a full 64 KiB RAM snapshot verbatim.
pub fn load_ram(path: &Path, mem: &mut Memory) -> EmuResult<()> {
    let bytes = std::fs::read(path)?;
    if bytes.len() != RAM_SIZE {
        return Err(EmuError::SizeMismatch {
            what: "RAM snapshot",
            expected: RAM_SIZE,
            actual: bytes.len(),
        });
    }
    mem.ram.copy_from_slice(&bytes);
    Ok(())
}
