/*!
rom.rs - the three fixed C64 ROM images (character, BASIC, KERNAL).

Sizes are enforced exactly (§6): chargen 4 KiB, basic 8 KiB, kernal 8 KiB.
ROM contents are immutable after construction (§5).
*/

use std::fs;
use std::path::Path;

use crate::error::{EmuError, EmuResult};

pub const CHARGEN_SIZE: usize = 0x1000;
pub const BASIC_SIZE: usize = 0x2000;
pub const KERNAL_SIZE: usize = 0x2000;

#[derive(Clone, Debug)]
pub struct RomSet {
    pub chargen: Box<[u8; CHARGEN_SIZE]>,
    pub basic: Box<[u8; BASIC_SIZE]>,
    pub kernal: Box<[u8; KERNAL_SIZE]>,
}

impl RomSet {
    /// Load the three ROM images from a directory (`chargen`, `basic`,
    /// `kernal` files within it), matching the original's
    /// `rom/c64/{chargen,basic,kernal}` layout.
    pub fn load_from_dir(dir: &Path) -> EmuResult<Self> {
        Ok(Self {
            chargen: load_fixed(&dir.join("chargen"), "chargen ROM")?,
            basic: load_fixed(&dir.join("basic"), "BASIC ROM")?,
            kernal: load_fixed(&dir.join("kernal"), "KERNAL ROM")?,
        })
    }

    /// Build directly from in-memory buffers (used by tests).
    pub fn from_bytes(chargen: &[u8], basic: &[u8], kernal: &[u8]) -> EmuResult<Self> {
        Ok(Self {
            chargen: to_fixed(chargen, "chargen ROM")?,
            basic: to_fixed(basic, "BASIC ROM")?,
            kernal: to_fixed(kernal, "KERNAL ROM")?,
        })
    }
}

fn load_fixed<const N: usize>(path: &Path, what: &'static str) -> EmuResult<Box<[u8; N]>> {
    let data = fs::read(path)?;
    to_fixed(&data, what)
}

fn to_fixed<const N: usize>(data: &[u8], what: &'static str) -> EmuResult<Box<[u8; N]>> {
    if data.len() != N {
        return Err(EmuError::SizeMismatch {
            what,
            expected: N,
            actual: data.len(),
        });
    }
    let mut buf = Box::new([0u8; N]);
    buf.copy_from_slice(data);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_size() {
        let err = RomSet::from_bytes(&[0; CHARGEN_SIZE], &[0; BASIC_SIZE], &[0; 10]).unwrap_err();
        match err {
            EmuError::SizeMismatch {
                what,
                expected,
                actual,
            } => {
                assert_eq!(what, "KERNAL ROM");
                assert_eq!(expected, KERNAL_SIZE);
                assert_eq!(actual, 10);
            }
            other => panic!("wrong error variant: {other:?}"),
        }
    }

    #[test]
    fn accepts_exact_sizes() {
        let roms = RomSet::from_bytes(
            &[0xAA; CHARGEN_SIZE],
            &[0xBB; BASIC_SIZE],
            &[0xCC; KERNAL_SIZE],
        )
        .unwrap();
        assert_eq!(roms.chargen[0], 0xAA);
        assert_eq!(roms.basic[0], 0xBB);
        assert_eq!(roms.kernal[0], 0xCC);
    }
}
