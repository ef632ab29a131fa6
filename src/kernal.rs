/*!
kernal.rs - the KERNAL ROM-call trampoline (§4.4, §4.9).

Real KERNAL routines live at fixed addresses `$F000`-`$FFFF`; this crate
never executes ROM bytes as 6502 code (the bank only has to answer
*reads*, not drive the interpreter). Instead `cpu::step` detours any
`JMP`/`JSR` targeting `>= cpu::ROM_CALL_THRESHOLD` into
[`Kernal::dispatch`], which synthesizes the routine's externally visible
effect directly against `Regs`/`Memory`, then resumes the caller as if
the routine had ended in `RTS` — mirroring `emulateC64ROM` in
`original_source/emu6502/emromc64.c`.

Zero-page locations below are the real C64 KERNAL variables the original
source names (`em.h`'s `RAM_*` constants).
*/

use crate::bits::FLAG_C;
use crate::cpu::Regs;
use crate::drive::Drive;
use crate::error::{EmuError, EmuResult};
use crate::memory::Memory;
use crate::serial::SerialBus;

const RAM_STATUS: u16 = 0x90;
const RAM_LDTND: u16 = 0x98; // number of open files
const RAM_DFLTN: u16 = 0x99; // default input device
const RAM_DFLTO: u16 = 0x9A; // default output device
const RAM_FNLEN: u16 = 0xB7;
const RAM_LA: u16 = 0xB8;
const RAM_SA: u16 = 0xB9;
const RAM_FA: u16 = 0xBA;
const RAM_FNADR: u16 = 0xBB; // word
const MAX_OPEN_FILES: usize = 10;

pub const CHKIN: u16 = 0xFFC6;
pub const GETIN: u16 = 0xFFE4;
pub const CLRCHN: u16 = 0xFFCC;
pub const CIOUT: u16 = 0xFFA8;
pub const SECOND: u16 = 0xFF93;
pub const LISTEN: u16 = 0xFFB1;
pub const UNLSN: u16 = 0xFFAE;
pub const TALK: u16 = 0xFFB4;
pub const TKSA: u16 = 0xFF96;
pub const ACPTR: u16 = 0xFFA5;
pub const UNTLK: u16 = 0xFFAB;
pub const SETNAM: u16 = 0xFFBD;
pub const SETLFS: u16 = 0xFFBA;
pub const BSOUT: u16 = 0xFFD2;
pub const LOAD: u16 = 0xFFD5;
pub const OPEN: u16 = 0xFFC0;
pub const CLOSE: u16 = 0xFFC3;
pub const CLALL: u16 = 0xFFE7;

/// KERNAL soft-error codes (the `STATUS`/carry-flag convention, §7).
#[derive(Copy, Clone, Debug)]
pub enum RomError {
    TooManyFiles = 1,
    FileOpen = 2,
    FileNotOpen = 3,
    FileNotFound = 4,
    DeviceNotPresent = 5,
    MissingFileName = 8,
    BadDeviceNumber = 9,
}

#[derive(Default)]
pub struct Kernal {
    bus: SerialBus,
    /// Parallel open-file tables: logical number, device, secondary addr.
    la_table: Vec<u8>,
    fa_table: Vec<u8>,
    sa_table: Vec<u8>,
}

impl Kernal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the zero-page defaults the real KERNAL's `IOINIT` establishes at
    /// power-on: default input device 0 (keyboard), default output device 3
    /// (screen). Since this crate never executes the reset routine itself,
    /// `Machine::new` calls this once so `CHKIN`/`BSOUT` see sane defaults.
    pub fn init_ram(&self, mem: &mut Memory) {
        mem.store(RAM_DFLTN, 0);
        mem.store(RAM_DFLTO, 3);
        mem.store(RAM_LDTND, 0);
        mem.store(RAM_STATUS, 0);
    }

    fn set_status_error(&self, mem: &mut Memory, regs: &mut Regs, code: RomError) {
        mem.store(RAM_STATUS, code as u8);
        regs.set_flag(FLAG_C, true);
    }

    fn lookup_file(&self, logical: u8) -> Option<usize> {
        self.la_table.iter().position(|&la| la == logical)
    }

    /// Dispatch a single KERNAL entry point. `drive` models device 8.
    pub fn dispatch(
        &mut self,
        regs: &mut Regs,
        mem: &mut Memory,
        drive: &mut Drive,
        addr: u16,
    ) -> EmuResult<()> {
        match addr {
            CHKIN => self.chkin(regs, mem, drive),
            GETIN => {
                // The real routine reads from the keyboard buffer; without
                // a keyboard this model has nothing to offer, so it
                // returns the same sentinel byte observed from VICE in
                // the original trace captures.
                regs.a = 0x30;
                Ok(())
            }
            CLRCHN => self.clrchn(regs, mem, drive),
            BSOUT => self.bsout(regs, mem, drive),
            CIOUT => self.ciout(regs, mem, drive),
            SECOND => self.second(regs, mem, drive),
            LISTEN => self.listen(regs, mem, drive),
            UNLSN => self.unlsn(regs, mem, drive),
            TALK => self.talk(regs, mem),
            TKSA => self.tksa(regs),
            ACPTR => self.acptr(regs, mem, drive),
            UNTLK => {
                self.bus.untalk();
                Ok(())
            }
            SETNAM => self.setnam(regs, mem),
            SETLFS => self.setlfs(regs, mem),
            LOAD => self.load(regs, mem, drive),
            OPEN => self.open(regs, mem, drive),
            CLOSE => self.close(regs, mem, drive),
            CLALL => {
                regs.a = 0;
                mem.store(RAM_LDTND, 0);
                self.la_table.clear();
                self.fa_table.clear();
                self.sa_table.clear();
                self.clrchn(regs, mem, drive)
            }
            other => Err(EmuError::UnsupportedRomCall { addr: other }),
        }
    }

    fn chkin(&mut self, regs: &mut Regs, mem: &mut Memory, _drive: &mut Drive) -> EmuResult<()> {
        let logical = regs.x;
        let row = match self.lookup_file(logical) {
            Some(row) => row,
            None => {
                self.set_status_error(mem, regs, RomError::FileNotOpen);
                return Ok(());
            }
        };
        mem.store(RAM_STATUS, 0);
        let device = self.fa_table[row];
        mem.store(RAM_LA, self.la_table[row]);
        mem.store(RAM_FA, device);
        mem.store(RAM_SA, self.sa_table[row]);
        match device {
            0 | 3 => Ok(()),
            _ => {
                regs.a = device;
                self.talk(regs, mem)?;
                regs.a = mem.load(RAM_SA);
                self.tksa(regs)
            }
        }
    }

    fn clrchn(&mut self, regs: &mut Regs, mem: &mut Memory, drive: &mut Drive) -> EmuResult<()> {
        if mem.load(RAM_DFLTO) > 3 {
            self.unlsn(regs, mem, drive)?;
        }
        if mem.load(RAM_DFLTN) > 3 {
            self.bus.untalk();
        }
        mem.store(RAM_DFLTO, 3);
        mem.store(RAM_DFLTN, 0);
        Ok(())
    }

    fn bsout(&mut self, regs: &mut Regs, mem: &mut Memory, drive: &mut Drive) -> EmuResult<()> {
        let device = mem.load(RAM_DFLTO);
        match device {
            0..=2 => Err(EmuError::InvalidDevice {
                device,
                operation: "BSOUT",
            }),
            3 => Ok(()), // screen output not modeled
            _ => self.ciout(regs, mem, drive),
        }
    }

    fn ciout(&mut self, regs: &mut Regs, _mem: &mut Memory, drive: &mut Drive) -> EmuResult<()> {
        if self.bus.device() < 8 {
            return Err(EmuError::InvalidDevice {
                device: self.bus.device(),
                operation: "CIOUT",
            });
        }
        if !self.bus.is_listening() {
            return Err(EmuError::InvalidDevice {
                device: self.bus.device(),
                operation: "CIOUT without a listener",
            });
        }
        drive.ciout(regs.a)
    }

    fn second(&mut self, regs: &mut Regs, _mem: &mut Memory, _drive: &mut Drive) -> EmuResult<()> {
        self.bus.second(regs.a)
    }

    fn listen(&mut self, regs: &mut Regs, mem: &mut Memory, drive: &mut Drive) -> EmuResult<()> {
        let device = regs.a;
        mem.store(RAM_FA, device);
        self.bus.listen(device);
        if device == 8 {
            drive.listen();
            Ok(())
        } else {
            Err(EmuError::InvalidDevice {
                device,
                operation: "LISTEN",
            })
        }
    }

    fn unlsn(&mut self, _regs: &mut Regs, mem: &mut Memory, drive: &mut Drive) -> EmuResult<()> {
        let device = mem.load(RAM_FA);
        let result = if device >= 8 {
            drive.execute_command()
        } else {
            Err(EmuError::InvalidDevice {
                device,
                operation: "UNLSN",
            })
        };
        self.bus.unlisten();
        result
    }

    fn talk(&mut self, regs: &mut Regs, mem: &mut Memory) -> EmuResult<()> {
        mem.store(RAM_FA, regs.a);
        self.bus.talk(regs.a);
        Ok(())
    }

    fn tksa(&mut self, regs: &mut Regs) -> EmuResult<()> {
        self.bus.tksa(regs.a)
    }

    fn acptr(&mut self, regs: &mut Regs, mem: &mut Memory, drive: &mut Drive) -> EmuResult<()> {
        if !self.bus.is_talking() {
            return Err(EmuError::InvalidDevice {
                device: self.bus.device(),
                operation: "ACPTR without a talker",
            });
        }
        if self.bus.device() < 8 {
            return Err(EmuError::InvalidDevice {
                device: self.bus.device(),
                operation: "ACPTR",
            });
        }
        let channel = self.bus.channel();
        regs.a = if channel == 15 {
            drive.acptr_command_channel()
        } else {
            drive.acptr_channel(channel)?
        };
        regs.set_flag(FLAG_C, false);
        let _ = mem;
        Ok(())
    }

    fn setnam(&mut self, regs: &mut Regs, mem: &mut Memory) -> EmuResult<()> {
        mem.store(RAM_FNLEN, regs.a);
        mem.store(RAM_FNADR, regs.x);
        mem.store(RAM_FNADR + 1, regs.y);
        Ok(())
    }

    fn setlfs(&mut self, regs: &mut Regs, mem: &mut Memory) -> EmuResult<()> {
        mem.store(RAM_LA, regs.a);
        mem.store(RAM_FA, regs.x);
        mem.store(RAM_SA, regs.y);
        Ok(())
    }

    fn open(&mut self, regs: &mut Regs, mem: &mut Memory, drive: &mut Drive) -> EmuResult<()> {
        let logical = mem.load(RAM_LA);
        if self.lookup_file(logical).is_some() {
            self.set_status_error(mem, regs, RomError::FileOpen);
            return Ok(());
        }
        if self.la_table.len() == MAX_OPEN_FILES {
            self.set_status_error(mem, regs, RomError::TooManyFiles);
            return Ok(());
        }
        let mut sa = mem.load(RAM_SA) | 0x60;
        mem.store(RAM_SA, sa);
        let device = mem.load(RAM_FA);

        if device >= 8 {
            let fnlen = mem.load(RAM_FNLEN);
            if fnlen > 0 {
                let fnadr = mem.load_word(RAM_FNADR);
                let name: Vec<u8> = (0..fnlen).map(|i| mem.load(fnadr + i as u16)).collect();
                self.open_disk_file(regs, mem, drive, sa, &name)?;
            }
        } else if device != 0 && device != 3 {
            return Err(EmuError::InvalidDevice {
                device,
                operation: "OPEN",
            });
        }
        sa = mem.load(RAM_SA);

        self.la_table.push(logical);
        self.fa_table.push(device);
        self.sa_table.push(sa);
        mem.store(RAM_LDTND, self.la_table.len() as u8);
        regs.set_flag(FLAG_C, false);
        Ok(())
    }

    fn open_disk_file(
        &mut self,
        regs: &mut Regs,
        mem: &mut Memory,
        drive: &mut Drive,
        sa: u8,
        name: &[u8],
    ) -> EmuResult<()> {
        regs.a = mem.load(RAM_FA);
        self.listen(regs, mem, drive)?;
        regs.a = sa;
        self.second(regs, mem, drive)?;
        if mem.load(RAM_STATUS) & 0x80 != 0 {
            self.set_status_error(mem, regs, RomError::DeviceNotPresent);
            return Ok(());
        }
        if name.first() == Some(&b'#') {
            let requested = if name.len() == 2 {
                Some(name[1] - b'0')
            } else {
                None
            };
            drive.open_buffer(sa & 0x0F, requested)?;
        } else {
            for &byte in name {
                regs.a = byte;
                self.ciout(regs, mem, drive)?;
            }
        }
        self.unlsn(regs, mem, drive)
    }

    fn close(&mut self, regs: &mut Regs, mem: &mut Memory, drive: &mut Drive) -> EmuResult<()> {
        let fd = regs.a;
        if let Some(row) = self.lookup_file(fd) {
            let device = self.fa_table[row];
            if device >= 8 {
                let sa = self.sa_table[row];
                if sa & 0x80 == 0 {
                    regs.a = device;
                    self.listen(regs, mem, drive)?;
                    regs.a = (sa & 0xEF) | 0xE0;
                    self.second(regs, mem, drive)?;
                    self.unlsn(regs, mem, drive)?;
                    drive.close_channel(sa & 0x0F);
                }
            }
            self.la_table.remove(row);
            self.fa_table.remove(row);
            self.sa_table.remove(row);
            mem.store(RAM_LDTND, self.la_table.len() as u8);
        }
        regs.set_flag(FLAG_C, false);
        Ok(())
    }

    /// LOAD is resolved by looking the filename up in the disk directory
    /// and copying its sector chain straight into RAM, rather than
    /// streaming it byte-by-byte through TALK/ACPTR/UNTLK the way a real
    /// program driving the KERNAL would observe it (§4.9; an explicit,
    /// documented simplification rather than an accidental shortcut).
    fn load(&mut self, regs: &mut Regs, mem: &mut Memory, drive: &mut Drive) -> EmuResult<()> {
        let device = mem.load(RAM_FA);
        if device != 8 {
            return Err(EmuError::InvalidDevice {
                device,
                operation: "LOAD",
            });
        }
        let fnlen = mem.load(RAM_FNLEN);
        if fnlen == 0 {
            self.set_status_error(mem, regs, RomError::MissingFileName);
            return Ok(());
        }
        let fnadr = mem.load_word(RAM_FNADR);
        let name: String = (0..fnlen)
            .map(|i| mem.load(fnadr + i as u16) as char)
            .collect();

        let entries = drive.directory()?;
        let entry = entries
            .iter()
            .find(|e| e.filename == name)
            .ok_or_else(|| {
                self.set_status_error(mem, regs, RomError::FileNotFound);
                EmuError::InvalidDevice {
                    device: 0,
                    operation: "LOAD file not found",
                }
            });
        let entry = match entry {
            Ok(e) => e,
            Err(_) => return Ok(()),
        };

        let data = drive.read_file(entry.start_track, entry.start_sector)?;
        if data.len() < 2 {
            self.set_status_error(mem, regs, RomError::FileNotFound);
            return Ok(());
        }
        let embedded_addr = crate::bits::word(data[0], data[1]);
        let secondary = mem.load(RAM_SA);
        let load_addr = if secondary & 0x01 != 0 {
            embedded_addr
        } else {
            crate::bits::word(regs.y, regs.x)
        };

        for (i, &byte) in data[2..].iter().enumerate() {
            mem.store(load_addr.wrapping_add(i as u16), byte);
        }

        let end_addr = load_addr.wrapping_add((data.len() - 2) as u16);
        regs.x = crate::bits::lo(end_addr);
        regs.y = crate::bits::hi(end_addr);
        regs.set_flag(FLAG_C, false);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rom::{BASIC_SIZE, CHARGEN_SIZE, KERNAL_SIZE, RomSet};

    fn setup() -> (Kernal, Regs, Memory, Drive) {
        let mem = Memory::new(
            RomSet::from_bytes(&[0; CHARGEN_SIZE], &[0; BASIC_SIZE], &[0; KERNAL_SIZE]).unwrap(),
        );
        (Kernal::new(), Regs::new(), mem, Drive::new())
    }

    #[test]
    fn setnam_setlfs_roundtrip_into_ram() {
        let (mut k, mut regs, mut mem, mut drive) = setup();
        mem.store(0x3000, b'A');
        mem.store(0x3001, b'B');
        regs.a = 2;
        regs.x = 0x00;
        regs.y = 0x30;
        k.dispatch(&mut regs, &mut mem, &mut drive, SETNAM).unwrap();
        assert_eq!(mem.load(RAM_FNLEN), 2);
        assert_eq!(mem.load_word(RAM_FNADR), 0x3000);

        regs.a = 5;
        regs.x = 8;
        regs.y = 96;
        k.dispatch(&mut regs, &mut mem, &mut drive, SETLFS).unwrap();
        assert_eq!(mem.load(RAM_LA), 5);
        assert_eq!(mem.load(RAM_FA), 8);
        assert_eq!(mem.load(RAM_SA), 96);
    }

    #[test]
    fn open_and_close_round_trip_keyboard_device() {
        let (mut k, mut regs, mut mem, mut drive) = setup();
        mem.store(RAM_LA, 1);
        mem.store(RAM_FA, 0);
        mem.store(RAM_SA, 0);
        mem.store(RAM_FNLEN, 0);
        k.dispatch(&mut regs, &mut mem, &mut drive, OPEN).unwrap();
        assert_eq!(mem.load(RAM_LDTND), 1);
        regs.a = 1;
        k.dispatch(&mut regs, &mut mem, &mut drive, CLOSE).unwrap();
        assert_eq!(mem.load(RAM_LDTND), 0);
    }

    #[test]
    fn open_unknown_device_errors() {
        let (mut k, mut regs, mut mem, mut drive) = setup();
        mem.store(RAM_LA, 1);
        mem.store(RAM_FA, 2);
        mem.store(RAM_FNLEN, 0);
        let err = k.dispatch(&mut regs, &mut mem, &mut drive, OPEN).unwrap_err();
        assert!(matches!(err, EmuError::InvalidDevice { .. }));
    }

    #[test]
    fn getin_returns_sentinel_byte() {
        let (mut k, mut regs, mut mem, mut drive) = setup();
        k.dispatch(&mut regs, &mut mem, &mut drive, GETIN).unwrap();
        assert_eq!(regs.a, 0x30);
    }

    #[test]
    fn ciout_without_listener_errors() {
        let (mut k, mut regs, mut mem, mut drive) = setup();
        regs.a = b'A';
        let err = k.dispatch(&mut regs, &mut mem, &mut drive, CIOUT).unwrap_err();
        assert!(matches!(err, EmuError::InvalidDevice { .. }));
    }

    #[test]
    fn listen_then_ciout_then_unlsn_runs_disk_command() {
        let (mut k, mut regs, mut mem, mut drive) = setup();
        drive.mount(vec![0u8; crate::drive::geometry::STANDARD_D64_SIZE]).unwrap();
        regs.a = 8;
        k.dispatch(&mut regs, &mut mem, &mut drive, LISTEN).unwrap();
        regs.a = 0x6F;
        k.dispatch(&mut regs, &mut mem, &mut drive, SECOND).unwrap();
        for &b in b"I" {
            regs.a = b;
            k.dispatch(&mut regs, &mut mem, &mut drive, CIOUT).unwrap();
        }
        k.dispatch(&mut regs, &mut mem, &mut drive, UNLSN).unwrap();
    }
}
