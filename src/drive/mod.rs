/*!
drive/mod.rs - the 1541 disk drive model: command buffer, four sector
buffers, channel bindings, and the mounted `.d64` image (§3, §4.5-§4.7).
*/

pub mod command;
pub mod directory;
pub mod geometry;

use command::DiskCommand;
use geometry::{track_sector_addr, SECTOR_SIZE};

use crate::error::{EmuError, EmuResult};

pub const BUFFER_COUNT: usize = 4;
pub const COMMAND_BUFFER_SIZE: usize = 0x2A;

struct SectorBuffer {
    data: [u8; SECTOR_SIZE],
    ptr: u8,
    /// Channel bound to this buffer, or `None` if unbound.
    channel: Option<u8>,
}

impl Default for SectorBuffer {
    fn default() -> Self {
        Self {
            data: [0u8; SECTOR_SIZE],
            ptr: 0,
            channel: None,
        }
    }
}

#[derive(Default)]
pub struct Drive {
    mounted_image: Option<Vec<u8>>,
    command_buffer: Vec<u8>,
    buffers: [SectorBuffer; BUFFER_COUNT],
    last_memory_read: u8,
}

impl Drive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount a `.d64` image. Its size must be exactly the standard 35-track
    /// size (§4.6); this mirrors the original's `checkDiskSize`.
    pub fn mount(&mut self, image: Vec<u8>) -> EmuResult<()> {
        if image.len() != geometry::STANDARD_D64_SIZE {
            return Err(EmuError::SizeMismatch {
                what: "D64 disk image",
                expected: geometry::STANDARD_D64_SIZE,
                actual: image.len(),
            });
        }
        self.mounted_image = Some(image);
        Ok(())
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted_image.is_some()
    }

    /// DOS `LISTEN`: clear the command buffer in preparation to receive a
    /// new command.
    pub fn listen(&mut self) {
        self.command_buffer.clear();
    }

    /// DOS `CIOUT`: append a byte to the command buffer.
    pub fn ciout(&mut self, byte: u8) -> EmuResult<()> {
        if self.command_buffer.len() == COMMAND_BUFFER_SIZE {
            return Err(EmuError::CommandBufferFull {
                capacity: COMMAND_BUFFER_SIZE,
            });
        }
        self.command_buffer.push(byte);
        Ok(())
    }

    /// DOS `ACPTR` for the command channel (15): the single status byte
    /// left over from the most recent `M-R`.
    pub fn acptr_command_channel(&self) -> u8 {
        self.last_memory_read
    }

    /// DOS `ACPTR` for a data channel: the next byte from its bound
    /// sector buffer.
    pub fn acptr_channel(&mut self, channel: u8) -> EmuResult<u8> {
        let buf = self.buffer_for_channel_mut(channel)?;
        let byte = buf.data[buf.ptr as usize];
        buf.ptr = buf.ptr.wrapping_add(1);
        Ok(byte)
    }

    /// Bind a channel to a free sector buffer (or a specific one, if the
    /// filename was `#n`), per `diskOpenFile`.
    pub fn open_buffer(&mut self, channel: u8, requested: Option<u8>) -> EmuResult<()> {
        let index = match requested {
            Some(n) => {
                let i = n as usize;
                if i >= BUFFER_COUNT {
                    return Err(EmuError::InvalidDevice {
                        device: n,
                        operation: "OPEN buffer number",
                    });
                }
                if self.buffers[i].channel.is_some() {
                    return Err(EmuError::UnboundChannel { channel: n });
                }
                i
            }
            None => self
                .buffers
                .iter()
                .position(|b| b.channel.is_none())
                .ok_or(EmuError::UnboundChannel { channel })?,
        };
        self.buffers[index].channel = Some(channel);
        self.buffers[index].ptr = 0;
        Ok(())
    }

    pub fn close_channel(&mut self, channel: u8) {
        for buf in &mut self.buffers {
            if buf.channel == Some(channel) {
                buf.channel = None;
                buf.ptr = 0;
            }
        }
    }

    fn buffer_for_channel_mut(&mut self, channel: u8) -> EmuResult<&mut SectorBuffer> {
        self.buffers
            .iter_mut()
            .find(|b| b.channel == Some(channel))
            .ok_or(EmuError::UnboundChannel { channel })
    }

    /// Parse and execute whatever command text is currently in the command
    /// buffer (DOS `UNLSN` on the command channel).
    pub fn execute_command(&mut self) -> EmuResult<()> {
        let text = self.command_buffer.clone();
        let (cmd, arg_start) = command::parse_name(&text)?;
        let args = command::parse_args(cmd, &text[arg_start..])?;
        self.exec(cmd, &args)
    }

    fn exec(&mut self, cmd: DiskCommand, args: &[u8]) -> EmuResult<()> {
        match cmd {
            DiskCommand::Initialize | DiskCommand::Uj => {
                self.command_buffer.clear();
                for buf in &mut self.buffers {
                    buf.ptr = 0;
                    buf.channel = None;
                }
                Ok(())
            }
            DiskCommand::U9 | DiskCommand::New | DiskCommand::Validate => Ok(()),
            DiskCommand::BufferPointer => {
                let channel = args[0];
                let location = args[1];
                self.buffer_for_channel_mut(channel)?.ptr = location;
                Ok(())
            }
            DiskCommand::MemoryRead => {
                // The real ROM reads ACS loader state from a fixed KERNAL
                // variable; this model doesn't run ROM code, so there's
                // nothing meaningful to return. Kept as an explicit no-op
                // rather than silently returning garbage.
                self.last_memory_read = 0;
                Ok(())
            }
            DiskCommand::MemoryWrite => Ok(()),
            DiskCommand::U1 => {
                let channel = args[0];
                let drive = args[1];
                let track = args[2];
                let sector = args[3];
                if drive != 0 {
                    return Err(EmuError::InvalidDevice {
                        device: drive,
                        operation: "U1 drive select",
                    });
                }
                let image = self.mounted_image.as_ref().ok_or(EmuError::NoDiskMounted)?;
                let addr = track_sector_addr(track, sector)?;
                let sector_data: [u8; SECTOR_SIZE] =
                    image[addr..addr + SECTOR_SIZE].try_into().unwrap();
                let buf = self.buffer_for_channel_mut(channel)?;
                buf.data = sector_data;
                // The 1541's raw U1 read starts the buffer pointer at 0xFF,
                // not 0: the first ACPTR returns the byte at offset 0xFF,
                // and it wraps to 0 from there.
                buf.ptr = 0xFF;
                Ok(())
            }
            other => Err(EmuError::UnimplementedDiskCommand {
                command: other.name(),
            }),
        }
    }

    pub fn directory(&self) -> EmuResult<Vec<directory::DirEntry>> {
        let image = self.mounted_image.as_ref().ok_or(EmuError::NoDiskMounted)?;
        directory::read_directory(image)
    }

    pub fn read_file(&self, start_track: u8, start_sector: u8) -> EmuResult<Vec<u8>> {
        let image = self.mounted_image.as_ref().ok_or(EmuError::NoDiskMounted)?;
        directory::read_file_chain(image, start_track, start_sector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mounted_drive() -> Drive {
        let mut drive = Drive::new();
        drive.mount(vec![0u8; geometry::STANDARD_D64_SIZE]).unwrap();
        drive
    }

    #[test]
    fn rejects_wrong_size_image() {
        let mut drive = Drive::new();
        let err = drive.mount(vec![0u8; 100]).unwrap_err();
        assert!(matches!(err, EmuError::SizeMismatch { .. }));
    }

    #[test]
    fn command_buffer_overflow_is_rejected() {
        let mut drive = mounted_drive();
        drive.listen();
        for _ in 0..COMMAND_BUFFER_SIZE {
            drive.ciout(b'A').unwrap();
        }
        assert!(matches!(
            drive.ciout(b'A').unwrap_err(),
            EmuError::CommandBufferFull { .. }
        ));
    }

    #[test]
    fn open_buffer_binds_first_free_slot() {
        let mut drive = mounted_drive();
        drive.open_buffer(2, None).unwrap();
        drive.open_buffer(3, None).unwrap();
        assert!(drive.buffer_for_channel_mut(2).is_ok());
        assert!(drive.buffer_for_channel_mut(3).is_ok());
    }

    #[test]
    fn u1_reads_sector_into_bound_buffer() {
        let mut drive = Drive::new();
        let mut image = vec![0u8; geometry::STANDARD_D64_SIZE];
        let addr = track_sector_addr(18, 0).unwrap();
        image[addr + 0xFF] = 0xAB;
        drive.mount(image).unwrap();
        drive.open_buffer(5, None).unwrap();
        drive.listen();
        for &b in b"U1:5,0,18,0" {
            drive.ciout(b).unwrap();
        }
        drive.execute_command().unwrap();
        // The 1541 raw read quirk: the buffer pointer starts at 0xFF, so the
        // first ACPTR returns that offset, then wraps to 0 for the next.
        assert_eq!(drive.acptr_channel(5).unwrap(), 0xAB);
    }

    #[test]
    fn u1_without_mounted_disk_errors() {
        let mut drive = Drive::new();
        drive.open_buffer(5, None).unwrap();
        drive.listen();
        for &b in b"U1:5,0,18,0" {
            drive.ciout(b).unwrap();
        }
        assert!(matches!(
            drive.execute_command().unwrap_err(),
            EmuError::NoDiskMounted
        ));
    }

    #[test]
    fn close_channel_frees_buffer_for_reuse() {
        let mut drive = mounted_drive();
        drive.open_buffer(2, None).unwrap();
        drive.close_channel(2);
        assert!(drive.buffer_for_channel_mut(2).is_err());
    }
}
