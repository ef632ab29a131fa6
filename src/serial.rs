/*!
serial.rs - IEC serial bus talker/listener/secondary-address state (§3).

Grounded in `getSerialBusAddrState`/`getSerialBusAddrDevice` and the
`SERIAL_BUS_STATE_TALKER`/`SERIAL_BUS_STATE_LISTENER` constants in
`original_source/emu6502/emromc64.c`: the bus's active device and
talker/listener mode are packed into a single byte there; this crate
keeps the two states but as named fields rather than a packed byte,
since nothing downstream needs the packed representation.
*/

use crate::error::{EmuError, EmuResult};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Mode {
    Idle,
    Listener,
    Talker,
}

#[derive(Debug, Default)]
pub struct SerialBus {
    mode: ModeState,
    device: u8,
    secondary_addr: u8,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
struct ModeState(Option<ModeTag>);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ModeTag {
    Listener,
    Talker,
}

impl From<Mode> for ModeState {
    fn from(m: Mode) -> Self {
        ModeState(match m {
            Mode::Idle => None,
            Mode::Listener => Some(ModeTag::Listener),
            Mode::Talker => Some(ModeTag::Talker),
        })
    }
}

impl SerialBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// `LISTEN`: address `device` as a listener.
    pub fn listen(&mut self, device: u8) {
        self.device = device;
        self.mode = Mode::Listener.into();
        self.secondary_addr = 0;
    }

    /// `TALK`: address `device` as a talker.
    pub fn talk(&mut self, device: u8) {
        self.device = device;
        self.mode = Mode::Talker.into();
        self.secondary_addr = 0;
    }

    /// `SECOND`: send a secondary address to the addressed listener.
    pub fn second(&mut self, addr: u8) -> EmuResult<()> {
        if self.mode.0 != Some(ModeTag::Listener) {
            return Err(EmuError::InvalidDevice {
                device: self.device,
                operation: "SECOND without an active listener",
            });
        }
        self.secondary_addr = addr;
        Ok(())
    }

    /// `TKSA`: send a secondary address to the addressed talker.
    pub fn tksa(&mut self, addr: u8) -> EmuResult<()> {
        if self.mode.0 != Some(ModeTag::Talker) {
            return Err(EmuError::InvalidDevice {
                device: self.device,
                operation: "TKSA without an active talker",
            });
        }
        self.secondary_addr = addr;
        Ok(())
    }

    /// `UNLSN`: release the bus from listener mode.
    pub fn unlisten(&mut self) {
        self.mode = Mode::Idle.into();
    }

    /// `UNTLK`: release the bus from talker mode.
    pub fn untalk(&mut self) {
        self.mode = Mode::Idle.into();
    }

    pub fn is_listening(&self) -> bool {
        self.mode.0 == Some(ModeTag::Listener)
    }

    pub fn is_talking(&self) -> bool {
        self.mode.0 == Some(ModeTag::Talker)
    }

    pub fn device(&self) -> u8 {
        self.device
    }

    /// The low nibble of the last secondary address, used to pick a drive
    /// channel (0-14 data channels, 15 the command channel).
    pub fn channel(&self) -> u8 {
        self.secondary_addr & 0x0F
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listen_then_second_succeeds() {
        let mut bus = SerialBus::new();
        bus.listen(8);
        bus.second(0x6F).unwrap();
        assert!(bus.is_listening());
        assert_eq!(bus.channel(), 0x0F);
    }

    #[test]
    fn second_without_listen_errors() {
        let mut bus = SerialBus::new();
        assert!(bus.second(0x60).is_err());
    }

    #[test]
    fn tksa_without_talk_errors() {
        let mut bus = SerialBus::new();
        assert!(bus.tksa(0x60).is_err());
    }

    #[test]
    fn talk_then_tksa_succeeds() {
        let mut bus = SerialBus::new();
        bus.talk(8);
        bus.tksa(0x61).unwrap();
        assert_eq!(bus.channel(), 1);
        assert!(bus.is_talking());
    }

    #[test]
    fn unlisten_clears_mode() {
        let mut bus = SerialBus::new();
        bus.listen(8);
        bus.unlisten();
        assert!(!bus.is_listening());
    }

    #[test]
    fn device_tracks_most_recent_address() {
        let mut bus = SerialBus::new();
        bus.listen(8);
        bus.talk(9);
        assert_eq!(bus.device(), 9);
    }
}
