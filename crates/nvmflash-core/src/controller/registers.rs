//! NVM controller register definitions
//!
//! Command opcodes, status flags and control register encoding, following
//! the SAM D2x NVMCTRL layout.

use bitflags::bitflags;

/// Key that must accompany every command written to CTRLA.CMD
pub const CMDEX_KEY: u8 = 0xA5;

/// NVM controller command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Erase the row addressed by ADDR
    EraseRow,
    /// Write the page buffer to the page addressed by ADDR
    WritePage,
    /// Lock the region addressed by ADDR
    LockRegion,
    /// Unlock the region addressed by ADDR
    UnlockRegion,
    /// Clear the page buffer to all ones
    PageBufferClear,
}

impl Command {
    /// CTRLA.CMD opcode
    pub const fn opcode(self) -> u8 {
        match self {
            Self::EraseRow => 0x02,
            Self::WritePage => 0x04,
            Self::LockRegion => 0x40,
            Self::UnlockRegion => 0x41,
            Self::PageBufferClear => 0x44,
        }
    }

    /// Decode an opcode
    pub const fn from_opcode(opcode: u8) -> Option<Self> {
        match opcode {
            0x02 => Some(Self::EraseRow),
            0x04 => Some(Self::WritePage),
            0x40 => Some(Self::LockRegion),
            0x41 => Some(Self::UnlockRegion),
            0x44 => Some(Self::PageBufferClear),
            _ => None,
        }
    }

    /// Full CTRLA value: opcode plus execution key
    pub const fn ctrla(self) -> u16 {
        ((CMDEX_KEY as u16) << 8) | self.opcode() as u16
    }
}

bitflags! {
    /// Sticky error flags of the STATUS register
    ///
    /// These flags stay set until written back with a one.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StatusFlags: u16 {
        /// Power reduction mode active
        const PRM   = 1 << 0;
        /// NVM page buffer was written since the last command
        const LOAD  = 1 << 1;
        /// Programming error (invalid command)
        const PROGE = 1 << 2;
        /// Lock error (locked region touched)
        const LOCKE = 1 << 3;
        /// NVM controller error
        const NVME  = 1 << 4;

        /// All error flags
        const ERRORS = Self::PROGE.bits() | Self::LOCKE.bits() | Self::NVME.bits();
    }
}

impl Default for StatusFlags {
    fn default() -> Self {
        StatusFlags::empty()
    }
}

/// Power reduction behaviour in sleep mode (CTRLB.SLEEPPRM)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(serde::Deserialize))]
#[cfg_attr(feature = "std", serde(rename_all = "kebab-case"))]
pub enum SleepMode {
    /// Leave power reduction on first access after sleep
    #[default]
    WakeOnAccess,
    /// Leave power reduction when exiting sleep
    WakeUpInstant,
    /// Never enter power reduction
    Disabled,
}

/// Read timing policy (CTRLB.READMODE)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(serde::Deserialize))]
#[cfg_attr(feature = "std", serde(rename_all = "kebab-case"))]
pub enum ReadMode {
    /// No extra wait state on a cache miss
    #[default]
    NoMissPenalty,
    /// Insert a wait state on a cache miss to save power
    LowPower,
    /// Constant read latency regardless of cache hits
    Deterministic,
}

/// Control register configuration written during init
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Read wait states (0..=15)
    pub read_wait_states: u8,
    /// Manual page write: page buffer is committed by an explicit
    /// `WritePage` command instead of on loading its last word
    pub manual_write: bool,
    /// Sleep mode power reduction
    pub sleep_mode: SleepMode,
    /// Read mode
    pub read_mode: ReadMode,
    /// Disable the NVM cache
    pub cache_disabled: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            read_wait_states: 1,
            manual_write: true,
            sleep_mode: SleepMode::WakeOnAccess,
            read_mode: ReadMode::NoMissPenalty,
            cache_disabled: false,
        }
    }
}

impl ControllerConfig {
    const RWS_POS: u32 = 1;
    const MANW_POS: u32 = 7;
    const SLEEPPRM_POS: u32 = 8;
    const READMODE_POS: u32 = 16;
    const CACHEDIS_POS: u32 = 18;

    /// Encode as a CTRLB register value
    pub fn ctrlb(&self) -> u32 {
        let sleep = match self.sleep_mode {
            SleepMode::WakeOnAccess => 0,
            SleepMode::WakeUpInstant => 1,
            SleepMode::Disabled => 3,
        };
        let read = match self.read_mode {
            ReadMode::NoMissPenalty => 0,
            ReadMode::LowPower => 1,
            ReadMode::Deterministic => 2,
        };

        (((self.read_wait_states & 0x0F) as u32) << Self::RWS_POS)
            | ((self.manual_write as u32) << Self::MANW_POS)
            | (sleep << Self::SLEEPPRM_POS)
            | (read << Self::READMODE_POS)
            | ((self.cache_disabled as u32) << Self::CACHEDIS_POS)
    }

    /// Decode a CTRLB register value
    ///
    /// Reserved encodings fall back to the defaults.
    pub fn from_ctrlb(value: u32) -> Self {
        let sleep_mode = match (value >> Self::SLEEPPRM_POS) & 0x3 {
            1 => SleepMode::WakeUpInstant,
            3 => SleepMode::Disabled,
            _ => SleepMode::WakeOnAccess,
        };
        let read_mode = match (value >> Self::READMODE_POS) & 0x3 {
            1 => ReadMode::LowPower,
            2 => ReadMode::Deterministic,
            _ => ReadMode::NoMissPenalty,
        };

        Self {
            read_wait_states: ((value >> Self::RWS_POS) & 0x0F) as u8,
            manual_write: (value >> Self::MANW_POS) & 1 != 0,
            sleep_mode,
            read_mode,
            cache_disabled: (value >> Self::CACHEDIS_POS) & 1 != 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_opcodes() {
        for cmd in [
            Command::EraseRow,
            Command::WritePage,
            Command::LockRegion,
            Command::UnlockRegion,
            Command::PageBufferClear,
        ] {
            assert_eq!(Command::from_opcode(cmd.opcode()), Some(cmd));
        }
        assert_eq!(Command::from_opcode(0x1F), None);
        assert_eq!(Command::EraseRow.ctrla(), 0xA502);
    }

    #[test]
    fn test_ctrlb_encoding() {
        let cfg = ControllerConfig {
            read_wait_states: 3,
            manual_write: true,
            sleep_mode: SleepMode::Disabled,
            read_mode: ReadMode::Deterministic,
            cache_disabled: true,
        };
        let raw = cfg.ctrlb();
        assert_eq!(raw, (3 << 1) | (1 << 7) | (3 << 8) | (2 << 16) | (1 << 18));
        assert_eq!(ControllerConfig::from_ctrlb(raw), cfg);
    }

    #[test]
    fn test_error_mask() {
        assert!(StatusFlags::ERRORS.contains(StatusFlags::LOCKE));
        assert!(!StatusFlags::ERRORS.contains(StatusFlags::LOAD));
    }
}
