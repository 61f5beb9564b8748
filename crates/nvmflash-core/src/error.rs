//! Error types for nvmflash-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate. `Ok(())` plays the role of the controller's
//! "success" code; every other outcome is one of these variants.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Controller state
    /// Controller was already busy when the request was admitted
    Busy,
    /// Controller did not report ready within the wait budget
    Timeout,

    // Hardware status (sticky flags)
    /// Programming error: invalid command or bad command sequence (PROGE)
    ProgramError,
    /// Operation touched a locked region (LOCKE)
    LockError,
    /// NVM controller reported an internal error (NVME)
    ControllerError,

    // Request validation
    /// Byte count is zero, below the minimum program size or too large
    InvalidByteCount,
    /// Address is outside the flash array or not on a required boundary
    InvalidAddress,
    /// Row count is zero or runs past the end of the flash array
    InvalidBlockCount,

    // Blank check
    /// A word that should be erased is not
    NotBlank {
        /// Address of the first non-blank word
        addr: u32,
    },

    // Configuration
    /// Flash geometry is inconsistent or unsupported
    InvalidGeometry,
}

impl Error {
    /// Numeric status code, matching the order of the controller's
    /// error enumeration (0 is success)
    pub fn code(&self) -> u8 {
        match self {
            Self::Busy => 1,
            Self::ProgramError => 2,
            Self::LockError => 3,
            Self::ControllerError => 4,
            Self::InvalidByteCount => 5,
            Self::InvalidAddress => 6,
            Self::InvalidBlockCount => 7,
            Self::Timeout => 8,
            Self::NotBlank { .. } => 9,
            Self::InvalidGeometry => 10,
        }
    }

    /// Whether this error was reported by the controller's status register
    pub fn is_hardware(&self) -> bool {
        matches!(
            self,
            Self::ProgramError | Self::LockError | Self::ControllerError
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "NVM controller busy"),
            Self::Timeout => write!(f, "timed out waiting for NVM controller"),
            Self::ProgramError => write!(f, "programming error (invalid command)"),
            Self::LockError => write!(f, "operation targets a locked region"),
            Self::ControllerError => write!(f, "NVM controller error"),
            Self::InvalidByteCount => write!(f, "invalid byte count"),
            Self::InvalidAddress => write!(f, "invalid address"),
            Self::InvalidBlockCount => write!(f, "invalid row count"),
            Self::NotBlank { addr } => write!(f, "flash not blank at 0x{:08X}", addr),
            Self::InvalidGeometry => write!(f, "invalid flash geometry"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_controller_order() {
        assert_eq!(Error::Busy.code(), 1);
        assert_eq!(Error::ProgramError.code(), 2);
        assert_eq!(Error::InvalidBlockCount.code(), 7);
        assert_eq!(Error::Timeout.code(), 8);
    }

    #[test]
    fn test_hardware_classification() {
        assert!(Error::LockError.is_hardware());
        assert!(!Error::InvalidAddress.is_hardware());
        assert!(!Error::NotBlank { addr: 0 }.is_hardware());
    }
}
