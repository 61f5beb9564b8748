//! Error types for the NVM emulator

use std::io;
use thiserror::Error;

/// Emulator setup errors
#[derive(Debug, Error)]
pub enum SimError {
    /// I/O error on the backing image
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Image does not fit the emulated flash
    #[error("image is {actual} bytes but the flash holds only {capacity}")]
    ImageTooLarge { actual: usize, capacity: usize },

    /// Lock region count the emulator cannot represent
    #[error("unsupported lock region count {0} (must be 1..=32 and divide the flash)")]
    InvalidLockRegions(u32),

    /// Engine error
    #[error(transparent)]
    Nvm(#[from] nvmflash_core::Error),
}

/// Result type for emulator setup
pub type Result<T> = std::result::Result<T, SimError>;
