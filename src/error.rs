//! CLI error type

use std::io;
use thiserror::Error;

use nvmflash_core::config::ConfigError;
use nvmflash_sim::SimError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sim(#[from] SimError),

    #[error("{0}")]
    Nvm(#[from] nvmflash_core::Error),

    #[error("invalid progress template: {0}")]
    Progress(#[from] indicatif::style::TemplateError),

    #[error("invalid lock file {path}: {value:?}")]
    LockFile { path: String, value: String },

    #[error("input file {0} is empty")]
    EmptyInput(String),

    #[error("range 0x{address:08X}+0x{length:X} is outside the flash")]
    OutOfRange { address: u32, length: u32 },
}

pub type Result<T> = std::result::Result<T, CliError>;
