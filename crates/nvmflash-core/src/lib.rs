//! nvmflash-core - Core library for on-chip NVM flash programming
//!
//! This crate implements the write/erase engine for a microcontroller NVM
//! controller whose flash array is erased one row at a time and programmed
//! one page at a time. It is `no_std` compatible; the register-level access
//! to the controller is supplied by an implementation of
//! [`controller::NvmController`].
//!
//! # Features
//!
//! - `std` - Enable standard library support and the TOML config loader
//!
//! # Example
//!
//! ```ignore
//! use nvmflash_core::flash::{DirectPage, NvmFlash};
//! use nvmflash_core::geometry::FlashGeometry;
//!
//! fn store<C: NvmController>(ctrl: C) -> nvmflash_core::Result<()> {
//!     let mut nvm = NvmFlash::new(ctrl, FlashGeometry::SAMD21G18A, DirectPage)?;
//!     nvm.init()?;
//!     nvm.erase_rows(0x1000, 1)?;
//!     nvm.write(0x1000, b"calibration")?;
//!     Ok(())
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "std")]
extern crate std;

#[cfg(feature = "std")]
pub mod config;
pub mod controller;
pub mod error;
pub mod flash;
pub mod geometry;
pub mod protocol;
pub mod status;

pub use error::{Error, Result};
