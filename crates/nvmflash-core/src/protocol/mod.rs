//! NVM controller protocol implementation
//!
//! This module contains the command sequences that drive the NVM
//! controller through the [`crate::controller::NvmController`] trait.

pub mod nvmctrl;

pub use nvmctrl::*;
