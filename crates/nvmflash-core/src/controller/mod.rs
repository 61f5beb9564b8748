//! NVM controller abstraction
//!
//! The engine never touches hardware registers directly. Everything it needs
//! from the peripheral goes through the [`NvmController`] trait.

mod registers;
mod traits;

pub use registers::*;
pub use traits::NvmController;
