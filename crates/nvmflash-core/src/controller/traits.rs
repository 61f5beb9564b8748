//! Controller trait definition

use super::registers::{Command, ControllerConfig, StatusFlags};

/// Register-level access to an NVM controller
///
/// Implementations are thin wrappers around the peripheral registers (or an
/// emulation of them). They never wait: every method returns immediately,
/// and the engine in [`crate::protocol`] does all polling with explicit
/// budgets.
///
/// The flash array is exposed as a sequence of words indexed from the start
/// of the array ([`crate::geometry::FlashGeometry::to_word_index`]). Writing
/// a word does not program flash directly; it lands in the controller's page
/// buffer at the matching page position.
///
/// ## Example: memory-mapped controller
///
/// ```ignore
/// impl NvmController for Nvmctrl {
///     fn is_ready(&mut self) -> bool {
///         self.regs.intflag.read().ready().bit_is_set()
///     }
///
///     fn issue_command(&mut self, cmd: Command) {
///         self.regs.ctrla.write(|w| unsafe { w.bits(cmd.ctrla()) });
///     }
///     // ...
/// }
/// ```
pub trait NvmController {
    /// Enable the peripheral bus clock of the controller
    fn enable_clock(&mut self);

    /// Write the control register (wait states, write mode, caching)
    fn configure(&mut self, config: &ControllerConfig);

    /// Whether the controller is ready to accept a command
    fn is_ready(&mut self) -> bool;

    /// Write a command with its execution key to CTRLA
    fn issue_command(&mut self, cmd: Command);

    /// Set the byte address used by the next command
    fn set_address(&mut self, addr: u32);

    /// Read the sticky status flags
    fn read_status(&mut self) -> StatusFlags;

    /// Acknowledge status flags (write-one-to-clear)
    fn clear_status(&mut self, mask: StatusFlags);

    /// Read one word of the flash array
    fn read_word(&mut self, word_index: u32) -> u32;

    /// Load one word into the page buffer
    fn write_word(&mut self, word_index: u32, value: u32);

    /// Delay for the specified number of microseconds
    fn delay_us(&mut self, us: u32);
}
