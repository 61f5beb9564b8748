//! Hardware status resolution
//!
//! The controller's error flags are sticky: once set they stay set until
//! written back, and a flag left behind by one operation would be reported
//! by the next. Every logical operation therefore reads the status once,
//! classifies it, and acknowledges exactly the flags it observed.
//!
//! [`StatusScope`] ties the acknowledgment to the scope's lifetime so it
//! happens on every exit path.

use crate::controller::{NvmController, StatusFlags};
use crate::error::{Error, Result};

/// Status flags acquired from the controller, acknowledged on drop
pub struct StatusScope<'a, C: NvmController + ?Sized> {
    ctrl: &'a mut C,
    flags: StatusFlags,
}

impl<'a, C: NvmController + ?Sized> StatusScope<'a, C> {
    /// Read the current status flags
    pub fn acquire(ctrl: &'a mut C) -> Self {
        let flags = ctrl.read_status();
        Self { ctrl, flags }
    }

    /// The flags observed at acquisition
    pub fn flags(&self) -> StatusFlags {
        self.flags
    }

    /// Classify the observed flags
    pub fn result(&self) -> Result<()> {
        classify(self.flags)
    }
}

impl<C: NvmController + ?Sized> Drop for StatusScope<'_, C> {
    fn drop(&mut self) {
        self.ctrl.clear_status(self.flags & StatusFlags::ERRORS);
    }
}

/// Map status flags to an error, highest priority first
///
/// PROGE wins over LOCKE, which wins over NVME.
pub fn classify(flags: StatusFlags) -> Result<()> {
    if flags.contains(StatusFlags::PROGE) {
        Err(Error::ProgramError)
    } else if flags.contains(StatusFlags::LOCKE) {
        Err(Error::LockError)
    } else if flags.contains(StatusFlags::NVME) {
        Err(Error::ControllerError)
    } else {
        Ok(())
    }
}

/// Read, classify and acknowledge the controller status
pub fn resolve_status<C: NvmController + ?Sized>(ctrl: &mut C) -> Result<()> {
    let scope = StatusScope::acquire(ctrl);
    let result = scope.result();
    if result.is_err() {
        log::warn!("NVM status {:?}", scope.flags());
    }
    result
}

/// Read the error flags without acknowledging them
pub fn peek_status<C: NvmController + ?Sized>(ctrl: &mut C) -> StatusFlags {
    ctrl.read_status() & StatusFlags::ERRORS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{Command, ControllerConfig};

    /// Controller with nothing but a status register
    struct StatusOnly {
        status: StatusFlags,
        clears: u32,
    }

    impl StatusOnly {
        fn with(status: StatusFlags) -> Self {
            Self { status, clears: 0 }
        }
    }

    impl NvmController for StatusOnly {
        fn enable_clock(&mut self) {}
        fn configure(&mut self, _config: &ControllerConfig) {}
        fn is_ready(&mut self) -> bool {
            true
        }
        fn issue_command(&mut self, _cmd: Command) {}
        fn set_address(&mut self, _addr: u32) {}
        fn read_status(&mut self) -> StatusFlags {
            self.status
        }
        fn clear_status(&mut self, mask: StatusFlags) {
            self.clears += 1;
            self.status.remove(mask);
        }
        fn read_word(&mut self, _word_index: u32) -> u32 {
            0xFFFF_FFFF
        }
        fn write_word(&mut self, _word_index: u32, _value: u32) {}
        fn delay_us(&mut self, _us: u32) {}
    }

    #[test]
    fn test_priority_order() {
        let all = StatusFlags::PROGE | StatusFlags::LOCKE | StatusFlags::NVME;
        assert_eq!(classify(all), Err(Error::ProgramError));
        assert_eq!(
            classify(StatusFlags::LOCKE | StatusFlags::NVME),
            Err(Error::LockError)
        );
        assert_eq!(classify(StatusFlags::NVME), Err(Error::ControllerError));
        assert_eq!(classify(StatusFlags::LOAD), Ok(()));
        assert_eq!(classify(StatusFlags::empty()), Ok(()));
    }

    #[test]
    fn test_resolve_acknowledges_once() {
        let mut ctrl = StatusOnly::with(StatusFlags::LOCKE | StatusFlags::LOAD);
        assert_eq!(resolve_status(&mut ctrl), Err(Error::LockError));
        assert_eq!(ctrl.clears, 1);
        assert_eq!(ctrl.status, StatusFlags::LOAD);

        // The next operation starts clean
        assert_eq!(resolve_status(&mut ctrl), Ok(()));
        assert_eq!(ctrl.clears, 2);
    }

    #[test]
    fn test_scope_acknowledges_on_early_return() {
        fn bail<C: NvmController>(ctrl: &mut C) -> Result<()> {
            let scope = StatusScope::acquire(ctrl);
            scope.result()?;
            unreachable!("status had an error flag set");
        }

        let mut ctrl = StatusOnly::with(StatusFlags::NVME);
        assert_eq!(bail(&mut ctrl), Err(Error::ControllerError));
        assert_eq!(ctrl.clears, 1);
        assert!(ctrl.status.is_empty());
    }

    #[test]
    fn test_peek_does_not_clear() {
        let mut ctrl = StatusOnly::with(StatusFlags::PROGE | StatusFlags::PRM);
        assert_eq!(peek_status(&mut ctrl), StatusFlags::PROGE);
        assert_eq!(ctrl.clears, 0);
        assert_eq!(ctrl.status, StatusFlags::PROGE | StatusFlags::PRM);
    }
}
