//! Flash session - owned state for NVM operations

use crate::controller::{ControllerConfig, NvmController};
use crate::error::{Error, Result};
use crate::geometry::FlashGeometry;
use crate::protocol::{self, Timeouts};
use crate::status::{resolve_status, StatusScope};

use super::cursor::WriteCursor;
use super::strategy::{AnyStrategy, ProgramParams, ProgramStrategy};

/// An NVM controller together with everything needed to drive it
///
/// The session owns the controller and the strategy state, and every
/// operation takes `&mut self`, so at most one write can be in flight.
///
/// Each public operation validates its arguments before touching the
/// controller, then runs to completion and resolves the sticky status
/// flags exactly once.
#[derive(Debug)]
pub struct NvmFlash<C, S = AnyStrategy> {
    ctrl: C,
    geometry: FlashGeometry,
    config: ControllerConfig,
    timeouts: Timeouts,
    strategy: S,
}

impl<C: NvmController, S: ProgramStrategy> NvmFlash<C, S> {
    /// Create a session with default controller configuration and timeouts
    pub fn new(ctrl: C, geometry: FlashGeometry, mut strategy: S) -> Result<Self> {
        geometry.validate()?;
        strategy.reset(&geometry)?;
        Ok(Self {
            ctrl,
            geometry,
            config: ControllerConfig::default(),
            timeouts: Timeouts::default(),
            strategy,
        })
    }

    /// Use the given controller configuration from the next `init()`
    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// Use the given wait budgets
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Bring up the controller
    ///
    /// Enables the controller clock, acknowledges stale status flags, writes
    /// the control configuration and resets the strategy (an empty shadow
    /// pointed at row 0 for the row-buffered strategy).
    pub fn init(&mut self) -> Result<()> {
        self.ctrl.enable_clock();
        {
            let stale = StatusScope::acquire(&mut self.ctrl);
            if !stale.flags().is_empty() {
                log::debug!("Clearing stale NVM status {:?}", stale.flags());
            }
        }
        self.ctrl.configure(&self.config);
        self.strategy.reset(&self.geometry)?;

        log::debug!(
            "NVM ready: {} rows of {} bytes ({} pages of {} bytes), CTRLB=0x{:08X}",
            self.geometry.row_count(),
            self.geometry.row_size(),
            self.geometry.pages_per_row,
            self.geometry.page_size,
            self.config.ctrlb()
        );
        Ok(())
    }

    /// Refuse to start while someone else's command is still running
    fn admit(&mut self) -> Result<()> {
        if self.ctrl.is_ready() {
            Ok(())
        } else {
            Err(Error::Busy)
        }
    }

    /// Write `data` at `destination`
    ///
    /// The request may start anywhere and span any number of pages and rows.
    /// It is split into page-local chunks that are handed to the strategy in
    /// order. Hardware errors are reported once all chunks are issued.
    pub fn write(&mut self, destination: u32, data: &[u8]) -> Result<()> {
        self.geometry.check_range(destination, data.len())?;
        self.admit()?;

        log::debug!("Write {} bytes at 0x{:08X}", data.len(), destination);

        let params = ProgramParams {
            geometry: &self.geometry,
            timeouts: &self.timeouts,
            manual_write: self.config.manual_write,
        };

        let mut cursor = WriteCursor::new();
        cursor.start(destination, data.len() as u32);

        let mut outcome = Ok(());
        while let Some(chunk) = cursor.next_chunk(&self.geometry) {
            let slice = &data[chunk.source_range()];
            if let Err(e) = self
                .strategy
                .program_chunk(&mut self.ctrl, &params, &chunk, slice)
            {
                outcome = Err(e);
                cursor.reset();
                break;
            }
        }

        let status = resolve_status(&mut self.ctrl);
        outcome.and(status)
    }

    /// Erase `row_count` rows starting at the row that begins at `start`
    pub fn erase_rows(&mut self, start: u32, row_count: u32) -> Result<()> {
        if !self.geometry.contains(start) || !self.geometry.is_row_aligned(start) {
            return Err(Error::InvalidAddress);
        }
        let first_row = self.geometry.to_coordinate(start).row;
        if row_count == 0 || first_row as u64 + row_count as u64 > self.geometry.row_count() as u64
        {
            return Err(Error::InvalidBlockCount);
        }
        self.admit()?;

        log::debug!("Erase {} rows at 0x{:08X}", row_count, start);

        let result = protocol::erase_range(
            &mut self.ctrl,
            &self.geometry,
            start,
            row_count,
            &self.timeouts,
        );
        self.strategy.rows_erased(first_row, row_count);
        result
    }

    /// Check that `length` bytes at `address` are erased
    ///
    /// `length` may not exceed one row. Returns `Error::NotBlank` with the
    /// address of the first programmed word otherwise.
    pub fn blank_check(&mut self, address: u32, length: u32) -> Result<()> {
        if length == 0 || length > self.geometry.row_size() {
            return Err(Error::InvalidByteCount);
        }
        if !self.geometry.contains(address)
            || address as u64 + length as u64 > self.geometry.end_address()
        {
            return Err(Error::InvalidAddress);
        }
        self.admit()?;

        let outcome = protocol::check_blank(
            &mut self.ctrl,
            &self.geometry,
            address,
            length,
            &self.timeouts,
        );
        let status = resolve_status(&mut self.ctrl);
        outcome.and(status)
    }

    /// Whether the row containing `address` is erased
    pub fn is_row_blank(&mut self, address: u32) -> Result<bool> {
        if !self.geometry.contains(address) {
            return Err(Error::InvalidAddress);
        }
        let row_start = self.geometry.row_base_address(address);
        protocol::is_row_blank(&mut self.ctrl, &self.geometry, row_start, &self.timeouts)
    }

    /// Read `buf.len()` bytes starting at `address`
    pub fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        if !self.geometry.contains(address)
            || address as u64 + buf.len() as u64 > self.geometry.end_address()
        {
            return Err(Error::InvalidAddress);
        }
        protocol::read(&mut self.ctrl, &self.geometry, address, buf, &self.timeouts)
    }

    /// Lock the region containing `address` against program and erase
    pub fn lock_region(&mut self, address: u32) -> Result<()> {
        self.region_command(address, true)
    }

    /// Unlock the region containing `address`
    pub fn unlock_region(&mut self, address: u32) -> Result<()> {
        self.region_command(address, false)
    }

    fn region_command(&mut self, address: u32, lock: bool) -> Result<()> {
        if !self.geometry.contains(address) {
            return Err(Error::InvalidAddress);
        }
        self.admit()?;

        log::debug!(
            "{} region at 0x{:08X}",
            if lock { "Lock" } else { "Unlock" },
            address
        );
        let outcome = if lock {
            protocol::lock_region(&mut self.ctrl, address, &self.timeouts)
        } else {
            protocol::unlock_region(&mut self.ctrl, address, &self.timeouts)
        };
        let status = resolve_status(&mut self.ctrl);
        outcome.and(status)
    }

    /// Flash geometry
    pub fn geometry(&self) -> &FlashGeometry {
        &self.geometry
    }

    /// Controller configuration written by `init()`
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Wait budgets
    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// The controller
    pub fn controller(&self) -> &C {
        &self.ctrl
    }

    /// Mutable access to the controller
    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.ctrl
    }

    /// The programming strategy
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Give back the controller
    pub fn into_controller(self) -> C {
        self.ctrl
    }
}
