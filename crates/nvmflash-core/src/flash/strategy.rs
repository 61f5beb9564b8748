//! Page programming strategies
//!
//! The engine hands every page chunk of a write to a [`ProgramStrategy`].
//! Two strategies exist:
//!
//! - [`DirectPage`] programs the chunk straight into flash. The target bytes
//!   must already be blank.
//! - [`RowShadow`] stages the row in RAM and erases and replays it when a
//!   chunk lands on a page that is no longer blank.
//!
//! [`AnyStrategy`] selects one of them at runtime from a [`WriteMode`].

use crate::controller::NvmController;
use crate::error::Result;
use crate::geometry::FlashGeometry;
use crate::protocol::{self, Timeouts};

use super::cursor::PageChunk;
use super::shadow::RowShadow;

/// Parameters shared by every chunk of a write
#[derive(Debug, Clone, Copy)]
pub struct ProgramParams<'a> {
    /// Flash geometry
    pub geometry: &'a FlashGeometry,
    /// Wait budgets
    pub timeouts: &'a Timeouts,
    /// Whether pages are committed with an explicit `WritePage` command
    pub manual_write: bool,
}

/// How a page chunk reaches flash
pub trait ProgramStrategy {
    /// Reset the session state, called on construction and by `init()`
    fn reset(&mut self, geometry: &FlashGeometry) -> Result<()>;

    /// Program one chunk; `data` holds exactly `chunk.len` bytes
    fn program_chunk<C: NvmController + ?Sized>(
        &mut self,
        ctrl: &mut C,
        params: &ProgramParams<'_>,
        chunk: &PageChunk,
        data: &[u8],
    ) -> Result<()>;

    /// Rows `first_row..first_row + count` were erased behind the strategy's back
    fn rows_erased(&mut self, _first_row: u32, _count: u32) {}
}

/// Program chunks directly into blank pages
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectPage;

impl ProgramStrategy for DirectPage {
    fn reset(&mut self, _geometry: &FlashGeometry) -> Result<()> {
        Ok(())
    }

    fn program_chunk<C: NvmController + ?Sized>(
        &mut self,
        ctrl: &mut C,
        params: &ProgramParams<'_>,
        chunk: &PageChunk,
        data: &[u8],
    ) -> Result<()> {
        let flags = protocol::program_page(
            ctrl,
            params.geometry,
            chunk.address,
            data,
            params.manual_write,
            params.timeouts,
        )?;
        if !flags.is_empty() {
            log::trace!("Status after page at 0x{:08X}: {:?}", chunk.address, flags);
        }
        Ok(())
    }
}

/// Write strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(serde::Deserialize))]
#[cfg_attr(feature = "std", serde(rename_all = "kebab-case"))]
pub enum WriteMode {
    /// Program pages directly; targets must be blank
    #[default]
    Direct,
    /// Stage rows in a shadow buffer and erase/replay on rewrite
    RowBuffered,
}

/// Strategy chosen at runtime
#[derive(Debug, Clone)]
pub enum AnyStrategy {
    /// See [`DirectPage`]
    Direct(DirectPage),
    /// See [`RowShadow`]
    RowBuffered(RowShadow),
}

impl AnyStrategy {
    /// Build the strategy for a write mode
    pub fn from_mode(mode: WriteMode) -> Self {
        match mode {
            WriteMode::Direct => Self::Direct(DirectPage),
            WriteMode::RowBuffered => Self::RowBuffered(RowShadow::new()),
        }
    }

    /// The write mode of this strategy
    pub fn mode(&self) -> WriteMode {
        match self {
            Self::Direct(_) => WriteMode::Direct,
            Self::RowBuffered(_) => WriteMode::RowBuffered,
        }
    }
}

impl From<WriteMode> for AnyStrategy {
    fn from(mode: WriteMode) -> Self {
        Self::from_mode(mode)
    }
}

impl ProgramStrategy for AnyStrategy {
    fn reset(&mut self, geometry: &FlashGeometry) -> Result<()> {
        match self {
            Self::Direct(s) => s.reset(geometry),
            Self::RowBuffered(s) => s.reset(geometry),
        }
    }

    fn program_chunk<C: NvmController + ?Sized>(
        &mut self,
        ctrl: &mut C,
        params: &ProgramParams<'_>,
        chunk: &PageChunk,
        data: &[u8],
    ) -> Result<()> {
        match self {
            Self::Direct(s) => s.program_chunk(ctrl, params, chunk, data),
            Self::RowBuffered(s) => s.program_chunk(ctrl, params, chunk, data),
        }
    }

    fn rows_erased(&mut self, first_row: u32, count: u32) {
        match self {
            Self::Direct(s) => s.rows_erased(first_row, count),
            Self::RowBuffered(s) => s.rows_erased(first_row, count),
        }
    }
}
