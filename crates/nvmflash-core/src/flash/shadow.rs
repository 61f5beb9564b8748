//! Row shadow buffer
//!
//! Flash pages can only be programmed once between erases, but the erase
//! unit is a whole row. [`RowShadow`] keeps a RAM copy of the row being
//! written so that rewriting a page costs an erase of the row followed by a
//! replay of every page in it, without losing the sibling pages.
//!
//! The copy is seeded from flash whenever the shadow moves to a new row, and
//! every byte written afterwards goes to the copy first. The copy is
//! therefore always a faithful image of the row and an erase can always be
//! followed by a lossless replay.
//!
//! A commit that fails part way leaves the row marked for replay. Until a
//! replay of the whole row succeeds, every later commit to that row (and
//! every move to another row) replays it from the copy instead of trusting
//! what is in flash.

use heapless::Vec;

use crate::controller::NvmController;
use crate::error::{Error, Result};
use crate::geometry::{FlashGeometry, ERASED_BYTE, MAX_ROW_SIZE};
use crate::protocol;
use crate::status::{classify, peek_status};

use super::cursor::PageChunk;
use super::strategy::{ProgramParams, ProgramStrategy};

/// RAM image of one flash row
#[derive(Debug, Clone)]
pub struct RowShadow {
    buffer: Vec<u8, MAX_ROW_SIZE>,
    page_size: usize,
    pages_per_row: u32,
    active_row: u32,
    active_page_in_row: u8,
    free_offset_in_page: u16,
    /// Buffer holds the current contents of `active_row`
    loaded: bool,
    /// Flash may not match the buffer for `active_row`
    replay_pending: bool,
    replays: u32,
}

impl Default for RowShadow {
    fn default() -> Self {
        Self::new()
    }
}

impl RowShadow {
    /// Create an empty shadow; sized by [`ProgramStrategy::reset`]
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            page_size: 0,
            pages_per_row: 0,
            active_row: 0,
            active_page_in_row: 0,
            free_offset_in_page: 0,
            loaded: false,
            replay_pending: false,
            replays: 0,
        }
    }

    /// Reset every byte of the buffer to the erased value
    pub fn flush(&mut self) {
        self.buffer.iter_mut().for_each(|b| *b = ERASED_BYTE);
    }

    /// Point the shadow at the row and page of `destination`
    ///
    /// Moving to another row seeds the buffer from flash so it mirrors the
    /// physical row before anything is staged.
    pub fn retarget<C: NvmController + ?Sized>(
        &mut self,
        ctrl: &mut C,
        params: &ProgramParams<'_>,
        destination: u32,
    ) -> Result<()> {
        let geometry = params.geometry;
        let coord = geometry.to_coordinate(destination);

        if self.loaded && self.replay_pending && coord.row != self.active_row {
            log::warn!(
                "Row {} was left half written, replaying it before moving on",
                self.active_row
            );
            self.replay_row(ctrl, params)?;
        }

        if !self.loaded || coord.row != self.active_row {
            self.flush();
            self.loaded = false;
            self.active_row = coord.row;
            let row_start = geometry.row_address(coord.row);
            protocol::read(ctrl, geometry, row_start, &mut self.buffer, params.timeouts)?;
            self.loaded = true;
            log::trace!("Shadow now tracks row {} (0x{:08X})", coord.row, row_start);
        }

        self.active_page_in_row = coord.page_in_row;
        self.free_offset_in_page = coord.byte_offset_in_page;
        Ok(())
    }

    /// Stage `bytes` at the free offset and commit the active page
    ///
    /// The shadow must have been pointed at the page with [`retarget`] and
    /// `bytes` must fit in the rest of that page. Filling the last page of
    /// the row wraps the shadow to the next row, which is flushed until it
    /// is retargeted.
    ///
    /// [`retarget`]: RowShadow::retarget
    pub fn append_and_maybe_commit<C: NvmController + ?Sized>(
        &mut self,
        ctrl: &mut C,
        params: &ProgramParams<'_>,
        bytes: &[u8],
    ) -> Result<()> {
        let offset = self.free_offset_in_page as usize;
        if !self.loaded || offset + bytes.len() > self.page_size {
            return Err(Error::InvalidByteCount);
        }
        if bytes.is_empty() {
            return Ok(());
        }

        let index = self.active_page_in_row as usize * self.page_size + offset;
        self.buffer[index..index + bytes.len()].copy_from_slice(bytes);
        self.free_offset_in_page += bytes.len() as u16;

        self.commit_page(ctrl, params)?;
        if self.free_offset_in_page as usize == self.page_size {
            self.advance_page();
        }
        Ok(())
    }

    fn advance_page(&mut self) {
        self.free_offset_in_page = 0;
        if (self.active_page_in_row as u32) + 1 < self.pages_per_row {
            self.active_page_in_row += 1;
        } else {
            self.active_page_in_row = 0;
            self.active_row += 1;
            self.flush();
            self.loaded = false;
        }
    }

    /// Bring the active page of flash in line with the buffer
    ///
    /// Any failure marks the row for replay.
    fn commit_page<C: NvmController + ?Sized>(
        &mut self,
        ctrl: &mut C,
        params: &ProgramParams<'_>,
    ) -> Result<()> {
        let outcome = self.program_or_replay(ctrl, params);
        if outcome.is_err() {
            self.replay_pending = true;
        }
        outcome
    }

    fn program_or_replay<C: NvmController + ?Sized>(
        &mut self,
        ctrl: &mut C,
        params: &ProgramParams<'_>,
    ) -> Result<()> {
        let geometry = params.geometry;
        let page = self.active_page_in_row as u32;
        let page_addr = geometry.row_address(self.active_row) + page * geometry.page_size;

        if self.replay_pending {
            log::debug!("Row {} still needs a replay", self.active_row);
            return self.replay_row(ctrl, params);
        }

        if protocol::is_page_blank(ctrl, geometry, page_addr, params.timeouts)? {
            let flags = protocol::program_page(
                ctrl,
                geometry,
                page_addr,
                self.page(page),
                params.manual_write,
                params.timeouts,
            )?;
            classify(flags)
        } else {
            log::warn!(
                "Page 0x{:08X} already programmed, erasing row {} and replaying it",
                page_addr,
                self.active_row
            );
            self.replay_row(ctrl, params)
        }
    }

    /// Erase the active row and program every non-blank page of the buffer
    ///
    /// The row stays marked for replay unless every step succeeds without
    /// raising an error flag.
    fn replay_row<C: NvmController + ?Sized>(
        &mut self,
        ctrl: &mut C,
        params: &ProgramParams<'_>,
    ) -> Result<()> {
        let geometry = params.geometry;
        let row_start = geometry.row_address(self.active_row);

        self.replay_pending = true;
        protocol::erase_row(ctrl, row_start, params.timeouts)?;
        classify(peek_status(ctrl))?;

        for page in 0..self.pages_per_row {
            let data = self.page(page);
            if data.iter().all(|&b| b == ERASED_BYTE) {
                continue;
            }
            let flags = protocol::program_page(
                ctrl,
                geometry,
                row_start + page * geometry.page_size,
                data,
                params.manual_write,
                params.timeouts,
            )?;
            classify(flags)?;
        }

        self.replay_pending = false;
        self.replays += 1;
        Ok(())
    }

    fn page(&self, page: u32) -> &[u8] {
        let start = page as usize * self.page_size;
        &self.buffer[start..start + self.page_size]
    }

    /// Row the shadow currently mirrors
    pub fn active_row(&self) -> u32 {
        self.active_row
    }

    /// Page within the active row that receives the next byte
    pub fn active_page_in_row(&self) -> u8 {
        self.active_page_in_row
    }

    /// Offset within the active page that receives the next byte
    pub fn free_offset_in_page(&self) -> u16 {
        self.free_offset_in_page
    }

    /// The staged row image
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Whether the buffer mirrors the active row
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Number of erase-and-replay cycles performed
    pub fn replays(&self) -> u32 {
        self.replays
    }

    /// Whether the active row must be replayed before flash can be trusted
    pub fn replay_pending(&self) -> bool {
        self.replay_pending
    }
}

impl ProgramStrategy for RowShadow {
    fn reset(&mut self, geometry: &FlashGeometry) -> Result<()> {
        let row_size = geometry.row_size() as usize;
        self.buffer.clear();
        self.buffer
            .resize(row_size, ERASED_BYTE)
            .map_err(|_| Error::InvalidGeometry)?;
        self.page_size = geometry.page_size as usize;
        self.pages_per_row = geometry.pages_per_row;
        self.active_row = 0;
        self.active_page_in_row = 0;
        self.free_offset_in_page = 0;
        self.loaded = false;
        self.replay_pending = false;
        Ok(())
    }

    fn program_chunk<C: NvmController + ?Sized>(
        &mut self,
        ctrl: &mut C,
        params: &ProgramParams<'_>,
        chunk: &PageChunk,
        data: &[u8],
    ) -> Result<()> {
        self.retarget(ctrl, params, chunk.address)?;
        self.append_and_maybe_commit(ctrl, params, data)
    }

    fn rows_erased(&mut self, first_row: u32, count: u32) {
        if self.loaded && self.active_row >= first_row && self.active_row - first_row < count {
            self.flush();
            self.loaded = false;
            self.replay_pending = false;
        }
    }
}
