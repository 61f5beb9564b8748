//! NVMCTRL command sequences
//!
//! This module implements the command sequences of the NVM controller:
//! row erase, page program through the page buffer, region lock/unlock,
//! and blank checks over the memory-mapped array.
//!
//! Every wait is a bounded poll of the ready flag. A controller that never
//! becomes ready surfaces as [`Error::Timeout`] instead of a hang.
//!
//! None of these functions acknowledge the sticky status flags except
//! [`erase_range`], which is a complete logical operation on its own. The
//! caller resolves status once per logical operation with
//! [`crate::status::resolve_status`].

use crate::controller::{Command, NvmController, StatusFlags};
use crate::error::{Error, Result};
use crate::geometry::{FlashGeometry, ERASED_BYTE, ERASED_WORD};
use crate::status::{peek_status, resolve_status};

/// Wait budgets for controller operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Delay between polls of the ready flag
    pub poll_delay_us: u32,
    /// Budget for page buffer commands, page writes and array reads
    pub program_timeout_us: u32,
    /// Budget for a row erase or lock command
    pub erase_timeout_us: u32,
}

impl Default for Timeouts {
    fn default() -> Self {
        // Page write is ~2.5ms, row erase ~6ms on SAM D2x
        Self {
            poll_delay_us: 10,
            program_timeout_us: 10_000,
            erase_timeout_us: 50_000,
        }
    }
}

/// Wait for the controller to report ready
///
/// Polls the ready flag at most `timeout_us / poll_delay_us` times (at least
/// once) and returns `Error::Timeout` if it never comes up.
pub fn wait_ready<C: NvmController + ?Sized>(
    ctrl: &mut C,
    poll_delay_us: u32,
    timeout_us: u32,
) -> Result<()> {
    let max_polls = if poll_delay_us > 0 {
        timeout_us / poll_delay_us
    } else {
        timeout_us // Fall back to polling once per microsecond
    };

    for _ in 0..max_polls.max(1) {
        if ctrl.is_ready() {
            return Ok(());
        }
        if poll_delay_us > 0 {
            ctrl.delay_us(poll_delay_us);
        }
    }

    log::warn!("NVM controller not ready after {}us", timeout_us);
    Err(Error::Timeout)
}

/// Issue an addressed command and wait for it to complete
fn execute_at<C: NvmController + ?Sized>(
    ctrl: &mut C,
    cmd: Command,
    addr: u32,
    timeouts: &Timeouts,
    timeout_us: u32,
) -> Result<()> {
    wait_ready(ctrl, timeouts.poll_delay_us, timeout_us)?;
    ctrl.set_address(addr);
    ctrl.issue_command(cmd);
    wait_ready(ctrl, timeouts.poll_delay_us, timeout_us)
}

/// Erase one row
///
/// `row_start` must be the first byte of a row. Afterwards every bit of the
/// row is set.
pub fn erase_row<C: NvmController + ?Sized>(
    ctrl: &mut C,
    row_start: u32,
    timeouts: &Timeouts,
) -> Result<()> {
    log::trace!("Erase row at 0x{:08X}", row_start);
    execute_at(
        ctrl,
        Command::EraseRow,
        row_start,
        timeouts,
        timeouts.erase_timeout_us,
    )
}

/// Erase `row_count` consecutive rows starting at `row_start`
///
/// The status flags aggregate over the whole loop and are resolved once at
/// the end, also when a row erase timed out.
pub fn erase_range<C: NvmController + ?Sized>(
    ctrl: &mut C,
    geometry: &FlashGeometry,
    row_start: u32,
    row_count: u32,
    timeouts: &Timeouts,
) -> Result<()> {
    let row_size = geometry.row_size();
    let outcome = (0..row_count)
        .try_for_each(|i| erase_row(&mut *ctrl, row_start + i * row_size, timeouts));
    let status = resolve_status(ctrl);
    outcome.and(status)
}

/// Lock the region containing `addr`
pub fn lock_region<C: NvmController + ?Sized>(
    ctrl: &mut C,
    addr: u32,
    timeouts: &Timeouts,
) -> Result<()> {
    execute_at(
        ctrl,
        Command::LockRegion,
        addr,
        timeouts,
        timeouts.erase_timeout_us,
    )
}

/// Unlock the region containing `addr`
pub fn unlock_region<C: NvmController + ?Sized>(
    ctrl: &mut C,
    addr: u32,
    timeouts: &Timeouts,
) -> Result<()> {
    execute_at(
        ctrl,
        Command::UnlockRegion,
        addr,
        timeouts,
        timeouts.erase_timeout_us,
    )
}

/// Assemble the page buffer word at `word_addr`
///
/// Bytes inside `[data_start, data_start + data.len())` come from `data`,
/// all others are the erased filler so they leave flash untouched.
fn pack_word(geometry: &FlashGeometry, word_addr: u32, data_start: u32, data: &[u8]) -> u32 {
    let mut word = ERASED_WORD;
    for b in 0..geometry.word_size {
        let byte_addr = word_addr + b;
        if byte_addr >= data_start && ((byte_addr - data_start) as usize) < data.len() {
            let byte = data[(byte_addr - data_start) as usize];
            word &= !(0xFF << (8 * b)) | ((byte as u32) << (8 * b));
        }
    }
    word
}

/// Program up to one page
///
/// `data` is written starting at `addr` and must not cross the end of the
/// page containing `addr`. The page buffer is cleared first, then loaded
/// word by word from the word containing `addr` up to the end of the page:
///
/// - words covered by `data` carry the data (a word only partly covered is
///   completed with erased filler bytes);
/// - words past the end of `data` carry the erased filler, so the rest of
///   the page stays as it is;
/// - nothing past the page boundary is touched.
///
/// In manual write mode the page is committed with an explicit `WritePage`
/// command; otherwise the controller commits when the last word of the
/// page is loaded.
///
/// The bytes being programmed must be blank: programming can only clear
/// bits. Returns the error flags observed after the write without
/// acknowledging them.
pub fn program_page<C: NvmController + ?Sized>(
    ctrl: &mut C,
    geometry: &FlashGeometry,
    addr: u32,
    data: &[u8],
    manual_write: bool,
    timeouts: &Timeouts,
) -> Result<StatusFlags> {
    let page_base = geometry.page_base_address(addr);
    let page_end = page_base as u64 + geometry.page_size as u64;
    if data.is_empty() || addr as u64 + data.len() as u64 > page_end {
        return Err(Error::InvalidByteCount);
    }

    log::trace!(
        "Program {} bytes at 0x{:08X} (page 0x{:08X})",
        data.len(),
        addr,
        page_base
    );

    wait_ready(ctrl, timeouts.poll_delay_us, timeouts.program_timeout_us)?;
    ctrl.issue_command(Command::PageBufferClear);
    wait_ready(ctrl, timeouts.poll_delay_us, timeouts.program_timeout_us)?;

    let data_end = addr as u64 + data.len() as u64;
    let first_word = geometry.to_word_index(addr);
    let page_end_word = geometry.to_word_index(page_base) + geometry.words_per_page();

    for word_index in first_word..page_end_word {
        let word_addr = geometry.word_address(word_index);
        let word = if word_addr as u64 >= data_end {
            ERASED_WORD
        } else {
            pack_word(geometry, word_addr, addr, data)
        };
        ctrl.write_word(word_index, word);
    }

    if manual_write {
        ctrl.set_address(page_base);
        ctrl.issue_command(Command::WritePage);
    }
    wait_ready(ctrl, timeouts.poll_delay_us, timeouts.program_timeout_us)?;

    Ok(peek_status(ctrl))
}

/// Find the first non-blank byte in `[addr, addr + len)`
///
/// Reads the array a word at a time and stops at the first word holding a
/// programmed byte inside the span. Returns the address of that word.
pub fn first_non_blank<C: NvmController + ?Sized>(
    ctrl: &mut C,
    geometry: &FlashGeometry,
    addr: u32,
    len: u32,
) -> Option<u32> {
    if len == 0 {
        return None;
    }
    let end = addr as u64 + len as u64;
    let first_word = geometry.to_word_index(addr);
    let last_word = geometry.to_word_index((end - 1) as u32);

    for word_index in first_word..=last_word {
        let word = ctrl.read_word(word_index);
        if word == ERASED_WORD {
            continue;
        }
        let word_addr = geometry.word_address(word_index);
        let dirty = (0..geometry.word_size).any(|b| {
            let byte_addr = word_addr + b;
            byte_addr >= addr && (byte_addr as u64) < end && (word >> (8 * b)) as u8 != ERASED_BYTE
        });
        if dirty {
            return Some(word_addr);
        }
    }
    None
}

/// Check that `[addr, addr + len)` is erased
///
/// Returns `Error::NotBlank` with the address of the first programmed word.
pub fn check_blank<C: NvmController + ?Sized>(
    ctrl: &mut C,
    geometry: &FlashGeometry,
    addr: u32,
    len: u32,
    timeouts: &Timeouts,
) -> Result<()> {
    wait_ready(ctrl, timeouts.poll_delay_us, timeouts.program_timeout_us)?;
    match first_non_blank(ctrl, geometry, addr, len) {
        Some(addr) => Err(Error::NotBlank { addr }),
        None => Ok(()),
    }
}

/// Whether the row starting at `row_start` is erased
pub fn is_row_blank<C: NvmController + ?Sized>(
    ctrl: &mut C,
    geometry: &FlashGeometry,
    row_start: u32,
    timeouts: &Timeouts,
) -> Result<bool> {
    wait_ready(ctrl, timeouts.poll_delay_us, timeouts.program_timeout_us)?;
    Ok(first_non_blank(ctrl, geometry, row_start, geometry.row_size()).is_none())
}

/// Whether the page containing `addr` is erased
pub fn is_page_blank<C: NvmController + ?Sized>(
    ctrl: &mut C,
    geometry: &FlashGeometry,
    addr: u32,
    timeouts: &Timeouts,
) -> Result<bool> {
    wait_ready(ctrl, timeouts.poll_delay_us, timeouts.program_timeout_us)?;
    let page_base = geometry.page_base_address(addr);
    Ok(first_non_blank(ctrl, geometry, page_base, geometry.page_size).is_none())
}

/// Read `buf.len()` bytes starting at `addr`
pub fn read<C: NvmController + ?Sized>(
    ctrl: &mut C,
    geometry: &FlashGeometry,
    addr: u32,
    buf: &mut [u8],
    timeouts: &Timeouts,
) -> Result<()> {
    wait_ready(ctrl, timeouts.poll_delay_us, timeouts.program_timeout_us)?;

    let mut cached: Option<(u32, u32)> = None;
    for (i, byte) in buf.iter_mut().enumerate() {
        let byte_addr = addr + i as u32;
        let word_index = geometry.to_word_index(byte_addr);
        let word = match cached {
            Some((index, word)) if index == word_index => word,
            _ => {
                let word = ctrl.read_word(word_index);
                cached = Some((word_index, word));
                word
            }
        };
        let shift = 8 * (geometry.offset_of(byte_addr) % geometry.word_size);
        *byte = (word >> shift) as u8;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geo() -> FlashGeometry {
        FlashGeometry {
            page_size: 16,
            pages_per_row: 4,
            word_size: 4,
            flash_size: 256,
            base_address: 0,
            min_program_size: 4,
        }
    }

    #[test]
    fn test_pack_word_full() {
        let word = pack_word(&geo(), 4, 4, &[0x11, 0x22, 0x33, 0x44]);
        assert_eq!(word, 0x4433_2211);
    }

    #[test]
    fn test_pack_word_unaligned_start() {
        // Data starts at byte 6: bytes 4 and 5 of the word stay erased
        let word = pack_word(&geo(), 4, 6, &[0xAA, 0xBB, 0xCC]);
        assert_eq!(word, 0xBBAA_FFFF);
    }

    #[test]
    fn test_pack_word_short_tail() {
        let word = pack_word(&geo(), 8, 4, &[0, 0, 0, 0, 0x12]);
        assert_eq!(word, 0xFFFF_FF12);
    }

    #[test]
    fn test_default_timeouts_allow_polling() {
        let t = Timeouts::default();
        assert!(t.program_timeout_us / t.poll_delay_us > 0);
        assert!(t.erase_timeout_us > t.program_timeout_us);
    }
}
