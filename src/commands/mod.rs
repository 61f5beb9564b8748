//! CLI command implementations
//!
//! Every command drives an initialized [`NvmFlash`] session. Long transfers
//! are cut at row boundaries so the progress bar moves once per row.
//!
//! [`NvmFlash`]: nvmflash_core::flash::NvmFlash

mod blank_check;
mod erase;
mod info;
mod lock;
mod progress;
mod read;
mod write;

pub use blank_check::run_blank_check;
pub use erase::run_erase;
pub use info::run_info;
pub use lock::run_lock;
pub use read::run_read;
pub use write::run_write;

use nvmflash_core::geometry::FlashGeometry;

use crate::error::{CliError, Result};

/// Split `len` bytes at `address` into row-bounded `(offset, len)` pieces
///
/// A head shorter than `min_len` is folded into the piece after it and a
/// tail shorter than `min_len` into the piece before it, so every piece is
/// a valid write on its own.
fn row_pieces(
    geometry: &FlashGeometry,
    address: u32,
    len: usize,
    min_len: usize,
) -> Vec<(usize, usize)> {
    let row_size = geometry.row_size() as usize;
    let start = geometry.offset_of(address) as usize;

    let mut pieces = Vec::new();
    let mut offset = 0;
    while offset < len {
        let left = len - offset;
        let mut take = (row_size - (start + offset) % row_size).min(left);
        if take < min_len {
            take = (take + row_size).min(left);
        }
        if left - take < min_len {
            take = left;
        }
        pieces.push((offset, take));
        offset += take;
    }
    pieces
}

/// Check that `[address, address + length)` lies inside the array
fn check_span(geometry: &FlashGeometry, address: u32, length: u32) -> Result<()> {
    if !geometry.contains(address) || address as u64 + length as u64 > geometry.end_address() {
        return Err(CliError::OutOfRange { address, length });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_pieces_unaligned() {
        let geo = FlashGeometry::SAMD21G18A;
        assert_eq!(
            row_pieces(&geo, 0xF0, 0x120, 4),
            vec![(0, 0x10), (0x10, 0x100), (0x110, 0x10)]
        );
    }

    #[test]
    fn test_row_pieces_folds_short_tail() {
        let geo = FlashGeometry::SAMD21G18A;
        assert_eq!(row_pieces(&geo, 0, 258, 4), vec![(0, 258)]);
        assert_eq!(row_pieces(&geo, 0, 258, 1), vec![(0, 256), (256, 2)]);
    }

    #[test]
    fn test_row_pieces_folds_short_head() {
        let geo = FlashGeometry::SAMD21G18A;
        assert_eq!(row_pieces(&geo, 0xFE, 100, 4), vec![(0, 100)]);
        assert_eq!(
            row_pieces(&geo, 0xFE, 0x300, 4),
            vec![(0, 0x102), (0x102, 0x100), (0x202, 0xFE)]
        );
        assert_eq!(row_pieces(&geo, 0xFE, 100, 1), vec![(0, 2), (2, 98)]);
    }

    #[test]
    fn test_row_pieces_empty() {
        assert!(row_pieces(&FlashGeometry::SAMD21G18A, 0, 0, 4).is_empty());
    }

    #[test]
    fn test_check_span() {
        let geo = FlashGeometry::SAMD21G18A;
        assert!(check_span(&geo, 0, 256 * 1024).is_ok());
        assert!(check_span(&geo, 4, 256 * 1024).is_err());
        assert!(check_span(&geo, 256 * 1024, 0).is_err());
    }
}
