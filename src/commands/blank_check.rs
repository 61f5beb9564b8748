//! Blank check command

use nvmflash_core::controller::NvmController;
use nvmflash_core::flash::{NvmFlash, ProgramStrategy};
use nvmflash_core::Error;

use super::{check_span, row_pieces};
use crate::error::Result;

/// Check that `length` bytes at `address` are erased
///
/// Ranges longer than a row are checked one row at a time.
pub fn run_blank_check<C: NvmController, S: ProgramStrategy>(
    nvm: &mut NvmFlash<C, S>,
    address: u32,
    length: u32,
) -> Result<()> {
    let geometry = *nvm.geometry();
    if length == 0 {
        return Err(Error::InvalidByteCount.into());
    }
    check_span(&geometry, address, length)?;

    for (offset, len) in row_pieces(&geometry, address, length as usize, 1) {
        if let Err(e) = nvm.blank_check(address + offset as u32, len as u32) {
            if let Error::NotBlank { addr } = e {
                println!("Not blank: programmed word at 0x{:08X}", addr);
            }
            return Err(e.into());
        }
    }

    println!("0x{:08X}..0x{:08X} is blank", address, address as u64 + length as u64);
    Ok(())
}
