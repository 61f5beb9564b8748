//! Erase command

use nvmflash_core::controller::NvmController;
use nvmflash_core::flash::{NvmFlash, ProgramStrategy};

use super::progress;
use crate::error::Result;

/// Erase `rows` rows starting at `address`
pub fn run_erase<C: NvmController, S: ProgramStrategy>(
    nvm: &mut NvmFlash<C, S>,
    address: u32,
    rows: u32,
) -> Result<()> {
    let row_size = nvm.geometry().row_size();
    let pb = progress::spinner(format!(
        "Erasing {} rows ({} bytes) at 0x{:08X}...",
        rows,
        rows as u64 * row_size as u64,
        address
    ))?;

    let result = nvm.erase_rows(address, rows);
    match result {
        Ok(()) => pb.finish_with_message(format!("Erased {} rows", rows)),
        Err(e) => pb.abandon_with_message(format!("Erase failed: {}", e)),
    }
    result?;
    Ok(())
}
