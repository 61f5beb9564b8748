//! Read command

use std::fs;
use std::path::Path;

use nvmflash_core::controller::NvmController;
use nvmflash_core::flash::{NvmFlash, ProgramStrategy};

use super::{check_span, progress, row_pieces};
use crate::error::Result;

/// Read `length` bytes at `address` (the rest of the array if `None`) into `output`
pub fn run_read<C: NvmController, S: ProgramStrategy>(
    nvm: &mut NvmFlash<C, S>,
    address: u32,
    length: Option<u32>,
    output: &Path,
) -> Result<()> {
    let geometry = *nvm.geometry();
    let length = match length {
        Some(length) => length,
        None => geometry.end_address().saturating_sub(address as u64) as u32,
    };
    check_span(&geometry, address, length)?;

    let mut data = vec![0u8; length as usize];
    let pb = progress::bar(length as u64, "Reading")?;
    for (offset, len) in row_pieces(&geometry, address, data.len(), 1) {
        nvm.read(address + offset as u32, &mut data[offset..offset + len])?;
        pb.inc(len as u64);
    }
    pb.finish_with_message("Read complete");

    fs::write(output, &data)?;
    println!("Wrote {} bytes to {:?}", data.len(), output);
    Ok(())
}
