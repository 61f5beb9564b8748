//! Write command

use std::fs;
use std::path::Path;

use nvmflash_core::controller::NvmController;
use nvmflash_core::flash::{NvmFlash, ProgramStrategy};

use super::{progress, row_pieces};
use crate::error::{CliError, Result};

/// Write the contents of `input` at `address`
pub fn run_write<C: NvmController, S: ProgramStrategy>(
    nvm: &mut NvmFlash<C, S>,
    address: u32,
    input: &Path,
) -> Result<()> {
    let data = fs::read(input)?;
    if data.is_empty() {
        return Err(CliError::EmptyInput(input.display().to_string()));
    }
    println!("Read {} bytes from {:?}", data.len(), input);

    let geometry = *nvm.geometry();
    geometry.check_range(address, data.len())?;

    let pb = progress::bar(data.len() as u64, "Writing")?;
    for (offset, len) in row_pieces(&geometry, address, data.len(), geometry.min_program_size as usize) {
        nvm.write(address + offset as u32, &data[offset..offset + len])?;
        pb.inc(len as u64);
    }
    pb.finish_with_message("Write complete");

    println!("Wrote {} bytes at 0x{:08X}", data.len(), address);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nvmflash_core::config::NvmConfig;
    use nvmflash_sim::{open_session, SimController};

    #[test]
    fn test_write_just_before_row_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.bin");
        let data: Vec<u8> = (0..100u8).collect();
        fs::write(&input, &data).unwrap();

        let mut nvm = open_session(SimController::new_default(), &NvmConfig::default()).unwrap();
        run_write(&mut nvm, 0xFE, &input).unwrap();

        let flash = nvm.controller().data();
        assert_eq!(&flash[0xFE..0xFE + 100], &data[..]);
        assert!(flash[..0xFE].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_write_rejects_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("empty.bin");
        fs::write(&input, b"").unwrap();

        let mut nvm = open_session(SimController::new_default(), &NvmConfig::default()).unwrap();
        assert!(matches!(
            run_write(&mut nvm, 0, &input),
            Err(CliError::EmptyInput(_))
        ));
    }
}
