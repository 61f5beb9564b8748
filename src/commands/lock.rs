//! Region lock commands

use nvmflash_core::controller::NvmController;
use nvmflash_core::flash::{NvmFlash, ProgramStrategy};

use crate::error::Result;

/// Lock (or unlock) the region containing `address`
pub fn run_lock<C: NvmController, S: ProgramStrategy>(
    nvm: &mut NvmFlash<C, S>,
    address: u32,
    lock: bool,
) -> Result<()> {
    if lock {
        nvm.lock_region(address)?;
        println!("Locked region containing 0x{:08X}", address);
    } else {
        nvm.unlock_region(address)?;
        println!("Unlocked region containing 0x{:08X}", address);
    }
    Ok(())
}
