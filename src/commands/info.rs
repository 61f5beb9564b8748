//! Info command

use nvmflash_core::config::NvmConfig;
use nvmflash_core::controller::NvmController;
use nvmflash_core::flash::{NvmFlash, ProgramStrategy};

use crate::error::Result;

/// Print the geometry, controller setup and how many rows are in use
pub fn run_info<C: NvmController, S: ProgramStrategy>(
    nvm: &mut NvmFlash<C, S>,
    config: &NvmConfig,
) -> Result<()> {
    let geometry = *nvm.geometry();
    let controller = *nvm.config();
    let timeouts = *nvm.timeouts();

    println!("NVM Information");
    println!("===============");
    println!();
    println!(
        "Size:            {} bytes ({} KiB)",
        geometry.flash_size,
        geometry.flash_size / 1024
    );
    println!(
        "Address range:   0x{:08X} - 0x{:08X}",
        geometry.base_address,
        geometry.end_address() - 1
    );
    println!("Page size:       {} bytes", geometry.page_size);
    println!(
        "Row size:        {} bytes ({} pages)",
        geometry.row_size(),
        geometry.pages_per_row
    );
    println!("Rows:            {}", geometry.row_count());
    println!("Word size:       {} bytes", geometry.word_size);
    println!("Min write:       {} bytes", geometry.min_program_size);
    println!("Write mode:      {:?}", config.write_mode);
    println!();
    println!("CTRLB:           0x{:08X}", controller.ctrlb());
    println!("  Wait states:   {}", controller.read_wait_states);
    println!(
        "  Page write:    {}",
        if controller.manual_write { "manual" } else { "automatic" }
    );
    println!("  Sleep mode:    {:?}", controller.sleep_mode);
    println!("  Read mode:     {:?}", controller.read_mode);
    println!("  Cache:         {}", if controller.cache_disabled { "disabled" } else { "enabled" });
    println!();
    println!(
        "Timeouts:        poll {}us, program {}us, erase {}us",
        timeouts.poll_delay_us, timeouts.program_timeout_us, timeouts.erase_timeout_us
    );

    let mut used = 0u32;
    for row in 0..geometry.row_count() {
        if !nvm.is_row_blank(geometry.row_address(row))? {
            used += 1;
        }
    }
    println!();
    println!(
        "Rows in use:     {} of {} ({} bytes erased)",
        used,
        geometry.row_count(),
        (geometry.row_count() - used) as u64 * geometry.row_size() as u64
    );
    Ok(())
}
