//! Image-backed emulated controller
//!
//! The array lives in the image file. Lock bits are kept next to it in
//! `<image>.locks` as a hex mask, so that a region locked by one invocation
//! is still locked in the next.

use std::fs;
use std::path::{Path, PathBuf};

use nvmflash_core::config::NvmConfig;
use nvmflash_sim::{SimConfig, SimController};

use crate::error::{CliError, Result};

fn lock_path(image: &Path) -> PathBuf {
    let mut name = image.as_os_str().to_os_string();
    name.push(".locks");
    PathBuf::from(name)
}

/// Open the emulated controller for an image
pub fn open(image: &Path, config: &NvmConfig) -> Result<SimController> {
    let sim_config = SimConfig {
        geometry: config.geometry,
        ..SimConfig::default()
    };
    let mut sim = SimController::from_image_file(sim_config, image)?;

    let locks = lock_path(image);
    if locks.exists() {
        let text = fs::read_to_string(&locks)?;
        let value = text.trim();
        let mask = u32::from_str_radix(value.trim_start_matches("0x"), 16).map_err(|_| {
            CliError::LockFile {
                path: locks.display().to_string(),
                value: value.to_string(),
            }
        })?;
        sim.set_locked_regions(mask);
        log::debug!("Restored lock mask 0x{:08X}", mask);
    }

    Ok(sim)
}

/// Write the array and the lock bits back
pub fn save(image: &Path, sim: &SimController) -> Result<()> {
    sim.save_image(image)?;
    let locks = lock_path(image);
    if sim.locked_regions() != 0 {
        fs::write(&locks, format!("0x{:08X}\n", sim.locked_regions()))?;
    } else if locks.exists() {
        fs::remove_file(&locks)?;
    }
    log::debug!("Saved {} bytes to {}", sim.data().len(), image.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_path() {
        assert_eq!(
            lock_path(Path::new("out/nvm.bin")),
            PathBuf::from("out/nvm.bin.locks")
        );
    }
}
