//! Engine sessions on top of the emulator

use nvmflash_core::config::NvmConfig;
use nvmflash_core::flash::{AnyStrategy, NvmFlash};
use nvmflash_core::{Error, Result};

use crate::SimController;

/// Build and initialize an engine session for an emulated controller
///
/// The emulator geometry must match the configured geometry.
pub fn open_session(sim: SimController, config: &NvmConfig) -> Result<NvmFlash<SimController>> {
    if sim.config().geometry != config.geometry {
        log::error!(
            "Emulator geometry {:?} does not match configuration {:?}",
            sim.config().geometry,
            config.geometry
        );
        return Err(Error::InvalidGeometry);
    }

    let mut nvm = NvmFlash::new(sim, config.geometry, AnyStrategy::from_mode(config.write_mode))?
        .with_config(config.controller)
        .with_timeouts(config.timeouts);
    nvm.init()?;
    Ok(nvm)
}
