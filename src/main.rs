//! nvmflash - On-chip NVM flash programmer
//!
//! Drives the `nvmflash-core` write/erase engine against an emulated NVM
//! controller whose array is kept in an image file.
//!
//! # Architecture
//!
//! - **nvmflash-core** splits writes into page chunks, programs pages through
//!   the controller's page buffer, erases rows and resolves the sticky status
//!   flags. It only talks to the controller through the `NvmController` trait.
//! - **nvmflash-sim** implements that trait in memory.
//!
//! The commands below work on any `NvmController`; the binary wires them to
//! the emulator.

mod cli;
mod commands;
mod error;
mod image;

use clap::Parser;
use cli::{Cli, Commands};
use nvmflash_core::config::NvmConfig;
use nvmflash_sim::open_session;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let mut config = match &cli.config {
        Some(path) => {
            let config = NvmConfig::from_toml_file(path)?;
            log::info!("Loaded configuration from {:?}", path);
            config
        }
        None => NvmConfig::default(),
    };
    if let Some(mode) = cli.mode {
        config.write_mode = mode.into();
    }

    let sim = image::open(&cli.image, &config)?;
    let mut nvm = open_session(sim, &config)?;

    let mutates = matches!(
        cli.command,
        Commands::Write { .. } | Commands::Erase { .. } | Commands::Lock { .. } | Commands::Unlock { .. }
    );

    let result = match cli.command {
        Commands::Info => commands::run_info(&mut nvm, &config),
        Commands::Write { address, input } => commands::run_write(&mut nvm, address, &input),
        Commands::Read {
            address,
            length,
            output,
        } => commands::run_read(&mut nvm, address, length, &output),
        Commands::Erase { address, rows } => commands::run_erase(&mut nvm, address, rows),
        Commands::BlankCheck { address, length } => {
            commands::run_blank_check(&mut nvm, address, length)
        }
        Commands::Lock { address } => commands::run_lock(&mut nvm, address, true),
        Commands::Unlock { address } => commands::run_lock(&mut nvm, address, false),
    };

    // Pages programmed before a failure stay programmed
    if mutates {
        image::save(&cli.image, nvm.controller())?;
    }

    result?;
    Ok(())
}
