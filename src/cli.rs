//! CLI argument parsing

use clap::{Parser, Subcommand, ValueEnum};
use nvmflash_core::flash::WriteMode;
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

#[derive(Parser)]
#[command(name = "nvmflash")]
#[command(author, version, about = "On-chip NVM flash programmer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Flash image backing the emulated controller (created erased if missing)
    #[arg(long, global = true, default_value = "nvm.bin")]
    pub image: PathBuf,

    /// Configuration file (TOML format)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Write strategy, overrides the configuration file
    #[arg(long, global = true, value_enum)]
    pub mode: Option<ModeArg>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Write strategy on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    /// Program pages directly; targets must be erased
    Direct,
    /// Stage rows in RAM, erase and replay rows on rewrite
    RowBuffered,
}

impl From<ModeArg> for WriteMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Direct => WriteMode::Direct,
            ModeArg::RowBuffered => WriteMode::RowBuffered,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show geometry, controller configuration and row usage
    Info,

    /// Write a file to flash
    Write {
        /// Destination address (hex, e.g., 0x2000)
        #[arg(short, long, value_parser = parse_hex_u32)]
        address: u32,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Read flash contents to a file
    Read {
        /// Start address (hex or decimal)
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0")]
        address: u32,

        /// Number of bytes (defaults to the rest of the array)
        #[arg(short, long, value_parser = parse_hex_u32)]
        length: Option<u32>,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Erase rows
    Erase {
        /// First byte of the first row (hex or decimal)
        #[arg(short, long, value_parser = parse_hex_u32)]
        address: u32,

        /// Number of rows
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "1")]
        rows: u32,
    },

    /// Check that a range is erased
    BlankCheck {
        /// Start address (hex or decimal)
        #[arg(short, long, value_parser = parse_hex_u32)]
        address: u32,

        /// Number of bytes (hex or decimal)
        #[arg(short, long, value_parser = parse_hex_u32)]
        length: u32,
    },

    /// Lock the region containing an address
    Lock {
        /// Any address inside the region
        #[arg(short, long, value_parser = parse_hex_u32)]
        address: u32,
    },

    /// Unlock the region containing an address
    Unlock {
        /// Any address inside the region
        #[arg(short, long, value_parser = parse_hex_u32)]
        address: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x2000"), Ok(0x2000));
        assert_eq!(parse_hex_u32("0X10"), Ok(16));
        assert_eq!(parse_hex_u32("4096"), Ok(4096));
        assert!(parse_hex_u32("0xZZ").is_err());
        assert!(parse_hex_u32("-1").is_err());
    }

    #[test]
    fn test_cli_parses_write() {
        let cli = Cli::try_parse_from([
            "nvmflash",
            "--mode",
            "row-buffered",
            "write",
            "--address",
            "0x100",
            "--input",
            "fw.bin",
        ])
        .unwrap();
        assert_eq!(cli.mode, Some(ModeArg::RowBuffered));
        match cli.command {
            Commands::Write { address, input } => {
                assert_eq!(address, 0x100);
                assert_eq!(input, PathBuf::from("fw.bin"));
            }
            _ => panic!("expected write"),
        }
    }

    #[test]
    fn test_cli_verify() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
