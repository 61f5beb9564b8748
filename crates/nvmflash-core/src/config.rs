//! TOML configuration
//!
//! Describes the flash array, the controller setup and the write strategy:
//!
//! ```toml
//! write_mode = "row-buffered"
//!
//! [geometry]
//! page_size = 64
//! pages_per_row = 4
//! flash_size = "256 KiB"
//! base_address = 0x0
//!
//! [controller]
//! read_wait_states = 1
//! manual_write = true
//! sleep_mode = "wake-on-access"
//! read_mode = "no-miss-penalty"
//! cache_disabled = false
//!
//! [timeouts]
//! poll_delay_us = 10
//! program_timeout_us = 10000
//! erase_timeout_us = 50000
//! ```
//!
//! Every key is optional; missing keys take the ATSAMD21G18A defaults.

use std::fmt;
use std::format;
use std::fs;
use std::path::Path;
use std::string::{String, ToString};

use crate::controller::{ControllerConfig, ReadMode, SleepMode};
use crate::flash::WriteMode;
use crate::geometry::FlashGeometry;
use crate::protocol::Timeouts;

/// Errors loading a configuration file
#[derive(Debug)]
pub enum ConfigError {
    /// File could not be read
    Io(std::io::Error),
    /// File is not valid TOML or has unexpected values
    Parse(String),
    /// Geometry is inconsistent
    InvalidGeometry,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config: {}", e),
            Self::Parse(msg) => write!(f, "failed to parse config: {}", msg),
            Self::InvalidGeometry => write!(f, "invalid flash geometry in config"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Complete engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NvmConfig {
    /// Flash geometry
    pub geometry: FlashGeometry,
    /// Control register setup
    pub controller: ControllerConfig,
    /// Wait budgets
    pub timeouts: Timeouts,
    /// Page programming strategy
    pub write_mode: WriteMode,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfigFile {
    write_mode: Option<WriteMode>,
    #[serde(default)]
    geometry: TomlGeometry,
    #[serde(default)]
    controller: TomlController,
    #[serde(default)]
    timeouts: TomlTimeouts,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlGeometry {
    #[serde(default, deserialize_with = "deserialize_opt_size")]
    page_size: Option<u32>,
    pages_per_row: Option<u32>,
    word_size: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_size")]
    flash_size: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_size")]
    base_address: Option<u32>,
    min_program_size: Option<u32>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlController {
    read_wait_states: Option<u8>,
    manual_write: Option<bool>,
    sleep_mode: Option<SleepMode>,
    read_mode: Option<ReadMode>,
    cache_disabled: Option<bool>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlTimeouts {
    poll_delay_us: Option<u32>,
    program_timeout_us: Option<u32>,
    erase_timeout_us: Option<u32>,
}

/// Deserialize an optional u32 given as a number, hex string or size string
fn deserialize_opt_size<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SizeOrInt {
        Int(u32),
        Str(String),
    }

    match Option::<SizeOrInt>::deserialize(deserializer)? {
        None => Ok(None),
        Some(SizeOrInt::Int(n)) => Ok(Some(n)),
        Some(SizeOrInt::Str(s)) => parse_size(&s).map(Some).map_err(serde::de::Error::custom),
    }
}

/// Parse "0x4000", "16384", "16 KiB" or "16K"
pub fn parse_size(s: &str) -> Result<u32, String> {
    let s = s.trim();

    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u32::from_str_radix(hex.trim(), 16).map_err(|e| format!("invalid hex: {}", e));
    }
    if let Ok(n) = s.parse::<u32>() {
        return Ok(n);
    }

    let lower = s.to_lowercase();
    let (num, multiplier) = if let Some(n) = lower.strip_suffix("mib") {
        (n, 1024 * 1024)
    } else if let Some(n) = lower.strip_suffix("kib") {
        (n, 1024)
    } else if let Some(n) = lower.strip_suffix('m') {
        (n, 1024 * 1024)
    } else if let Some(n) = lower.strip_suffix('k') {
        (n, 1024)
    } else {
        return Err(format!("invalid size: {}", s));
    };

    let num: u32 = num
        .trim()
        .parse()
        .map_err(|_| format!("invalid size: {}", s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: {}", s))
}

impl NvmConfig {
    /// Load a configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: TomlConfigFile =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let defaults = NvmConfig::default();

        let g = file.geometry;
        let geometry = FlashGeometry {
            page_size: g.page_size.unwrap_or(defaults.geometry.page_size),
            pages_per_row: g.pages_per_row.unwrap_or(defaults.geometry.pages_per_row),
            word_size: g.word_size.unwrap_or(defaults.geometry.word_size),
            flash_size: g.flash_size.unwrap_or(defaults.geometry.flash_size),
            base_address: g.base_address.unwrap_or(defaults.geometry.base_address),
            min_program_size: g
                .min_program_size
                .unwrap_or(defaults.geometry.min_program_size),
        };
        geometry
            .validate()
            .map_err(|_| ConfigError::InvalidGeometry)?;

        let c = file.controller;
        let controller = ControllerConfig {
            read_wait_states: c
                .read_wait_states
                .unwrap_or(defaults.controller.read_wait_states),
            manual_write: c.manual_write.unwrap_or(defaults.controller.manual_write),
            sleep_mode: c.sleep_mode.unwrap_or(defaults.controller.sleep_mode),
            read_mode: c.read_mode.unwrap_or(defaults.controller.read_mode),
            cache_disabled: c
                .cache_disabled
                .unwrap_or(defaults.controller.cache_disabled),
        };
        if controller.read_wait_states > 15 {
            return Err(ConfigError::Parse(format!(
                "read_wait_states must be 0..=15, got {}",
                controller.read_wait_states
            )));
        }

        let t = file.timeouts;
        let timeouts = Timeouts {
            poll_delay_us: t.poll_delay_us.unwrap_or(defaults.timeouts.poll_delay_us),
            program_timeout_us: t
                .program_timeout_us
                .unwrap_or(defaults.timeouts.program_timeout_us),
            erase_timeout_us: t
                .erase_timeout_us
                .unwrap_or(defaults.timeouts.erase_timeout_us),
        };

        Ok(Self {
            geometry,
            controller,
            timeouts,
            write_mode: file.write_mode.unwrap_or(defaults.write_mode),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_samd21() {
        let cfg = NvmConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, NvmConfig::default());
        assert_eq!(cfg.geometry, FlashGeometry::SAMD21G18A);
        assert_eq!(cfg.write_mode, WriteMode::Direct);
    }

    #[test]
    fn test_full_config() {
        let cfg = NvmConfig::from_toml_str(
            r#"
            write_mode = "row-buffered"

            [geometry]
            page_size = 64
            pages_per_row = 4
            flash_size = "64 KiB"
            base_address = "0x2000"

            [controller]
            read_wait_states = 2
            manual_write = false
            sleep_mode = "disabled"
            read_mode = "deterministic"
            cache_disabled = true

            [timeouts]
            poll_delay_us = 5
            erase_timeout_us = 100000
            "#,
        )
        .unwrap();

        assert_eq!(cfg.write_mode, WriteMode::RowBuffered);
        assert_eq!(cfg.geometry.flash_size, 64 * 1024);
        assert_eq!(cfg.geometry.base_address, 0x2000);
        assert_eq!(cfg.controller.read_wait_states, 2);
        assert!(!cfg.controller.manual_write);
        assert_eq!(cfg.controller.sleep_mode, SleepMode::Disabled);
        assert_eq!(cfg.controller.read_mode, ReadMode::Deterministic);
        assert!(cfg.controller.cache_disabled);
        assert_eq!(cfg.timeouts.poll_delay_us, 5);
        assert_eq!(cfg.timeouts.program_timeout_us, 10_000);
        assert_eq!(cfg.timeouts.erase_timeout_us, 100_000);
    }

    #[test]
    fn test_bad_geometry_rejected() {
        let err = NvmConfig::from_toml_str("[geometry]\npage_size = 48\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidGeometry));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = NvmConfig::from_toml_str("[geometry]\nsector_size = 4096\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4096"), Ok(4096));
        assert_eq!(parse_size("0x1000"), Ok(4096));
        assert_eq!(parse_size("4 KiB"), Ok(4096));
        assert_eq!(parse_size("4k"), Ok(4096));
        assert_eq!(parse_size("1 MiB"), Ok(1024 * 1024));
        assert!(parse_size("lots").is_err());
    }
}
