//! Minimal TOML parser for device configuration
//!
//! Handles only the subset `device.toml` uses. It does NOT support the
//! full TOML spec.
//!
//! Supported:
//! - `[section]` headers
//! - `key = value` pairs (quoted strings and integers)
//! - Comments (`# ...`), whole-line and trailing
//!
//! Unknown keys are ignored so older firmware accepts newer files.

use super::types::{DeviceConfig, PinConfig};

/// Configuration parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Unknown or malformed section header
    InvalidSection,
    /// Line is not `key = value`
    InvalidLine,
    /// Value has the wrong type or is out of range
    InvalidValue,
    /// Pin is not of the form `gpioN` / `!gpioN`
    InvalidPin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Output,
    Engine,
    Link,
    Status,
}

/// Parse a `device.toml` into a [`DeviceConfig`]
pub fn parse_config(input: &str) -> Result<DeviceConfig, ConfigError> {
    let mut config = DeviceConfig::default();
    let mut section = Section::Root;

    for line in input.lines() {
        let line = strip_comment(line).trim();
        if line.is_empty() {
            continue;
        }

        if let Some(header) = line.strip_prefix('[') {
            let header = header.strip_suffix(']').ok_or(ConfigError::InvalidSection)?;
            section = parse_section_header(header)?;
            continue;
        }

        let (key, value) = parse_key_value(line).ok_or(ConfigError::InvalidLine)?;
        apply_value(section, key, value, &mut config)?;
    }

    Ok(config)
}

fn parse_section_header(header: &str) -> Result<Section, ConfigError> {
    match header.trim() {
        "output" => Ok(Section::Output),
        "engine" => Ok(Section::Engine),
        "link" => Ok(Section::Link),
        "status" => Ok(Section::Status),
        _ => Err(ConfigError::InvalidSection),
    }
}

fn apply_value(
    section: Section,
    key: &str,
    value: &str,
    config: &mut DeviceConfig,
) -> Result<(), ConfigError> {
    match section {
        Section::Output => {
            if key == "pin" {
                config.output.pin = parse_pin(value)?;
            }
        }
        Section::Engine => match key {
            "max_pulses" => config.engine.max_pulses = parse_nonzero(value)?,
            // 0 disables the duration ceiling
            "max_micros" => {
                let micros: u64 = parse_int(value)?;
                config.engine.max_micros = (micros > 0).then_some(micros);
            }
            "max_ticks" => config.engine.max_ticks = parse_nonzero(value)?,
            _ => {}
        },
        Section::Link => match key {
            "tx_pin" => config.link.tx_pin = parse_pin(value)?.pin,
            "rx_pin" => config.link.rx_pin = parse_pin(value)?.pin,
            "baud" | "baud_rate" => config.link.baud_rate = parse_nonzero(value)?,
            _ => {}
        },
        Section::Status => match key {
            "refresh_ms" => config.status.refresh_ms = parse_int(value)?,
            "rotation_ms" => config.status.rotation_ms = parse_nonzero(value)?,
            _ => {}
        },
        Section::Root => {}
    }
    Ok(())
}

/// Drop a trailing comment unless the `#` sits inside a string
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..i],
            _ => {}
        }
    }
    line
}

fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, value))
}

fn parse_string(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Parse an integer, accepting TOML digit separators (`1_000_000`)
fn parse_int<T: core::str::FromStr>(value: &str) -> Result<T, ConfigError> {
    let mut digits: heapless::String<24> = heapless::String::new();
    for c in value.chars().filter(|&c| c != '_') {
        digits.push(c).map_err(|_| ConfigError::InvalidValue)?;
    }
    digits.parse().map_err(|_| ConfigError::InvalidValue)
}

fn parse_nonzero<T: core::str::FromStr + PartialEq + Default>(value: &str) -> Result<T, ConfigError> {
    let parsed: T = parse_int(value)?;
    if parsed == T::default() {
        return Err(ConfigError::InvalidValue);
    }
    Ok(parsed)
}

/// Parse a pin string like "gpio14" or "!gpio14"
fn parse_pin(value: &str) -> Result<PinConfig, ConfigError> {
    let value = parse_string(value);
    let (inverted, name) = match value.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    let pin: u8 = name
        .strip_prefix("gpio")
        .ok_or(ConfigError::InvalidPin)?
        .parse()
        .map_err(|_| ConfigError::InvalidPin)?;
    if pin > 29 {
        return Err(ConfigError::InvalidPin);
    }
    Ok(PinConfig { pin, inverted })
}
