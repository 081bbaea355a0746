//! Device configuration
//!
//! The firmware embeds a `device.toml` and parses it at boot with
//! [`parse_config`]. Missing sections and keys keep their defaults.

pub mod parse;
pub mod types;

pub use parse::{parse_config, ConfigError};
pub use types::{DeviceConfig, EngineConfig, LinkConfig, OutputConfig, PinConfig, StatusConfig};
