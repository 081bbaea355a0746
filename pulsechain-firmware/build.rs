//! Build script for pulsechain-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates device.toml at compile time

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Pins the board wires the exposure output and command link to
const OUTPUT_PIN: i64 = 14;
const LINK_PINS: (i64, i64) = (0, 1);

fn main() {
    setup_linker();
    validate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Copy memory.x to the output directory
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validate device.toml at compile time
fn validate_config() {
    println!("cargo:rerun-if-changed=device.toml");

    let config_path = Path::new("device.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: device.toml not found!                                   ║\n\
            ║                                                                  ║\n\
            ║  The firmware embeds device.toml as its configuration.           ║\n\
            ║  Please create one in the pulsechain-firmware directory.         ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read device.toml                               ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in device.toml                       ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    validate_sections(&config, &mut errors);
    validate_output(&config, &mut errors, &mut warnings);
    validate_engine(&config, &mut errors);
    validate_link(&config, &mut errors, &mut warnings);
    validate_status(&config, &mut errors);

    for warning in &warnings {
        println!("cargo:warning={}", warning);
    }

    if !errors.is_empty() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: Invalid device configuration                             ║\n\
            ╠══════════════════════════════════════════════════════════════════╣\n\
            {}\n\
            ╚══════════════════════════════════════════════════════════════════╝\n",
            errors
                .iter()
                .map(|e| format!("║  • {:<62} ║", e))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }

    println!("cargo:warning=device.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn validate_sections(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(table) = config.as_table() else {
        return;
    };
    for (name, value) in table {
        if !["output", "engine", "link", "status"].contains(&name.as_str()) {
            errors.push(format!("Unknown section [{}]", name));
        } else if !value.is_table() {
            errors.push(format!("[{}] must be a table", name));
        }
    }
}

/// Parse "gpioN" / "!gpioN", returning (pin, inverted)
fn parse_pin(value: &str) -> Option<(i64, bool)> {
    let (inverted, name) = match value.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    let pin: i64 = name.strip_prefix("gpio")?.parse().ok()?;
    (0..=29).contains(&pin).then_some((pin, inverted))
}

fn pin_field(
    section: &str,
    key: &str,
    table: &toml::Value,
    errors: &mut Vec<String>,
) -> Option<(i64, bool)> {
    match table.get(key) {
        Some(toml::Value::String(s)) => {
            let pin = parse_pin(s);
            if pin.is_none() {
                errors.push(format!("[{}] {} must be \"gpio0\"-\"gpio29\"", section, key));
            }
            pin
        }
        Some(_) => {
            errors.push(format!("[{}] {} must be a string", section, key));
            None
        }
        None => None,
    }
}

fn int_field(
    section: &str,
    key: &str,
    table: &toml::Value,
    min: i64,
    errors: &mut Vec<String>,
) -> Option<i64> {
    match table.get(key) {
        Some(toml::Value::Integer(v)) if *v >= min => Some(*v),
        Some(_) => {
            errors.push(format!("[{}] {} must be an integer >= {}", section, key, min));
            None
        }
        None => None,
    }
}

fn validate_output(config: &toml::Value, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
    let Some(output) = config.get("output") else {
        return;
    };
    if let Some((pin, _)) = pin_field("output", "pin", output, errors) {
        if pin != OUTPUT_PIN {
            warnings.push(format!(
                "[output] pin gpio{} ignored, the board drives gpio{}",
                pin, OUTPUT_PIN
            ));
        }
    }
}

fn validate_engine(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(engine) = config.get("engine") else {
        return;
    };
    int_field("engine", "max_pulses", engine, 1, errors);
    int_field("engine", "max_micros", engine, 0, errors);
    if let Some(ticks) = int_field("engine", "max_ticks", engine, 1, errors) {
        // Two packed sequences (staged and committed) must fit the heap
        if ticks > 512 * 1024 {
            errors.push("[engine] max_ticks must be at most 524288".to_string());
        }
    }
}

fn validate_link(config: &toml::Value, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
    let Some(link) = config.get("link") else {
        return;
    };
    let tx = pin_field("link", "tx_pin", link, errors).map(|(pin, _)| pin);
    let rx = pin_field("link", "rx_pin", link, errors).map(|(pin, _)| pin);
    if tx.is_some_and(|p| p != LINK_PINS.0) || rx.is_some_and(|p| p != LINK_PINS.1) {
        warnings.push(format!(
            "[link] pins ignored, the board uses gpio{}/gpio{}",
            LINK_PINS.0, LINK_PINS.1
        ));
    }
    if let Some(toml::Value::Integer(baud)) = link.get("baud") {
        if !(1200..=921_600).contains(baud) {
            errors.push("[link] baud must be 1200-921600".to_string());
        }
    }
}

fn validate_status(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(status) = config.get("status") else {
        return;
    };
    int_field("status", "refresh_ms", status, 0, errors);
    int_field("status", "rotation_ms", status, 1, errors);
}
